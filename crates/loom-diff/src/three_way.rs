//! Diff3-style line merge.
//!
//! Both sides are diffed against the base with the Myers algorithm from
//! `similar`. Hunks that overlap or touch are grouped; a group changed by one
//! side takes that side's text, a group changed identically by both sides
//! merges cleanly, and anything else is a conflict labelled with the base
//! line range it covers.

use std::ops::Range;

use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::error::{MergeConflicts, MergeOutcome};
use crate::traits::ContentMerger;

/// A replacement of `base[range]` by `lines`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Hunk<'a> {
    range: Range<usize>,
    lines: Vec<&'a str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Ours,
    Theirs,
}

/// The default [`ContentMerger`]: line-oriented, UTF-8 only.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineMerger;

impl LineMerger {
    pub fn new() -> Self {
        Self
    }
}

impl ContentMerger for LineMerger {
    fn merge(&self, base: &[u8], ours: &[u8], theirs: &[u8]) -> MergeOutcome {
        if ours == theirs || base == theirs {
            return Ok(ours.to_vec());
        }
        if base == ours {
            return Ok(theirs.to_vec());
        }

        let (Ok(base), Ok(ours), Ok(theirs)) = (
            std::str::from_utf8(base),
            std::str::from_utf8(ours),
            std::str::from_utf8(theirs),
        ) else {
            return Err(MergeConflicts::binary());
        };

        merge_text(base, ours, theirs).map(String::into_bytes)
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn hunks<'a>(base: &[&'a str], side: &[&'a str]) -> Vec<Hunk<'a>> {
    capture_diff_slices(Algorithm::Myers, base, side)
        .iter()
        .filter_map(|op| {
            let (tag, old, new) = op.as_tag_tuple();
            (tag != DiffTag::Equal).then(|| Hunk {
                range: old,
                lines: side[new].to_vec(),
            })
        })
        .collect()
}

/// Rebuild one side's text for `base[region]` from its hunks inside it.
fn side_text<'a>(base: &[&'a str], region: &Range<usize>, hunks: &[&Hunk<'a>]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = region.start;
    for hunk in hunks {
        out.extend_from_slice(&base[pos..hunk.range.start]);
        out.extend_from_slice(&hunk.lines);
        pos = hunk.range.end;
    }
    out.extend_from_slice(&base[pos..region.end]);
    out
}

fn conflict_label(region: &Range<usize>) -> String {
    let first = region.start + 1;
    let last = region.end.max(first);
    format!("lines {first}-{last}")
}

fn merge_text(base: &str, ours: &str, theirs: &str) -> Result<String, MergeConflicts> {
    let base_lines = split_lines(base);
    let ours_hunks = hunks(&base_lines, &split_lines(ours));
    let theirs_hunks = hunks(&base_lines, &split_lines(theirs));

    let mut tagged: Vec<(Side, &Hunk<'_>)> = ours_hunks
        .iter()
        .map(|h| (Side::Ours, h))
        .chain(theirs_hunks.iter().map(|h| (Side::Theirs, h)))
        .collect();
    tagged.sort_by_key(|(side, h)| (h.range.start, h.range.end, *side == Side::Theirs));

    let mut merged: Vec<&str> = Vec::new();
    let mut conflicts = Vec::new();
    let mut pos = 0;
    let mut next = 0;

    while next < tagged.len() {
        let mut region = tagged[next].1.range.clone();
        let mut ours_group = Vec::new();
        let mut theirs_group = Vec::new();
        while next < tagged.len() && tagged[next].1.range.start <= region.end {
            let (side, hunk) = tagged[next];
            region.end = region.end.max(hunk.range.end);
            match side {
                Side::Ours => ours_group.push(hunk),
                Side::Theirs => theirs_group.push(hunk),
            }
            next += 1;
        }

        merged.extend_from_slice(&base_lines[pos..region.start]);
        let ours_text = side_text(&base_lines, &region, &ours_group);
        let theirs_text = side_text(&base_lines, &region, &theirs_group);
        if theirs_group.is_empty() || ours_text == theirs_text {
            merged.extend(ours_text);
        } else if ours_group.is_empty() {
            merged.extend(theirs_text);
        } else {
            conflicts.push(conflict_label(&region));
        }
        pos = region.end;
    }
    merged.extend_from_slice(&base_lines[pos..]);

    if conflicts.is_empty() {
        Ok(merged.concat())
    } else {
        Err(MergeConflicts::new(conflicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(base: &str, ours: &str, theirs: &str) -> MergeOutcome {
        LineMerger.merge(base.as_bytes(), ours.as_bytes(), theirs.as_bytes())
    }

    fn merged(base: &str, ours: &str, theirs: &str) -> String {
        String::from_utf8(merge(base, ours, theirs).unwrap()).unwrap()
    }

    #[test]
    fn one_sided_changes_take_that_side() {
        assert_eq!(merged("a\nb\n", "a\nb\n", "a\nB\n"), "a\nB\n");
        assert_eq!(merged("a\nb\n", "A\nb\n", "a\nb\n"), "A\nb\n");
    }

    #[test]
    fn disjoint_changes_combine() {
        let base = "1\n2\n3\n4\n5\n";
        let ours = "one\n2\n3\n4\n5\n";
        let theirs = "1\n2\n3\n4\nfive\n";
        assert_eq!(merged(base, ours, theirs), "one\n2\n3\n4\nfive\n");
    }

    #[test]
    fn insert_and_delete_in_separate_regions() {
        let base = "a\nb\nc\nd\ne\n";
        let ours = "a\nb\nc\nd\ne\nf\n";
        let theirs = "b\nc\nd\ne\n";
        assert_eq!(merged(base, ours, theirs), "b\nc\nd\ne\nf\n");
    }

    #[test]
    fn identical_changes_merge_cleanly() {
        let base = "x\ny\nz\n";
        let both = "x\nY\nz\n";
        assert_eq!(merged(base, both, both), both);

        let ours = "X\ny\nz\n";
        let theirs = "x\ny\nz\n";
        assert_eq!(merged(base, ours, theirs), ours);
    }

    #[test]
    fn overlapping_edits_conflict_with_line_label() {
        let err = merge("a\nb\nc\n", "a\nours\nc\n", "a\ntheirs\nc\n").unwrap_err();
        assert_eq!(err.paths, vec!["lines 2-2".to_string()]);
    }

    #[test]
    fn adjacent_divergent_edits_conflict() {
        let err = merge("a\nb\nc\nd\n", "a\nB\nc\nd\n", "a\nb\nC\nd\n").unwrap_err();
        assert_eq!(err.paths, vec!["lines 2-3".to_string()]);
    }

    #[test]
    fn competing_inserts_at_same_point_conflict() {
        let err = merge("a\n", "a\nours\n", "a\ntheirs\n").unwrap_err();
        assert_eq!(err.paths.len(), 1);
    }

    #[test]
    fn multiple_conflicts_are_all_reported() {
        let base = "1\n2\n3\n4\n5\n6\n7\n";
        let ours = "1\nA\n3\n4\n5\nB\n7\n";
        let theirs = "1\nX\n3\n4\n5\nY\n7\n";
        let err = merge(base, ours, theirs).unwrap_err();
        assert_eq!(err.paths, vec!["lines 2-2", "lines 6-6"]);
    }

    #[test]
    fn empty_base_merges_identical_content_only() {
        assert_eq!(merged("", "same\n", "same\n"), "same\n");
        assert!(merge("", "left\n", "right\n").is_err());
    }

    #[test]
    fn missing_trailing_newline_is_preserved() {
        assert_eq!(merged("a\nb", "A\nb", "a\nb"), "A\nb");
        assert_eq!(merged("a\nb\nc", "A\nb\nc", "a\nb\nC"), "A\nb\nC");
    }

    #[test]
    fn binary_payloads_merge_only_trivially() {
        let base = [0xFFu8, 0x00];
        let ours = [0xFEu8, 0x01];
        assert_eq!(LineMerger.merge(&base, &ours, &base).unwrap(), ours);
        assert_eq!(LineMerger.merge(&base, &base, &ours).unwrap(), ours);

        let theirs = [0xFDu8];
        let err = LineMerger.merge(&base, &ours, &theirs).unwrap_err();
        assert_eq!(err, MergeConflicts::binary());
    }
}
