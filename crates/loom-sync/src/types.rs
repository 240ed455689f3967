use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use loom_types::CommitId;

use crate::error::{SyncError, SyncResult};

/// A refspec mapping source refs to destination refs.
///
/// `src` and `dst` may each contain a single `*`, which must appear on both
/// sides; the text it matches in `src` is substituted into `dst`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefSpec {
    pub src: String,
    pub dst: String,
    pub force: bool,
}

impl RefSpec {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force: false,
        }
    }

    pub fn forced(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force: true,
        }
    }

    /// `+refs/heads/*:refs/remotes/<remote>/*`
    pub fn fetch_all(remote: &str) -> Self {
        Self::forced("refs/heads/*", format!("refs/remotes/{remote}/*"))
    }

    /// Parse `"+refs/heads/*:refs/remotes/origin/*"` or a bare `"src"`.
    pub fn parse(s: &str) -> SyncResult<Self> {
        let (force, rest) = match s.strip_prefix('+') {
            Some(stripped) => (true, stripped),
            None => (false, s),
        };
        let (src, dst) = rest.split_once(':').unwrap_or((rest, rest));
        let spec = Self {
            src: src.into(),
            dst: dst.into(),
            force,
        };
        spec.validate().map_err(|reason| SyncError::InvalidRefSpec {
            spec: s.to_string(),
            reason: reason.into(),
        })?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.src.is_empty() || self.dst.is_empty() {
            return Err("source and destination must not be empty");
        }
        let src_globs = self.src.matches('*').count();
        let dst_globs = self.dst.matches('*').count();
        if src_globs > 1 || dst_globs > 1 {
            return Err("at most one '*' per side");
        }
        if src_globs != dst_globs {
            return Err("'*' must appear on both sides or neither");
        }
        Ok(())
    }

    pub fn is_glob(&self) -> bool {
        self.src.contains('*')
    }

    /// The destination for `name`, if `name` matches the source side.
    pub fn map(&self, name: &str) -> Option<String> {
        match self.src.split_once('*') {
            Some((prefix, suffix)) => {
                let captured = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
                (!captured.is_empty()).then(|| self.dst.replacen('*', captured, 1))
            }
            None => (name == self.src).then(|| self.dst.clone()),
        }
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            write!(f, "+")?;
        }
        if self.src == self.dst {
            write!(f, "{}", self.src)
        } else {
            write!(f, "{}:{}", self.src, self.dst)
        }
    }
}

impl FromStr for RefSpec {
    type Err = SyncError;

    fn from_str(s: &str) -> SyncResult<Self> {
        Self::parse(s)
    }
}

/// A ref moved by a sync operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUpdate {
    pub name: String,
    pub old: Option<CommitId>,
    pub new: CommitId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub commits_received: usize,
    /// Remote-tracking refs that changed.
    pub refs_updated: Vec<RefUpdate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushResult {
    pub commits_sent: usize,
    /// The remote ref as it was before and after the push.
    pub update: RefUpdate,
}

impl PushResult {
    pub fn is_up_to_date(&self) -> bool {
        self.update.old == Some(self.update.new)
    }
}

/// How pull reconciles the local branch with the fetched one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullStrategy {
    Rebase,
    #[default]
    Merge,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MergeStatus {
    #[default]
    UpToDate,
    FastForward,
    Rebased { replayed: usize },
    Merged { commit: CommitId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullResult {
    pub fetch: FetchResult,
    pub status: MergeStatus,
    /// The local branch after the pull.
    pub tip: CommitId,
}

/// A remote as seen through its remote-tracking refs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub name: String,
    /// `(branch, tip)` pairs, sorted by branch.
    pub branches: Vec<(String, CommitId)>,
}

/// Tunables for [`RemoteSync`](crate::RemoteSync).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on every transport call.
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}
