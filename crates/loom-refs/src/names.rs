//! Ref name validation and classification.
//!
//! Branch names follow git-style conventions: non-empty, no whitespace or
//! `~ ^ : ? * [ \`, no `..` or `@{`, no leading/trailing `/` or `.`, no
//! `.lock` suffix, and no empty or dot-prefixed path components.

use crate::error::{RefError, RefResult};
use crate::types::{RefKind, HEAD};

/// Namespace of local branches.
pub const LOCAL_PREFIX: &str = "refs/heads/";
/// Namespace of remote-tracking refs.
pub const REMOTE_PREFIX: &str = "refs/remotes/";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidRefName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a short branch name such as `main` or `feature/auth`.
///
/// ```
/// use loom_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "branch name must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    let rules: [(bool, &str); 5] = [
        (name.contains(".."), "must not contain '..'"),
        (name.contains("@{"), "must not contain '@{'"),
        (name.ends_with('.'), "must not end with '.'"),
        (name.starts_with('/') || name.ends_with('/'), "must not start or end with '/'"),
        (name.ends_with(".lock"), "must not end with '.lock'"),
    ];
    if let Some((_, reason)) = rules.iter().find(|(broken, _)| *broken) {
        return Err(invalid(name, *reason));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    Ok(())
}

/// Validate a remote name: a single branch-name component.
pub fn validate_remote_name(name: &str) -> RefResult<()> {
    if name.contains('/') {
        return Err(invalid(name, "remote name must not contain '/'"));
    }
    validate_branch_name(name)
}

/// Canonical name of a local branch.
pub fn local_ref(branch: &str) -> String {
    format!("{LOCAL_PREFIX}{branch}")
}

/// Canonical name of a remote-tracking ref.
pub fn remote_tracking_ref(remote: &str, branch: &str) -> String {
    format!("{REMOTE_PREFIX}{remote}/{branch}")
}

/// Validate a canonical ref name and report its namespace.
pub fn classify(name: &str) -> RefResult<RefKind> {
    if name == HEAD {
        return Ok(RefKind::Head);
    }
    if let Some(branch) = name.strip_prefix(LOCAL_PREFIX) {
        validate_branch_name(branch)?;
        return Ok(RefKind::Local {
            branch: branch.to_string(),
        });
    }
    if let Some(rest) = name.strip_prefix(REMOTE_PREFIX) {
        let Some((remote, branch)) = rest.split_once('/') else {
            return Err(invalid(name, "expected refs/remotes/<remote>/<branch>"));
        };
        validate_remote_name(remote)?;
        validate_branch_name(branch)?;
        return Ok(RefKind::RemoteTracking {
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
    }
    Err(invalid(name, "unsupported ref namespace"))
}
