//! Logical path helpers.
//!
//! Tree node paths, cache keys, and change-event targets are all logical
//! project-relative identifiers: forward-slash separated strings. Every
//! producer and consumer normalizes through here before comparing or
//! keying — a missed normalization silently turns cache hits into misses,
//! so this is a correctness boundary, not a convenience.

use crate::types::CHECKLIST_FILE;

/// Normalizes a path to forward slashes and strips any trailing slash.
pub fn normalize(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() && !normalized.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Joins two logical path fragments with a single slash.
pub fn join(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// Returns the last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the path without its last segment, or `None` for a bare name.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Re-expresses an absolute provider path relative to the project root.
///
/// Returns `None` when the path is the root itself or lies outside it.
pub fn project_relative(path: &str, project_root: &str) -> Option<String> {
    let path = normalize(path);
    let root = normalize(project_root);
    let rest = path.strip_prefix(&root)?;
    let rest = rest.strip_prefix('/')?;
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Whether some `/`-separated segment of the path contains "archive".
pub fn has_archive_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment.contains("archive"))
}

/// Whether the path names a checklist file.
pub fn is_checklist(path: &str) -> bool {
    file_name(path) == CHECKLIST_FILE
}
