//! Dot-separated path resolution shared by the in-memory value tree
//! (`value.rs`) and the flat header field table (`header.rs`), so both
//! sides agree on what counts as "under" a given path.

/// Splits a dotted path into its segments. An empty path has zero segments
/// (the root).
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// True if `candidate` is `path` itself or a descendant of it at a
/// `.`-segment boundary — `"a.bc"` is never considered under `"a.b"`.
pub fn is_under(candidate: &str, path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    candidate == path || candidate.strip_prefix(path).map(|rest| rest.starts_with('.')).unwrap_or(false)
}
