//! Context path normalization and overlap detection

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::DomainError;

static DUPLICATE_SLASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").expect("valid regex"));
static ALLOWED_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[A-Za-z0-9\-._~/:@!$&'()*+,;=%]*$").expect("valid regex"));

const MAX_CONTEXT_PATH_LENGTH: usize = 256;

/// Normalize a context path: collapse duplicate slashes, drop the trailing slash
pub fn normalize_context_path(path: &str) -> Result<String, DomainError> {
    let trimmed = path.trim();

    if trimmed.is_empty() {
        return Err(DomainError::validation("The context path is required"));
    }

    if !trimmed.starts_with('/') {
        return Err(DomainError::validation(format!(
            "The context path [{}] must start with a '/'",
            trimmed
        )));
    }

    if trimmed.len() > MAX_CONTEXT_PATH_LENGTH {
        return Err(DomainError::validation(format!(
            "The context path exceeds {} characters",
            MAX_CONTEXT_PATH_LENGTH
        )));
    }

    if !ALLOWED_PATH.is_match(trimmed) {
        return Err(DomainError::validation(format!(
            "The context path [{}] contains invalid characters",
            trimmed
        )));
    }

    let collapsed = DUPLICATE_SLASHES.replace_all(trimmed, "/");
    let normalized = collapsed.trim_end_matches('/');

    if normalized.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(normalized.to_string())
    }
}

/// Two normalized paths overlap when one is a segment prefix of the other
pub fn context_paths_overlap(left: &str, right: &str) -> bool {
    fn is_segment_prefix(prefix: &str, path: &str) -> bool {
        if prefix == "/" {
            return true;
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    is_segment_prefix(left, right) || is_segment_prefix(right, left)
}
