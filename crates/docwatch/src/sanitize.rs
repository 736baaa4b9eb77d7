//! Helpers for keeping span attributes free of full paths.
//!
//! Document names are fine in traces; the folders they live in (often a
//! user's home directory) are not.

use std::path::Path;

/// Returns only the file name component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<unknown>".to_string())
}
