//! Segment file naming conventions.

use std::path::{Path, PathBuf};

/// Build the path of a segment file: `{dir}/{id:09}{ext}`.
pub fn segment_file_name(dir: &Path, ext: &str, id: u32) -> PathBuf {
    dir.join(format!("{:09}{}", id, ext))
}

/// Parse a directory entry name as a segment file, returning its id.
///
/// Returns `None` unless the name is all digits followed by exactly
/// the given extension.
pub fn parse_segment_file_name(name: &str, ext: &str) -> Option<u32> {
    let digits = name.strip_suffix(ext)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Create a directory if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}
