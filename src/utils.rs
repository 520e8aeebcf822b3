//! Small helpers for log previews, output file naming and directory checks.

use chrono::{Local, NaiveDate};
use std::fs as stdfs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` bytes, backing off to the previous character
/// boundary, and appends the number of bytes cut.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// `aa_metadata_<date>.jsonl`, the metadata crawler's file name for `date`.
pub fn metadata_file_name(date: NaiveDate) -> String {
    format!("aa_metadata_{}.jsonl", date.format("%Y-%m-%d"))
}

/// Today's metadata file inside `dir`.
pub fn default_metadata_path(dir: &Path) -> PathBuf {
    dir.join(metadata_file_name(Local::now().date_naive()))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

/// Parent directory of an output file, or `.` for bare file names.
pub fn output_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // 'ş' is two bytes; cutting at 1 must not split it
        let result = truncate_for_log("şehir", 1);
        assert_eq!(result, "…(+6 bytes)");
        assert_eq!(truncate_for_log("aşb", 2), "a…(+3 bytes)");
    }

    #[test]
    fn test_metadata_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        assert_eq!(metadata_file_name(date), "aa_metadata_2025-05-06.jsonl");

        let path = default_metadata_path(Path::new("data"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("aa_metadata_") && name.ends_with(".jsonl"));
        assert_eq!(path.parent(), Some(Path::new("data")));
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("out.jsonl")), Path::new("."));
        assert_eq!(output_dir(Path::new("data/out.jsonl")), Path::new("data"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }
}
