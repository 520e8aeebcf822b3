//! JSON Lines reading and writing.
//!
//! Each record is serialized completely in memory and handed to the file in
//! a single `write_all`, followed by a flush. A run killed mid-write can
//! still leave a partial last line; opening in [`WriteMode::Append`] cuts
//! such a tail back to the last newline before anything is added. Non-ASCII
//! text is written unescaped.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument, warn};

/// How an output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty file.
    Truncate,
    /// Keep existing lines and add to the end.
    Append,
}

/// Line-atomic JSON Lines appender.
#[derive(Debug)]
pub struct JsonLinesWriter {
    file: File,
    path: PathBuf,
    lines: usize,
}

impl JsonLinesWriter {
    /// Open `path`, creating it and its parent directory if needed.
    ///
    /// In append mode a partial last line is removed first.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display(), ?mode))]
    pub async fn open(path: impl AsRef<Path>, mode: WriteMode) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        if mode == WriteMode::Append {
            trim_partial_line(&path).await?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = options.open(&path).await?;
        debug!("opened JSON Lines output");

        Ok(Self {
            file,
            path,
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written through this writer.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Serialize `value` as one line and flush it to disk.
    pub async fn append<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        self.lines += 1;
        Ok(())
    }
}

/// Cut `path` back to its last newline. Returns the number of bytes
/// removed; a missing file is left alone.
pub async fn trim_partial_line(path: &Path) -> io::Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let len = file.metadata().await?.len();

    let mut keep = 0u64;
    let mut end = len;
    let mut buf = vec![0u8; 8192];
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            keep = start + i as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        file.set_len(keep).await?;
        file.sync_all().await?;
        warn!(path = %path.display(), dropped = len - keep, "removed partial last line");
    }
    Ok(len - keep)
}

/// Documents decoded from a JSON Lines file.
#[derive(Debug)]
pub struct LinesRead<T> {
    pub items: Vec<T>,
    /// Non-blank lines that did not decode as `T`.
    pub malformed: usize,
}

/// Read every line of `path` as a `T`, skipping (and counting) lines that
/// fail to decode. A missing file yields no items when `missing_ok` is set.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn read_lines<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    missing_ok: bool,
) -> io::Result<LinesRead<T>> {
    let path = path.as_ref();
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if missing_ok && e.kind() == io::ErrorKind::NotFound => {
            debug!("file does not exist yet");
            return Ok(LinesRead {
                items: Vec::new(),
                malformed: 0,
            });
        }
        Err(e) => return Err(e),
    };

    let mut lines = BufReader::new(file).lines();
    let mut items = Vec::new();
    let mut malformed = 0usize;
    let mut lineno = 0usize;
    while let Some(line) = lines.next_line().await? {
        lineno += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                malformed += 1;
                warn!(path = %path.display(), line = lineno, error = %e, "skipping malformed line");
            }
        }
    }

    Ok(LinesRead { items, malformed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_writes_one_flushed_line_per_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.jsonl");

        let mut writer = JsonLinesWriter::open(&path, WriteMode::Append).await.unwrap();
        writer.append(&json!({"Id": 1, "Title": "Şehir"})).await.unwrap();
        writer.append(&json!({"Id": 2})).await.unwrap();
        assert_eq!(writer.lines(), 2);

        // readable while the writer is still open
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"Id\":1,\"Title\":\"Şehir\"}\n{\"Id\":2}\n");
    }

    #[tokio::test]
    async fn test_truncate_and_append_modes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "{\"old\":true}\n").unwrap();

        let mut writer = JsonLinesWriter::open(&path, WriteMode::Append).await.unwrap();
        writer.append(&json!({"new": 1})).await.unwrap();
        drop(writer);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let mut writer = JsonLinesWriter::open(&path, WriteMode::Truncate).await.unwrap();
        writer.append(&json!({"new": 2})).await.unwrap();
        drop(writer);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"new\":2}\n");
    }

    #[tokio::test]
    async fn test_append_cuts_partial_last_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "{\"Id\":1}\n{\"Id\":4,\"Ti").unwrap();

        let mut writer = JsonLinesWriter::open(&path, WriteMode::Append).await.unwrap();
        writer.append(&json!({"Id": 5})).await.unwrap();
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"Id\":1}\n{\"Id\":5}\n");
    }

    #[tokio::test]
    async fn test_trim_partial_line_cases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        // whole lines are untouched
        std::fs::write(&path, "{\"a\":1}\n").unwrap();
        assert_eq!(trim_partial_line(&path).await.unwrap(), 0);

        // a single fragment with no newline at all empties the file
        std::fs::write(&path, "{\"a\":").unwrap();
        assert_eq!(trim_partial_line(&path).await.unwrap(), 5);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        // the newline may sit far behind a long fragment
        let long = format!("{{\"a\":1}}\n{}", "x".repeat(20_000));
        std::fs::write(&path, &long).unwrap();
        assert_eq!(trim_partial_line(&path).await.unwrap(), 20_000);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");

        assert_eq!(trim_partial_line(&dir.path().join("absent.jsonl")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_lines_skips_malformed_and_blank() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.jsonl");
        std::fs::write(&path, "{\"a\":1}\n\nnot json\n{\"a\":2}\n{\"a\":").unwrap();

        let read: LinesRead<Value> = read_lines(&path, false).await.unwrap();
        assert_eq!(read.items.len(), 2);
        assert_eq!(read.malformed, 2);
    }

    #[tokio::test]
    async fn test_read_lines_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");

        let read: LinesRead<Value> = read_lines(&path, true).await.unwrap();
        assert!(read.items.is_empty());

        let err = read_lines::<Value>(&path, false).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
