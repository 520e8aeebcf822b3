//! Resume bookkeeping for the detail fetcher.
//!
//! There is no checkpoint file: the set of finished article ids is rebuilt
//! by replaying the fetcher's own output (and optionally an extra resume
//! file with the same line schema) at startup.

use crate::models::ArticleId;
use crate::outputs::jsonl::read_lines;
use serde::Deserialize;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tracing::{info, instrument};

/// Only the id is needed from a previously written record.
#[derive(Deserialize)]
struct WrittenRecord {
    #[serde(rename = "Id")]
    id: ArticleId,
}

/// Ids already written to the output stream.
#[derive(Debug, Default, Clone)]
pub struct FetchProgress {
    done: HashSet<String>,
    malformed: usize,
}

impl FetchProgress {
    /// Replay `output` and, when given, `resume`.
    ///
    /// Missing files count as empty; malformed lines are skipped; any other
    /// read failure is returned.
    #[instrument(level = "info", skip_all, fields(output = %output.display()))]
    pub async fn load(output: &Path, resume: Option<&Path>) -> io::Result<Self> {
        let mut progress = Self::default();
        progress.replay(output).await?;
        if let Some(resume) = resume.filter(|r| *r != output) {
            progress.replay(resume).await?;
        }
        if !progress.done.is_empty() || progress.malformed > 0 {
            info!(
                done = progress.done.len(),
                malformed = progress.malformed,
                "resuming from previous output"
            );
        }
        Ok(progress)
    }

    async fn replay(&mut self, path: &Path) -> io::Result<()> {
        let read = read_lines::<WrittenRecord>(path, true).await?;
        self.malformed += read.malformed;
        for record in read.items {
            if record.id.is_null() {
                self.malformed += 1;
                continue;
            }
            self.done.insert(record.id.key());
        }
        Ok(())
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.done.contains(&id.key())
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: &ArticleId) -> bool {
        self.done.insert(id.key())
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Lines skipped while replaying.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_from_output_and_resume_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("bodies.jsonl");
        let resume = dir.path().join("older.jsonl");
        std::fs::write(
            &output,
            "{\"Id\":\"a\",\"Title\":null,\"Url\":\"u\",\"full_text\":\"\"}\n{broken\n",
        )
        .unwrap();
        std::fs::write(&resume, "{\"Id\":7,\"full_text\":\"x\"}\n{\"Id\":null}\n").unwrap();

        let progress = FetchProgress::load(&output, Some(&resume)).await.unwrap();
        assert_eq!(progress.len(), 2);
        assert!(progress.contains(&ArticleId::from("a")));
        assert!(progress.contains(&ArticleId::from(7u64)));
        assert!(progress.contains(&ArticleId::from("7")));
        assert_eq!(progress.malformed(), 2);
    }

    #[tokio::test]
    async fn test_missing_output_is_empty_progress() {
        let dir = tempdir().unwrap();
        let progress = FetchProgress::load(&dir.path().join("new.jsonl"), None)
            .await
            .unwrap();
        assert!(progress.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_output_is_an_error() {
        let dir = tempdir().unwrap();
        // a directory cannot be read as a file
        let err = FetchProgress::load(dir.path(), None).await;
        assert!(err.is_err());
    }

    #[test]
    fn test_insert_reports_duplicates() {
        let mut progress = FetchProgress::default();
        assert!(progress.insert(&ArticleId::from("x")));
        assert!(!progress.insert(&ArticleId::from("x")));
    }
}
