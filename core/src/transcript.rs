//! Exchange Transcript Journal
//!
//! Durable, append-only record of every completed exchange, one JSON line
//! per prompt/reply pair. Writes are best-effort: the journal exists for
//! the humans curating the device, not for correctness, so a failed write
//! is logged at warn and the worker cycle carries on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed prompt/reply pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeRecord {
    /// Record identifier.
    pub id: Uuid,
    /// When the exchange completed.
    pub at: DateTime<Utc>,
    /// What the user submitted.
    pub prompt: String,
    /// What the model answered (error-formatted text on backend failure).
    pub reply: String,
}

impl ExchangeRecord {
    /// Create a record stamped with the current time.
    pub fn new(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            prompt: prompt.into(),
            reply: reply.into(),
        }
    }
}

/// Append-only JSON-lines journal.
pub struct TranscriptJournal {
    path: PathBuf,
}

impl TranscriptJournal {
    /// Create a journal writing to `path`. Nothing is touched on disk
    /// until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The journal's path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a JSON line, creating the file (and parent
    /// directories) on first use.
    pub fn append(&self, record: &ExchangeRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_append_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("transcript.jsonl");
        let journal = TranscriptJournal::new(&path);

        journal
            .append(&ExchangeRecord::new("hello", "greetings"))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_records_round_trip_one_per_line() {
        let dir = tempdir().unwrap();
        let journal = TranscriptJournal::new(dir.path().join("transcript.jsonl"));

        journal.append(&ExchangeRecord::new("first", "one")).unwrap();
        journal.append(&ExchangeRecord::new("second", "two")).unwrap();

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        let records: Vec<ExchangeRecord> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prompt, "first");
        assert_eq!(records[1].reply, "two");
        assert_ne!(records[0].id, records[1].id);
    }
}
