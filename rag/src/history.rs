use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::store_json::{load_or_default, lock, save};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub answer: String,
    pub source_label: Option<String>,
}

type HistoryDb = BTreeMap<String, Vec<HistoryEntry>>;

/// Append-only question history per user. Every append re-reads the file,
/// pushes one entry and writes the whole file back.
pub struct HistoryLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl HistoryLog {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn append(
        &self,
        username: &str,
        query: &str,
        answer: &str,
        source_label: Option<&str>,
    ) -> Result<(), RagError> {
        let _guard = lock(&self.guard);
        let mut db: HistoryDb = load_or_default(&self.path);
        db.entry(username.to_string()).or_default().push(HistoryEntry {
            query: query.to_string(),
            answer: answer.to_string(),
            source_label: source_label.map(str::to_string),
        });
        save(&self.path, &db)
    }

    /// All entries for `username`, oldest first.
    pub fn entries(&self, username: &str) -> Vec<HistoryEntry> {
        let _guard = lock(&self.guard);
        let mut db: HistoryDb = load_or_default(&self.path);
        db.remove(username).unwrap_or_default()
    }

    /// The last `n` queries for `username`, newest first.
    pub fn recent(&self, username: &str, n: usize) -> Vec<String> {
        self.entries(username)
            .into_iter()
            .rev()
            .take(n)
            .map(|e| e.query)
            .collect()
    }
}
