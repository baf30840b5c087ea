use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::Category;
use crate::error::SyncError;
use crate::fs_util;

pub const HISTORY_FILE_NAME: &str = "download_history.json";

/// Fact that one file of one category has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub downloaded_at: String,
    pub url: String,
}

/// Category code -> file name -> record.
///
/// Keyed by code string rather than [`Category`] so that codes written by a
/// newer build survive a load/persist cycle untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: BTreeMap<String, BTreeMap<String, DownloadRecord>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.entries
            .get(category.code())
            .is_some_and(|items| items.contains_key(name))
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&DownloadRecord> {
        self.entries.get(category.code())?.get(name)
    }

    pub fn record(
        &mut self,
        category: Category,
        name: &str,
        url: &str,
        downloaded_at: DateTime<Local>,
    ) {
        let downloaded_at = downloaded_at
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        self.entries
            .entry(category.code().to_string())
            .or_default()
            .insert(
                name.to_string(),
                DownloadRecord {
                    downloaded_at,
                    url: url.to_string(),
                },
            );
    }

    pub fn count(&self, category: Category) -> usize {
        self.entries
            .get(category.code())
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-code counts, including codes this build does not know about.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.entries
            .iter()
            .map(|(code, items)| (code.clone(), items.len()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Utf8PathBuf,
}

impl HistoryStore {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(download_dir: &Utf8Path) -> Self {
        Self::new(download_dir.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the history; a missing file is an empty history, a malformed one
    /// is [`SyncError::CorruptState`].
    pub fn try_load(&self) -> Result<History, SyncError> {
        let content = match fs::read(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(History::new()),
            Err(err) => {
                return Err(SyncError::Filesystem(format!(
                    "read {}: {err}",
                    self.path
                )));
            }
        };
        serde_json::from_slice(&content).map_err(|err| SyncError::CorruptState {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Like [`Self::try_load`] but never fails: any error is logged and an
    /// empty history is returned, so previously fetched files will be fetched again.
    pub fn load(&self) -> History {
        match self.try_load() {
            Ok(history) => {
                tracing::debug!(
                    path = %self.path,
                    items = history.len(),
                    "loaded download history"
                );
                history
            }
            Err(err) => {
                tracing::error!("{err}; starting with an empty history");
                History::new()
            }
        }
    }

    /// Replaces the history file atomically; an interrupted persist leaves the previous file.
    pub fn persist(&self, history: &History) -> Result<(), SyncError> {
        let content = serde_json::to_vec_pretty(history)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        fs_util::write_atomic(&self.path, &content)?;
        tracing::debug!(path = %self.path, items = history.len(), "saved download history");
        Ok(())
    }
}
