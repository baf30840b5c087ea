use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Serialize;

use crate::catalog::CatalogSource;
use crate::domain::Category;
use crate::download::Downloader;
use crate::error::SyncError;
use crate::fs_util;
use crate::history::HistoryStore;
use crate::reconcile::{CategoryReport, Pause, Reconciler};

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub dry_run: bool,
    pub categories: Vec<CategoryReport>,
    /// Requested codes that name no category; each contributed nothing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_categories: Vec<String>,
    pub total_downloaded: usize,
    pub total_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub path: String,
    pub categories: BTreeMap<String, usize>,
    pub total: usize,
}

pub struct App<C, D, P> {
    reconciler: Reconciler<C, D, P>,
    store: HistoryStore,
}

impl<C: CatalogSource, D: Downloader, P: Pause> App<C, D, P> {
    pub fn new(reconciler: Reconciler<C, D, P>, store: HistoryStore) -> Self {
        Self { reconciler, store }
    }

    /// One full run: load history, reconcile each category in enumeration
    /// order, then persist the history once.
    ///
    /// Only filesystem problems with the download directory or the history
    /// file are returned as errors; everything per category or per item is
    /// logged and reflected in the result.
    pub fn sync(&self, selection: &Selection) -> Result<SyncResult, SyncError> {
        let dry_run = self.reconciler.is_dry_run();
        if !dry_run {
            prepare_layout(self.reconciler.download_dir(), &Category::ALL)?;
        }

        let mut history = self.store.load();
        let mut reports = Vec::with_capacity(selection.categories.len());
        for &category in &selection.categories {
            reports.push(self.reconciler.process_category(category, &mut history));
        }

        if !dry_run {
            self.store.persist(&history)?;
        }

        let total_downloaded = reports.iter().map(|report| report.downloaded).sum();
        let total_failed = reports.iter().map(|report| report.failed.len()).sum();
        tracing::info!(total_downloaded, total_failed, "run complete");
        Ok(SyncResult {
            dry_run,
            categories: reports,
            unknown_categories: selection.unknown.clone(),
            total_downloaded,
            total_failed,
        })
    }
}

/// Counts of recorded files per category code, read from the history file.
pub fn history_summary(store: &HistoryStore) -> Result<HistoryResult, SyncError> {
    let history = store.try_load()?;
    Ok(HistoryResult {
        path: store.path().to_string(),
        categories: history.counts(),
        total: history.len(),
    })
}

/// Creates the download directory and one subdirectory per category.
pub fn prepare_layout(download_dir: &Utf8Path, categories: &[Category]) -> Result<(), SyncError> {
    fs_util::ensure_dir(download_dir)?;
    for category in categories {
        fs_util::ensure_dir(&download_dir.join(category.code()))?;
    }
    Ok(())
}

/// Categories picked for a run, in enumeration order without repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub categories: Vec<Category>,
    pub unknown: Vec<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            unknown: Vec::new(),
        }
    }

    /// Parses requested codes; no codes means every category. Unknown codes
    /// are logged and kept aside so the rest of the run goes ahead.
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Self {
        if codes.is_empty() {
            return Self::all();
        }
        let mut categories = Vec::new();
        let mut unknown = Vec::new();
        for code in codes {
            match code.as_ref().parse::<Category>() {
                Ok(category) => categories.push(category),
                Err(err) => {
                    tracing::error!("{err}; it will yield no files");
                    unknown.push(code.as_ref().trim().to_string());
                }
            }
        }
        categories.sort();
        categories.dedup();
        Self {
            categories,
            unknown,
        }
    }
}
