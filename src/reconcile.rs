use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use serde::Serialize;

use crate::catalog::CatalogSource;
use crate::domain::Category;
use crate::download::{Downloader, destination_path};
use crate::history::History;

/// Blocks between consecutive downloads.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub listed: usize,
    pub skipped: usize,
    pub downloaded: usize,
    pub failed: Vec<String>,
    /// Files a dry run would have downloaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<String>,
}

impl CategoryReport {
    fn new(category: Category) -> Self {
        Self {
            category,
            listed: 0,
            skipped: 0,
            downloaded: 0,
            failed: Vec::new(),
            pending: Vec::new(),
        }
    }
}

/// Diffs a category's catalog against the history and downloads what is missing.
pub struct Reconciler<C, D, P = ThreadSleep> {
    catalog: C,
    downloader: D,
    pause: P,
    download_dir: Utf8PathBuf,
    delay: Duration,
    dry_run: bool,
}

impl<C: CatalogSource, D: Downloader> Reconciler<C, D, ThreadSleep> {
    pub fn new(catalog: C, downloader: D, download_dir: Utf8PathBuf, delay: Duration) -> Self {
        Self {
            catalog,
            downloader,
            pause: ThreadSleep,
            download_dir,
            delay,
            dry_run: false,
        }
    }
}

impl<C: CatalogSource, D: Downloader, P: Pause> Reconciler<C, D, P> {
    pub fn with_pause<Q: Pause>(self, pause: Q) -> Reconciler<C, D, Q> {
        Reconciler {
            catalog: self.catalog,
            downloader: self.downloader,
            pause,
            download_dir: self.download_dir,
            delay: self.delay,
            dry_run: self.dry_run,
        }
    }

    /// In dry-run mode missing files are reported but not fetched or recorded.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    /// Processes one category. Item failures are logged and left out of
    /// `history`, so the next run tries them again.
    pub fn process_category(&self, category: Category, history: &mut History) -> CategoryReport {
        let items = self.catalog.list_items(category);
        let mut report = CategoryReport::new(category);
        report.listed = items.len();
        let mut attempted = false;

        for item in items {
            if let Some(record) = history.get(category, &item.name) {
                tracing::debug!(
                    %category,
                    name = %item.name,
                    downloaded_at = %record.downloaded_at,
                    "skipping, already downloaded"
                );
                report.skipped += 1;
                continue;
            }
            if self.dry_run && report.pending.contains(&item.name) {
                report.skipped += 1;
                continue;
            }

            if self.dry_run {
                tracing::info!(%category, name = %item.name, url = %item.url, "would download");
                report.pending.push(item.name);
                continue;
            }

            if attempted {
                self.pause.pause(self.delay);
            }
            attempted = true;

            let destination = destination_path(&self.download_dir, category, &item.name);
            tracing::info!(%category, name = %item.name, "downloading");
            match self.downloader.fetch(&item.url, &destination) {
                Ok(()) => {
                    history.record(category, &item.name, item.url.as_str(), Local::now());
                    report.downloaded += 1;
                    tracing::info!(%category, name = %item.name, path = %destination, "downloaded");
                }
                Err(err) => {
                    tracing::error!(
                        %category,
                        name = %item.name,
                        url = %item.url,
                        "download failed: {err}"
                    );
                    report.failed.push(item.name);
                }
            }
        }

        tracing::info!(
            %category,
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "category done"
        );
        report
    }
}
