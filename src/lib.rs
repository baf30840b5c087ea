//! Incremental downloader for KOStats subscription stat files.
//!
//! A run logs in, lists each sport's subscription page, and downloads only the
//! files missing from `download_history.json`. A file recorded there is never
//! fetched again, even if the site later serves different content under the
//! same name.

pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod history;
pub mod output;
pub mod reconcile;
pub mod session;
