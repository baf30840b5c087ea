use std::io::{self, Write};

use serde::Serialize;

use crate::app::{HistoryResult, SyncResult};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_sync(result: &SyncResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_history(result: &HistoryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_sync(result: &SyncResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(render_sync(result).as_bytes())
    }

    pub fn print_history(result: &HistoryResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(render_history(result).as_bytes())
    }
}

pub fn render_sync(result: &SyncResult) -> String {
    let mut out = String::new();
    for report in &result.categories {
        if result.dry_run {
            out.push_str(&format!(
                "{}: {} new file(s) to download, {} already downloaded\n",
                report.category,
                report.pending.len(),
                report.skipped
            ));
            for name in &report.pending {
                out.push_str(&format!("  {name}\n"));
            }
            continue;
        }
        out.push_str(&format!(
            "{}: downloaded {} new file(s)",
            report.category, report.downloaded
        ));
        if !report.failed.is_empty() {
            out.push_str(&format!(", {} failed", report.failed.len()));
        }
        out.push('\n');
    }
    for code in &result.unknown_categories {
        out.push_str(&format!("{code}: unknown category, nothing listed\n"));
    }
    if !result.dry_run {
        out.push_str(&format!(
            "Downloaded {} new file(s) in total.\n",
            result.total_downloaded
        ));
    }
    out
}

pub fn render_history(result: &HistoryResult) -> String {
    let mut out = format!("{}\n", result.path);
    for (code, count) in &result.categories {
        out.push_str(&format!("{code}: {count} file(s)\n"));
    }
    out.push_str(&format!("{} file(s) recorded in total.\n", result.total));
    out
}
