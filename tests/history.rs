use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::Local;

use kostats_sync::app::history_summary;
use kostats_sync::domain::Category;
use kostats_sync::error::SyncError;
use kostats_sync::history::{History, HistoryStore};

fn temp_store() -> (tempfile::TempDir, HistoryStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, HistoryStore::in_dir(&root))
}

#[test]
fn missing_file_loads_empty() {
    let (_temp, store) = temp_store();
    assert!(store.try_load().unwrap().is_empty());
    assert!(store.load().is_empty());
}

#[test]
fn corrupt_file_loads_empty() {
    let (_temp, store) = temp_store();
    fs::write(store.path().as_std_path(), "{\"CBK\": {\"A.TXT\": ").unwrap();

    assert_matches!(store.try_load(), Err(SyncError::CorruptState { .. }));
    assert!(store.load().is_empty());
}

#[test]
fn non_utf8_file_is_corrupt() {
    let (_temp, store) = temp_store();
    fs::write(store.path().as_std_path(), [0xff, 0xfe, 0x00, 0x7b]).unwrap();

    assert_matches!(store.try_load(), Err(SyncError::CorruptState { .. }));
    assert!(store.load().is_empty());
}

#[test]
fn persist_then_load() {
    let (_temp, store) = temp_store();
    let mut history = History::new();
    history.record(
        Category::Cbk,
        "A.TXT",
        "http://www.kostats.com/CBK_Subscription/A.TXT",
        Local::now(),
    );
    history.record(
        Category::Nhl,
        "GAMES.TXT",
        "http://www.kostats.com/NHL_Subscription/GAMES.TXT",
        Local::now(),
    );

    store.persist(&history).unwrap();
    let loaded = store.try_load().unwrap();
    assert_eq!(loaded, history);
}

#[test]
fn reads_files_written_by_older_versions() {
    let (_temp, store) = temp_store();
    let content = r#"{
  "CBK": {
    "A.TXT": {
      "downloaded_at": "2024-11-02T09:15:42.123456",
      "url": "http://www.kostats.com/CBK_Subscription/A.TXT",
      "size": 1024
    }
  },
  "WNBA": {
    "W.TXT": {
      "downloaded_at": "2024-11-02T09:16:00.000000",
      "url": "http://www.kostats.com/WNBA_Subscription/W.TXT"
    }
  }
}"#;
    fs::write(store.path().as_std_path(), content).unwrap();

    let history = store.try_load().unwrap();
    assert!(history.contains(Category::Cbk, "A.TXT"));
    assert_eq!(
        history.get(Category::Cbk, "A.TXT").unwrap().downloaded_at,
        "2024-11-02T09:15:42.123456"
    );

    // Codes unknown to this build survive a rewrite.
    store.persist(&history).unwrap();
    let rewritten: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path().as_std_path()).unwrap()).unwrap();
    assert!(rewritten["WNBA"]["W.TXT"].is_object());
}

#[test]
fn interrupted_persist_keeps_previous_history() {
    let (temp, store) = temp_store();
    let mut history = History::new();
    history.record(Category::Mlb, "A.TXT", "http://example.com/A.TXT", Local::now());
    store.persist(&history).unwrap();

    // A crash after the temp write but before the rename leaves a stray temp file.
    let stray = temp.path().join(".kostats-sync123456.tmp");
    fs::write(&stray, "{\"MLB\": {\"A.TXT\": {\"downloaded_at\": \"").unwrap();

    let loaded = store.try_load().unwrap();
    assert_eq!(loaded, history);

    history.record(Category::Mlb, "B.TXT", "http://example.com/B.TXT", Local::now());
    store.persist(&history).unwrap();
    assert_eq!(store.try_load().unwrap().count(Category::Mlb), 2);
}

#[test]
fn persist_leaves_no_temp_files() {
    let (temp, store) = temp_store();
    let mut history = History::new();
    history.record(Category::Nfl, "WK01.TXT", "http://example.com/WK01.TXT", Local::now());
    store.persist(&history).unwrap();
    store.persist(&history).unwrap();

    let entries = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn summary_counts_per_code() {
    let (_temp, store) = temp_store();
    let mut history = History::new();
    history.record(Category::Cbk, "A.TXT", "http://example.com/A.TXT", Local::now());
    history.record(Category::Cbk, "B.TXT", "http://example.com/B.TXT", Local::now());
    history.record(Category::Nba, "C.TXT", "http://example.com/C.TXT", Local::now());
    store.persist(&history).unwrap();

    let summary = history_summary(&store).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.categories.get("CBK"), Some(&2));
    assert_eq!(summary.categories.get("NBA"), Some(&1));
}
