use std::fs;
use std::io::Write;

use camino::Utf8Path;
use tempfile::Builder;

use crate::error::SyncError;

/// Writes `content` to `path` through a synced temp file in the same directory
/// and a rename, so readers see either the old file or the complete new one.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SyncError> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("create {parent}: {err}")))?;

    let mut temp = Builder::new()
        .prefix(".kostats-sync")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("replace {path}: {err}")))?;
    Ok(())
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), SyncError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("create {path}: {err}")))
}

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."))
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn write_replaces_existing_without_leftovers() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("NFL").join("WK01.TXT");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");
        let entries = fs::read_dir(root.join("NFL").as_std_path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        assert_eq!(parent_dir(Utf8Path::new("history.json")), Utf8Path::new("."));
        assert_eq!(parent_dir(Utf8Path::new("a/b.json")), Utf8Path::new("a"));
    }
}
