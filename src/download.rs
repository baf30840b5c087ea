use camino::{Utf8Path, Utf8PathBuf};
use url::Url;

use crate::domain::Category;
use crate::error::SyncError;
use crate::fs_util;
use crate::session::AuthenticatedSession;

pub trait Downloader {
    /// Fetches `url` into `destination`, replacing any file already there.
    ///
    /// On error nothing is written at `destination`.
    fn fetch(&self, url: &Url, destination: &Utf8Path) -> Result<(), SyncError>;
}

pub fn destination_path(download_dir: &Utf8Path, category: Category, name: &str) -> Utf8PathBuf {
    download_dir.join(category.code()).join(name)
}

pub struct HttpDownloader {
    session: AuthenticatedSession,
}

impl HttpDownloader {
    pub fn new(session: AuthenticatedSession) -> Self {
        Self { session }
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &Url, destination: &Utf8Path) -> Result<(), SyncError> {
        let response = self
            .session
            .client()
            .get(url.clone())
            .send()
            .map_err(|err| SyncError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let body = response
            .bytes()
            .map_err(|err| SyncError::Http(err.to_string()))?;
        fs_util::write_atomic(destination, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_layout() {
        let path = destination_path(Utf8Path::new("downloads"), Category::Mlb, "MLB0401.TXT");
        assert_eq!(path, Utf8PathBuf::from("downloads/MLB/MLB0401.TXT"));
    }
}
