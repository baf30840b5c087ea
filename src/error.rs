use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("missing credentials: set KOSTATS_USERNAME and KOSTATS_PASSWORD (environment or .env)")]
    #[diagnostic(help("create a .env file next to the binary with both variables"))]
    MissingCredentials,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid category code: {0}")]
    InvalidCategory(String),

    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid item pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid HTML selector: {0}")]
    Selector(String),

    #[error("could not find a login form at {0}")]
    LoginFormNotFound(String),

    #[error("login failed: {0}")]
    AuthFailed(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("download history at {path} is corrupt: {message}")]
    CorruptState { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
