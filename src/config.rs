use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::Category;
use crate::error::SyncError;

pub const DEFAULT_CONFIG_FILE: &str = "kostats-sync.json";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_LOG_FILE: &str = "kostats_sync.log";
pub const DEFAULT_BASE_URL: &str = "http://www.kostats.com";
pub const DEFAULT_LOGIN_URL: &str = "http://www.kostats.com/amember5/member";
pub const DEFAULT_ITEM_PATTERN: &str = r"\.TXT$";
pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const USERNAME_VAR: &str = "KOSTATS_USERNAME";
pub const PASSWORD_VAR: &str = "KOSTATS_PASSWORD";
pub const DOWNLOAD_DIR_VAR: &str = "DOWNLOAD_DIR";

/// On-disk config file. Every field is optional and unknown fields are ignored.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub download_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub item_pattern: Option<String>,
    #[serde(default)]
    pub login_field: Option<String>,
    #[serde(default)]
    pub password_field: Option<String>,
    #[serde(default)]
    pub log_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub pages: BTreeMap<String, String>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub download_dir: Option<Utf8PathBuf>,
    pub delay_ms: Option<u64>,
    pub log_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub download_dir: Utf8PathBuf,
    pub delay: Duration,
    pub timeout: Duration,
    pub base_url: Url,
    pub login_url: Url,
    pub item_pattern: Regex,
    pub login_field: String,
    pub password_field: String,
    /// Subscription page per sport. A sport missing here is listed as empty.
    pub pages: BTreeMap<Category, Url>,
}

impl ResolvedConfig {
    pub fn history_path(&self) -> Utf8PathBuf {
        self.download_dir.join(crate::history::HISTORY_FILE_NAME)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup(USERNAME_VAR).filter(|value| !value.trim().is_empty());
        let password = lookup(PASSWORD_VAR).filter(|value| !value.is_empty());
        match (username, password) {
            (Some(username), Some(password)) => Ok(Self {
                username: username.trim().to_string(),
                password,
            }),
            _ => Err(SyncError::MissingCredentials),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `.env` and the process environment over `config`, then applies `overrides`.
    pub fn resolve(
        config: Config,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, SyncError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => tracing::warn!("ignoring unreadable .env: {err}"),
        }
        Self::resolve_config(config, |key| std::env::var(key).ok(), overrides)
    }

    /// Log file location; needed before the rest of the config is resolved.
    pub fn log_file(config: Option<&Config>, overrides: &ConfigOverrides) -> Utf8PathBuf {
        overrides
            .log_file
            .clone()
            .or_else(|| config.and_then(|config| config.log_file.clone()))
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LOG_FILE))
    }

    pub fn read_file(path: Option<&Utf8Path>) -> Result<Config, SyncError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        // The default file is optional; an explicit one is not.
        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| SyncError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config<F>(
        config: Config,
        env: F,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let download_dir = overrides
            .download_dir
            .clone()
            .or_else(|| {
                env(DOWNLOAD_DIR_VAR)
                    .filter(|value| !value.trim().is_empty())
                    .map(Utf8PathBuf::from)
            })
            .or(config.download_dir)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DOWNLOAD_DIR));

        let delay_ms = overrides
            .delay_ms
            .or(config.delay_ms)
            .unwrap_or(DEFAULT_DELAY_MS);
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let base_url = parse_url(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let login_url = parse_url(config.login_url.as_deref().unwrap_or(DEFAULT_LOGIN_URL))?;

        let pattern = config
            .item_pattern
            .as_deref()
            .unwrap_or(DEFAULT_ITEM_PATTERN);
        let item_pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| SyncError::InvalidPattern(err.to_string()))?;

        let mut pages = Category::ALL
            .into_iter()
            .map(|category| Ok((category, parse_url(&category.default_page())?)))
            .collect::<Result<BTreeMap<_, _>, SyncError>>()?;
        for (code, page) in config.pages {
            let category = match code.parse::<Category>() {
                Ok(category) => category,
                Err(err) => {
                    tracing::error!("{err}; ignoring its page {page}");
                    continue;
                }
            };
            // An empty page turns the sport off.
            if page.trim().is_empty() {
                pages.remove(&category);
            } else {
                pages.insert(category, parse_url(&page)?);
            }
        }

        Ok(ResolvedConfig {
            download_dir,
            delay: Duration::from_millis(delay_ms),
            timeout: Duration::from_secs(timeout_secs),
            base_url,
            login_url,
            item_pattern,
            login_field: config
                .login_field
                .unwrap_or_else(|| "amember_login".to_string()),
            password_field: config
                .password_field
                .unwrap_or_else(|| "amember_pass".to_string()),
            pages,
        })
    }
}

fn parse_url(value: &str) -> Result<Url, SyncError> {
    Url::parse(value.trim()).map_err(|err| SyncError::InvalidUrl {
        url: value.to_string(),
        message: err.to_string(),
    })
}
