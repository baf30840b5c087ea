use std::collections::BTreeMap;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{Credentials, ResolvedConfig};
use crate::error::SyncError;

const LOGIN_FORM_ID: &str = "am-login-form";

/// Cookie-carrying HTTP client that has passed the member login.
#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    client: Client,
}

impl AuthenticatedSession {
    /// Wraps a client whose cookie jar already carries a member session.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Where the login form posts, and every named field it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Url,
    pub fields: BTreeMap<String, String>,
}

pub fn build_client(config: &ResolvedConfig) -> Result<Client, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("kostats-sync/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| SyncError::Http(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .timeout(config.timeout)
        .build()
        .map_err(|err| SyncError::Http(err.to_string()))
}

/// Logs in through the member form. Any failure here is fatal for the run.
pub fn authenticate(
    config: &ResolvedConfig,
    credentials: &Credentials,
) -> Result<AuthenticatedSession, SyncError> {
    tracing::info!(url = %config.login_url, "logging in");
    login(config, credentials).inspect_err(|err| tracing::error!("{err}; aborting"))
}

fn login(
    config: &ResolvedConfig,
    credentials: &Credentials,
) -> Result<AuthenticatedSession, SyncError> {
    let client = build_client(config)?;

    let login_page = client
        .get(config.login_url.clone())
        .send()
        .and_then(|response| response.text())
        .map_err(|err| SyncError::AuthFailed(err.to_string()))?;

    let form = extract_login_form(&login_page, &config.base_url, &config.login_url)?
        .ok_or_else(|| SyncError::LoginFormNotFound(config.login_url.to_string()))?;

    let mut fields = form.fields;
    fields.insert(config.login_field.clone(), credentials.username.clone());
    fields.insert(config.password_field.clone(), credentials.password.clone());

    let body = client
        .post(form.action.clone())
        .form(&fields)
        .send()
        .and_then(|response| response.text())
        .map_err(|err| SyncError::AuthFailed(err.to_string()))?;

    if !looks_logged_in(&body) {
        return Err(SyncError::AuthFailed(
            "response did not contain a logout link or account page".to_string(),
        ));
    }
    tracing::info!("login successful");
    Ok(AuthenticatedSession::new(client))
}

/// Finds the member login form: by id first, then any form posting to a `login` action.
///
/// A form without an action posts to `fallback`; a relative action is resolved against `base`.
pub fn extract_login_form(
    html: &str,
    base: &Url,
    fallback: &Url,
) -> Result<Option<LoginForm>, SyncError> {
    let document = Html::parse_document(html);
    let form_selector = selector("form")?;
    let input_selector = selector("input")?;

    let by_id = document
        .select(&form_selector)
        .find(|form| form.value().id() == Some(LOGIN_FORM_ID));
    let Some(form) = by_id.or_else(|| {
        document.select(&form_selector).find(|form| {
            form.value()
                .attr("action")
                .is_some_and(|action| action.contains("login"))
        })
    }) else {
        return Ok(None);
    };

    let action = resolve_action(form, base, fallback)?;
    let fields = form
        .select(&input_selector)
        .filter_map(|input| {
            let name = input.value().attr("name").filter(|name| !name.is_empty())?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Ok(Some(LoginForm { action, fields }))
}

fn resolve_action(form: ElementRef<'_>, base: &Url, fallback: &Url) -> Result<Url, SyncError> {
    match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => {
            base.join(action).map_err(|err| SyncError::InvalidUrl {
                url: action.to_string(),
                message: err.to_string(),
            })
        }
        _ => Ok(fallback.clone()),
    }
}

pub fn looks_logged_in(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("logout") || body.contains("my account")
}

pub(crate) fn selector(css: &str) -> Result<Selector, SyncError> {
    Selector::parse(css).map_err(|err| SyncError::Selector(err.to_string()))
}
