use std::collections::BTreeMap;

use regex::Regex;
use scraper::Html;
use url::Url;

use crate::config::ResolvedConfig;
use crate::domain::{CatalogItem, Category};
use crate::error::SyncError;
use crate::session::{AuthenticatedSession, selector};

pub trait CatalogSource {
    /// Lists the files currently offered for `category`, in page order.
    ///
    /// Never fails: problems are logged and yield an empty list.
    fn list_items(&self, category: Category) -> Vec<CatalogItem>;
}

pub struct HttpCatalog {
    session: AuthenticatedSession,
    pages: BTreeMap<Category, Url>,
    pattern: Regex,
}

impl HttpCatalog {
    pub fn new(session: AuthenticatedSession, config: &ResolvedConfig) -> Self {
        Self {
            session,
            pages: config.pages.clone(),
            pattern: config.item_pattern.clone(),
        }
    }

    fn fetch_page(&self, page: &Url) -> Result<String, SyncError> {
        let response = self
            .session
            .client()
            .get(page.clone())
            .send()
            .map_err(|err| SyncError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                status: response.status().as_u16(),
                url: page.to_string(),
            });
        }
        response
            .text()
            .map_err(|err| SyncError::Http(err.to_string()))
    }
}

impl CatalogSource for HttpCatalog {
    fn list_items(&self, category: Category) -> Vec<CatalogItem> {
        let Some(page) = self.pages.get(&category) else {
            tracing::error!(%category, "unknown category: no page configured");
            return Vec::new();
        };

        tracing::info!(%category, url = %page, "listing files");
        let html = match self.fetch_page(page) {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(%category, "failed to list files: {err}");
                return Vec::new();
            }
        };

        match extract_items(&html, page, &self.pattern) {
            Ok(items) => {
                tracing::info!(%category, count = items.len(), "found files");
                items
            }
            Err(err) => {
                tracing::error!(%category, "failed to parse listing: {err}");
                Vec::new()
            }
        }
    }
}

/// Collects every `<a href>` whose target matches `pattern`, resolved against `page`.
pub fn extract_items(
    html: &str,
    page: &Url,
    pattern: &Regex,
) -> Result<Vec<CatalogItem>, SyncError> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let items = document
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| pattern.is_match(href))
        .filter_map(|href| match page.join(href) {
            Ok(url) => CatalogItem::from_url(url),
            Err(err) => {
                tracing::warn!(href, "skipping unresolvable link: {err}");
                None
            }
        })
        .collect();
    Ok(items)
}
