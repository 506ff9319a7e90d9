// src/services/renderer.rs

//! Page renderer: fetches one listing page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;

use crate::error::Result;
use crate::models::CrawlerConfig;
use crate::services::SessionToken;
use crate::utils::{parse_selector, url::page_url};

/// Header carrying the session token on every page request.
const SESSION_HEADER: &str = "X-Session-Id";

/// Raw content of one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// URL the page was fetched from
    pub url: String,
    /// Full page body; extractors scope it to the results region
    pub content: String,
    /// Whether the page rendered at all
    pub success: bool,
}

impl RenderedPage {
    pub fn ok(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            success: true,
        }
    }

    pub fn failed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: String::new(),
            success: false,
        }
    }
}

/// Source of listing pages.
///
/// Implementations never fail the crawl: a page that cannot be produced is
/// reported with `success == false`.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(
        &self,
        base_url: &str,
        page_number: u32,
        selector: &str,
        session: &SessionToken,
    ) -> RenderedPage;
}

/// Renders pages with a plain HTTP GET.
pub struct HttpRenderer {
    client: Client,
    page_param: String,
}

impl HttpRenderer {
    /// Create a renderer with a client configured from the crawler settings.
    pub fn new(config: &CrawlerConfig, page_param: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            page_param: page_param.into(),
        })
    }

    async fn fetch(&self, url: &str, session: &SessionToken) -> reqwest::Result<String> {
        self.client
            .get(url)
            .header(SESSION_HEADER, session.as_str())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Count the results regions matching `selector` in `html`.
    fn count_regions(html: &str, selector: &str) -> Result<usize> {
        if selector.trim().is_empty() {
            return Ok(0);
        }

        let selector = parse_selector(selector)?;
        Ok(Html::parse_document(html).select(&selector).count())
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(
        &self,
        base_url: &str,
        page_number: u32,
        selector: &str,
        session: &SessionToken,
    ) -> RenderedPage {
        let url = match page_url(base_url, &self.page_param, page_number) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build URL for page {page_number} from {base_url}: {e}");
                return RenderedPage::failed(base_url);
            }
        };

        log::debug!("Fetching page {page_number}: {url}");
        let body = match self.fetch(&url, session).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Failed to fetch page {page_number} ({url}): {e}");
                return RenderedPage::failed(url);
            }
        };

        match Self::count_regions(&body, selector) {
            Ok(regions) => {
                log::debug!("Page {page_number}: {regions} region(s) match '{selector}'");
                RenderedPage::ok(url, body)
            }
            Err(e) => {
                log::warn!("Bad content selector for page {page_number} ({url}): {e}");
                RenderedPage::failed(url)
            }
        }
    }
}
