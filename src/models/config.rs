//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RecordSchema;
use crate::utils::parse_selector;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote listing to harvest
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP, pacing and termination behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Target schema and required fields
    #[serde(default)]
    pub schema: RecordSchema,

    /// Selector rules for the structured extractor
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Archive file locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.base_url)?;
        if self.source.page_param.trim().is_empty() {
            return Err(AppError::validation("source.page_param is empty"));
        }
        parse_selector(&self.source.content_selector)?;

        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.empty_page_limit == 0 {
            return Err(AppError::validation("crawler.empty_page_limit must be > 0"));
        }
        if self.crawler.failed_page_limit == 0 {
            return Err(AppError::validation("crawler.failed_page_limit must be > 0"));
        }
        if self.crawler.max_pages == Some(0) {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }

        if !self.schema.required.iter().any(|f| f == "title") {
            return Err(AppError::validation("schema.required must include 'title'"));
        }
        for field in &self.schema.required {
            if !self.schema.fields.contains(field) {
                return Err(AppError::validation(format!(
                    "required field '{field}' is not in schema.fields"
                )));
            }
        }

        parse_selector(&self.extractor.item_selector)?;
        if let Some(selector) = &self.extractor.no_results_selector {
            parse_selector(selector)?;
        }
        if let Some(pattern) = &self.extractor.no_results_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                AppError::validation(format!("invalid no_results_pattern '{pattern}': {e}"))
            })?;
        }
        for field in &self.schema.fields {
            let rule = self.extractor.fields.get(field).ok_or_else(|| {
                AppError::validation(format!("no extractor selector for field '{field}'"))
            })?;
            parse_selector(&rule.selector)?;
        }

        Ok(())
    }
}

/// Remote listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing URL without the page parameter
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Query parameter that carries the page number
    #[serde(default = "defaults::page_param")]
    pub page_param: String,

    /// CSS selector for the results region of each page
    #[serde(default = "defaults::content_selector")]
    pub content_selector: String,

    /// Fixed browsing session id; generated per run when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            page_param: defaults::page_param(),
            content_selector: defaults::content_selector(),
            session_id: None,
        }
    }
}

/// HTTP client, pacing and termination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum time between the starts of consecutive page fetches
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Consecutive pages yielding zero records before the crawl stops
    #[serde(default = "defaults::empty_page_limit")]
    pub empty_page_limit: u32,

    /// Consecutive renderer failures before the crawl stops
    #[serde(default = "defaults::failed_page_limit")]
    pub failed_page_limit: u32,

    /// Optional hard bound on the number of pages fetched
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_delay_ms: defaults::page_delay(),
            empty_page_limit: defaults::empty_page_limit(),
            failed_page_limit: defaults::failed_page_limit(),
            max_pages: None,
        }
    }
}

/// How to read one field out of a listing item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    /// CSS selector relative to the item element
    pub selector: String,

    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attr: Option<String>,
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: None,
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }
}

/// Selector rules for the structured extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Selector matching one listing item
    #[serde(default = "defaults::item_selector")]
    pub item_selector: String,

    /// Element whose presence means the listing has ended
    #[serde(default = "defaults::no_results_selector")]
    pub no_results_selector: Option<String>,

    /// Regex over the page text signalling the listing has ended
    #[serde(default = "defaults::no_results_pattern")]
    pub no_results_pattern: Option<String>,

    /// Field name to extraction rule
    #[serde(default = "defaults::field_rules")]
    pub fields: BTreeMap<String, FieldRule>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            item_selector: defaults::item_selector(),
            no_results_selector: defaults::no_results_selector(),
            no_results_pattern: defaults::no_results_pattern(),
            fields: defaults::field_rules(),
        }
    }
}

/// Archive file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Append-only tabular archive
    #[serde(default = "defaults::archive_file")]
    pub archive_file: PathBuf,

    /// Regenerated JSON mirror of the archive
    #[serde(default = "defaults::mirror_file")]
    pub mirror_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archive_file: defaults::archive_file(),
            mirror_file: defaults::mirror_file(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::FieldRule;

    // Source defaults
    pub fn base_url() -> String {
        "https://jobs.apple.com/en-gb/search?location=united-kingdom-GBR".into()
    }
    pub fn page_param() -> String {
        "page".into()
    }
    pub fn content_selector() -> String {
        "[class^='search-results-section']".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_delay() -> u64 {
        61_000
    }
    pub fn empty_page_limit() -> u32 {
        1
    }
    pub fn failed_page_limit() -> u32 {
        3
    }

    // Extractor defaults
    pub fn item_selector() -> String {
        "table#tblResultSet tbody".into()
    }
    pub fn no_results_selector() -> Option<String> {
        Some(".no-results, #no-results".into())
    }
    pub fn no_results_pattern() -> Option<String> {
        Some(r"(?i)no (results|jobs|positions) (were )?found".into())
    }
    pub fn field_rules() -> BTreeMap<String, FieldRule> {
        BTreeMap::from([
            (
                "title".to_string(),
                FieldRule::text("a.table--advanced-search__title"),
            ),
            (
                "category".to_string(),
                FieldRule::text(".table--advanced-search__role"),
            ),
            (
                "date".to_string(),
                FieldRule::text(".table--advanced-search__date"),
            ),
            (
                "location".to_string(),
                FieldRule::text(".table--advanced-search__location"),
            ),
            (
                "url".to_string(),
                FieldRule::attr("a.table--advanced-search__title", "href"),
            ),
        ])
    }

    // Path defaults
    pub fn archive_file() -> PathBuf {
        "data/jobs.csv".into()
    }
    pub fn mirror_file() -> PathBuf {
        "data/jobs.json".into()
    }
}
