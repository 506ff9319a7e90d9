// src/services/extractor.rs

//! Structured extraction of job records from rendered pages.
//!
//! The crawl only depends on the [`StructuredExtractor`] capability, so the
//! backend can be swapped without touching the orchestrator.
//! [`SelectorExtractor`] is the rule-based implementation driven by CSS
//! selectors from the configuration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{ExtractorConfig, RawRecord, RecordSchema};
use crate::services::RenderedPage;
use crate::utils::{normalize_whitespace, parse_selector, url::resolve};

/// Attributes whose values are links and get resolved against the page URL.
const LINK_ATTRS: &[&str] = &["href", "src"];

/// Output of one extractor call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted items, unvalidated
    pub records: Vec<RawRecord>,
    /// The source explicitly signalled the end of the listing
    pub no_results_found: bool,
}

/// Usage counters reported once at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionUsage {
    pub pages: usize,
    pub items: usize,
    pub missing_fields: usize,
    pub no_results_signals: usize,
}

impl ExtractionUsage {
    /// Key/value pairs for a summary log block.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Pages processed", self.pages.to_string()),
            ("Items extracted", self.items.to_string()),
            ("Fields missing", self.missing_fields.to_string()),
            ("End-of-listing signals", self.no_results_signals.to_string()),
        ]
    }
}

/// Capability turning page content into records.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    /// Extract records shaped by `schema` from the region matched by `selector`.
    ///
    /// An `Err` means the backend itself failed, not that the page was empty.
    async fn extract(
        &self,
        page: &RenderedPage,
        selector: &str,
        schema: &RecordSchema,
    ) -> Result<Extraction>;

    /// Cumulative usage since construction.
    fn usage(&self) -> ExtractionUsage;
}

struct CompiledRule {
    selector: Selector,
    attr: Option<String>,
}

/// Rule-based extractor using CSS selectors.
pub struct SelectorExtractor {
    item: Selector,
    fields: BTreeMap<String, CompiledRule>,
    no_results: Option<Selector>,
    no_results_pattern: Option<Regex>,
    pages: AtomicUsize,
    items: AtomicUsize,
    missing_fields: AtomicUsize,
    no_results_signals: AtomicUsize,
}

impl SelectorExtractor {
    /// Compile the configured selectors.
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let fields = config
            .fields
            .iter()
            .map(|(name, rule)| {
                let compiled = CompiledRule {
                    selector: parse_selector(&rule.selector)?,
                    attr: rule.attr.clone(),
                };
                Ok::<_, AppError>((name.clone(), compiled))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let no_results = config
            .no_results_selector
            .as_deref()
            .map(parse_selector)
            .transpose()?;

        let no_results_pattern = config
            .no_results_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    AppError::config(format!("invalid no_results_pattern '{p}': {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            item: parse_selector(&config.item_selector)?,
            fields,
            no_results,
            no_results_pattern,
            pages: AtomicUsize::new(0),
            items: AtomicUsize::new(0),
            missing_fields: AtomicUsize::new(0),
            no_results_signals: AtomicUsize::new(0),
        })
    }

    fn extract_sync(
        &self,
        page: &RenderedPage,
        selector: &str,
        schema: &RecordSchema,
    ) -> Result<Extraction> {
        let rules = schema
            .fields
            .iter()
            .map(|name| {
                self.fields
                    .get(name)
                    .map(|rule| (name.as_str(), rule))
                    .ok_or_else(|| AppError::config(format!("no extraction rule for '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        // The end-of-listing marker may sit outside the results region.
        let document = Html::parse_document(&page.content);
        let no_results_found = self.signals_no_results(&document);

        let scope = if selector.trim().is_empty() {
            None
        } else {
            Some(parse_selector(selector)?)
        };
        let roots: Vec<ElementRef<'_>> = match &scope {
            Some(scope) => document.select(scope).collect(),
            None => vec![document.root_element()],
        };

        let mut records = Vec::new();
        let mut missing = 0;
        for root in roots {
            for item in root.select(&self.item) {
                let mut record = RawRecord::new();
                for (name, rule) in &rules {
                    match Self::read_field(&item, rule, &page.url) {
                        Some(value) => {
                            record.insert((*name).to_string(), value);
                        }
                        None => missing += 1,
                    }
                }
                records.push(record);
            }
        }

        self.pages.fetch_add(1, Ordering::Relaxed);
        self.items.fetch_add(records.len(), Ordering::Relaxed);
        self.missing_fields.fetch_add(missing, Ordering::Relaxed);
        if no_results_found {
            self.no_results_signals.fetch_add(1, Ordering::Relaxed);
        }

        Ok(Extraction {
            records,
            no_results_found,
        })
    }

    fn signals_no_results(&self, document: &Html) -> bool {
        if let Some(selector) = &self.no_results {
            if document.select(selector).next().is_some() {
                return true;
            }
        }

        if let Some(pattern) = &self.no_results_pattern {
            let text = normalize_whitespace(&document.root_element().text().collect::<String>());
            if pattern.is_match(&text) {
                return true;
            }
        }

        false
    }

    /// Read one field from an item; `None` when absent or blank.
    fn read_field(item: &ElementRef<'_>, rule: &CompiledRule, page_url: &str) -> Option<String> {
        let element = item.select(&rule.selector).next()?;

        let value = match &rule.attr {
            Some(attr) => {
                let raw = element.value().attr(attr)?.trim();
                if !raw.is_empty() && LINK_ATTRS.contains(&attr.as_str()) {
                    resolve(page_url, raw)
                } else {
                    raw.to_string()
                }
            }
            None => normalize_whitespace(&element.text().collect::<String>()),
        };

        (!value.is_empty()).then_some(value)
    }
}

#[async_trait]
impl StructuredExtractor for SelectorExtractor {
    async fn extract(
        &self,
        page: &RenderedPage,
        selector: &str,
        schema: &RecordSchema,
    ) -> Result<Extraction> {
        self.extract_sync(page, selector, schema)
    }

    fn usage(&self) -> ExtractionUsage {
        ExtractionUsage {
            pages: self.pages.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
            missing_fields: self.missing_fields.load(Ordering::Relaxed),
            no_results_signals: self.no_results_signals.load(Ordering::Relaxed),
        }
    }
}
