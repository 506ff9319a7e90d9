//! Scripted listing source for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{RawRecord, RecordSchema};
use crate::services::{
    Extraction, ExtractionUsage, PageRenderer, RenderedPage, SessionToken, StructuredExtractor,
};

/// What the source serves for one page number.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    Records(Vec<RawRecord>),
    NoResults,
    RenderFailure,
    BackendError,
}

/// Renderer and extractor backed by a fixed page script.
///
/// Pages missing from the script render fine but hold no records.
#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<u32, ScriptedPage>,
    fetches: Mutex<Vec<(u32, Instant)>>,
    sessions: Mutex<Vec<String>>,
    extractions: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page_number: u32, page: ScriptedPage) -> Self {
        self.pages.insert(page_number, page);
        self
    }

    /// Page numbers in fetch order.
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.fetches.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    /// Fetch start instants in fetch order.
    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }
}

/// A complete raw record.
pub fn raw_job(title: &str, date: &str) -> RawRecord {
    RawRecord::from([
        ("title".to_string(), title.to_string()),
        ("category".to_string(), "Software and Services".to_string()),
        ("date".to_string(), date.to_string()),
        ("location".to_string(), "London".to_string()),
        (
            "url".to_string(),
            format!("https://jobs.example.com/details/{}", title.replace(' ', "-")),
        ),
    ])
}

/// Records page of `count` unique postings, titled `"{prefix} {n}"`.
pub fn records_page(prefix: &str, count: usize) -> ScriptedPage {
    ScriptedPage::Records(
        (1..=count)
            .map(|n| raw_job(&format!("{prefix} {n}"), "2026-10-01"))
            .collect(),
    )
}

#[async_trait]
impl PageRenderer for ScriptedSource {
    async fn render(
        &self,
        _base_url: &str,
        page_number: u32,
        _selector: &str,
        session: &SessionToken,
    ) -> RenderedPage {
        self.fetches
            .lock()
            .unwrap()
            .push((page_number, Instant::now()));
        self.sessions.lock().unwrap().push(session.to_string());

        let url = format!("scripted://listing?page={page_number}");
        match self.pages.get(&page_number) {
            Some(ScriptedPage::RenderFailure) => RenderedPage::failed(url),
            _ => RenderedPage::ok(url, page_number.to_string()),
        }
    }
}

#[async_trait]
impl StructuredExtractor for ScriptedSource {
    async fn extract(
        &self,
        page: &RenderedPage,
        _selector: &str,
        _schema: &RecordSchema,
    ) -> Result<Extraction> {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        let page_number: u32 = page
            .content
            .parse()
            .map_err(|_| AppError::validation("scripted page without a number"))?;

        match self.pages.get(&page_number) {
            Some(ScriptedPage::Records(records)) => Ok(Extraction {
                records: records.clone(),
                no_results_found: false,
            }),
            Some(ScriptedPage::NoResults) => Ok(Extraction {
                records: Vec::new(),
                no_results_found: true,
            }),
            Some(ScriptedPage::BackendError) => Err(AppError::validation("backend unavailable")),
            Some(ScriptedPage::RenderFailure) | None => Ok(Extraction::default()),
        }
    }

    fn usage(&self) -> ExtractionUsage {
        ExtractionUsage {
            pages: self.extractions.load(Ordering::Relaxed),
            ..ExtractionUsage::default()
        }
    }
}
