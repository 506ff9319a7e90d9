// src/pipeline/extract.rs

//! Page extraction: render one page, extract, validate, drop known titles.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{JobRecord, RecordSchema};
use crate::pipeline::DuplicateIndex;
use crate::services::{PageRenderer, SessionToken, StructuredExtractor};

/// Outcome of extracting a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    /// Valid records whose titles were not seen before
    pub records: Vec<JobRecord>,
    /// Explicit end-of-listing signal from the source, passed through as is
    pub no_results_found: bool,
    /// The renderer could not produce the page
    pub fetch_failed: bool,
    /// Items dropped for missing required fields
    pub invalid_count: usize,
    /// Items dropped because their title was already seen
    pub duplicate_count: usize,
}

impl PageExtraction {
    fn failed() -> Self {
        Self {
            fetch_failed: true,
            ..Self::default()
        }
    }
}

/// Render and extract one listing page.
///
/// A renderer failure is reported through `fetch_failed` with no records;
/// only an extractor failure is returned as an error.
#[allow(clippy::too_many_arguments)]
pub async fn extract_page(
    renderer: &dyn PageRenderer,
    extractor: &dyn StructuredExtractor,
    page_number: u32,
    base_url: &str,
    selector: &str,
    schema: &RecordSchema,
    session: &SessionToken,
    seen: &DuplicateIndex,
) -> Result<PageExtraction> {
    let page = renderer
        .render(base_url, page_number, selector, session)
        .await;
    if !page.success {
        log::warn!("Page {page_number} failed to render ({}); treating it as empty", page.url);
        return Ok(PageExtraction::failed());
    }

    let extraction = extractor
        .extract(&page, selector, schema)
        .await
        .map_err(|e| match e {
            AppError::Extraction { .. } => e,
            other => AppError::extraction(page_number, other),
        })?;

    let mut outcome = PageExtraction {
        no_results_found: extraction.no_results_found,
        ..PageExtraction::default()
    };
    let mut page_titles = HashSet::new();

    for raw in extraction.records {
        let record = match JobRecord::from_raw(&raw) {
            Some(record) if schema.validate(&raw) => record,
            _ => {
                outcome.invalid_count += 1;
                continue;
            }
        };

        if seen.contains_title(&record.title) || !page_titles.insert(record.title.clone()) {
            outcome.duplicate_count += 1;
            continue;
        }

        outcome.records.push(record);
    }

    if outcome.invalid_count > 0 {
        log::debug!(
            "Page {page_number}: dropped {} records missing required fields",
            outcome.invalid_count
        );
    }

    Ok(outcome)
}
