// src/pipeline/crawl.rs

//! Crawl orchestration.
//!
//! The orchestrator walks listing pages in increasing order, one at a time:
//!
//! ```text
//! FETCHING ──▶ FILTERING ──▶ ACCUMULATING ──▶ FETCHING ...
//!                  │
//!                  └──▶ TERMINATED
//! ```
//!
//! Termination is checked after every page, in order: the source's explicit
//! end-of-listing signal, then `empty_page_limit` consecutive pages with no
//! usable records. Pages the renderer could not produce are skipped rather
//! than treated as the end of the listing, up to `failed_page_limit` in a
//! row. Consecutive fetch starts are never closer than the page delay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::Result;
use crate::models::{Config, JobRecord, RecordSchema};
use crate::pipeline::archive::append_new;
use crate::pipeline::extract::{PageExtraction, extract_page};
use crate::pipeline::DuplicateIndex;
use crate::services::{ExtractionUsage, PageRenderer, SessionToken, StructuredExtractor};
use crate::storage::ArchiveStore;
use crate::utils::banner;

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The source signalled the end of the listing
    NoResults,
    /// Too many consecutive pages yielded no records
    EmptyPages,
    /// Too many consecutive pages failed to render
    FetchFailures,
    /// The configured page bound was reached
    PageLimit,
}

impl TerminationReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NoResults => "source reported no more results",
            Self::EmptyPages => "no jobs extracted from the last page(s)",
            Self::FetchFailures => "too many consecutive page fetch failures",
            Self::PageLimit => "page limit reached",
        }
    }
}

#[derive(Debug)]
enum CrawlState {
    Fetching,
    Filtering(PageExtraction),
    Accumulating(Vec<JobRecord>),
    Terminated(TerminationReason),
}

/// Pagination, pacing and termination settings for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub base_url: String,
    pub selector: String,
    pub page_delay: Duration,
    pub empty_page_limit: u32,
    pub failed_page_limit: u32,
    pub max_pages: Option<u32>,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            selector: config.source.content_selector.clone(),
            page_delay: config.crawler.page_delay(),
            empty_page_limit: config.crawler.empty_page_limit.max(1),
            failed_page_limit: config.crawler.failed_page_limit.max(1),
            max_pages: config.crawler.max_pages,
        }
    }
}

/// Result of the pagination loop.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Records collected this session, in page order
    pub records: Vec<JobRecord>,
    pub pages_fetched: u32,
    pub failed_pages: u32,
    pub invalid_records: usize,
    pub duplicate_records: usize,
    pub termination: TerminationReason,
}

/// Drives the pagination loop for one session.
pub struct CrawlOrchestrator<'a> {
    renderer: &'a dyn PageRenderer,
    extractor: &'a dyn StructuredExtractor,
    schema: &'a RecordSchema,
    settings: CrawlSettings,
    session: SessionToken,
}

impl<'a> CrawlOrchestrator<'a> {
    pub fn new(
        renderer: &'a dyn PageRenderer,
        extractor: &'a dyn StructuredExtractor,
        schema: &'a RecordSchema,
        settings: CrawlSettings,
        session: SessionToken,
    ) -> Self {
        Self {
            renderer,
            extractor,
            schema,
            settings,
            session,
        }
    }

    /// Run the loop until a termination condition fires.
    ///
    /// Titles and identity keys of accepted records are inserted into
    /// `index` as they are accumulated. An extractor failure aborts the
    /// session and discards everything accumulated so far.
    pub async fn run(&self, index: &mut DuplicateIndex) -> Result<CrawlReport> {
        let mut page_number: u32 = 1;
        let mut accumulated: Vec<JobRecord> = Vec::new();
        let mut last_fetch: Option<Instant> = None;
        let mut empty_streak = 0;
        let mut failed_streak = 0;
        let mut pages_fetched = 0;
        let mut failed_pages = 0;
        let mut invalid_records = 0;
        let mut duplicate_records = 0;

        let mut state = CrawlState::Fetching;
        let termination = loop {
            state = match state {
                CrawlState::Fetching => {
                    last_fetch = Some(Instant::now());
                    let page = extract_page(
                        self.renderer,
                        self.extractor,
                        page_number,
                        &self.settings.base_url,
                        &self.settings.selector,
                        self.schema,
                        &self.session,
                        index,
                    )
                    .await?;
                    pages_fetched += 1;
                    CrawlState::Filtering(page)
                }

                CrawlState::Filtering(page) => {
                    invalid_records += page.invalid_count;
                    duplicate_records += page.duplicate_count;

                    if page.no_results_found {
                        CrawlState::Terminated(TerminationReason::NoResults)
                    } else if page.fetch_failed {
                        failed_pages += 1;
                        failed_streak += 1;
                        if failed_streak >= self.settings.failed_page_limit {
                            CrawlState::Terminated(TerminationReason::FetchFailures)
                        } else {
                            CrawlState::Accumulating(Vec::new())
                        }
                    } else if page.records.is_empty() {
                        failed_streak = 0;
                        empty_streak += 1;
                        banner::sub_item(&format!("No jobs extracted from page {page_number}"));
                        if empty_streak >= self.settings.empty_page_limit {
                            CrawlState::Terminated(TerminationReason::EmptyPages)
                        } else {
                            CrawlState::Accumulating(Vec::new())
                        }
                    } else {
                        failed_streak = 0;
                        empty_streak = 0;

                        let mut survivors = Vec::with_capacity(page.records.len());
                        for record in page.records {
                            if index.contains_title(&record.title) {
                                duplicate_records += 1;
                                continue;
                            }
                            index.insert(record.identity());
                            survivors.push(record);
                        }

                        log::info!(
                            "Page {page_number}: {} new jobs ({} invalid, {} already seen)",
                            survivors.len(),
                            page.invalid_count,
                            page.duplicate_count
                        );
                        CrawlState::Accumulating(survivors)
                    }
                }

                CrawlState::Accumulating(survivors) => {
                    accumulated.extend(survivors);

                    if self
                        .settings
                        .max_pages
                        .is_some_and(|max| page_number >= max)
                    {
                        CrawlState::Terminated(TerminationReason::PageLimit)
                    } else {
                        page_number += 1;
                        if let Some(last) = last_fetch {
                            tokio::time::sleep_until(last + self.settings.page_delay).await;
                        }
                        CrawlState::Fetching
                    }
                }

                CrawlState::Terminated(reason) => break reason,
            };
        };

        log::info!(
            "Crawl finished after {pages_fetched} page(s): {}",
            termination.describe()
        );

        Ok(CrawlReport {
            records: accumulated,
            pages_fetched,
            failed_pages,
            invalid_records,
            duplicate_records,
            termination,
        })
    }
}

/// Summary of a full crawl session.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub session: SessionToken,
    pub report: CrawlReport,
    /// Records actually appended to the archive
    pub appended: Vec<JobRecord>,
    pub index_size_before: usize,
    pub index_size_after: usize,
    pub usage: ExtractionUsage,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Run one crawl session: load the index, paginate, archive new records.
///
/// Nothing is written unless the loop terminates normally.
pub async fn run_crawler(
    config: &Config,
    renderer: &dyn PageRenderer,
    extractor: &dyn StructuredExtractor,
    store: &dyn ArchiveStore,
) -> Result<CrawlSummary> {
    let start_time = Utc::now();
    let session = SessionToken::for_run(&config.source, start_time);
    banner::header("Crawling job listings");
    log::info!("Session: {session}");
    log::info!("Source: {}", config.source.base_url);
    log::info!(
        "Page delay: {}s",
        config.crawler.page_delay().as_secs_f64()
    );

    let mut index = DuplicateIndex::load(store).await?;
    let baseline = index.clone();

    let orchestrator = CrawlOrchestrator::new(
        renderer,
        extractor,
        &config.schema,
        CrawlSettings::from_config(config),
        session.clone(),
    );
    let report = orchestrator.run(&mut index).await?;

    let appended = if report.records.is_empty() {
        log::info!("No jobs were found during the crawl.");
        Vec::new()
    } else {
        append_new(&report.records, &baseline, store).await?
    };

    let usage = extractor.usage();
    banner::summary("Extraction usage", &usage.summary_items());

    Ok(CrawlSummary {
        session,
        index_size_before: baseline.len(),
        index_size_after: index.len(),
        report,
        appended,
        usage,
        start_time,
        end_time: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::IdentityKey;
    use crate::pipeline::testing::{ScriptedPage, ScriptedSource, raw_job, records_page};
    use crate::storage::LocalArchive;
    use tempfile::TempDir;

    fn settings() -> CrawlSettings {
        CrawlSettings {
            base_url: "scripted://listing".into(),
            selector: String::new(),
            page_delay: Duration::ZERO,
            empty_page_limit: 1,
            failed_page_limit: 3,
            max_pages: None,
        }
    }

    async fn crawl(
        source: &ScriptedSource,
        settings: CrawlSettings,
        index: &mut DuplicateIndex,
    ) -> Result<CrawlReport> {
        let schema = RecordSchema::default();
        CrawlOrchestrator::new(source, source, &schema, settings, SessionToken::new("s"))
            .run(index)
            .await
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.crawler.page_delay_ms = 0;
        config.source.session_id = Some("test-session".into());
        config
    }

    fn store(tmp: &TempDir) -> LocalArchive {
        LocalArchive::new(tmp.path().join("jobs.csv"), tmp.path().join("jobs.json"))
    }

    #[tokio::test]
    async fn test_no_results_on_page_k_issues_k_fetches() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 2))
            .page(2, records_page("Page2", 2))
            .page(3, records_page("Page3", 2))
            .page(4, ScriptedPage::NoResults);

        let report = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2, 3, 4]);
        assert_eq!(report.pages_fetched, 4);
        assert_eq!(report.termination, TerminationReason::NoResults);
        assert_eq!(report.records.len(), 6);
    }

    #[tokio::test]
    async fn test_empty_page_terminates_by_default() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(3, records_page("Page3", 3));

        let report = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2]);
        assert_eq!(report.termination, TerminationReason::EmptyPages);
        assert_eq!(report.records.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_limit_allows_gaps() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(3, records_page("Page3", 3))
            .page(4, ScriptedPage::NoResults);

        let report = crawl(
            &source,
            CrawlSettings {
                empty_page_limit: 2,
                ..settings()
            },
            &mut DuplicateIndex::new(),
        )
        .await
        .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2, 3, 4]);
        assert_eq!(report.records.len(), 6);
        assert_eq!(report.termination, TerminationReason::NoResults);
    }

    #[tokio::test]
    async fn test_render_failure_advances_to_next_page() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(2, ScriptedPage::RenderFailure)
            .page(3, ScriptedPage::NoResults);

        let report = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2, 3]);
        assert_eq!(report.termination, TerminationReason::NoResults);
        assert_eq!(report.failed_pages, 1);
        assert_eq!(report.records.len(), 3);
        assert!(report.records.iter().all(|r| r.title.starts_with("Page1")));
    }

    #[tokio::test]
    async fn test_consecutive_render_failures_stop_the_crawl() {
        let source = ScriptedSource::new()
            .page(1, ScriptedPage::RenderFailure)
            .page(2, ScriptedPage::RenderFailure)
            .page(3, ScriptedPage::RenderFailure)
            .page(4, records_page("Page4", 1));

        let report = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2, 3]);
        assert_eq!(report.termination, TerminationReason::FetchFailures);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_max_pages_bounds_the_loop() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 1))
            .page(2, records_page("Page2", 1))
            .page(3, records_page("Page3", 1));

        let report = crawl(
            &source,
            CrawlSettings {
                max_pages: Some(2),
                ..settings()
            },
            &mut DuplicateIndex::new(),
        )
        .await
        .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2]);
        assert_eq!(report.termination, TerminationReason::PageLimit);
    }

    #[tokio::test]
    async fn test_titles_repeated_across_pages_kept_once() {
        let source = ScriptedSource::new()
            .page(
                1,
                ScriptedPage::Records(vec![raw_job("Engineer A", "2026-10-01"), raw_job("Engineer B", "2026-10-01")]),
            )
            .page(
                2,
                ScriptedPage::Records(vec![raw_job("Engineer B", "2026-10-01"), raw_job("Engineer C", "2026-10-01")]),
            )
            .page(3, ScriptedPage::NoResults);

        let report = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Engineer A", "Engineer B", "Engineer C"]);
        assert_eq!(report.duplicate_records, 1);
    }

    #[tokio::test]
    async fn test_index_only_grows() {
        let mut index = DuplicateIndex::new();
        index.insert(IdentityKey::new("Archived", "2025-01-01"));
        let before = index.clone();

        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(2, ScriptedPage::NoResults);
        crawl(&source, settings(), &mut index).await.unwrap();

        assert!(index.is_superset(&before));
        assert_eq!(index.len(), before.len() + 3);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_session() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(2, ScriptedPage::BackendError);

        let err = crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { page: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_respect_page_delay() {
        let delay = Duration::from_secs(61);
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 1))
            .page(2, ScriptedPage::RenderFailure)
            .page(3, records_page("Page3", 1))
            .page(4, ScriptedPage::NoResults);

        crawl(
            &source,
            CrawlSettings {
                page_delay: delay,
                ..settings()
            },
            &mut DuplicateIndex::new(),
        )
        .await
        .unwrap();

        let times = source.fetch_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= delay);
        }
    }

    #[tokio::test]
    async fn test_session_token_stable_across_pages() {
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 1))
            .page(2, records_page("Page2", 1))
            .page(3, ScriptedPage::NoResults);

        crawl(&source, settings(), &mut DuplicateIndex::new())
            .await
            .unwrap();

        assert_eq!(source.sessions(), vec!["s", "s", "s"]);
    }

    #[tokio::test]
    async fn test_first_run_archives_every_page() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(2, records_page("Page2", 3))
            .page(3, ScriptedPage::NoResults);

        let summary = run_crawler(&test_config(), &source, &source, &store)
            .await
            .unwrap();

        assert_eq!(source.fetched_pages(), vec![1, 2, 3]);
        assert_eq!(summary.report.records.len(), 6);
        assert_eq!(summary.appended.len(), 6);
        assert_eq!(summary.index_size_before, 0);
        assert_eq!(summary.index_size_after, 6);
        assert_eq!(summary.usage.pages, 3);
        assert_eq!(summary.session.as_str(), "test-session");

        assert_eq!(store.load_records().await.unwrap().unwrap().len(), 6);
        assert_eq!(store.load_mirror().await.unwrap().unwrap().count, 6);
    }

    #[tokio::test]
    async fn test_archived_title_is_not_appended_again() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let archived = JobRecord::from_raw(&raw_job("Engineer A", "2026-10-01")).unwrap();
        store.append_records(&[archived]).await.unwrap();

        let source = ScriptedSource::new()
            .page(
                1,
                ScriptedPage::Records(vec![raw_job("Engineer A", "2026-10-01"), raw_job("Engineer B", "2026-10-01")]),
            )
            .page(2, ScriptedPage::NoResults);

        let summary = run_crawler(&test_config(), &source, &source, &store)
            .await
            .unwrap();

        let appended: Vec<&str> = summary.appended.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(appended, vec!["Engineer B"]);

        let titles: Vec<String> = store
            .load_records()
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Engineer A", "Engineer B"]);
    }

    #[tokio::test]
    async fn test_second_run_appends_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let script = || {
            ScriptedSource::new()
                .page(1, records_page("Page1", 3))
                .page(2, records_page("Page2", 3))
                .page(3, ScriptedPage::NoResults)
        };

        let first = run_crawler(&test_config(), &script(), &script(), &store)
            .await
            .unwrap();
        assert_eq!(first.appended.len(), 6);
        let mirror_before = store.load_mirror().await.unwrap().unwrap();

        let source = script();
        let second = run_crawler(&test_config(), &source, &source, &store)
            .await
            .unwrap();

        assert!(second.appended.is_empty());
        assert_eq!(second.report.termination, TerminationReason::EmptyPages);
        assert_eq!(store.load_records().await.unwrap().unwrap().len(), 6);

        let mirror_after = store.load_mirror().await.unwrap().unwrap();
        assert_eq!(mirror_after.updated_at, mirror_before.updated_at);
    }

    #[tokio::test]
    async fn test_archived_records_are_schema_complete() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut incomplete = raw_job("Engineer Z", "2026-10-01");
        incomplete.insert("location".into(), String::new());

        let source = ScriptedSource::new()
            .page(
                1,
                ScriptedPage::Records(vec![raw_job("Engineer A", "2026-10-01"), incomplete]),
            )
            .page(2, ScriptedPage::NoResults);

        let summary = run_crawler(&test_config(), &source, &source, &store)
            .await
            .unwrap();

        assert_eq!(summary.report.invalid_records, 1);
        for record in store.load_records().await.unwrap().unwrap() {
            assert!(!record.title.is_empty());
            assert!(!record.category.is_empty());
            assert!(!record.date.is_empty());
            assert!(!record.location.is_empty());
            assert!(!record.url.is_empty());
        }
    }

    #[tokio::test]
    async fn test_failed_session_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let source = ScriptedSource::new()
            .page(1, records_page("Page1", 3))
            .page(2, ScriptedPage::BackendError);

        assert!(
            run_crawler(&test_config(), &source, &source, &store)
                .await
                .is_err()
        );
        assert!(store.load_records().await.unwrap().is_none());
        assert!(store.load_mirror().await.unwrap().is_none());
    }
}
