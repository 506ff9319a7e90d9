//! Pipeline entry points for harvester operations.
//!
//! - `run_crawler`: One crawl session, from index load to archive append
//! - `append_new` / `regenerate_mirror`: Archive writes
//! - `run_validate`: Check configuration
//! - `run_info`: Inspect the archive

pub mod archive;
pub mod crawl;
pub mod extract;
pub mod index;
pub mod info;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{append_new, regenerate_mirror};
pub use crawl::{
    CrawlOrchestrator, CrawlReport, CrawlSettings, CrawlSummary, TerminationReason, run_crawler,
};
pub use extract::{PageExtraction, extract_page};
pub use index::DuplicateIndex;
pub use info::{ArchiveInfo, run_info};
pub use validate::run_validate;
