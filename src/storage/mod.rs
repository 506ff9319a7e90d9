//! Storage abstractions for the job archive.
//!
//! The archive has two views:
//! - Durable: an append-only table of every unique posting ever seen
//! - Mirror: a read-optimized JSON snapshot, regenerated wholesale from the
//!   durable table whenever it grows
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── jobs.csv      # Durable: append-only, one row per posting
//! └── jobs.json     # Mirror: full snapshot of jobs.csv
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::JobRecord;

// Re-export for convenience
pub use local::LocalArchive;

/// Metadata about a mirror regeneration.
#[derive(Debug, Clone)]
pub struct MirrorMetadata {
    /// Number of records in the mirror
    pub record_count: usize,
    /// Where the mirror was written
    pub location: String,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Contents of the mirror document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorData {
    /// ISO 8601 timestamp of last regeneration
    pub updated_at: DateTime<Utc>,
    /// Total record count
    pub count: usize,
    /// Every archived record, in archive order
    pub records: Vec<JobRecord>,
}

impl MirrorData {
    pub fn new(records: Vec<JobRecord>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Trait for archive backends.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Read every archived record.
    ///
    /// Returns `None` when the archive has never been written.
    async fn load_records(&self) -> Result<Option<Vec<JobRecord>>>;

    /// Append records to the durable table.
    async fn append_records(&self, records: &[JobRecord]) -> Result<()>;

    /// Replace the mirror with a snapshot of `records`.
    async fn write_mirror(&self, records: &[JobRecord]) -> Result<MirrorMetadata>;

    /// Read the current mirror, if any.
    async fn load_mirror(&self) -> Result<Option<MirrorData>>;
}
