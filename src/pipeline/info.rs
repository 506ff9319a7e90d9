// src/pipeline/info.rs

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::pipeline::DuplicateIndex;
use crate::storage::ArchiveStore;

/// Snapshot of the archive state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Whether the durable table exists
    pub archive_exists: bool,
    /// Rows in the durable table
    pub row_count: usize,
    /// Distinct identity keys among those rows
    pub distinct_keys: usize,
    /// Record count and timestamp of the mirror, if present
    pub mirror: Option<(usize, DateTime<Utc>)>,
}

/// Inspect the archive and its mirror.
pub async fn run_info(store: &dyn ArchiveStore) -> Result<ArchiveInfo> {
    let records = store.load_records().await?;
    let mirror = store
        .load_mirror()
        .await?
        .map(|data| (data.count, data.updated_at));

    let info = match records {
        Some(records) => ArchiveInfo {
            archive_exists: true,
            row_count: records.len(),
            distinct_keys: DuplicateIndex::from_records(&records).len(),
            mirror,
        },
        None => ArchiveInfo {
            mirror,
            ..ArchiveInfo::default()
        },
    };

    if info.archive_exists {
        log::info!(
            "Archive: {} rows, {} distinct postings",
            info.row_count,
            info.distinct_keys
        );
    } else {
        log::info!("No archive found yet.");
    }
    match info.mirror {
        Some((count, updated_at)) => log::info!("Mirror: {count} jobs, updated {updated_at}"),
        None => log::info!("Mirror: not generated"),
    }

    Ok(info)
}
