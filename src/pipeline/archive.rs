// src/pipeline/archive.rs

use std::collections::HashSet;

use crate::error::Result;
use crate::models::JobRecord;
use crate::pipeline::DuplicateIndex;
use crate::storage::{ArchiveStore, MirrorMetadata};

/// Append the records whose identity was not archived before the session.
///
/// `baseline` is the index as loaded at session start. The mirror is
/// regenerated from the full archive only when something was appended.
pub async fn append_new(
    records: &[JobRecord],
    baseline: &DuplicateIndex,
    store: &dyn ArchiveStore,
) -> Result<Vec<JobRecord>> {
    let mut batch = HashSet::new();
    let new_records: Vec<JobRecord> = records
        .iter()
        .filter(|record| {
            let key = record.identity();
            !baseline.contains(&key) && batch.insert(key)
        })
        .cloned()
        .collect();

    if new_records.is_empty() {
        log::info!("No new unique jobs found.");
        return Ok(new_records);
    }

    store.append_records(&new_records).await?;
    log::info!("Added {} new jobs to the archive", new_records.len());

    if let Some(meta) = regenerate_mirror(store).await? {
        log::info!(
            "Updated mirror {} ({} total jobs, {})",
            meta.location,
            meta.record_count,
            meta.timestamp.to_rfc3339()
        );
    }

    Ok(new_records)
}

/// Rebuild the mirror from the complete archive.
///
/// Returns `None` when there is no archive to mirror yet.
pub async fn regenerate_mirror(store: &dyn ArchiveStore) -> Result<Option<MirrorMetadata>> {
    match store.load_records().await? {
        Some(records) => Ok(Some(store.write_mirror(&records).await?)),
        None => {
            log::warn!("Archive not found; skipping mirror export");
            Ok(None)
        }
    }
}
