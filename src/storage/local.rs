//! Local filesystem archive.
//!
//! The durable table is a CSV file with a header row written on creation.
//! A table written with an older column set is rewritten under the current
//! header on the next append. The mirror is a pretty-printed JSON document
//! replaced atomically.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::JobRecord;
use crate::storage::{ArchiveStore, MirrorData, MirrorMetadata};

/// Local filesystem archive backend.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    archive_path: PathBuf,
    mirror_path: PathBuf,
}

impl LocalArchive {
    /// Create an archive over the given table and mirror files.
    pub fn new(archive_path: impl Into<PathBuf>, mirror_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            mirror_path: mirror_path.into(),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Whether the table's header row is the current column set.
    fn has_current_header(bytes: &[u8]) -> Result<bool> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);
        let headers = reader.headers()?;
        Ok(headers.iter().eq(JobRecord::COLUMNS.iter().copied()))
    }

    fn parse_table(bytes: &[u8]) -> Result<Vec<JobRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let records = reader
            .deserialize::<JobRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn encode_rows(records: &[JobRecord], with_header: bool) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(with_header)
            .from_writer(Vec::new());

        for record in records {
            writer.serialize(record)?;
        }

        writer
            .into_inner()
            .map_err(|e| AppError::archive(format!("failed to flush CSV rows: {e}")))
    }
}

#[async_trait]
impl ArchiveStore for LocalArchive {
    async fn load_records(&self) -> Result<Option<Vec<JobRecord>>> {
        match Self::read_bytes(&self.archive_path).await? {
            Some(bytes) => Ok(Some(Self::parse_table(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn append_records(&self, records: &[JobRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let existing = Self::read_bytes(&self.archive_path)
            .await?
            .filter(|bytes| !bytes.is_empty());

        if let Some(bytes) = &existing {
            if !Self::has_current_header(bytes)? {
                let mut all = Self::parse_table(bytes)?;
                all.extend_from_slice(records);
                let table = Self::encode_rows(&all, true)?;
                Self::write_atomic(&self.archive_path, &table).await?;

                log::info!(
                    "Rewrote {} with columns {} ({} rows)",
                    self.archive_path.display(),
                    JobRecord::COLUMNS.join(","),
                    all.len()
                );
                return Ok(());
            }
        }

        let bytes = Self::encode_rows(records, existing.is_none())?;

        Self::ensure_dir(&self.archive_path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.archive_path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        log::debug!(
            "Appended {} rows to {}",
            records.len(),
            self.archive_path.display()
        );
        Ok(())
    }

    async fn write_mirror(&self, records: &[JobRecord]) -> Result<MirrorMetadata> {
        let data = MirrorData::new(records.to_vec());
        let bytes = serde_json::to_vec_pretty(&data)?;
        Self::write_atomic(&self.mirror_path, &bytes).await?;

        Ok(MirrorMetadata {
            record_count: data.count,
            location: self.mirror_path.display().to_string(),
            timestamp: data.updated_at,
        })
    }

    async fn load_mirror(&self) -> Result<Option<MirrorData>> {
        match Self::read_bytes(&self.mirror_path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
