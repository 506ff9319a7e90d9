//! Duplicate index over archived postings.
//!
//! Holds the identity keys of every archived record plus the titles seen so
//! far. The index only grows: there is no removal operation.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{IdentityKey, JobRecord};
use crate::storage::ArchiveStore;

/// Set of known identity keys and titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateIndex {
    keys: HashSet<IdentityKey>,
    titles: HashSet<String>,
}

impl DuplicateIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from every record in the archive.
    ///
    /// A missing archive yields an empty index (first run).
    pub async fn load(archive: &dyn ArchiveStore) -> Result<Self> {
        match archive.load_records().await? {
            Some(records) => {
                let index = Self::from_records(&records);
                log::info!(
                    "Loaded {} identity keys from {} archived records",
                    index.len(),
                    records.len()
                );
                Ok(index)
            }
            None => {
                log::info!("No archive found; starting with an empty index");
                Ok(Self::new())
            }
        }
    }

    /// Build the index from in-memory records.
    pub fn from_records(records: &[JobRecord]) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record.identity());
        }
        index
    }

    /// Check whether a posting with this identity is known.
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.keys.contains(key)
    }

    /// Check whether any known posting carries this title.
    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    /// Add a key. Inserting a known key is a no-op.
    pub fn insert(&mut self, key: IdentityKey) {
        self.titles.insert(key.title.clone());
        self.keys.insert(key);
    }

    /// Whether every key in `other` is also in `self`.
    pub fn is_superset(&self, other: &DuplicateIndex) -> bool {
        self.keys.is_superset(&other.keys)
    }

    /// Number of identity keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
