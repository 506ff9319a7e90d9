//! Job record data structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single extracted item: field name to string value.
pub type RawRecord = BTreeMap<String, String>;

/// Identity of a posting: two records with the same `(title, date)` are the
/// same posting regardless of their other fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub title: String,
    pub date: String,
}

impl IdentityKey {
    pub fn new(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: date.into(),
        }
    }
}

/// A structured job posting.
///
/// Field order is the archive column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    /// Posting title
    pub title: String,

    /// Team or job category
    #[serde(default)]
    pub category: String,

    /// Posting date as shown by the source
    #[serde(default)]
    pub date: String,

    /// Job location
    #[serde(default)]
    pub location: String,

    /// Link to the posting (absent in archives written before it was persisted)
    #[serde(default)]
    pub url: String,
}

impl JobRecord {
    /// Archive column order.
    pub const COLUMNS: [&'static str; 5] = ["title", "category", "date", "location", "url"];

    /// Build a record from an extracted mapping.
    ///
    /// Returns `None` when the title is missing or blank; other fields
    /// default to empty. Callers validate against the schema first.
    pub fn from_raw(raw: &RawRecord) -> Option<Self> {
        let field = |name: &str| raw.get(name).map(|v| v.trim().to_string()).unwrap_or_default();

        let title = field("title");
        if title.is_empty() {
            return None;
        }

        Some(Self {
            title,
            category: field("category"),
            date: field("date"),
            location: field("location"),
            url: field("url"),
        })
    }

    /// The `(title, date)` identity of this posting.
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(self.title.clone(), self.date.clone())
    }
}
