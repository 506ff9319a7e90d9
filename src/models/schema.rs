//! Record schema contract.

use serde::{Deserialize, Serialize};

use crate::models::RawRecord;

/// Returns true iff every required field is present with a non-empty value.
pub fn validate(record: &RawRecord, required_fields: &[String]) -> bool {
    required_fields.iter().all(|name| {
        record
            .get(name)
            .is_some_and(|value| !value.trim().is_empty())
    })
}

/// Target schema handed to the extractor, plus the fields a record must
/// carry to be accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Named fields the extractor should produce
    #[serde(default = "defaults::fields")]
    pub fields: Vec<String>,

    /// Fields that must be present and non-empty
    #[serde(default = "defaults::fields")]
    pub required: Vec<String>,
}

impl RecordSchema {
    /// Check a record against the required fields.
    pub fn validate(&self, record: &RawRecord) -> bool {
        validate(record, &self.required)
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            fields: defaults::fields(),
            required: defaults::fields(),
        }
    }
}

mod defaults {
    use crate::models::JobRecord;

    pub fn fields() -> Vec<String> {
        JobRecord::COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}
