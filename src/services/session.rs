//! Browsing session token.

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::models::SourceConfig;

/// Opaque id of one crawl run's browsing session, stable across its pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap an existing session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a fresh token from the listing URL and the run start time.
    pub fn generate(prefix: &str, base_url: &str, started_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(base_url.as_bytes());
        hasher.update(started_at.to_rfc3339().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{prefix}-{}", &digest[..12]))
    }

    /// Use the configured session id, or generate one for this run.
    pub fn for_run(source: &SourceConfig, started_at: DateTime<Utc>) -> Self {
        match &source.session_id {
            Some(id) if !id.trim().is_empty() => Self::new(id.trim()),
            _ => Self::generate("jobs", &source.base_url, started_at),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
