// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
pub mod schema;

// Re-export all public types
pub use config::{Config, CrawlerConfig, ExtractorConfig, FieldRule, PathsConfig, SourceConfig};
pub use record::{IdentityKey, JobRecord, RawRecord};
pub use schema::RecordSchema;
