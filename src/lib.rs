// src/lib.rs

//! Harvester Library
//!
//! Incrementally harvests a paginated job listing into a deduplicated,
//! append-only archive.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
