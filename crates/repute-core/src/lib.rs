//! # repute-core
//! Foundation types and traits for the Repute scoring engine.

pub mod constants;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod query;
pub mod snapshot;
pub mod traits;
pub mod types;
