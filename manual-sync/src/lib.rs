//! Manual Sync Library
//!
//! Mirrors the product-manual catalogue into a SharePoint document library,
//! re-uploading only files whose content hash changed.

pub mod config;
pub mod download;
pub mod engine;
pub mod manifest;
pub mod remote;
pub mod resilience;
pub mod scheduler;
pub mod service;
pub mod sharepoint;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use engine::{RunSummary, SyncEngine, SyncOutcome};
pub use utils::errors::{Result, SyncError};
