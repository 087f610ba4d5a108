//! Utility modules for the manual sync.

pub mod errors;
pub mod logger;

pub use errors::{Result, SyncError};
