//! Manifest types describing the desired state of the document library.
//!
//! A manifest is fetched once per run and consumed read-only by the engine.
//! Documents and files keep the order the backend delivered them in, which
//! decides what a capped run processes.

pub mod api;

use crate::utils::errors;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

pub use api::ManualsApi;

/// Snapshot of every document the backend wants mirrored.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub documents: Vec<Document>,
    #[serde(rename = "lastGeneratedAt", deserialize_with = "deserialize_timestamp")]
    pub last_generated_at: DateTime<Utc>,
    #[serde(rename = "timeToGenerate")]
    pub time_to_generate: String,
}

/// One logical manual (a product or category) and all of its files.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub serials: Vec<SerialRange>,
    pub files: Vec<ManualFile>,
}

/// Serial numbers a document applies to, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SerialRange {
    pub from: String,
    pub to: String,
}

/// A single uploadable file.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualFile {
    pub filename: String,
    pub mime: String,
    pub language: String,
    #[serde(rename = "type")]
    pub content_type: String,
    /// Declared size as delivered by the backend (a string, not a number).
    pub size: String,
    /// Opaque change-detection token; never recomputed locally.
    pub hash: String,
    #[serde(rename = "link")]
    pub download_url: String,
}

impl Manifest {
    /// Total number of files across all documents.
    pub fn file_count(&self) -> usize {
        self.documents.iter().map(|d| d.files.len()).sum()
    }
}

/// Provider of the desired-state manifest.
///
/// A fetch either yields a fully validated manifest or fails; there is no
/// partial result.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch_manifest(&self) -> errors::Result<Manifest>;
}

/// Accepts RFC 3339 timestamps, or naive ISO-8601 ones which are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid lastGeneratedAt '{}': {}", raw, e))
}
