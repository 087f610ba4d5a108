//! Per-file outcomes and the aggregate run summary.

use std::fmt;

/// Step of a file's processing at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Lookup,
    Download,
    EnsurePath,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Lookup => "lookup",
            Stage::Download => "download",
            Stage::EnsurePath => "ensure_path",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored hash equals the manifest hash; nothing was transferred.
    Skipped,
    Uploaded,
    Failed { stage: Stage, reason: String },
}

/// Outcome of one manifest file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub document_type: String,
    pub filename: String,
    /// Destination folder; `None` when the path could not be built.
    pub path: Option<String>,
    pub outcome: SyncOutcome,
}

/// Result of one engine run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub skipped: usize,
    pub uploaded: usize,
    pub failed: usize,
    /// Every processed file, in processing order
    pub reports: Vec<FileReport>,
    /// The file cap stopped the run before the manifest was exhausted
    pub truncated: bool,
    /// Cancellation stopped the run
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn record(&mut self, report: FileReport) {
        match report.outcome {
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Uploaded => self.uploaded += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(report);
    }

    /// Files processed so far, whatever their outcome.
    pub fn processed(&self) -> usize {
        self.skipped + self.uploaded + self.failed
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(filename: &str, outcome: SyncOutcome) -> FileReport {
        FileReport {
            document_type: "printer".into(),
            filename: filename.into(),
            path: Some("Manuals/printer/user/en".into()),
            outcome,
        }
    }

    #[test]
    fn test_record_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(report("a.pdf", SyncOutcome::Skipped));
        summary.record(report("b.pdf", SyncOutcome::Uploaded));
        summary.record(report(
            "c.pdf",
            SyncOutcome::Failed { stage: Stage::Download, reason: "HTTP 404".into() },
        ));
        summary.record(report("d.pdf", SyncOutcome::Uploaded));

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), 4);

        let failed: Vec<&str> = summary.failures().map(|r| r.filename.as_str()).collect();
        assert_eq!(failed, vec!["c.pdf"]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::EnsurePath.to_string(), "ensure_path");
        assert_eq!(Stage::Lookup.to_string(), "lookup");
    }
}
