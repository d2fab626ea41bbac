// src/report.rs

//! Run reports and the line-oriented report sink
//!
//! Every import or export run produces a report holding one outcome per
//! manifest record, in record order. While the run is in progress, status
//! and error lines are also pushed to a `ReportSink` so that callers can
//! surface them as they happen.
//!
//! Sink implementations:
//! - `LogReport`: forwards lines to tracing
//! - `SilentReport`: discards everything
//! - `CollectingReport`: keeps lines in memory (tests, embedding callers)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{info, warn};

/// Receiver for line-oriented status and error entries
///
/// Implementations must be thread-safe, since independent runs may share
/// one sink.
pub trait ReportSink: Send + Sync {
    /// Informational status line
    fn status(&self, line: &str);

    /// Error line for a recoverable failure
    fn error(&self, line: &str);
}

/// No-op sink for quiet mode
#[derive(Debug, Default)]
pub struct SilentReport;

impl ReportSink for SilentReport {
    fn status(&self, _line: &str) {}
    fn error(&self, _line: &str) {}
}

/// Sink that logs through tracing
#[derive(Debug)]
pub struct LogReport {
    name: String,
}

impl LogReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ReportSink for LogReport {
    fn status(&self, line: &str) {
        info!("{}: {}", self.name, line);
    }

    fn error(&self, line: &str) {
        warn!("{}: {}", self.name, line);
    }
}

/// One line captured by `CollectingReport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Status(String),
    Error(String),
}

/// Sink that records every line in order
#[derive(Debug, Default)]
pub struct CollectingReport {
    lines: Mutex<Vec<ReportLine>>,
}

impl CollectingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines received so far
    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Only the error lines
    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                ReportLine::Error(e) => Some(e),
                ReportLine::Status(_) => None,
            })
            .collect()
    }

    fn push(&self, line: ReportLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl ReportSink for CollectingReport {
    fn status(&self, line: &str) {
        self.push(ReportLine::Status(line.to_string()));
    }

    fn error(&self, line: &str) {
        self.push(ReportLine::Error(line.to_string()));
    }
}

/// Why a record was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Destination matches an immutable-path pattern
    Immutable,
    /// Older than the export content-age cutoff
    Unchanged,
    /// Account already present in the store
    Exists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immutable => write!(f, "immutable"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Exists => write!(f, "exists"),
        }
    }
}

/// Final status of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// Resource created (import) or serialized (export)
    Written,
    /// Link placeholder recorded, waiting for the resolver
    Deferred,
    /// Link placeholder resolved and created
    Linked { target: String },
    /// Record failed; the run continued
    Failed(String),
    /// Record intentionally not processed
    Skipped(SkipReason),
}

impl RecordStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written => write!(f, "written"),
            Self::Deferred => write!(f, "deferred"),
            Self::Linked { target } => write!(f, "linked -> {}", target),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

/// Outcome of one manifest record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Destination path (import) or source path (export)
    pub path: String,
    pub status: RecordStatus,
    /// Non-fatal notes such as principal fallbacks or dropped ACEs
    pub warnings: Vec<String>,
}

impl RecordOutcome {
    pub fn new(path: impl Into<String>, status: RecordStatus) -> Self {
        Self {
            path: path.into(),
            status,
            warnings: Vec::new(),
        }
    }
}

/// Counters shared by import and export reports
fn count(outcomes: &[RecordOutcome], pred: impl Fn(&RecordStatus) -> bool) -> usize {
    outcomes.iter().filter(|o| pred(&o.status)).count()
}

/// Result of an import run
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Format version marker the archive declared
    pub format_version: u32,
    /// Reconstructor that processed the archive
    pub handler: String,
    /// One outcome per manifest record, in record order
    pub outcomes: Vec<RecordOutcome>,
    /// Outcomes of account creation, when enabled
    pub principals: Vec<RecordOutcome>,
}

impl ImportReport {
    pub fn written(&self) -> usize {
        count(&self.outcomes, |s| {
            matches!(s, RecordStatus::Written | RecordStatus::Linked { .. })
        })
    }

    pub fn failed(&self) -> usize {
        count(&self.outcomes, RecordStatus::is_failure)
    }

    pub fn skipped(&self) -> usize {
        count(&self.outcomes, |s| matches!(s, RecordStatus::Skipped(_)))
    }

    /// Failed records with their reasons
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            RecordStatus::Failed(reason) => Some((o.path.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn outcome(&self, path: &str) -> Option<&RecordOutcome> {
        self.outcomes.iter().find(|o| o.path == path)
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.principals.iter().all(|p| !p.status.is_failure())
    }
}

/// Result of an export run
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// One outcome per visited resource, in export order
    pub outcomes: Vec<RecordOutcome>,
    /// XXH128 digest of every content entry written, keyed by resource path
    pub digests: BTreeMap<String, String>,
    /// Dataset entries serialized
    pub datasets_written: usize,
    /// Dataset references collapsed onto an earlier write
    pub datasets_deduplicated: usize,
    /// Number of writes the manifest took
    pub manifest_chunks: usize,
}

impl ExportReport {
    pub fn written(&self) -> usize {
        count(&self.outcomes, |s| matches!(s, RecordStatus::Written))
    }

    pub fn skipped(&self) -> usize {
        count(&self.outcomes, |s| matches!(s, RecordStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        count(&self.outcomes, RecordStatus::is_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_report_keeps_order() {
        let sink = CollectingReport::new();
        sink.status("starting");
        sink.error("bad record");
        sink.status("done");

        assert_eq!(
            sink.lines(),
            vec![
                ReportLine::Status("starting".to_string()),
                ReportLine::Error("bad record".to_string()),
                ReportLine::Status("done".to_string()),
            ]
        );
        assert_eq!(sink.errors(), vec!["bad record".to_string()]);
    }

    #[test]
    fn test_import_report_counters() {
        let report = ImportReport {
            format_version: 3,
            handler: "vfs-v3".to_string(),
            outcomes: vec![
                RecordOutcome::new("/a", RecordStatus::Written),
                RecordOutcome::new("/b", RecordStatus::Linked { target: "/a".to_string() }),
                RecordOutcome::new("/c", RecordStatus::Failed("boom".to_string())),
                RecordOutcome::new("/d", RecordStatus::Skipped(SkipReason::Immutable)),
            ],
            principals: Vec::new(),
        };

        assert_eq!(report.written(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("/c", "boom")]);
        assert_eq!(report.outcome("/b").unwrap().status.to_string(), "linked -> /a");
    }

    #[test]
    fn test_silent_report_is_noop() {
        let sink: Box<dyn ReportSink> = Box::new(SilentReport);
        sink.status("ignored");
        sink.error("ignored");
    }
}
