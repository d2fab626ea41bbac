// src/import/record.rs

//! Per-record state machine
//!
//! ```text
//! Pending -> ContentLoaded -> {Converted | AsIs} -> {Deferred | Written | Failed}
//! ```
//!
//! `Skipped` and `Failed` may also be entered from any non-terminal state.
//! Written, Deferred, Failed and Skipped are terminal: once reached, the
//! record never moves again.

use crate::error::{Error, Result};
use crate::manifest::ResourceRecord;
use crate::report::{RecordOutcome, RecordStatus, SkipReason};
use crate::store::TypeKind;

/// Position of a record in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    ContentLoaded,
    Converted,
    AsIs,
    Deferred,
    Written,
    Failed(String),
    Skipped(SkipReason),
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Deferred | Self::Written | Self::Failed(_) | Self::Skipped(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ContentLoaded => "content-loaded",
            Self::Converted => "converted",
            Self::AsIs => "as-is",
            Self::Deferred => "deferred",
            Self::Written => "written",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }

    fn may_enter(&self, next: &RecordState) -> bool {
        use RecordState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed(_)) | (_, Skipped(_)) => true,
            (Pending, ContentLoaded) => true,
            (ContentLoaded, Converted) | (ContentLoaded, AsIs) => true,
            (Converted | AsIs, Deferred) | (Converted | AsIs, Written) => true,
            _ => false,
        }
    }
}

/// Everything known about one record while it is being reconstructed
#[derive(Debug)]
pub struct RecordContext {
    /// Position in the manifest
    pub index: usize,
    /// Absolute destination path in the store
    pub destination: String,
    pub record: ResourceRecord,
    pub kind: Option<TypeKind>,
    /// Body as loaded, then as converted
    pub content: Vec<u8>,
    pub warnings: Vec<String>,
    state: RecordState,
}

impl RecordContext {
    pub fn new(index: usize, destination: String, record: ResourceRecord) -> Self {
        Self {
            index,
            destination,
            record,
            kind: None,
            content: Vec::new(),
            warnings: Vec::new(),
            state: RecordState::Pending,
        }
    }

    pub fn state(&self) -> &RecordState {
        &self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(&mut self, next: RecordState) -> Result<()> {
        if !self.state.may_enter(&next) {
            return Err(Error::Conversion(format!(
                "{}: illegal transition {} -> {}",
                self.destination,
                self.state.name(),
                next.name()
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Record a failure unless the record already reached a terminal state
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = RecordState::Failed(reason.into());
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Report entry for the record's current state
    pub fn outcome(&self) -> RecordOutcome {
        let status = match &self.state {
            RecordState::Written => RecordStatus::Written,
            RecordState::Deferred => RecordStatus::Deferred,
            RecordState::Skipped(reason) => RecordStatus::Skipped(*reason),
            RecordState::Failed(reason) => RecordStatus::Failed(reason.clone()),
            other => RecordStatus::Failed(format!("record stopped in state {}", other.name())),
        };
        RecordOutcome {
            path: self.destination.clone(),
            status,
            warnings: self.warnings.clone(),
        }
    }
}
