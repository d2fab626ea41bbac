// src/lib.rs

//! Treeport
//!
//! Versioned import/export of hierarchical resource trees.
//!
//! # Architecture
//!
//! - Archives: a gzip-compressed container or an equivalent directory tree,
//!   holding a `manifest.xml` plus one entry per resource body
//! - Manifests: XML documents whose version marker selects the reconstructor
//! - Reconstructors: one per format version, behind a single trait and a
//!   registry, each walking records through an explicit state machine
//! - Links: deferred until the main pass is complete, then resolved
//! - Stores: the engine talks to its environment through collaborator
//!   traits; `MemoryStore` is the in-memory reference implementation

pub mod archive;
pub mod compat;
pub mod config;
pub mod content;
pub mod dedup;
mod error;
pub mod export;
pub mod hash;
pub mod import;
pub mod manifest;
pub mod params;
pub mod path;
pub mod report;
pub mod store;
pub mod xml;

pub use archive::{verify_archive, ArchiveKind, ArchiveReader, ArchiveWriter};
pub use compat::check_compatibility;
pub use config::TransferConfig;
pub use error::{Error, Result};
pub use export::export_data;
pub use import::{get_conflicting_paths, import_data, import_data_with, ReconstructorRegistry};
pub use manifest::FormatVersion;
pub use params::{ExportParameters, ImportParameters};
pub use report::{
    CollectingReport, ExportReport, ImportReport, LogReport, RecordOutcome, RecordStatus,
    ReportSink, SilentReport, SkipReason,
};
pub use store::{Backend, MemoryStore};
