// src/error.rs

//! Error types shared by the import/export engine
//!
//! Fatal errors propagate out of `import_data` / `export_data` with `?`.
//! Per-record failures are wrapped into the run report instead and never
//! surface through this type at the top level.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the archive transport, manifest handling and reconstructors
#[derive(Error, Debug)]
pub enum Error {
    /// Low-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O failure with a description of what was attempted
    #[error("I/O error: {0}")]
    IoError(String),

    /// Archive path is neither a regular file nor a directory
    #[error("archive unreadable: {0}")]
    ArchiveUnreadable(String),

    /// Archive does not contain the requested entry
    #[error("Entry Not Found: {0}")]
    EntryNotFound(String),

    /// Document is not well-formed XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Manifest is well-formed but structurally invalid
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// No reconstructor is registered for the declared format version
    #[error("no handler for format version {0}")]
    NoHandler(u32),

    /// Parameter rejected at construction
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Path failed validation
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path tries to escape its root
    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    /// Resource store rejected an operation
    #[error("store error: {0}")]
    Store(String),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource already exists where a new one was requested
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Content could not be converted between data models
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Declared resource type is not known to the type catalog
    #[error("unknown resource type: {0}")]
    UnknownType(String),

    /// Dataset class key has no registered content definition
    #[error("no content definition registered for class: {0}")]
    UnknownDefinition(String),

    /// Configuration file could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap any displayable XML-layer failure
    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }

    /// True for errors that must stop a run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ArchiveUnreadable(_)
                | Self::Xml(_)
                | Self::Manifest(_)
                | Self::NoHandler(_)
                | Self::InvalidParameter(_)
        )
    }
}
