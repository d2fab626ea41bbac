// src/config.rs
//! Import/export defaults loaded from a TOML file

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest chunk size used when nothing else is configured (characters)
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Encoding assumed for legacy content that declares none
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Top-level configuration file
///
/// ```toml
/// [import]
/// immutable = ["/system/**"]
/// default_encoding = "ISO-8859-1"
/// keep_permissions = true
///
/// [[import.translations]]
/// from = "system/bodies/"
/// to = "system/legacy/bodies/"
///
/// [export]
/// include_principals = true
/// chunk_size = 4096
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// One directory prefix rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub from: String,
    pub to: String,
}

/// `[import]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Glob patterns of destination paths that are never overwritten
    #[serde(default)]
    pub immutable: Vec<String>,

    /// Encoding for legacy content without a `content-encoding` property
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Ordered prefix rewrites; the first match wins
    #[serde(default)]
    pub translations: Vec<Translation>,

    /// Keep stored ACEs of resources that already exist
    #[serde(default)]
    pub keep_permissions: bool,

    /// Create users and groups listed in the manifest's accounts section
    #[serde(default)]
    pub import_accounts: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            immutable: Vec::new(),
            default_encoding: default_encoding(),
            translations: Vec::new(),
            keep_permissions: false,
            import_accounts: false,
        }
    }
}

/// `[export]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Write an accounts section for every referenced principal
    #[serde(default)]
    pub include_principals: bool,

    /// Manifest chunk size in characters for container output
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Emit the document type marker and enforce record invariants
    #[serde(default)]
    pub validate: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            include_principals: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            validate: false,
        }
    }
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl TransferConfig {
    /// Parse a configuration document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.export.chunk_size == 0 {
            return Err(Error::InvalidParameter(
                "export.chunk_size must be greater than zero".to_string(),
            ));
        }
        for pattern in &self.import.immutable {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::InvalidParameter(format!("invalid immutable pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Translations as `(from, to)` pairs
    pub fn translation_pairs(&self) -> Vec<(String, String)> {
        self.import
            .translations
            .iter()
            .map(|t| (t.from.clone(), t.to.clone()))
            .collect()
    }
}
