// src/params.rs

//! Export and import parameters
//!
//! Parameters are immutable once built. All validation happens in `build()`:
//! empty paths, negative ages, malformed patterns and unknown encodings are
//! rejected there and never reach the engine.

use crate::archive::ArchiveKind;
use crate::config::{TransferConfig, DEFAULT_CHUNK_SIZE, DEFAULT_ENCODING};
use crate::error::{Error, Result};
use crate::import::legacy::TextEncoding;
use crate::manifest::ModuleDescriptor;
use crate::path::normalize_resource_path;
use chrono::{DateTime, Duration, Utc};
use glob::Pattern;
use std::path::{Path, PathBuf};

fn require_archive_path(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if s.trim().is_empty() {
        return Err(Error::InvalidParameter("archive path is empty".to_string()));
    }
    Ok(PathBuf::from(s.trim()))
}

fn require_resource_path(what: &str, path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(Error::InvalidParameter(format!("{} is empty", what)));
    }
    normalize_resource_path(path)
        .map_err(|e| Error::InvalidParameter(format!("{} '{}': {}", what, path, e)))
}

fn require_principal(what: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidParameter(format!("{} is empty", what)));
    }
    Ok(name.to_string())
}

/// Parameters of one export run
#[derive(Debug, Clone)]
pub struct ExportParameters {
    archive: PathBuf,
    kind: ArchiveKind,
    sources: Vec<String>,
    recursive: bool,
    cutoff: Option<DateTime<Utc>>,
    include_principals: bool,
    validate: bool,
    chunk_size: usize,
    module: Option<ModuleDescriptor>,
}

impl ExportParameters {
    pub fn builder(archive: impl AsRef<Path>, kind: ArchiveKind) -> ExportParametersBuilder {
        ExportParametersBuilder {
            archive: archive.as_ref().to_path_buf(),
            kind,
            sources: Vec::new(),
            recursive: true,
            max_age_secs: None,
            now: None,
            include_principals: false,
            validate: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            module: None,
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Normalized resource paths to export
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Leaf resources last modified before this instant are not exported
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.cutoff
    }

    pub fn include_principals(&self) -> bool {
        self.include_principals
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn module(&self) -> Option<&ModuleDescriptor> {
        self.module.as_ref()
    }
}

/// Builder for [`ExportParameters`]
#[derive(Debug, Clone)]
pub struct ExportParametersBuilder {
    archive: PathBuf,
    kind: ArchiveKind,
    sources: Vec<String>,
    recursive: bool,
    max_age_secs: Option<i64>,
    now: Option<DateTime<Utc>>,
    include_principals: bool,
    validate: bool,
    chunk_size: usize,
    module: Option<ModuleDescriptor>,
}

impl ExportParametersBuilder {
    /// Seed options from a configuration file
    pub fn with_config(mut self, config: &TransferConfig) -> Self {
        self.include_principals = config.export.include_principals;
        self.validate = config.export.validate;
        self.chunk_size = config.export.chunk_size;
        self
    }

    pub fn source(mut self, path: impl Into<String>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Only export leaf resources modified within the last `secs` seconds
    pub fn max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Reference instant for the age cutoff (defaults to now)
    pub fn reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn include_principals(mut self, include: bool) -> Self {
        self.include_principals = include;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn module(mut self, module: ModuleDescriptor) -> Self {
        self.module = Some(module);
        self
    }

    pub fn build(self) -> Result<ExportParameters> {
        let archive = require_archive_path(&self.archive)?;

        if self.sources.is_empty() && self.module.is_none() {
            return Err(Error::InvalidParameter(
                "nothing to export: no source paths and no module".to_string(),
            ));
        }
        let sources = self
            .sources
            .iter()
            .map(|s| require_resource_path("source path", s))
            .collect::<Result<Vec<_>>>()?;

        let cutoff = match self.max_age_secs {
            Some(secs) if secs < 0 => {
                return Err(Error::InvalidParameter(format!(
                    "content age must not be negative: {}",
                    secs
                )));
            }
            Some(secs) => {
                let now = self.now.unwrap_or_else(Utc::now);
                let age = Duration::try_seconds(secs).ok_or_else(|| {
                    Error::InvalidParameter(format!("content age out of range: {}", secs))
                })?;
                Some(now - age)
            }
            None => None,
        };

        if self.chunk_size == 0 {
            return Err(Error::InvalidParameter(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(ExportParameters {
            archive,
            kind: self.kind,
            sources,
            recursive: self.recursive,
            cutoff,
            include_principals: self.include_principals,
            validate: self.validate,
            chunk_size: self.chunk_size,
            module: self.module,
        })
    }
}

/// Parameters of one import run (also used by the conflict scan)
#[derive(Debug, Clone)]
pub struct ImportParameters {
    archive: PathBuf,
    destination: String,
    immutable: Vec<Pattern>,
    translations: Vec<(String, String)>,
    encoding: TextEncoding,
    keep_permissions: bool,
    import_accounts: bool,
    validate: bool,
    acting_user: String,
    acting_group: String,
}

impl ImportParameters {
    pub fn builder(archive: impl AsRef<Path>, destination: impl Into<String>) -> ImportParametersBuilder {
        ImportParametersBuilder {
            archive: archive.as_ref().to_path_buf(),
            destination: destination.into(),
            immutable: Vec::new(),
            translations: Vec::new(),
            default_encoding: DEFAULT_ENCODING.to_string(),
            keep_permissions: false,
            import_accounts: false,
            validate: false,
            acting_user: "admin".to_string(),
            acting_group: "users".to_string(),
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Normalized destination prefix
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// True when `path` matches a configured immutable pattern
    pub fn is_immutable(&self, path: &str) -> bool {
        self.immutable.iter().any(|p| p.matches(path))
    }

    pub fn translations(&self) -> &[(String, String)] {
        &self.translations
    }

    pub fn default_encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn keep_permissions(&self) -> bool {
        self.keep_permissions
    }

    pub fn import_accounts(&self) -> bool {
        self.import_accounts
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    /// Principal of the current operation, used as the lenient fallback
    pub fn acting_user(&self) -> &str {
        &self.acting_user
    }

    pub fn acting_group(&self) -> &str {
        &self.acting_group
    }
}

/// Builder for [`ImportParameters`]
#[derive(Debug, Clone)]
pub struct ImportParametersBuilder {
    archive: PathBuf,
    destination: String,
    immutable: Vec<String>,
    translations: Vec<(String, String)>,
    default_encoding: String,
    keep_permissions: bool,
    import_accounts: bool,
    validate: bool,
    acting_user: String,
    acting_group: String,
}

impl ImportParametersBuilder {
    /// Seed options from a configuration file
    pub fn with_config(mut self, config: &TransferConfig) -> Self {
        self.immutable = config.import.immutable.clone();
        self.translations = config.translation_pairs();
        self.default_encoding = config.import.default_encoding.clone();
        self.keep_permissions = config.import.keep_permissions;
        self.import_accounts = config.import.import_accounts;
        self
    }

    pub fn immutable(mut self, pattern: impl Into<String>) -> Self {
        self.immutable.push(pattern.into());
        self
    }

    pub fn translation(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.translations.push((from.into(), to.into()));
        self
    }

    pub fn default_encoding(mut self, label: impl Into<String>) -> Self {
        self.default_encoding = label.into();
        self
    }

    pub fn keep_permissions(mut self, keep: bool) -> Self {
        self.keep_permissions = keep;
        self
    }

    pub fn import_accounts(mut self, import: bool) -> Self {
        self.import_accounts = import;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn acting_principal(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.acting_user = user.into();
        self.acting_group = group.into();
        self
    }

    pub fn build(self) -> Result<ImportParameters> {
        let archive = require_archive_path(&self.archive)?;
        let destination = require_resource_path("destination path", &self.destination)?;

        let immutable = self
            .immutable
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    Error::InvalidParameter(format!("invalid immutable pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for (from, _) in &self.translations {
            if from.trim_matches('/').is_empty() {
                return Err(Error::InvalidParameter(
                    "translation prefix must not be empty".to_string(),
                ));
            }
        }

        let encoding = TextEncoding::from_label(&self.default_encoding).ok_or_else(|| {
            Error::InvalidParameter(format!("unsupported encoding: {}", self.default_encoding))
        })?;

        Ok(ImportParameters {
            archive,
            destination,
            immutable,
            translations: self.translations,
            encoding,
            keep_permissions: self.keep_permissions,
            import_accounts: self.import_accounts,
            validate: self.validate,
            acting_user: require_principal("acting user", &self.acting_user)?,
            acting_group: require_principal("acting group", &self.acting_group)?,
        })
    }
}
