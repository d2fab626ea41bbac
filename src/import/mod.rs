// src/import/mod.rs

//! Import pipeline
//!
//! 1. Open the archive (form detected from the path) and parse the manifest.
//! 2. Read the version marker and select the reconstructor registered for
//!    it. No match aborts the run before any record is touched.
//! 3. The reconstructor walks the records in document order against the
//!    store. Per-record failures land in the report; the loop continues.
//! 4. Deferred links are resolved once the main pass is complete.

mod accounts;
mod conflicts;
pub mod legacy;
mod links;
mod module;
mod record;
mod vfs;

pub use conflicts::get_conflicting_paths;
pub use links::{LinkTable, Placeholder};
pub use module::ModuleReconstructor;
pub use record::{RecordContext, RecordState};
pub use vfs::VfsReconstructor;

use crate::archive::ArchiveReader;
use crate::content::DefinitionRegistry;
use crate::error::{Error, Result};
use crate::manifest::{FormatVersion, ManifestReader, PrincipalKind};
use crate::params::ImportParameters;
use crate::path::parent_of;
use crate::report::{ImportReport, ReportSink};
use crate::store::{Backend, NewResource, PrincipalId, TypeKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// State shared by all steps of one import run
pub struct ImportRun<'a> {
    pub params: &'a ImportParameters,
    pub archive: &'a ArchiveReader,
    pub manifest: &'a ManifestReader,
    pub version: FormatVersion,
    pub store: &'a mut dyn Backend,
    pub sink: &'a dyn ReportSink,
    pub definitions: &'a DefinitionRegistry,
    pub report: ImportReport,
    pub links: LinkTable,
    /// Principal of the current operation
    pub acting_user: PrincipalId,
    pub acting_group: PrincipalId,
}

impl ImportRun<'_> {
    /// Resolve a principal by name, falling back to the acting principal
    ///
    /// Returns the id and, when the fallback was taken for a non-empty name,
    /// a warning for the report.
    pub fn resolve_or_fallback(&self, kind: PrincipalKind, name: &str) -> (PrincipalId, Option<String>) {
        let fallback = match kind {
            PrincipalKind::User => self.acting_user,
            PrincipalKind::Group => self.acting_group,
        };
        if name.is_empty() {
            return (fallback, None);
        }
        match self.store.lookup(kind, name) {
            Some(id) => (id, None),
            None => {
                let acting = match kind {
                    PrincipalKind::User => self.params.acting_user(),
                    PrincipalKind::Group => self.params.acting_group(),
                };
                (
                    fallback,
                    Some(format!("unknown {} '{}', using '{}'", kind, name, acting)),
                )
            }
        }
    }

    /// Create any missing folders above `path`
    pub fn ensure_parents(&mut self, path: &str) -> Result<()> {
        match parent_of(path) {
            Some(parent) => self.ensure_folder(parent),
            None => Ok(()),
        }
    }

    /// Create `path` and any missing folders above it
    pub fn ensure_folder(&mut self, path: &str) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(folder) = current {
            match self.store.read_header(folder)? {
                Some(header) if header.is_live() => {
                    if self.store.kind_of(&header.type_name) != Some(TypeKind::Folder) {
                        return Err(Error::Store(format!("{} is not a folder", folder)));
                    }
                    break;
                }
                _ => missing.push(folder.to_string()),
            }
            current = parent_of(folder);
        }
        for folder in missing.into_iter().rev() {
            debug!("creating missing folder {}", folder);
            self.store
                .create_resource(NewResource::folder(folder, self.acting_user, self.acting_group))?;
        }
        Ok(())
    }

    /// Define property names the catalog does not know yet
    pub fn define_properties(&mut self, names: impl IntoIterator<Item = String>) -> Result<()> {
        for name in names {
            if !self.store.is_defined(&name) {
                debug!("defining property {}", name);
                self.store.define(&name)?;
            }
        }
        Ok(())
    }
}

/// Reconstruction logic for one format version
pub trait Reconstructor: Send + Sync {
    /// Short name used in reports
    fn name(&self) -> &'static str;

    fn version(&self) -> FormatVersion;

    /// Secondary check when several handlers share a version
    fn matches(&self, _manifest: &ManifestReader) -> bool {
        true
    }

    fn reconstruct(&self, run: &mut ImportRun<'_>) -> Result<()>;
}

/// Registry of reconstructors, grouped by version
pub struct ReconstructorRegistry {
    handlers: BTreeMap<FormatVersion, Vec<Arc<dyn Reconstructor>>>,
}

impl ReconstructorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Create a registry with every built-in reconstructor
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for version in FormatVersion::ALL {
            registry.register(Arc::new(VfsReconstructor::new(version)));
        }
        registry.register(Arc::new(ModuleReconstructor::new()));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn Reconstructor>) {
        self.handlers.entry(handler.version()).or_default().push(handler);
    }

    /// Pick the reconstructor for a manifest
    pub fn select(&self, manifest: &ManifestReader) -> Result<Arc<dyn Reconstructor>> {
        let marker = manifest.marker();
        let version = manifest.detect_version()?;
        self.handlers
            .get(&version)
            .and_then(|handlers| handlers.iter().find(|h| h.matches(manifest)))
            .cloned()
            .ok_or(Error::NoHandler(marker))
    }

    pub fn versions(&self) -> Vec<FormatVersion> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for ReconstructorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Import an archive into the store
pub fn import_data(
    params: &ImportParameters,
    store: &mut dyn Backend,
    sink: &dyn ReportSink,
) -> Result<ImportReport> {
    import_data_with(
        params,
        store,
        sink,
        &ReconstructorRegistry::with_builtins(),
        &DefinitionRegistry::with_builtins(),
    )
}

/// Import with caller-supplied registries
pub fn import_data_with(
    params: &ImportParameters,
    store: &mut dyn Backend,
    sink: &dyn ReportSink,
    registry: &ReconstructorRegistry,
    definitions: &DefinitionRegistry,
) -> Result<ImportReport> {
    let archive = ArchiveReader::open(params.archive())?;
    let manifest = ManifestReader::read(&archive)?;
    if params.validate() {
        manifest.validate()?;
    }
    let handler = registry.select(&manifest)?;
    let version = handler.version();

    let acting_user = store
        .lookup(PrincipalKind::User, params.acting_user())
        .ok_or_else(|| Error::InvalidParameter(format!("unknown acting user '{}'", params.acting_user())))?;
    let acting_group = store
        .lookup(PrincipalKind::Group, params.acting_group())
        .ok_or_else(|| Error::InvalidParameter(format!("unknown acting group '{}'", params.acting_group())))?;

    info!(
        "importing {} ({} archive, format {}, handler {}) into {}",
        params.archive().display(),
        archive.kind(),
        version,
        handler.name(),
        params.destination()
    );
    sink.status(&format!("format version {} detected, using {}", version, handler.name()));

    let mut run = ImportRun {
        params,
        archive: &archive,
        manifest: &manifest,
        version,
        store,
        sink,
        definitions,
        report: ImportReport {
            format_version: manifest.marker(),
            handler: handler.name().to_string(),
            ..Default::default()
        },
        links: LinkTable::default(),
        acting_user,
        acting_group,
    };

    run.ensure_folder(params.destination())?;

    if params.import_accounts() {
        accounts::import_accounts(&mut run)?;
    }

    handler.reconstruct(&mut run)?;

    let report = run.report;
    info!(
        "import finished: {} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
    sink.status(&format!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_versions() {
        let registry = ReconstructorRegistry::with_builtins();
        assert_eq!(registry.versions(), FormatVersion::ALL.to_vec());
    }

    #[test]
    fn test_select_by_marker_and_family() {
        let registry = ReconstructorRegistry::with_builtins();

        let v0 = ManifestReader::parse(b"<export><files/></export>").unwrap();
        assert_eq!(registry.select(&v0).unwrap().name(), "vfs-v0");

        let v2 = ManifestReader::parse(b"<export><info><version>2</version></info><files/></export>").unwrap();
        assert_eq!(registry.select(&v2).unwrap().name(), "vfs-v2");

        let module = ManifestReader::parse(
            b"<export><info><version>3</version></info><files/><module name=\"m\"/></export>",
        )
        .unwrap();
        assert_eq!(registry.select(&module).unwrap().name(), "module-v3");

        let plain = ManifestReader::parse(b"<export><info><version>3</version></info><files/></export>").unwrap();
        assert_eq!(registry.select(&plain).unwrap().name(), "vfs-v3");
    }

    #[test]
    fn test_unknown_marker_and_empty_registry() {
        let registry = ReconstructorRegistry::with_builtins();
        let v7 = ManifestReader::parse(b"<export><info><version>7</version></info></export>").unwrap();
        assert!(matches!(registry.select(&v7), Err(Error::NoHandler(7))));

        let empty = ReconstructorRegistry::new();
        let v1 = ManifestReader::parse(b"<export><info><version>1</version></info></export>").unwrap();
        assert!(matches!(empty.select(&v1), Err(Error::NoHandler(1))));
    }
}
