// src/import/module.rs

//! Module bundle reconstruction
//!
//! A module archive carries a regular resource tree plus a `<module>`
//! section whose groupings reference serialized datasets. The tree is
//! rebuilt first; each grouping's datasets are then materialized through
//! the content-definition registry under `<destination>/<module>/<grouping>`.

use super::vfs::{import_files, write_resource};
use super::{links, ImportRun, Reconstructor};
use crate::content::Dataset;
use crate::error::{Error, Result};
use crate::manifest::{DatasetRef, FormatVersion, ManifestReader, ModuleSection};
use crate::path::join_resource_path;
use crate::report::{RecordOutcome, RecordStatus, SkipReason};
use crate::store::NewResource;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Reconstructor for version 3 archives with a module section
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleReconstructor;

impl ModuleReconstructor {
    pub fn new() -> Self {
        Self
    }
}

impl Reconstructor for ModuleReconstructor {
    fn name(&self) -> &'static str {
        "module-v3"
    }

    fn version(&self) -> FormatVersion {
        FormatVersion::V3
    }

    fn matches(&self, manifest: &ManifestReader) -> bool {
        manifest.has_module_section()
    }

    fn reconstruct(&self, run: &mut ImportRun<'_>) -> Result<()> {
        import_files(run)?;
        let module = run
            .manifest
            .module()?
            .ok_or_else(|| Error::Manifest("module section disappeared".to_string()))?;
        import_datasets(run, &module)?;
        links::resolve(run)
    }
}

fn import_datasets(run: &mut ImportRun<'_>, module: &ModuleSection) -> Result<()> {
    info!(
        "materializing module {} {} ({} groupings, {} datasets)",
        module.name,
        module.version,
        module.groupings.len(),
        module.datasets.len()
    );
    let refs: HashMap<&str, &DatasetRef> = module
        .datasets
        .iter()
        .map(|d| (d.fingerprint.as_str(), d))
        .collect();
    let base = join_resource_path(run.params.destination(), &module.name)?;

    for grouping in &module.groupings {
        let folder = join_resource_path(&base, &grouping.name)?;
        for fingerprint in &grouping.fingerprints {
            let (path, result) = match refs.get(fingerprint.as_str()) {
                Some(dataset_ref) => match join_resource_path(&folder, &dataset_ref.id) {
                    Ok(path) => {
                        let result = materialize(run, dataset_ref, &path);
                        (path, result)
                    }
                    Err(e) => (format!("{}/{}", folder, dataset_ref.id), Err(e)),
                },
                None => (
                    format!("{}/#{}", folder, fingerprint),
                    Err(Error::Manifest(format!("grouping references unknown dataset {}", fingerprint))),
                ),
            };

            let status = match result {
                Ok(true) => {
                    debug!("materialized {}", path);
                    RecordStatus::Written
                }
                Ok(false) => RecordStatus::Skipped(SkipReason::Immutable),
                Err(e) => {
                    warn!("{}: {}", path, e);
                    run.sink.error(&format!("{}: {}", path, e));
                    RecordStatus::Failed(e.to_string())
                }
            };
            run.report.outcomes.push(RecordOutcome::new(path, status));
        }
    }
    Ok(())
}

/// Write one dataset; `false` when its destination is immutable
fn materialize(run: &mut ImportRun<'_>, dataset_ref: &DatasetRef, path: &str) -> Result<bool> {
    if run.params.is_immutable(path) {
        info!("{} is immutable, skipping", path);
        run.sink.status(&format!("skipped immutable {}", path));
        return Ok(false);
    }
    let bytes = run.archive.get_entry(&dataset_ref.source)?;
    let dataset: Dataset = serde_json::from_slice(&bytes)?;
    if dataset.class != dataset_ref.class || dataset.id != dataset_ref.id {
        return Err(Error::Manifest(format!(
            "dataset {} holds {}:{}, manifest declares {}:{}",
            dataset_ref.source, dataset.class, dataset.id, dataset_ref.class, dataset_ref.id
        )));
    }

    let definition = run.definitions.create(&dataset.class)?;
    let materialized = definition.materialize(&dataset)?;

    let resource = NewResource {
        path: path.to_string(),
        type_name: materialized.type_name.to_string(),
        flags: 0,
        owner: run.acting_user,
        group: run.acting_group,
        created: None,
        created_by: run.acting_user,
        modified: None,
        modified_by: run.acting_user,
        content: materialized.content,
        properties: materialized.properties,
    };
    write_resource(run, resource, Vec::new())?;
    Ok(true)
}
