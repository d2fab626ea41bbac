// src/import/conflicts.rs

//! Pre-import conflict scan

use crate::archive::ArchiveReader;
use crate::error::{Error, Result};
use crate::manifest::{record_from_element, ManifestReader};
use crate::params::ImportParameters;
use crate::path::{join_resource_path, translate};
use crate::store::ResourceStore;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Destination paths an import would overwrite
///
/// Only records that carry content are considered, and only live resources
/// count as conflicts. Nothing is written to the archive or the store, so
/// the same archive can be imported right after the scan.
pub fn get_conflicting_paths<S: ResourceStore + ?Sized>(
    params: &ImportParameters,
    store: &S,
) -> Result<BTreeSet<String>> {
    let archive = ArchiveReader::open(params.archive())?;
    let manifest = ManifestReader::read(&archive)?;
    let version = manifest.detect_version()?;
    let rules = version.rules();

    let mut conflicts = BTreeSet::new();
    for (index, element) in manifest.file_elements().into_iter().enumerate() {
        let record = match record_from_element(element, &rules) {
            Ok(record) => record,
            Err(e) => {
                debug!("conflict scan skips record {}: {}", index + 1, e);
                continue;
            }
        };
        if record.source.is_none() {
            continue;
        }
        let relative = translate(&record.destination, params.translations());
        let destination = match join_resource_path(params.destination(), &relative) {
            Ok(path) => path,
            Err(Error::PathTraversal(path)) => {
                debug!("conflict scan skips traversing path {}", path);
                continue;
            }
            Err(e) => return Err(e),
        };
        if let Some(header) = store.read_header(&destination)?
            && header.is_live()
        {
            conflicts.insert(destination);
        }
    }

    info!(
        "{} of {} records would overwrite existing resources",
        conflicts.len(),
        manifest.file_elements().len()
    );
    Ok(conflicts)
}
