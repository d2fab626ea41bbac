// src/import/links.rs

//! Link deferral
//!
//! Link records are held back during the main pass because their target
//! may be imported later in the same run. Once every record has been
//! processed, each placeholder's content is read as a target reference,
//! resolved against the destination tree and written as a pointer.

use super::vfs::write_resource;
use super::ImportRun;
use crate::error::{Error, Result};
use crate::manifest::FormatVersion;
use crate::path::{join_resource_path, normalize_resource_path, translate};
use crate::report::RecordStatus;
use crate::store::{NewResource, StoredAce};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A link record waiting for its target
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// Index of the record's outcome in the run report
    pub slot: usize,
    /// Store request with the raw target reference as content
    pub resource: NewResource,
    pub aces: Vec<StoredAce>,
}

impl Placeholder {
    /// Raw target reference as recorded in the archive
    pub fn raw_target(&self) -> String {
        String::from_utf8_lossy(&self.resource.content).trim().to_string()
    }
}

/// Pending placeholders keyed by destination path
#[derive(Debug, Default)]
pub struct LinkTable {
    entries: BTreeMap<String, Placeholder>,
}

impl LinkTable {
    /// Add a placeholder; returns the one it replaced at the same destination
    pub fn insert(&mut self, placeholder: Placeholder) -> Option<Placeholder> {
        self.entries.insert(placeholder.resource.path.clone(), placeholder)
    }

    pub fn get(&self, path: &str) -> Option<&Placeholder> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a link target was found
enum Target {
    /// A live resource in the store (or an external reference)
    Found(String),
    /// Another placeholder that has not been written yet
    Waiting,
}

/// Resolve every pending placeholder
///
/// Runs only after the main pass. Placeholders are resolved in passes: a
/// link whose target is another pending link waits until that link has
/// been written. Links still waiting when a pass makes no progress form a
/// cycle and fail. An unresolved target fails that record alone.
pub(super) fn resolve(run: &mut ImportRun<'_>) -> Result<()> {
    let mut pending = std::mem::take(&mut run.links.entries);
    if pending.is_empty() {
        return Ok(());
    }
    info!("resolving {} deferred links", pending.len());

    loop {
        let mut progressed = false;
        let paths: Vec<String> = pending.keys().cloned().collect();
        for path in paths {
            let Some(raw) = pending.get(&path).map(Placeholder::raw_target) else {
                continue;
            };
            let result = match locate(run, &pending, &raw) {
                Ok(Target::Waiting) => continue,
                Ok(Target::Found(target)) => Ok(target),
                Err(e) => Err(e),
            };
            if let Some(placeholder) = pending.remove(&path) {
                let slot = placeholder.slot;
                let result = result.and_then(|target| write_link(run, placeholder, target));
                settle(run, &path, slot, result);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    for (path, placeholder) in pending {
        let reason = Error::Conversion(format!(
            "link target {} is part of a link cycle",
            placeholder.raw_target()
        ));
        settle(run, &path, placeholder.slot, Err(reason));
    }
    Ok(())
}

fn settle(run: &mut ImportRun<'_>, path: &str, slot: usize, result: Result<String>) {
    let status = match result {
        Ok(target) => {
            debug!("{} -> {}", path, target);
            RecordStatus::Linked { target }
        }
        Err(e) => {
            warn!("{}: {}", path, e);
            run.sink.error(&format!("{}: {}", path, e));
            RecordStatus::Failed(e.to_string())
        }
    };
    if let Some(outcome) = run.report.outcomes.get_mut(slot) {
        outcome.status = status;
    }
}

fn write_link(run: &mut ImportRun<'_>, mut placeholder: Placeholder, target: String) -> Result<String> {
    placeholder.resource.type_name = FormatVersion::CURRENT.rules().link_type.to_string();
    placeholder.resource.content = target.clone().into_bytes();
    write_resource(run, placeholder.resource, placeholder.aces)?;
    Ok(target)
}

/// Locate the target of a link in the destination tree
///
/// The target is first read as an archive path (translated and placed under
/// the import destination), then as an absolute store path. External
/// references are accepted as they are.
fn locate(
    run: &ImportRun<'_>,
    pending: &BTreeMap<String, Placeholder>,
    raw: &str,
) -> Result<Target> {
    if raw.is_empty() {
        return Err(Error::Conversion("link has no target".to_string()));
    }
    if raw.contains("://") {
        return Ok(Target::Found(raw.to_string()));
    }

    let relative = translate(raw, run.params.translations());
    let candidates = [
        join_resource_path(run.params.destination(), &relative)?,
        normalize_resource_path(raw)?,
    ];
    for candidate in candidates {
        if pending.contains_key(&candidate) {
            return Ok(Target::Waiting);
        }
        if let Some(header) = run.store.read_header(&candidate)?
            && header.is_live()
        {
            return Ok(Target::Found(candidate));
        }
    }
    Err(Error::Conversion(format!("link target {} cannot be resolved", raw)))
}
