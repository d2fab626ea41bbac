// src/export.rs

//! Export engine
//!
//! 1. Walk the requested source paths (parents before children, siblings in
//!    name order) and turn every live resource into a manifest record.
//! 2. Store each leaf body as its own content entry.
//! 3. Serialize module datasets once per fingerprint.
//! 4. Write the manifest last, in the current format version.

use crate::archive::{content_entry_name, dataset_entry_name, ArchiveWriter};
use crate::dedup::DigestTracker;
use crate::error::{Error, Result};
use crate::hash::xxh128;
use crate::manifest::{
    AccessEntry, Accounts, DatasetRef, FormatVersion, GroupingRef, ManifestOptions, ManifestWriter,
    ModuleDescriptor, ModuleSection, PrincipalKind, PrincipalRef, ResourceRecord,
};
use crate::params::ExportParameters;
use crate::report::{ExportReport, RecordOutcome, RecordStatus, ReportSink, SkipReason};
use crate::store::{principal_name, Backend, ResourceHeader, TypeKind};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Export resources (and optionally a module) into a new archive
pub fn export_data(
    params: &ExportParameters,
    store: &dyn Backend,
    sink: &dyn ReportSink,
) -> Result<ExportReport> {
    let mut archive = ArchiveWriter::create(params.archive(), params.kind())?;
    let version = FormatVersion::CURRENT;
    let mut report = ExportReport::default();
    info!(
        "exporting {} source(s) to {} archive {}",
        params.sources().len(),
        params.kind(),
        params.archive().display()
    );

    let headers = collect_resources(store, params.sources(), params.recursive(), &mut report)?;

    let mut records = Vec::with_capacity(headers.len());
    for header in headers {
        let path = header.path.clone();
        match export_resource(store, params, version, &mut archive, &mut report, header) {
            Ok(Some(record)) => {
                report.outcomes.push(RecordOutcome::new(path, RecordStatus::Written));
                records.push(record);
            }
            Ok(None) => {
                debug!("{} unchanged since cutoff", path);
                report
                    .outcomes
                    .push(RecordOutcome::new(path, RecordStatus::Skipped(SkipReason::Unchanged)));
            }
            Err(e) => {
                warn!("{}: {}", path, e);
                sink.error(&format!("{}: {}", path, e));
                report.outcomes.push(RecordOutcome::new(path, RecordStatus::Failed(e.to_string())));
            }
        }
    }

    let module = match params.module() {
        Some(descriptor) => Some(export_module(descriptor, &mut archive, &mut report)?),
        None => None,
    };

    let options = ManifestOptions::new(version, params.validate()).with_chunk_size(params.chunk_size());
    let mut manifest = ManifestWriter::start_document(&mut archive, options)?;
    if params.include_principals() {
        let accounts = collect_accounts(store, &records);
        if !accounts.is_empty() {
            manifest.write_accounts(&accounts)?;
        }
    }
    for record in &records {
        manifest.write_resource_record(record)?;
    }
    if let Some(module) = &module {
        manifest.write_module(module)?;
    }
    report.manifest_chunks = manifest.end_document(&mut archive)?;
    let entries = archive.entry_count();
    archive.close()?;

    info!(
        "export finished: {} written, {} skipped, {} failed, {} entries",
        report.written(),
        report.skipped(),
        report.failed(),
        entries
    );
    sink.status(&format!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    ));
    Ok(report)
}

/// Live resources under the source paths, parents first, each once
fn collect_resources(
    store: &dyn Backend,
    sources: &[String],
    recursive: bool,
    report: &mut ExportReport,
) -> Result<Vec<ResourceHeader>> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for source in sources {
        let mut stack = vec![(source.clone(), true)];
        while let Some((path, descend)) = stack.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let Some(header) = store.read_header(&path)? else {
                warn!("source {} does not exist", path);
                report
                    .outcomes
                    .push(RecordOutcome::new(path, RecordStatus::Failed("no such resource".to_string())));
                continue;
            };
            if !header.is_live() {
                debug!("{} is deleted, not exported", path);
                continue;
            }

            if store.kind_of(&header.type_name) == Some(TypeKind::Folder) && descend {
                let children = store.read_folder(&path)?;
                stack.extend(children.into_iter().rev().map(|child| (child, recursive)));
            }
            // The store root has no record of its own
            if path != "/" {
                headers.push(header);
            }
        }
    }
    Ok(headers)
}

/// Build the record for one resource and store its body
///
/// Returns `None` for leaf resources older than the cutoff.
fn export_resource(
    store: &dyn Backend,
    params: &ExportParameters,
    version: FormatVersion,
    archive: &mut ArchiveWriter,
    report: &mut ExportReport,
    header: ResourceHeader,
) -> Result<Option<ResourceRecord>> {
    let kind = store
        .kind_of(&header.type_name)
        .ok_or_else(|| Error::UnknownType(header.type_name.clone()))?;

    if !kind.is_folder()
        && let Some(cutoff) = params.cutoff()
        && header.modified < cutoff
    {
        return Ok(None);
    }

    let type_name = match kind {
        TypeKind::Link => version.rules().link_type.to_string(),
        _ => header.type_name.clone(),
    };

    let mut record = ResourceRecord {
        destination: header.path.trim_start_matches('/').to_string(),
        type_name,
        flags: header.flags,
        owner: principal_name(store, header.owner),
        group: principal_name(store, header.group),
        created: Some(header.created),
        created_by: principal_name(store, header.created_by),
        modified: Some(header.modified),
        modified_by: principal_name(store, header.modified_by),
        size: None,
        source: None,
        properties: store.read_properties(&header.path)?,
        aces: Vec::new(),
    };

    for ace in store.read_aces(&header.path)? {
        match store.name_of(ace.principal) {
            Some((kind, name)) => record.aces.push(AccessEntry {
                principal: PrincipalRef { kind, name },
                allowed: ace.allowed,
                denied: ace.denied,
                flags: ace.flags,
            }),
            None => warn!("{}: access entry for unknown principal {:?} dropped", header.path, ace.principal),
        }
    }

    if !kind.is_folder() {
        let content = store.read_content(&header.path)?;
        let entry = content_entry_name(&header.path);
        archive.put_entry(&entry, &content)?;
        report.digests.insert(header.path.clone(), xxh128(&content));
        record.size = Some(content.len() as u64);
        record.source = Some(entry);
    }
    Ok(Some(record))
}

/// Serialize module datasets, each distinct one exactly once
fn export_module(
    descriptor: &ModuleDescriptor,
    archive: &mut ArchiveWriter,
    report: &mut ExportReport,
) -> Result<ModuleSection> {
    let mut tracker = DigestTracker::new();
    let mut section = ModuleSection {
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        groupings: Vec::with_capacity(descriptor.groupings.len()),
        datasets: Vec::new(),
    };

    for grouping in &descriptor.groupings {
        let mut grouping_ref = GroupingRef {
            name: grouping.name.clone(),
            fingerprints: Vec::with_capacity(grouping.datasets.len()),
        };
        for dataset in &grouping.datasets {
            let fingerprint = DigestTracker::fingerprint(&dataset.class, &dataset.id);
            if tracker.should_write(&fingerprint) {
                let entry = dataset_entry_name(&fingerprint);
                archive.put_entry(&entry, &serde_json::to_vec_pretty(dataset)?)?;
                section.datasets.push(DatasetRef {
                    fingerprint: fingerprint.clone(),
                    class: dataset.class.clone(),
                    id: dataset.id.clone(),
                    source: entry,
                });
            } else {
                debug!("dataset {}:{} already exported", dataset.class, dataset.id);
            }
            grouping_ref.fingerprints.push(fingerprint);
        }
        section.groupings.push(grouping_ref);
    }

    report.datasets_written = tracker.written();
    report.datasets_deduplicated = tracker.skipped();
    info!(
        "module {}: {} datasets written, {} duplicates collapsed",
        descriptor.name,
        report.datasets_written,
        report.datasets_deduplicated
    );
    Ok(section)
}

/// Users and groups referenced by the exported records
///
/// Groups that referenced users belong to are included so that the users
/// can be recreated on import.
fn collect_accounts(store: &dyn Backend, records: &[ResourceRecord]) -> Accounts {
    let mut users = BTreeSet::new();
    let mut groups = BTreeSet::new();
    for principal in records.iter().flat_map(ResourceRecord::principals) {
        match principal.kind {
            PrincipalKind::User => users.insert(principal.name),
            PrincipalKind::Group => groups.insert(principal.name),
        };
    }

    let users: Vec<_> = users.iter().filter_map(|name| store.user_record(name)).collect();
    for user in &users {
        groups.extend(user.groups.iter().cloned());
    }
    Accounts {
        users,
        groups: groups.iter().filter_map(|name| store.group_record(name)).collect(),
    }
}
