// src/import/vfs.rs

//! Plain resource-tree reconstruction
//!
//! One reconstructor per format version; they differ only in the
//! `VersionRules` applied while decoding and converting records.

use super::legacy::{convert_legacy_page, TextEncoding, ENCODING_PROPERTY, LOCALE_PROPERTY};
use super::links::{self, Placeholder};
use super::record::{RecordContext, RecordState};
use super::{ImportRun, Reconstructor};
use crate::compat::check_compatibility;
use crate::error::{Error, Result};
use crate::manifest::{
    record_from_element, FormatVersion, ManifestReader, PrincipalKind, Property, VersionRules,
};
use crate::path::{join_resource_path, translate};
use crate::report::{RecordOutcome, RecordStatus, SkipReason};
use crate::store::{NewResource, StoredAce, TypeKind};
use crate::xml::Element;
use tracing::{debug, info, warn};

/// Reconstructor for archives without a module section
#[derive(Debug, Clone, Copy)]
pub struct VfsReconstructor {
    version: FormatVersion,
}

impl VfsReconstructor {
    pub fn new(version: FormatVersion) -> Self {
        Self { version }
    }
}

impl Reconstructor for VfsReconstructor {
    fn name(&self) -> &'static str {
        match self.version {
            FormatVersion::V0 => "vfs-v0",
            FormatVersion::V1 => "vfs-v1",
            FormatVersion::V2 => "vfs-v2",
            FormatVersion::V3 => "vfs-v3",
        }
    }

    fn version(&self) -> FormatVersion {
        self.version
    }

    fn matches(&self, manifest: &ManifestReader) -> bool {
        !manifest.has_module_section()
    }

    fn reconstruct(&self, run: &mut ImportRun<'_>) -> Result<()> {
        import_files(run)?;
        links::resolve(run)
    }
}

/// Main pass: every `<file>` record in document order
pub(super) fn import_files(run: &mut ImportRun<'_>) -> Result<()> {
    let manifest = run.manifest;
    let rules = run.version.rules();
    let files = manifest.file_elements();
    info!("reconstructing {} records", files.len());

    for (index, element) in files.into_iter().enumerate() {
        let outcome = import_record(run, &rules, index, element);
        if let RecordStatus::Failed(reason) = &outcome.status {
            warn!("{}: {}", outcome.path, reason);
            run.sink.error(&format!("{}: {}", outcome.path, reason));
        }
        for warning in &outcome.warnings {
            warn!("{}: {}", outcome.path, warning);
        }
        run.report.outcomes.push(outcome);
    }
    Ok(())
}

fn import_record(
    run: &mut ImportRun<'_>,
    rules: &VersionRules,
    index: usize,
    element: &Element,
) -> RecordOutcome {
    let record = match record_from_element(element, rules) {
        Ok(record) => record,
        Err(e) => {
            let label = element
                .child_text("destination")
                .unwrap_or_else(|| format!("#{}", index + 1));
            return RecordOutcome::new(label, RecordStatus::Failed(e.to_string()));
        }
    };

    let relative = translate(&record.destination, run.params.translations());
    let destination = match join_resource_path(run.params.destination(), &relative) {
        Ok(path) => path,
        Err(e) => {
            return RecordOutcome::new(record.destination, RecordStatus::Failed(e.to_string()));
        }
    };

    let mut ctx = RecordContext::new(index, destination, record);
    if let Err(e) = process(run, rules, &mut ctx) {
        ctx.fail(e.to_string());
    }
    ctx.outcome()
}

fn process(run: &mut ImportRun<'_>, rules: &VersionRules, ctx: &mut RecordContext) -> Result<()> {
    if run.params.is_immutable(&ctx.destination) {
        info!("{} is immutable, skipping", ctx.destination);
        run.sink.status(&format!("skipped immutable {}", ctx.destination));
        return ctx.advance(RecordState::Skipped(SkipReason::Immutable));
    }

    let kind = run
        .store
        .kind_of(&ctx.record.type_name)
        .ok_or_else(|| Error::UnknownType(ctx.record.type_name.clone()))?;
    ctx.kind = Some(kind);

    load_content(run, ctx)?;
    convert(run, rules, ctx)?;

    let (resource, aces) = draft(run, ctx);
    if kind == TypeKind::Link {
        debug!("deferring link {}", ctx.destination);
        let slot = run.report.outcomes.len();
        let replaced = run.links.insert(Placeholder {
            slot,
            resource,
            aces,
        });
        if let Some(earlier) = replaced
            && let Some(outcome) = run.report.outcomes.get_mut(earlier.slot)
        {
            let reason = "superseded by a later record for the same destination";
            warn!("{}: {}", outcome.path, reason);
            run.sink.error(&format!("{}: {}", outcome.path, reason));
            outcome.status = RecordStatus::Failed(reason.to_string());
        }
        return ctx.advance(RecordState::Deferred);
    }

    write_resource(run, resource, aces)?;
    debug!("wrote {}", ctx.destination);
    ctx.advance(RecordState::Written)
}

fn load_content(run: &ImportRun<'_>, ctx: &mut RecordContext) -> Result<()> {
    if let Some(source) = &ctx.record.source {
        let bytes = run.archive.get_entry(source)?;
        if let Some(size) = ctx.record.size
            && size != bytes.len() as u64
        {
            return Err(Error::Conversion(format!(
                "content entry {} holds {} bytes, manifest declares {}",
                source,
                bytes.len(),
                size
            )));
        }
        ctx.content = bytes;
    }
    ctx.advance(RecordState::ContentLoaded)
}

fn convert(run: &ImportRun<'_>, rules: &VersionRules, ctx: &mut RecordContext) -> Result<()> {
    if rules.legacy_pages && ctx.kind == Some(TypeKind::Page) {
        let encoding = match ctx.record.property(ENCODING_PROPERTY) {
            Some(label) => TextEncoding::from_label(label)
                .ok_or_else(|| Error::Conversion(format!("unsupported encoding '{}'", label)))?,
            None => run.params.default_encoding(),
        };
        let language = ctx.record.property(LOCALE_PROPERTY).map(str::to_string);
        ctx.content = convert_legacy_page(&ctx.content, encoding, language.as_deref())?;

        let utf8 = TextEncoding::Utf8.label();
        match ctx.record.properties.iter_mut().find(|p| p.name == ENCODING_PROPERTY) {
            Some(property) => property.value = utf8.to_string(),
            None => ctx.record.properties.push(Property::new(ENCODING_PROPERTY, utf8)),
        }
        debug!("converted legacy page {} ({})", ctx.destination, encoding);
        return ctx.advance(RecordState::Converted);
    }

    if rules.check_templates
        && !check_compatibility(&ctx.destination, &ctx.content, &ctx.record.type_name)
    {
        return Err(Error::Conversion(format!(
            "template {} has an incompatible structure",
            ctx.destination
        )));
    }
    ctx.advance(RecordState::AsIs)
}

/// Resolve principals and assemble the store request for a record
fn draft(run: &ImportRun<'_>, ctx: &mut RecordContext) -> (NewResource, Vec<StoredAce>) {
    let record = &ctx.record;
    let mut warnings = Vec::new();
    let mut resolve = |kind: PrincipalKind, name: &str| {
        let (id, warning) = run.resolve_or_fallback(kind, name);
        warnings.extend(warning);
        id
    };

    let owner = resolve(PrincipalKind::User, &record.owner);
    let group = resolve(PrincipalKind::Group, &record.group);
    let created_by = resolve(PrincipalKind::User, &record.created_by);
    let modified_by = resolve(PrincipalKind::User, &record.modified_by);

    let mut aces = Vec::with_capacity(record.aces.len());
    for ace in &record.aces {
        match run.store.lookup(ace.principal.kind, &ace.principal.name) {
            Some(principal) => aces.push(StoredAce {
                principal,
                kind: ace.principal.kind,
                allowed: ace.allowed,
                denied: ace.denied,
                flags: ace.flags,
            }),
            None => warnings.push(format!(
                "dropped access entry for unknown {} '{}'",
                ace.principal.kind, ace.principal.name
            )),
        }
    }

    let resource = NewResource {
        path: ctx.destination.clone(),
        type_name: record.type_name.clone(),
        flags: record.flags,
        owner,
        group,
        created: record.created,
        created_by,
        modified: record.modified,
        modified_by,
        content: std::mem::take(&mut ctx.content),
        properties: record.properties.clone(),
    };
    for warning in warnings {
        ctx.warn(warning);
    }
    (resource, aces)
}

/// Create a resource, then attach its access entries
///
/// With `keep_permissions`, a resource that was already live keeps the
/// entries it had.
pub(super) fn write_resource(
    run: &mut ImportRun<'_>,
    resource: NewResource,
    aces: Vec<StoredAce>,
) -> Result<()> {
    let path = resource.path.clone();
    let existed = run
        .store
        .read_header(&path)?
        .is_some_and(|header| header.is_live());

    run.define_properties(resource.properties.iter().map(|p| p.name.clone()))?;
    run.ensure_parents(&path)?;
    run.store.create_resource(resource)?;

    if existed && run.params.keep_permissions() {
        debug!("keeping existing permissions on {}", path);
    } else {
        run.store.replace_aces(&path, aces)?;
    }
    Ok(())
}
