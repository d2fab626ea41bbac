// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use treeport::archive::{ArchiveKind, ArchiveWriter, MANIFEST_ENTRY};
use treeport::content::page::{PageElement, StructuredPage};
use treeport::manifest::{
    FormatVersion, GroupRecord, ManifestOptions, ManifestWriter, PrincipalKind, Property,
    ResourceRecord, UserRecord,
};
use treeport::store::{
    MemoryStore, NewResource, PrincipalId, PrincipalStore, PropertyCatalog, ResourceHeader,
    ResourceStore, StoredAce, TypeCatalog, TypeKind,
};
use treeport::Result;

/// Store with a small site: plain and binary files, a page, a pointer,
/// properties, ACEs and two extra principals.
///
/// ```text
/// /site/docs/a.txt      plain, owned by alice, ACE for editors
/// /site/docs/b.bin      binary
/// /site/pages/home      page
/// /site/shortcut        pointer -> /site/docs/a.txt
/// ```
pub fn populated_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    let editors = store
        .create_group(&GroupRecord {
            name: "editors".to_string(),
            description: Some("Content editors".to_string()),
        })
        .unwrap();
    let alice = store
        .create_user(&UserRecord {
            name: "alice".to_string(),
            full_name: Some("Alice Example".to_string()),
            groups: vec!["editors".to_string()],
        })
        .unwrap();

    store.mkdir_p("/site/docs").unwrap();
    store.mkdir_p("/site/pages").unwrap();

    let mut a = NewResource::folder("/site/docs/a.txt", alice, editors);
    a.type_name = "plain".to_string();
    a.content = b"alpha\n".to_vec();
    a.properties = vec![
        Property::new("title", "Alpha"),
        Property::new("notes", "  padded value  "),
    ];
    store.define("title").unwrap();
    store.define("notes").unwrap();
    store.create_resource(a).unwrap();
    store
        .replace_aces(
            "/site/docs/a.txt",
            vec![StoredAce {
                principal: editors,
                kind: PrincipalKind::Group,
                allowed: 3,
                denied: 4,
                flags: 0,
            }],
        )
        .unwrap();

    store
        .put_file("/site/docs/b.bin", "binary", &[0, 1, 2, 255, 254, b'\n', b'<', b'&'])
        .unwrap();
    store
        .put_file("/site/pages/home", "page", &sample_page("Welcome"))
        .unwrap();
    store
        .put_file("/site/shortcut", "pointer", b"/site/docs/a.txt")
        .unwrap();
    store
}

/// Structured page with a single body element
pub fn sample_page(body: &str) -> Vec<u8> {
    StructuredPage::single(
        "en",
        vec![PageElement {
            name: "body".to_string(),
            content: body.to_string(),
        }],
    )
    .to_xml()
    .unwrap()
    .into_bytes()
}

/// Bare record with only destination and type set
pub fn record(destination: &str, type_name: &str) -> ResourceRecord {
    ResourceRecord {
        destination: destination.to_string(),
        type_name: type_name.to_string(),
        owner: "admin".to_string(),
        group: "users".to_string(),
        ..Default::default()
    }
}

/// Record with a content entry under `content/`
pub fn content_record(destination: &str, type_name: &str, content: &[u8]) -> (ResourceRecord, Vec<u8>) {
    let mut rec = record(destination, type_name);
    rec.source = Some(format!("content/{}", destination));
    rec.size = Some(content.len() as u64);
    (rec, content.to_vec())
}

/// Write an archive in an older format version through the manifest writer
pub fn versioned_archive(
    path: &Path,
    kind: ArchiveKind,
    version: FormatVersion,
    records: &[(ResourceRecord, Vec<u8>)],
) -> PathBuf {
    let mut archive = ArchiveWriter::create(path, kind).unwrap();
    for (rec, content) in records {
        if let Some(source) = &rec.source {
            archive.put_entry(source, content).unwrap();
        }
    }
    let mut manifest =
        ManifestWriter::start_document(&mut archive, ManifestOptions::new(version, false)).unwrap();
    for (rec, _) in records {
        manifest.write_resource_record(rec).unwrap();
    }
    manifest.end_document(&mut archive).unwrap();
    archive.close().unwrap();
    path.to_path_buf()
}

/// Write an archive with a hand-written manifest
pub fn raw_archive(path: &Path, manifest: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let mut archive = ArchiveWriter::create(path, ArchiveKind::Container).unwrap();
    archive.put_entry(MANIFEST_ENTRY, manifest.as_bytes()).unwrap();
    for (name, data) in entries {
        archive.put_entry(name, data).unwrap();
    }
    archive.close().unwrap();
    path.to_path_buf()
}

/// Store wrapper that remembers every path passed to `create_resource`
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub created: Vec<String>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            created: Vec::new(),
        }
    }
}

impl ResourceStore for RecordingStore {
    fn read_header(&self, path: &str) -> Result<Option<ResourceHeader>> {
        self.inner.read_header(path)
    }

    fn read_content(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.read_content(path)
    }

    fn read_folder(&self, path: &str) -> Result<Vec<String>> {
        self.inner.read_folder(path)
    }

    fn read_properties(&self, path: &str) -> Result<Vec<Property>> {
        self.inner.read_properties(path)
    }

    fn read_aces(&self, path: &str) -> Result<Vec<StoredAce>> {
        self.inner.read_aces(path)
    }

    fn create_resource(&mut self, resource: NewResource) -> Result<()> {
        self.created.push(resource.path.clone());
        self.inner.create_resource(resource)
    }

    fn replace_aces(&mut self, path: &str, aces: Vec<StoredAce>) -> Result<()> {
        self.inner.replace_aces(path, aces)
    }
}

impl PrincipalStore for RecordingStore {
    fn lookup(&self, kind: PrincipalKind, name: &str) -> Option<PrincipalId> {
        self.inner.lookup(kind, name)
    }

    fn name_of(&self, id: PrincipalId) -> Option<(PrincipalKind, String)> {
        self.inner.name_of(id)
    }

    fn user_record(&self, name: &str) -> Option<UserRecord> {
        self.inner.user_record(name)
    }

    fn group_record(&self, name: &str) -> Option<GroupRecord> {
        self.inner.group_record(name)
    }

    fn create_user(&mut self, user: &UserRecord) -> Result<PrincipalId> {
        self.inner.create_user(user)
    }

    fn create_group(&mut self, group: &GroupRecord) -> Result<PrincipalId> {
        self.inner.create_group(group)
    }
}

impl PropertyCatalog for RecordingStore {
    fn is_defined(&self, name: &str) -> bool {
        self.inner.is_defined(name)
    }

    fn define(&mut self, name: &str) -> Result<()> {
        self.inner.define(name)
    }
}

impl TypeCatalog for RecordingStore {
    fn kind_of(&self, type_name: &str) -> Option<TypeKind> {
        self.inner.kind_of(type_name)
    }
}
