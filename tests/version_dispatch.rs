// tests/version_dispatch.rs

//! Version marker detection and reconstructor selection.

mod common;

use common::{content_record, raw_archive, record, versioned_archive};
use tempfile::TempDir;
use treeport::archive::ArchiveKind;
use treeport::manifest::FormatVersion;
use treeport::store::ResourceStore;
use treeport::{import_data, Error, ImportParameters, MemoryStore, SilentReport};

const V0_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <info><creator>legacy</creator></info>
  <files>
    <file>
      <destination>old</destination>
      <type>folder</type>
      <owner>admin</owner>
      <group>users</group>
      <datecreated>1104537600000</datecreated>
    </file>
    <file>
      <source>content/old/readme.txt</source>
      <destination>old/readme.txt</destination>
      <type>plain</type>
      <size>6</size>
      <datelastmodified>1104537600000</datelastmodified>
    </file>
  </files>
</export>
"#;

#[test]
fn test_absent_marker_selects_version_zero() {
    let temp_dir = TempDir::new().unwrap();
    let archive = raw_archive(
        &temp_dir.path().join("v0.tar.gz"),
        V0_MANIFEST,
        &[("content/old/readme.txt", b"hello\n")],
    );

    let params = ImportParameters::builder(&archive, "/").build().unwrap();
    let mut store = MemoryStore::new();
    let report = import_data(&params, &mut store, &SilentReport).unwrap();

    assert_eq!(report.format_version, 0);
    assert_eq!(report.handler, "vfs-v0");
    assert!(report.is_clean());
    let header = store.read_header("/old/readme.txt").unwrap().unwrap();
    assert_eq!(header.modified.timestamp(), 1_104_537_600);
    assert_eq!(store.read_content("/old/readme.txt").unwrap(), b"hello\n");
}

#[test]
fn test_marker_selects_matching_version() {
    for version in [FormatVersion::V1, FormatVersion::V2, FormatVersion::V3] {
        let temp_dir = TempDir::new().unwrap();
        let archive = versioned_archive(
            &temp_dir.path().join("a.tar.gz"),
            ArchiveKind::Container,
            version,
            &[
                (record("docs", "folder"), Vec::new()),
                content_record("docs/a.txt", "plain", b"a"),
            ],
        );

        let params = ImportParameters::builder(&archive, "/").build().unwrap();
        let mut store = MemoryStore::new();
        let report = import_data(&params, &mut store, &SilentReport).unwrap();

        assert_eq!(report.format_version, version.marker());
        assert_eq!(report.handler, format!("vfs-{}", version));
        assert_eq!(report.written(), 2);
    }
}

#[test]
fn test_unknown_marker_is_fatal_before_any_record() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = V0_MANIFEST.replace(
        "<info><creator>legacy</creator></info>",
        "<info><creator>future</creator><version>9</version></info>",
    );
    let archive = raw_archive(
        &temp_dir.path().join("v9.tar.gz"),
        &manifest,
        &[("content/old/readme.txt", b"hello\n")],
    );

    let params = ImportParameters::builder(&archive, "/imported").build().unwrap();
    let mut store = MemoryStore::new();
    let result = import_data(&params, &mut store, &SilentReport);

    assert!(matches!(result, Err(Error::NoHandler(9))));
    assert_eq!(store.revision(), 0);
    assert!(!store.exists("/imported"));
}

#[test]
fn test_unreadable_archive_and_manifest_are_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = MemoryStore::new();

    let missing = ImportParameters::builder(temp_dir.path().join("missing.tar.gz"), "/")
        .build()
        .unwrap();
    assert!(matches!(
        import_data(&missing, &mut store, &SilentReport),
        Err(Error::ArchiveUnreadable(_))
    ));

    let garbage = temp_dir.path().join("garbage.tar.gz");
    std::fs::write(&garbage, b"this is not a container").unwrap();
    let params = ImportParameters::builder(&garbage, "/").build().unwrap();
    assert!(import_data(&params, &mut store, &SilentReport).is_err());

    let broken = raw_archive(&temp_dir.path().join("broken.tar.gz"), "<export><files>", &[]);
    let params = ImportParameters::builder(&broken, "/").build().unwrap();
    let err = import_data(&params, &mut store, &SilentReport).unwrap_err();
    assert!(err.is_fatal());

    assert_eq!(store.revision(), 0);
}

#[test]
fn test_directory_archive_detected_by_path() {
    let temp_dir = TempDir::new().unwrap();
    let archive = versioned_archive(
        &temp_dir.path().join("tree"),
        ArchiveKind::Tree,
        FormatVersion::V2,
        &[content_record("x.txt", "plain", b"tree form")],
    );
    assert!(archive.is_dir());

    let params = ImportParameters::builder(&archive, "/t").build().unwrap();
    let mut store = MemoryStore::new();
    let report = import_data(&params, &mut store, &SilentReport).unwrap();
    assert_eq!(report.handler, "vfs-v2");
    assert_eq!(store.read_content("/t/x.txt").unwrap(), b"tree form");
}
