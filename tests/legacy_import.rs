// tests/legacy_import.rs

//! Record-level behavior of the older format versions.

mod common;

use common::{content_record, record, versioned_archive};
use tempfile::TempDir;
use treeport::archive::ArchiveKind;
use treeport::content::page::StructuredPage;
use treeport::manifest::permissions::{PERMISSION_READ, PERMISSION_VIEW, PERMISSION_WRITE};
use treeport::manifest::{AccessEntry, FormatVersion, PrincipalRef, Property, ResourceRecord};
use treeport::store::{principal_name, PropertyCatalog, ResourceStore};
use treeport::{
    import_data, CollectingReport, ImportParameters, ImportReport, MemoryStore, RecordStatus,
    SilentReport,
};

fn latin1_page(body: &str) -> Vec<u8> {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<XMLTEMPLATE><TEMPLATE><![CDATA[".to_vec();
    bytes.extend(body.chars().map(|c| c as u8));
    bytes.extend_from_slice(b"]]></TEMPLATE><TEMPLATE name=\"teaser\">short</TEMPLATE></XMLTEMPLATE>");
    bytes
}

fn import(
    version: FormatVersion,
    records: &[(ResourceRecord, Vec<u8>)],
    configure: impl FnOnce(treeport::params::ImportParametersBuilder) -> treeport::params::ImportParametersBuilder,
    store: &mut MemoryStore,
) -> ImportReport {
    let temp_dir = TempDir::new().unwrap();
    let archive = versioned_archive(
        &temp_dir.path().join("legacy.tar.gz"),
        ArchiveKind::Container,
        version,
        records,
    );
    let params = configure(ImportParameters::builder(&archive, "/")).build().unwrap();
    import_data(&params, store, &SilentReport).unwrap()
}

#[test]
fn test_legacy_page_converted_with_declared_encoding() {
    let (mut page, content) = content_record("pages/welcome", "page", &latin1_page("Grüße"));
    page.properties = vec![
        Property::new("content-encoding", "ISO-8859-1"),
        Property::new("locale", "de"),
    ];

    let mut store = MemoryStore::new();
    let report = import(FormatVersion::V1, &[(page, content)], |b| b, &mut store);
    assert_eq!(report.outcome("/pages/welcome").unwrap().status, RecordStatus::Written);

    let stored = store.read_content("/pages/welcome").unwrap();
    let page = StructuredPage::parse(std::str::from_utf8(&stored).unwrap()).unwrap();
    assert_eq!(page.element("de", "body"), Some("Grüße"));
    assert_eq!(page.element("de", "teaser"), Some("short"));

    let properties = store.read_properties("/pages/welcome").unwrap();
    assert!(properties.contains(&Property::new("content-encoding", "UTF-8")));
}

#[test]
fn test_legacy_page_uses_default_encoding() {
    let (page, content) = content_record("p", "page", &latin1_page("Ärger"));
    let mut store = MemoryStore::new();
    let report = import(
        FormatVersion::V0,
        &[(page, content)],
        |b| b.default_encoding("latin1"),
        &mut store,
    );
    assert!(report.is_clean());

    let stored = store.read_content("/p").unwrap();
    let page = StructuredPage::parse(std::str::from_utf8(&stored).unwrap()).unwrap();
    assert_eq!(page.element("en", "body"), Some("Ärger"));
}

#[test]
fn test_failed_conversion_does_not_stop_the_run() {
    let records = vec![
        content_record("broken", "page", b"<html><body>not a template</body></html>"),
        content_record("fine.txt", "plain", b"ok"),
        content_record("mystery", "hologram", b"?"),
        {
            let (mut r, c) = content_record("short.txt", "plain", b"12345");
            r.size = Some(3);
            (r, c)
        },
    ];

    let temp_dir = TempDir::new().unwrap();
    let archive = versioned_archive(
        &temp_dir.path().join("a.tar.gz"),
        ArchiveKind::Container,
        FormatVersion::V2,
        &records,
    );
    let params = ImportParameters::builder(&archive, "/").build().unwrap();
    let sink = CollectingReport::new();
    let mut store = MemoryStore::new();
    let report = import_data(&params, &mut store, &sink).unwrap();

    let statuses: Vec<_> = report.outcomes.iter().map(|o| (o.path.as_str(), o.status.is_failure())).collect();
    assert_eq!(
        statuses,
        vec![("/broken", true), ("/fine.txt", false), ("/mystery", true), ("/short.txt", true)]
    );
    assert_eq!(sink.errors().len(), 3);
    assert!(store.exists("/fine.txt"));
    assert!(!store.exists("/broken"));
    assert!(!store.exists("/mystery"));
}

#[test]
fn test_permission_string_aces() {
    let (mut rec, content) = content_record("secure.txt", "plain", b"s");
    rec.aces = vec![
        AccessEntry {
            principal: PrincipalRef::group("editors"),
            allowed: PERMISSION_READ | PERMISSION_WRITE,
            denied: PERMISSION_VIEW,
            flags: 0,
        },
        AccessEntry {
            principal: PrincipalRef::user("nobody-here"),
            allowed: PERMISSION_READ,
            denied: 0,
            flags: 0,
        },
    ];

    let mut store = MemoryStore::new();
    store.add_group("editors");
    let report = import(FormatVersion::V1, &[(rec, content)], |b| b, &mut store);

    let outcome = report.outcome("/secure.txt").unwrap();
    assert_eq!(outcome.status, RecordStatus::Written);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("nobody-here"));

    let aces = store.read_aces("/secure.txt").unwrap();
    assert_eq!(aces.len(), 1);
    assert_eq!(principal_name(&store, aces[0].principal), "editors");
    assert_eq!(aces[0].allowed, PERMISSION_READ | PERMISSION_WRITE);
    assert_eq!(aces[0].denied, PERMISSION_VIEW);
}

#[test]
fn test_base64_property_values() {
    let (mut rec, content) = content_record("ctl.txt", "plain", b"c");
    rec.properties = vec![Property::new("raw", "bell\u{7}and\u{1}start")];

    let mut store = MemoryStore::new();
    let report = import(FormatVersion::V2, &[(rec, content)], |b| b, &mut store);
    assert!(report.is_clean());
    assert_eq!(
        store.read_properties("/ctl.txt").unwrap(),
        vec![Property::new("raw", "bell\u{7}and\u{1}start")]
    );
    assert!(store.is_defined("raw"));
}

#[test]
fn test_unknown_principals_fall_back_to_acting_principal() {
    let (mut rec, content) = content_record("orphan.txt", "plain", b"o");
    rec.owner = "ghost".to_string();
    rec.group = "phantoms".to_string();

    let mut store = MemoryStore::new();
    let report = import(FormatVersion::V1, &[(rec, content)], |b| b, &mut store);

    let outcome = report.outcome("/orphan.txt").unwrap();
    assert_eq!(outcome.status, RecordStatus::Written);
    assert_eq!(outcome.warnings.len(), 2);

    let header = store.read_header("/orphan.txt").unwrap().unwrap();
    assert_eq!(header.owner, store.admin());
    assert_eq!(header.group, store.users_group());
}

#[test]
fn test_template_compatibility_gate() {
    let good = b"<XMLTEMPLATE>\n  <ELEMENTDEF name=\"head\"/>\n  <ELEMENTDEF name=\"body\"/>\n</XMLTEMPLATE>";
    let bad = b"<XMLTEMPLATE><ELEMENTDEF name=\"head\"/><SCRIPT/></XMLTEMPLATE>";

    let mut store = MemoryStore::new();
    let report = import(
        FormatVersion::V1,
        &[
            (record("templates", "folder"), Vec::new()),
            content_record("templates/good", "template", good),
            content_record("templates/bad", "template", bad),
        ],
        |b| b,
        &mut store,
    );

    assert_eq!(report.outcome("/templates/good").unwrap().status, RecordStatus::Written);
    assert!(report.outcome("/templates/bad").unwrap().status.is_failure());
    assert_eq!(report.failed(), 1);
}
