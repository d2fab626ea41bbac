// src/manifest/reader.rs

//! Manifest parsing and version detection

use super::codec::{accounts_from_element, module_from_element};
use super::{Accounts, FormatVersion, ModuleSection};
use crate::archive::{ArchiveReader, MANIFEST_ENTRY};
use crate::error::{Error, Result};
use crate::xml::{parse_document, Document, Element};
use tracing::debug;

/// Fields of the `<info>` section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestInfo {
    pub creator: Option<String>,
    pub created: Option<String>,
    /// Declared version marker; `None` for pre-versioning archives
    pub marker: Option<u32>,
}

/// A parsed manifest document
///
/// The version marker is read once here and cannot change for the rest of
/// the run.
#[derive(Debug, Clone)]
pub struct ManifestReader {
    document: Document,
    info: ManifestInfo,
}

impl ManifestReader {
    /// Read and parse the manifest entry of an archive
    pub fn read(archive: &ArchiveReader) -> Result<Self> {
        let bytes = archive.get_entry(MANIFEST_ENTRY).map_err(|e| match e {
            Error::EntryNotFound(_) => Error::Manifest("archive contains no manifest".to_string()),
            other => other,
        })?;
        Self::parse(&bytes)
    }

    /// Parse manifest bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Xml(format!("manifest is not UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{FEFF}');
        let document = parse_document(text)?;

        if document.root.name != "export" {
            return Err(Error::Manifest(format!(
                "unexpected root element <{}>",
                document.root.name
            )));
        }

        let info = match document.root.child("info") {
            Some(info) => ManifestInfo {
                creator: info.child_text("creator"),
                created: info.child_text("created"),
                marker: info
                    .child_text("version")
                    .map(|v| {
                        v.parse::<u32>().map_err(|_| {
                            Error::Manifest(format!("invalid version marker: '{}'", v))
                        })
                    })
                    .transpose()?,
            },
            None => ManifestInfo::default(),
        };

        debug!(
            "parsed manifest: marker {:?}, {} records",
            info.marker,
            document.root.child("files").map_or(0, |f| f.children_named("file").count())
        );
        Ok(Self { document, info })
    }

    pub fn info(&self) -> &ManifestInfo {
        &self.info
    }

    /// Version marker, 0 when absent
    pub fn marker(&self) -> u32 {
        self.info.marker.unwrap_or(0)
    }

    /// Format version the marker names
    pub fn detect_version(&self) -> Result<FormatVersion> {
        let marker = self.marker();
        FormatVersion::from_marker(marker).ok_or(Error::NoHandler(marker))
    }

    pub fn has_doctype(&self) -> bool {
        self.document.doctype.is_some()
    }

    pub fn has_module_section(&self) -> bool {
        self.document.root.child("module").is_some()
    }

    /// `<file>` elements in document order
    pub fn file_elements(&self) -> Vec<&Element> {
        self.document
            .root
            .child("files")
            .map(|f| f.children_named("file").collect())
            .unwrap_or_default()
    }

    pub fn accounts(&self) -> Result<Option<Accounts>> {
        self.document
            .root
            .child("accounts")
            .map(accounts_from_element)
            .transpose()
    }

    pub fn module(&self) -> Result<Option<ModuleSection>> {
        self.document
            .root
            .child("module")
            .map(module_from_element)
            .transpose()
    }

    /// Check required sections and per-record fields before any record is
    /// processed
    pub fn validate(&self) -> Result<()> {
        let root = &self.document.root;
        if root.child("info").is_none() {
            return Err(Error::Manifest("missing <info> section".to_string()));
        }
        if root.child("files").is_none() {
            return Err(Error::Manifest("missing <files> section".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for (index, file) in self.file_elements().into_iter().enumerate() {
            let destination = file.child_text("destination").ok_or_else(|| {
                Error::Manifest(format!("record {} has no <destination>", index + 1))
            })?;
            if file.child_text("type").is_none() {
                return Err(Error::Manifest(format!("record {} has no <type>", destination)));
            }
            if file.child_text("source").is_some() && file.child_text("size").is_none() {
                return Err(Error::Manifest(format!(
                    "record {} references content but declares no size",
                    destination
                )));
            }
            if !seen.insert(destination.trim_matches('/').to_string()) {
                return Err(Error::Manifest(format!("duplicate destination {}", destination)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_marker_is_version_zero() {
        let reader = ManifestReader::parse(b"<export><files/></export>").unwrap();
        assert_eq!(reader.info().marker, None);
        assert_eq!(reader.marker(), 0);
        assert_eq!(reader.detect_version().unwrap(), FormatVersion::V0);
    }

    #[test]
    fn test_marker_selects_version() {
        let reader = ManifestReader::parse(
            b"<export><info><creator>x</creator><version>2</version></info><files/></export>",
        )
        .unwrap();
        assert_eq!(reader.detect_version().unwrap(), FormatVersion::V2);
        assert_eq!(reader.info().creator.as_deref(), Some("x"));
    }

    #[test]
    fn test_unknown_marker_has_no_handler() {
        let reader =
            ManifestReader::parse(b"<export><info><version>9</version></info></export>").unwrap();
        assert!(matches!(reader.detect_version(), Err(Error::NoHandler(9))));
    }

    #[test]
    fn test_non_numeric_marker_is_fatal() {
        let result = ManifestReader::parse(b"<export><info><version>two</version></info></export>");
        assert!(matches!(result, Err(Error::Manifest(_))));
    }

    #[test]
    fn test_wrong_root_and_garbage() {
        assert!(matches!(ManifestReader::parse(b"<other/>"), Err(Error::Manifest(_))));
        assert!(matches!(ManifestReader::parse(b"<export>"), Err(Error::Xml(_))));
    }

    #[test]
    fn test_validate_required_fields() {
        let ok = ManifestReader::parse(
            b"<export><info/><files><file><destination>a</destination><type>folder</type></file></files></export>",
        )
        .unwrap();
        ok.validate().unwrap();

        let no_files = ManifestReader::parse(b"<export><info/></export>").unwrap();
        assert!(no_files.validate().is_err());

        let no_size = ManifestReader::parse(
            b"<export><info/><files><file><source>content/a</source><destination>a</destination><type>plain</type></file></files></export>",
        )
        .unwrap();
        assert!(no_size.validate().is_err());

        let dup = ManifestReader::parse(
            b"<export><info/><files><file><destination>a</destination><type>folder</type></file><file><destination>/a</destination><type>folder</type></file></files></export>",
        )
        .unwrap();
        assert!(dup.validate().is_err());
    }
}
