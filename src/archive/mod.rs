// src/archive/mod.rs

//! Archive transport
//!
//! An archive is physically either a single compressed container or a
//! directory tree. The form is decided once, when the archive is opened,
//! and carried in the `ArchiveWriter` / `ArchiveReader` variant from then
//! on. Entries are addressed by relative, slash-separated names.
//!
//! Reserved entries:
//! - `manifest.xml` holds the manifest document
//! - `content/<resource path>` holds one resource body
//! - `datasets/<fingerprint>.json` holds one module dataset

mod container;
mod tree;
mod verify;

pub use container::{ContainerReader, ContainerWriter};
pub use tree::{TreeReader, TreeWriter};
pub use verify::{verify_archive, VerifyIssue, VerifyReport};

use crate::error::{Error, Result};
use crate::path::normalize_entry_name;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Reserved name of the manifest entry
pub const MANIFEST_ENTRY: &str = "manifest.xml";

/// Prefix of resource body entries
pub const CONTENT_PREFIX: &str = "content";

/// Prefix of dataset entries
pub const DATASET_PREFIX: &str = "datasets";

/// Entry name for the body of a resource
pub fn content_entry_name(resource_path: &str) -> String {
    format!("{}/{}", CONTENT_PREFIX, resource_path.trim_start_matches('/'))
}

/// Entry name for a dataset fingerprint
pub fn dataset_entry_name(fingerprint: &str) -> String {
    format!("{}/{}.json", DATASET_PREFIX, fingerprint)
}

/// Physical form of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Single gzip-compressed tar file
    Container,
    /// Directory with one file per entry
    Tree,
}

impl ArchiveKind {
    /// Detect the form of an existing archive
    ///
    /// A regular file is a container, a directory is a tree; anything else
    /// (missing path, socket, ...) cannot be read.
    pub fn detect(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| Error::ArchiveUnreadable(format!("{}: {}", path.display(), e)))?;
        if metadata.is_file() {
            Ok(Self::Container)
        } else if metadata.is_dir() {
            Ok(Self::Tree)
        } else {
            Err(Error::ArchiveUnreadable(format!(
                "{}: neither a regular file nor a directory",
                path.display()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write side of the transport
///
/// `close` consumes the writer, so a finalized container cannot be written
/// to again.
pub enum ArchiveWriter {
    Container(ContainerWriter),
    Tree(TreeWriter),
}

impl ArchiveWriter {
    pub fn create(path: &Path, kind: ArchiveKind) -> Result<Self> {
        debug!("creating {} archive at {}", kind, path.display());
        match kind {
            ArchiveKind::Container => Ok(Self::Container(ContainerWriter::create(path)?)),
            ArchiveKind::Tree => Ok(Self::Tree(TreeWriter::create(path)?)),
        }
    }

    pub fn kind(&self) -> ArchiveKind {
        match self {
            Self::Container(_) => ArchiveKind::Container,
            Self::Tree(_) => ArchiveKind::Tree,
        }
    }

    pub fn put_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::Container(w) => w.put_entry(name, data),
            Self::Tree(w) => w.put_entry(name, data),
        }
    }

    /// Write one entry from consecutive chunks, returning the number of writes
    pub fn put_entry_chunks(&mut self, name: &str, chunks: &[&[u8]]) -> Result<usize> {
        match self {
            Self::Container(w) => w.put_entry_chunks(name, chunks),
            Self::Tree(w) => {
                let mut stream = w.open_entry(name)?;
                for chunk in chunks {
                    stream.write_all(chunk)?;
                }
                stream.flush()?;
                Ok(chunks.len())
            }
        }
    }

    /// Open an entry for incremental writing (tree form only)
    pub fn open_entry_stream(&mut self, name: &str) -> Result<Option<BufWriter<File>>> {
        match self {
            Self::Container(_) => Ok(None),
            Self::Tree(w) => w.open_entry(name).map(Some),
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Self::Container(w) => w.entry_count(),
            Self::Tree(w) => w.entry_count(),
        }
    }

    /// Finalize the archive
    pub fn close(self) -> Result<()> {
        match self {
            Self::Container(w) => w.finish(),
            Self::Tree(_) => Ok(()),
        }
    }
}

/// Read side of the transport
pub enum ArchiveReader {
    Container(ContainerReader),
    Tree(TreeReader),
}

impl ArchiveReader {
    /// Open an existing archive, detecting its form from the path
    pub fn open(path: &Path) -> Result<Self> {
        let kind = ArchiveKind::detect(path)?;
        debug!("opening {} archive at {}", kind, path.display());
        match kind {
            ArchiveKind::Container => Ok(Self::Container(ContainerReader::open(path)?)),
            ArchiveKind::Tree => Ok(Self::Tree(TreeReader::open(path))),
        }
    }

    pub fn kind(&self) -> ArchiveKind {
        match self {
            Self::Container(_) => ArchiveKind::Container,
            Self::Tree(_) => ArchiveKind::Tree,
        }
    }

    fn lookup(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Container(r) => Ok(r.get(name).map(<[u8]>::to_vec)),
            Self::Tree(r) => r.get(name),
        }
    }

    /// Read an entry
    ///
    /// Older archives anchor entry names inconsistently, so a name that is
    /// not found as given is retried without its leading slash.
    pub fn get_entry(&self, name: &str) -> Result<Vec<u8>> {
        let normalized = normalize_entry_name(name);
        if let Some(data) = self.lookup(&normalized)? {
            return Ok(data);
        }
        let stripped = normalized.trim_start_matches('/');
        if stripped != normalized
            && let Some(data) = self.lookup(stripped)?
        {
            return Ok(data);
        }
        Err(Error::EntryNotFound(name.to_string()))
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.get_entry(name).is_ok()
    }

    /// Names of every entry in the archive
    pub fn entry_names(&self) -> Result<Vec<String>> {
        match self {
            Self::Container(r) => Ok(r.names().map(str::to_string).collect()),
            Self::Tree(r) => r.names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_sample(path: &Path, kind: ArchiveKind) {
        let mut writer = ArchiveWriter::create(path, kind).unwrap();
        assert_eq!(writer.kind(), kind);
        writer.put_entry(MANIFEST_ENTRY, b"<export/>").unwrap();
        writer.put_entry(&content_entry_name("/docs/a.bin"), &[0, 255, 10, 13]).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_detects_form_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let container = temp_dir.path().join("a.tar.gz");
        let tree = temp_dir.path().join("tree");
        write_sample(&container, ArchiveKind::Container);
        write_sample(&tree, ArchiveKind::Tree);

        assert_eq!(ArchiveReader::open(&container).unwrap().kind(), ArchiveKind::Container);
        assert_eq!(ArchiveReader::open(&tree).unwrap().kind(), ArchiveKind::Tree);
    }

    #[test]
    fn test_missing_path_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let result = ArchiveReader::open(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(Error::ArchiveUnreadable(_))));
    }

    #[test]
    fn test_get_entry_with_leading_slash_fallback() {
        let temp_dir = TempDir::new().unwrap();
        for kind in [ArchiveKind::Container, ArchiveKind::Tree] {
            let path = temp_dir.path().join(format!("sample-{}", kind));
            write_sample(&path, kind);
            let reader = ArchiveReader::open(&path).unwrap();

            assert_eq!(reader.get_entry("content/docs/a.bin").unwrap(), vec![0, 255, 10, 13]);
            assert_eq!(reader.get_entry("/content/docs/a.bin").unwrap(), vec![0, 255, 10, 13]);
            assert!(reader.has_entry("/manifest.xml"));
        }
    }

    #[test]
    fn test_missing_entry_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.tar.gz");
        write_sample(&path, ArchiveKind::Container);
        let reader = ArchiveReader::open(&path).unwrap();

        let err = reader.get_entry("/content/missing").unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
        assert!(err.to_string().starts_with("Entry Not Found"));
    }

    #[test]
    fn test_entry_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.tar.gz");
        write_sample(&path, ArchiveKind::Container);
        let mut names = ArchiveReader::open(&path).unwrap().entry_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["content/docs/a.bin", "manifest.xml"]);
    }
}
