// src/manifest/writer.rs

//! Streaming manifest writer
//!
//! Records are serialized as they are produced. For a directory-tree archive
//! the manifest file is opened up front and written incrementally, so
//! `end_document` only closes the root element and flushes. A container
//! cannot hold an open entry while other entries are appended, so there the
//! document accumulates in memory and `end_document` hands it to the archive
//! in bounded chunks.

use super::codec::{accounts_to_element, module_to_element, record_to_element};
use super::{Accounts, FormatVersion, ModuleSection, ResourceRecord, VersionRules};
use crate::archive::{ArchiveWriter, MANIFEST_ENTRY};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::xml::{write_element, Element};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::debug;

/// System identifier emitted when validation is requested
const DOCTYPE: &str = "export SYSTEM \"treeport-export.dtd\"";

/// Split `s` into pieces of at most `max_chars` characters
///
/// Splits fall on character boundaries, so every piece is valid UTF-8 and the
/// concatenation of all pieces is exactly `s`. The last piece may be shorter.
pub fn split_into_chunks(s: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in s.char_indices() {
        if count == max_chars {
            chunks.push(&s[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < s.len() {
        chunks.push(&s[start..]);
    }
    chunks
}

/// Options for one manifest document
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    pub version: FormatVersion,
    /// Emit the document type marker and enforce record invariants
    pub validate: bool,
    /// Characters per write for container output
    pub chunk_size: usize,
    pub creator: String,
    pub created: DateTime<Utc>,
}

impl ManifestOptions {
    pub fn new(version: FormatVersion, validate: bool) -> Self {
        Self {
            version,
            validate,
            chunk_size: DEFAULT_CHUNK_SIZE,
            creator: format!("treeport {}", env!("CARGO_PKG_VERSION")),
            created: Utc::now(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}

/// Destination of the serialized document
enum Sink {
    /// Held until `end_document`, then written in chunks
    Buffer(Vec<u8>),
    /// Written straight into the archive's manifest file
    Stream(BufWriter<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Buffer(v) => v.write(buf),
            Sink::Stream(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Buffer(_) => Ok(()),
            Sink::Stream(f) => f.flush(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Files,
    Trailer,
}

/// Incremental writer for one manifest document
pub struct ManifestWriter {
    xml: Writer<Sink>,
    rules: VersionRules,
    validate: bool,
    chunk_size: usize,
    section: Section,
    destinations: HashSet<String>,
    records: usize,
}

impl ManifestWriter {
    /// Begin a document: prolog, root element and info section
    pub fn start_document(archive: &mut ArchiveWriter, options: ManifestOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidParameter("chunk size must be greater than zero".to_string()));
        }
        let sink = match archive.open_entry_stream(MANIFEST_ENTRY)? {
            Some(stream) => Sink::Stream(stream),
            None => Sink::Buffer(Vec::new()),
        };

        let mut xml = Writer::new_with_indent(sink, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(Error::xml)?;
        if options.validate {
            xml.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))
                .map_err(Error::xml)?;
        }
        xml.write_event(Event::Start(BytesStart::new("export")))
            .map_err(Error::xml)?;

        let mut info = Element::new("info")
            .with_child(Element::new("creator").with_text(options.creator.clone()))
            .with_child(
                Element::new("created")
                    .with_text(options.created.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        if options.version != FormatVersion::V0 {
            info = info.with_child(Element::new("version").with_text(options.version.marker().to_string()));
        }
        write_element(&mut xml, &info)?;

        debug!("started {} manifest (validate: {})", options.version, options.validate);
        Ok(Self {
            xml,
            rules: options.version.rules(),
            validate: options.validate,
            chunk_size: options.chunk_size,
            section: Section::Header,
            destinations: HashSet::new(),
            records: 0,
        })
    }

    /// Write the accounts section; only allowed before the first record
    pub fn write_accounts(&mut self, accounts: &Accounts) -> Result<()> {
        if self.section != Section::Header {
            return Err(Error::Manifest("accounts must precede resource records".to_string()));
        }
        write_element(&mut self.xml, &accounts_to_element(accounts))
    }

    fn open_files(&mut self) -> Result<()> {
        if self.section == Section::Header {
            self.xml
                .write_event(Event::Start(BytesStart::new("files")))
                .map_err(Error::xml)?;
            self.section = Section::Files;
        }
        Ok(())
    }

    fn close_files(&mut self) -> Result<()> {
        match self.section {
            Section::Header => {
                self.xml
                    .write_event(Event::Empty(BytesStart::new("files")))
                    .map_err(Error::xml)?;
            }
            Section::Files => {
                self.xml
                    .write_event(Event::End(BytesEnd::new("files")))
                    .map_err(Error::xml)?;
            }
            Section::Trailer => return Ok(()),
        }
        self.section = Section::Trailer;
        Ok(())
    }

    fn check_record(&mut self, record: &ResourceRecord) -> Result<()> {
        let destination = record.destination.trim_matches('/');
        if destination.is_empty() {
            return Err(Error::Manifest("record with empty destination".to_string()));
        }
        if record.type_name.trim().is_empty() {
            return Err(Error::Manifest(format!("record {} has no type", destination)));
        }
        if record.source.is_some() && record.size.is_none() {
            return Err(Error::Manifest(format!(
                "record {} references content but declares no size",
                destination
            )));
        }
        if !self.destinations.insert(destination.to_string()) {
            return Err(Error::Manifest(format!("duplicate destination {}", destination)));
        }
        Ok(())
    }

    /// Append one resource record
    pub fn write_resource_record(&mut self, record: &ResourceRecord) -> Result<()> {
        if self.section == Section::Trailer {
            return Err(Error::Manifest("records cannot follow the module section".to_string()));
        }
        if self.validate {
            self.check_record(record)?;
        }
        let element = record_to_element(record, &self.rules)?;
        self.open_files()?;
        write_element(&mut self.xml, &element)?;
        self.records += 1;
        Ok(())
    }

    /// Write the module section; closes the record list
    pub fn write_module(&mut self, module: &ModuleSection) -> Result<()> {
        self.close_files()?;
        write_element(&mut self.xml, &module_to_element(module))
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Close the document and hand it to the archive
    ///
    /// Returns the number of writes the manifest took.
    pub fn end_document(mut self, archive: &mut ArchiveWriter) -> Result<usize> {
        self.close_files()?;
        self.xml
            .write_event(Event::End(BytesEnd::new("export")))
            .map_err(Error::xml)?;

        match self.xml.into_inner() {
            Sink::Stream(mut stream) => {
                stream.write_all(b"\n")?;
                stream.flush()?;
                debug!("manifest streamed ({} records)", self.records);
                Ok(1)
            }
            Sink::Buffer(mut buffer) => {
                buffer.push(b'\n');
                let document = String::from_utf8(buffer).map_err(Error::xml)?;
                let chunks: Vec<&[u8]> = split_into_chunks(&document, self.chunk_size)
                    .into_iter()
                    .map(str::as_bytes)
                    .collect();
                let writes = archive.put_entry_chunks(MANIFEST_ENTRY, &chunks)?;
                debug!(
                    "manifest written in {} chunks ({} records, {} bytes)",
                    writes,
                    self.records,
                    document.len()
                );
                Ok(writes)
            }
        }
    }
}
