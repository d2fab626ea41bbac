// src/archive/container.rs

//! Single-file container form of an archive
//!
//! The container is a gzip-compressed tar stream. Entries are appended
//! sequentially while writing; `finish` closes the gzip stream, after which
//! the container is complete and the writer is consumed. Reading loads every
//! regular entry into memory once so that entries can be fetched in any
//! order afterwards.

use crate::error::{Error, Result};
use crate::path::{normalize_entry_name, sanitize_entry_name};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// Sequential writer for a compressed container
pub struct ContainerWriter {
    path: PathBuf,
    builder: Builder<GzEncoder<BufWriter<File>>>,
    mtime: u64,
    entries: usize,
}

impl ContainerWriter {
    /// Create (or truncate) the container file
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| {
            Error::IoError(format!("failed to create container {}: {}", path.display(), e))
        })?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        Ok(Self {
            path: path.to_path_buf(),
            builder: Builder::new(encoder),
            mtime: chrono::Utc::now().timestamp().max(0) as u64,
            entries: 0,
        })
    }

    /// Append one entry holding `data`
    pub fn put_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.put_entry_chunks(name, &[data]).map(|_| ())
    }

    /// Append one entry whose bytes are supplied as consecutive chunks
    ///
    /// The entry size is the sum of all chunk lengths. Each read the tar
    /// builder issues is served from a single chunk, so no buffer larger than
    /// one chunk is materialized. Returns the number of chunks written.
    pub fn put_entry_chunks(&mut self, name: &str, chunks: &[&[u8]]) -> Result<usize> {
        let entry_path = sanitize_entry_name(name)?;
        let size: u64 = chunks.iter().map(|c| c.len() as u64).sum();

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(size);
        header.set_mtime(self.mtime);

        self.builder
            .append_data(&mut header, &entry_path, ChunkReader::new(chunks))
            .map_err(|e| Error::IoError(format!("failed to append {}: {}", name, e)))?;
        self.entries += 1;

        debug!("container entry {} ({} bytes, {} chunks)", name, size, chunks.len());
        Ok(chunks.len())
    }

    /// Number of entries appended so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Finalize the tar stream and the gzip trailer
    pub fn finish(self) -> Result<()> {
        let encoder = self.builder.into_inner()?;
        let mut writer = encoder.finish()?;
        io::Write::flush(&mut writer)?;
        debug!("finalized container {} ({} entries)", self.path.display(), self.entries);
        Ok(())
    }
}

/// `Read` adapter that serves a list of slices back-to-back
struct ChunkReader<'a> {
    chunks: &'a [&'a [u8]],
    index: usize,
    offset: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(chunks: &'a [&'a [u8]]) -> Self {
        Self { chunks, index: 0, offset: 0 }
    }
}

impl Read for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.index < self.chunks.len() {
            let chunk = self.chunks[self.index];
            if self.offset < chunk.len() {
                let n = buf.len().min(chunk.len() - self.offset);
                buf[..n].copy_from_slice(&chunk[self.offset..self.offset + n]);
                self.offset += n;
                return Ok(n);
            }
            self.index += 1;
            self.offset = 0;
        }
        Ok(0)
    }
}

/// Fully loaded container, entries keyed by normalized name
pub struct ContainerReader {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ContainerReader {
    /// Read every regular entry of the container
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::ArchiveUnreadable(format!("{}: {}", path.display(), e))
        })?;
        let mut archive = Archive::new(GzDecoder::new(file));
        let mut entries = BTreeMap::new();

        let iter = archive
            .entries()
            .map_err(|e| Error::ArchiveUnreadable(format!("{}: {}", path.display(), e)))?;
        for entry in iter {
            let mut entry =
                entry.map_err(|e| Error::ArchiveUnreadable(format!("{}: {}", path.display(), e)))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = normalize_entry_name(&entry.path()?.to_string_lossy());
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            entries.insert(name, data);
        }

        debug!("loaded container {} ({} entries)", path.display(), entries.len());
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
