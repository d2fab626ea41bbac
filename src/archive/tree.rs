// src/archive/tree.rs

//! Directory-tree form of an archive
//!
//! Each entry is a plain file below the root. Parent directories are created
//! on demand, so entries may be written in any order.

use crate::error::{Error, Result};
use crate::path::safe_join;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Writer rooted at a destination directory
pub struct TreeWriter {
    root: PathBuf,
    entries: usize,
}

impl TreeWriter {
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| {
            Error::IoError(format!("failed to create archive root {}: {}", root.display(), e))
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            entries: 0,
        })
    }

    fn prepare(&self, name: &str) -> Result<PathBuf> {
        let target = safe_join(&self.root, name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(target)
    }

    pub fn put_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let target = self.prepare(name)?;
        fs::write(&target, data)
            .map_err(|e| Error::IoError(format!("failed to write {}: {}", target.display(), e)))?;
        self.entries += 1;
        debug!("tree entry {} ({} bytes)", name, data.len());
        Ok(())
    }

    /// Open an entry for incremental writing
    pub fn open_entry(&mut self, name: &str) -> Result<BufWriter<File>> {
        let target = self.prepare(name)?;
        let file = File::create(&target)
            .map_err(|e| Error::IoError(format!("failed to create {}: {}", target.display(), e)))?;
        self.entries += 1;
        Ok(BufWriter::new(file))
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reader rooted at an existing directory
pub struct TreeReader {
    root: PathBuf,
}

impl TreeReader {
    pub fn open(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Read an entry, `None` if no such file exists
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let target = safe_join(&self.root, name)?;
        if !target.is_file() {
            return Ok(None);
        }
        let data = fs::read(&target)
            .map_err(|e| Error::IoError(format!("failed to read {}: {}", target.display(), e)))?;
        Ok(Some(data))
    }

    /// Relative names of every file below the root, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::IoError(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                names.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(names)
    }
}
