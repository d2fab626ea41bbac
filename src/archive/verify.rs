// src/archive/verify.rs

//! Archive verification
//!
//! Re-reads the manifest of an existing archive and checks that every
//! referenced entry is present with the declared length. Nothing is
//! imported.

use super::ArchiveReader;
use crate::error::Result;
use crate::manifest::{record_from_element, FormatVersion, ManifestReader};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One problem found in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyIssue {
    /// Record destination or entry name the problem belongs to
    pub path: String,
    pub problem: String,
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

/// Result of verifying an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub version: FormatVersion,
    /// Number of `<file>` records checked
    pub records: usize,
    /// Number of dataset entries checked
    pub datasets: usize,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verify the archive at `path`
///
/// An unreadable archive, an unparsable manifest or an unknown format
/// version is an error; problems with individual records are issues.
pub fn verify_archive(path: &Path) -> Result<VerifyReport> {
    let archive = ArchiveReader::open(path)?;
    let manifest = ManifestReader::read(&archive)?;
    let version = manifest.detect_version()?;
    let rules = version.rules();
    info!("verifying {} archive {} (format {})", archive.kind(), path.display(), version);

    let mut issues = Vec::new();
    let files = manifest.file_elements();
    for (index, element) in files.iter().enumerate() {
        let record = match record_from_element(element, &rules) {
            Ok(record) => record,
            Err(e) => {
                let label = element
                    .child_text("destination")
                    .unwrap_or_else(|| format!("#{}", index + 1));
                issues.push(VerifyIssue { path: label, problem: e.to_string() });
                continue;
            }
        };
        let Some(source) = &record.source else {
            continue;
        };
        match archive.get_entry(source) {
            Ok(bytes) => match record.size {
                Some(size) if size != bytes.len() as u64 => issues.push(VerifyIssue {
                    path: record.destination.clone(),
                    problem: format!("entry {} holds {} bytes, manifest declares {}", source, bytes.len(), size),
                }),
                Some(_) => debug!("{} ok", source),
                None => issues.push(VerifyIssue {
                    path: record.destination.clone(),
                    problem: format!("entry {} has no declared size", source),
                }),
            },
            Err(e) => issues.push(VerifyIssue {
                path: record.destination.clone(),
                problem: e.to_string(),
            }),
        }
    }

    let mut datasets = 0;
    if let Some(module) = manifest.module()? {
        for dataset in &module.datasets {
            datasets += 1;
            let problem = match archive.get_entry(&dataset.source) {
                Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes)
                    .err()
                    .map(|e| format!("dataset entry {} is not valid JSON: {}", dataset.source, e)),
                Err(e) => Some(e.to_string()),
            };
            if let Some(problem) = problem {
                issues.push(VerifyIssue {
                    path: format!("{}:{}", dataset.class, dataset.id),
                    problem,
                });
            }
        }
    }

    Ok(VerifyReport {
        version,
        records: files.len(),
        datasets,
        issues,
    })
}
