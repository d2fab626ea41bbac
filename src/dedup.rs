// src/dedup.rs

//! Write-once tracking for relational export records
//!
//! Datasets referenced from several groupings of a module must land in the
//! archive only once. Each record is identified by a fingerprint of its
//! stable identity (class and id), not of its serialized bytes, so that two
//! references to the same logical record always collapse into one write.
//! Resource bodies are not tracked here; each declared path is written once
//! by construction.

use crate::hash::identity_fingerprint;
use std::collections::HashSet;
use tracing::debug;

/// Set of fingerprints already written during one export run
#[derive(Debug, Default)]
pub struct DigestTracker {
    seen: HashSet<String>,
    skipped: usize,
}

impl DigestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of a logical record identity
    pub fn fingerprint(class: &str, id: &str) -> String {
        identity_fingerprint(&[class, id])
    }

    /// Returns true exactly once per fingerprint
    pub fn should_write(&mut self, fingerprint: &str) -> bool {
        if self.seen.insert(fingerprint.to_string()) {
            true
        } else {
            self.skipped += 1;
            debug!("already exported: {}", fingerprint);
            false
        }
    }

    /// Number of distinct fingerprints written
    pub fn written(&self) -> usize {
        self.seen.len()
    }

    /// Number of calls that returned false
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_write_once_per_id() {
        let mut tracker = DigestTracker::new();
        let a = DigestTracker::fingerprint("article", "42");
        let b = DigestTracker::fingerprint("article", "43");

        assert!(tracker.should_write(&a));
        assert!(!tracker.should_write(&a));
        assert!(!tracker.should_write(&a));
        assert!(tracker.should_write(&b));

        assert_eq!(tracker.written(), 2);
        assert_eq!(tracker.skipped(), 2);
    }

    #[test]
    fn test_fingerprint_depends_on_class() {
        assert_ne!(
            DigestTracker::fingerprint("article", "1"),
            DigestTracker::fingerprint("note", "1")
        );
    }
}
