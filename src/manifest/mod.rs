// src/manifest/mod.rs

//! Manifest data model, reader and writer
//!
//! The manifest is an XML document at the archive root:
//!
//! ```text
//! <export>
//!   <info> creator, created, version </info>
//!   <accounts> users, groups </accounts>          (optional)
//!   <files> <file> ... </file>* </files>
//!   <module name version> groupings, datasets </module>   (optional)
//! </export>
//! ```
//!
//! Records are parsed one `<file>` element at a time so that a single
//! malformed record fails on its own instead of failing the whole run.

mod codec;
pub mod permissions;
mod reader;
mod version;
mod writer;

pub use codec::{
    accounts_from_element, accounts_to_element, format_timestamp, module_from_element,
    module_to_element, parse_timestamp, record_from_element, record_to_element,
};
pub use reader::{ManifestInfo, ManifestReader};
pub use version::{AceStyle, FormatVersion, TimestampStyle, VersionRules};
pub use writer::{split_into_chunks, ManifestOptions, ManifestWriter};

use crate::content::Dataset;
use chrono::{DateTime, Utc};
use std::fmt;

/// Whether a principal reference names a user or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A principal named in a manifest, resolved to a live identity at import
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalRef {
    pub kind: PrincipalKind,
    pub name: String,
}

impl PrincipalRef {
    pub fn user(name: impl Into<String>) -> Self {
        Self { kind: PrincipalKind::User, name: name.into() }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self { kind: PrincipalKind::Group, name: name.into() }
    }
}

/// Access control entry attached to one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub principal: PrincipalRef,
    pub allowed: u32,
    pub denied: u32,
    pub flags: u32,
}

/// Named property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One resource described by the manifest
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceRecord {
    /// Path relative to the archive root, without a leading slash
    pub destination: String,
    pub type_name: String,
    pub flags: u32,
    pub owner: String,
    pub group: String,
    pub created: Option<DateTime<Utc>>,
    pub created_by: String,
    pub modified: Option<DateTime<Utc>>,
    pub modified_by: String,
    /// Byte length of the content entry
    pub size: Option<u64>,
    /// Content entry name, `None` for folders
    pub source: Option<String>,
    pub properties: Vec<Property>,
    pub aces: Vec<AccessEntry>,
}

impl ResourceRecord {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Every principal name the record references
    pub fn principals(&self) -> Vec<PrincipalRef> {
        let mut refs = Vec::new();
        for name in [&self.owner, &self.created_by, &self.modified_by] {
            if !name.is_empty() {
                refs.push(PrincipalRef::user(name.clone()));
            }
        }
        if !self.group.is_empty() {
            refs.push(PrincipalRef::group(self.group.clone()));
        }
        refs.extend(self.aces.iter().map(|a| a.principal.clone()));
        refs
    }
}

/// User listed in the accounts section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserRecord {
    pub name: String,
    pub full_name: Option<String>,
    pub groups: Vec<String>,
}

/// Group listed in the accounts section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupRecord {
    pub name: String,
    pub description: Option<String>,
}

/// Accounts section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Accounts {
    pub users: Vec<UserRecord>,
    pub groups: Vec<GroupRecord>,
}

impl Accounts {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// Module bundle handed to the exporter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
    pub groupings: Vec<Grouping>,
}

/// Named group of datasets within a module
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouping {
    pub name: String,
    pub datasets: Vec<Dataset>,
}

/// Module section as written to the manifest
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleSection {
    pub name: String,
    pub version: String,
    pub groupings: Vec<GroupingRef>,
    pub datasets: Vec<DatasetRef>,
}

/// Grouping listing dataset fingerprints
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupingRef {
    pub name: String,
    pub fingerprints: Vec<String>,
}

/// Dataset entry of the module section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetRef {
    pub fingerprint: String,
    pub class: String,
    pub id: String,
    /// Entry name of the serialized dataset
    pub source: String,
}
