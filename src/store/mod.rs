// src/store/mod.rs

//! Collaborator interfaces consumed by the engine
//!
//! The engine never owns persistent state. It reads and creates resources,
//! resolves principals and defines properties through these traits. Callers
//! plug in their own store; `MemoryStore` is the in-memory reference
//! implementation used by the CLI and the tests.

mod memory;
mod types;

pub use memory::MemoryStore;
pub use types::{StandardTypes, TypeCatalog, TypeKind};

use crate::error::Result;
use crate::manifest::{GroupRecord, PrincipalKind, Property, UserRecord};
use chrono::{DateTime, Utc};

/// Opaque identity of a user or group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalId(pub u32);

/// Lifecycle state of a stored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Live,
    /// Marked deleted but still present in the store
    Deleted,
}

/// Metadata of a stored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    pub path: String,
    pub type_name: String,
    pub flags: u32,
    pub owner: PrincipalId,
    pub group: PrincipalId,
    pub created: DateTime<Utc>,
    pub created_by: PrincipalId,
    pub modified: DateTime<Utc>,
    pub modified_by: PrincipalId,
    pub size: u64,
    pub state: ResourceState,
}

impl ResourceHeader {
    pub fn is_live(&self) -> bool {
        self.state == ResourceState::Live
    }
}

/// Access control entry as stored, principal already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAce {
    pub principal: PrincipalId,
    pub kind: PrincipalKind,
    pub allowed: u32,
    pub denied: u32,
    pub flags: u32,
}

/// Fields of a resource to create
///
/// Creating at a path that already holds a resource replaces it; folder
/// children are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResource {
    pub path: String,
    pub type_name: String,
    pub flags: u32,
    pub owner: PrincipalId,
    pub group: PrincipalId,
    pub created: Option<DateTime<Utc>>,
    pub created_by: PrincipalId,
    pub modified: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub content: Vec<u8>,
    pub properties: Vec<Property>,
}

impl NewResource {
    /// Folder owned by `owner`/`group` with no metadata
    pub fn folder(path: impl Into<String>, owner: PrincipalId, group: PrincipalId) -> Self {
        Self {
            path: path.into(),
            type_name: "folder".to_string(),
            flags: 0,
            owner,
            group,
            created: None,
            created_by: owner,
            modified: None,
            modified_by: owner,
            content: Vec::new(),
            properties: Vec::new(),
        }
    }
}

/// Resource tree access
pub trait ResourceStore {
    /// Header of the resource at `path`, `None` if nothing is stored there
    fn read_header(&self, path: &str) -> Result<Option<ResourceHeader>>;

    fn read_content(&self, path: &str) -> Result<Vec<u8>>;

    /// Paths of the direct children of a folder, sorted
    fn read_folder(&self, path: &str) -> Result<Vec<String>>;

    fn read_properties(&self, path: &str) -> Result<Vec<Property>>;

    fn read_aces(&self, path: &str) -> Result<Vec<StoredAce>>;

    /// Create or replace a resource; the parent folder must exist
    fn create_resource(&mut self, resource: NewResource) -> Result<()>;

    fn replace_aces(&mut self, path: &str, aces: Vec<StoredAce>) -> Result<()>;
}

/// User and group lookup
pub trait PrincipalStore {
    fn lookup(&self, kind: PrincipalKind, name: &str) -> Option<PrincipalId>;

    fn name_of(&self, id: PrincipalId) -> Option<(PrincipalKind, String)>;

    fn user_record(&self, name: &str) -> Option<UserRecord>;

    fn group_record(&self, name: &str) -> Option<GroupRecord>;

    fn create_user(&mut self, user: &UserRecord) -> Result<PrincipalId>;

    fn create_group(&mut self, group: &GroupRecord) -> Result<PrincipalId>;
}

/// Property definitions
pub trait PropertyCatalog {
    fn is_defined(&self, name: &str) -> bool;

    fn define(&mut self, name: &str) -> Result<()>;
}

/// Everything an import or export run needs from its environment
pub trait Backend: ResourceStore + PrincipalStore + PropertyCatalog + TypeCatalog {}

impl<T: ResourceStore + PrincipalStore + PropertyCatalog + TypeCatalog> Backend for T {}

/// Name of a principal, or an empty string when the id is unknown
pub fn principal_name<S: PrincipalStore + ?Sized>(store: &S, id: PrincipalId) -> String {
    store.name_of(id).map(|(_, name)| name).unwrap_or_default()
}
