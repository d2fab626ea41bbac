// src/store/memory.rs

//! In-memory resource store with arena allocation and O(1) path lookup
//!
//! Nodes live in a contiguous Vec and are referenced by `NodeId`; a HashMap
//! maps resource paths to node ids. Replacing a resource reuses its node, so
//! ids stay valid for the lifetime of the store. A revision counter is bumped
//! on every mutation, which lets callers prove that an operation was
//! read-only.

use super::{
    NewResource, PrincipalId, PrincipalStore, PropertyCatalog, ResourceHeader, ResourceState,
    ResourceStore, StandardTypes, StoredAce, TypeCatalog, TypeKind,
};
use crate::error::{Error, Result};
use crate::manifest::{GroupRecord, PrincipalKind, Property, UserRecord};
use crate::path::{normalize_resource_path, parent_of};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    header: ResourceHeader,
    content: Vec<u8>,
    properties: Vec<Property>,
    aces: Vec<StoredAce>,
    children: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Principal {
    kind: PrincipalKind,
    name: String,
    detail: Option<String>,
    groups: Vec<String>,
}

/// Reference store kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    nodes: Vec<Node>,
    path_index: HashMap<String, NodeId>,
    principals: Vec<Principal>,
    principal_index: HashMap<(PrincipalKind, String), PrincipalId>,
    properties: BTreeSet<String>,
    types: StandardTypes,
    revision: u64,
}

impl MemoryStore {
    /// Store with a root folder, an `admin` user and a `users` group
    pub fn new() -> Self {
        let mut store = Self {
            nodes: Vec::new(),
            path_index: HashMap::new(),
            principals: Vec::new(),
            principal_index: HashMap::new(),
            properties: BTreeSet::new(),
            types: StandardTypes::with_builtins(),
            revision: 0,
        };
        let admin = store.add_principal(PrincipalKind::User, "admin", None, Vec::new());
        let users = store.add_principal(PrincipalKind::Group, "users", None, Vec::new());
        let now = Utc::now();
        store.path_index.insert("/".to_string(), NodeId(0));
        store.nodes.push(Node {
            header: ResourceHeader {
                path: "/".to_string(),
                type_name: "folder".to_string(),
                flags: 0,
                owner: admin,
                group: users,
                created: now,
                created_by: admin,
                modified: now,
                modified_by: admin,
                size: 0,
                state: ResourceState::Live,
            },
            content: Vec::new(),
            properties: Vec::new(),
            aces: Vec::new(),
            children: BTreeSet::new(),
        });
        store.revision = 0;
        store
    }

    /// Use a custom type catalog
    pub fn with_types(mut self, types: StandardTypes) -> Self {
        self.types = types;
        self
    }

    fn add_principal(
        &mut self,
        kind: PrincipalKind,
        name: &str,
        detail: Option<String>,
        groups: Vec<String>,
    ) -> PrincipalId {
        if let Some(id) = self.principal_index.get(&(kind, name.to_string())) {
            return *id;
        }
        let id = PrincipalId(self.principals.len() as u32);
        self.principals.push(Principal {
            kind,
            name: name.to_string(),
            detail,
            groups,
        });
        self.principal_index.insert((kind, name.to_string()), id);
        self.revision += 1;
        id
    }

    pub fn add_user(&mut self, name: &str) -> PrincipalId {
        self.add_principal(PrincipalKind::User, name, None, Vec::new())
    }

    pub fn add_group(&mut self, name: &str) -> PrincipalId {
        self.add_principal(PrincipalKind::Group, name, None, Vec::new())
    }

    /// Id of the built-in `admin` user
    pub fn admin(&self) -> PrincipalId {
        PrincipalId(0)
    }

    /// Id of the built-in `users` group
    pub fn users_group(&self) -> PrincipalId {
        PrincipalId(1)
    }

    fn node(&self, path: &str) -> Result<&Node> {
        let path = normalize_resource_path(path)?;
        self.path_index
            .get(&path)
            .map(|id| &self.nodes[id.0])
            .ok_or(Error::NotFound(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Node> {
        let path = normalize_resource_path(path)?;
        match self.path_index.get(&path) {
            Some(id) => Ok(&mut self.nodes[id.0]),
            None => Err(Error::NotFound(path)),
        }
    }

    /// Create a folder (and any missing parents) owned by admin
    pub fn mkdir_p(&mut self, path: &str) -> Result<()> {
        let path = normalize_resource_path(path)?;
        let mut missing = Vec::new();
        let mut current = Some(path.as_str());
        while let Some(p) = current {
            if self.path_index.contains_key(p) {
                break;
            }
            missing.push(p.to_string());
            current = parent_of(p);
        }
        for folder in missing.into_iter().rev() {
            self.create_resource(NewResource::folder(folder, self.admin(), self.users_group()))?;
        }
        Ok(())
    }

    /// Store a leaf resource owned by admin, creating parent folders
    pub fn put_file(&mut self, path: &str, type_name: &str, content: &[u8]) -> Result<()> {
        let path = normalize_resource_path(path)?;
        if let Some(parent) = parent_of(&path) {
            self.mkdir_p(parent)?;
        }
        let mut resource = NewResource::folder(path, self.admin(), self.users_group());
        resource.type_name = type_name.to_string();
        resource.content = content.to_vec();
        self.create_resource(resource)
    }

    /// Set the modification time of a stored resource
    pub fn touch(&mut self, path: &str, modified: DateTime<Utc>) -> Result<()> {
        self.node_mut(path)?.header.modified = modified;
        self.revision += 1;
        Ok(())
    }

    /// Replace the property list of a stored resource
    pub fn set_properties(&mut self, path: &str, properties: Vec<Property>) -> Result<()> {
        for p in &properties {
            self.properties.insert(p.name.clone());
        }
        self.node_mut(path)?.properties = properties;
        self.revision += 1;
        Ok(())
    }

    /// Flag a resource as deleted without removing it
    pub fn mark_deleted(&mut self, path: &str) -> Result<()> {
        self.node_mut(path)?.header.state = ResourceState::Deleted;
        self.revision += 1;
        Ok(())
    }

    /// Counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.path_index.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn exists(&self, path: &str) -> bool {
        self.node(path).is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore for MemoryStore {
    fn read_header(&self, path: &str) -> Result<Option<ResourceHeader>> {
        match self.node(path) {
            Ok(node) => Ok(Some(node.header.clone())),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_content(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.node(path)?.content.clone())
    }

    fn read_folder(&self, path: &str) -> Result<Vec<String>> {
        let node = self.node(path)?;
        if self.types.kind_of(&node.header.type_name) != Some(TypeKind::Folder) {
            return Err(Error::Store(format!("{} is not a folder", node.header.path)));
        }
        Ok(node.children.iter().cloned().collect())
    }

    fn read_properties(&self, path: &str) -> Result<Vec<Property>> {
        Ok(self.node(path)?.properties.clone())
    }

    fn read_aces(&self, path: &str) -> Result<Vec<StoredAce>> {
        Ok(self.node(path)?.aces.clone())
    }

    fn create_resource(&mut self, resource: NewResource) -> Result<()> {
        let path = normalize_resource_path(&resource.path)?;
        let kind = self
            .types
            .kind_of(&resource.type_name)
            .ok_or_else(|| Error::UnknownType(resource.type_name.clone()))?;
        if kind.is_folder() && !resource.content.is_empty() {
            return Err(Error::Store(format!("folder {} cannot have content", path)));
        }

        let parent = parent_of(&path).map(str::to_string);
        if let Some(parent) = &parent {
            let parent_node = self
                .node(parent)
                .map_err(|_| Error::Store(format!("parent folder {} does not exist", parent)))?;
            if self.types.kind_of(&parent_node.header.type_name) != Some(TypeKind::Folder) {
                return Err(Error::Store(format!("parent {} is not a folder", parent)));
            }
        }

        let now = Utc::now();
        let header = ResourceHeader {
            path: path.clone(),
            type_name: resource.type_name,
            flags: resource.flags,
            owner: resource.owner,
            group: resource.group,
            created: resource.created.unwrap_or(now),
            created_by: resource.created_by,
            modified: resource.modified.unwrap_or(now),
            modified_by: resource.modified_by,
            size: resource.content.len() as u64,
            state: ResourceState::Live,
        };

        match self.path_index.get(&path) {
            Some(id) => {
                let node = &mut self.nodes[id.0];
                let was_folder = self.types.kind_of(&node.header.type_name) == Some(TypeKind::Folder);
                if was_folder && !kind.is_folder() && !node.children.is_empty() {
                    return Err(Error::Store(format!(
                        "cannot replace non-empty folder {} with a {}",
                        path, header.type_name
                    )));
                }
                node.header = header;
                node.content = resource.content;
                node.properties = resource.properties;
            }
            None => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(Node {
                    header,
                    content: resource.content,
                    properties: resource.properties,
                    aces: Vec::new(),
                    children: BTreeSet::new(),
                });
                self.path_index.insert(path.clone(), id);
                if let Some(parent) = parent
                    && let Some(pid) = self.path_index.get(&parent)
                {
                    self.nodes[pid.0].children.insert(path);
                }
            }
        }
        self.revision += 1;
        Ok(())
    }

    fn replace_aces(&mut self, path: &str, aces: Vec<StoredAce>) -> Result<()> {
        self.node_mut(path)?.aces = aces;
        self.revision += 1;
        Ok(())
    }
}

impl PrincipalStore for MemoryStore {
    fn lookup(&self, kind: PrincipalKind, name: &str) -> Option<PrincipalId> {
        self.principal_index.get(&(kind, name.to_string())).copied()
    }

    fn name_of(&self, id: PrincipalId) -> Option<(PrincipalKind, String)> {
        self.principals
            .get(id.0 as usize)
            .map(|p| (p.kind, p.name.clone()))
    }

    fn user_record(&self, name: &str) -> Option<UserRecord> {
        let id = self.lookup(PrincipalKind::User, name)?;
        let p = &self.principals[id.0 as usize];
        Some(UserRecord {
            name: p.name.clone(),
            full_name: p.detail.clone(),
            groups: p.groups.clone(),
        })
    }

    fn group_record(&self, name: &str) -> Option<GroupRecord> {
        let id = self.lookup(PrincipalKind::Group, name)?;
        let p = &self.principals[id.0 as usize];
        Some(GroupRecord {
            name: p.name.clone(),
            description: p.detail.clone(),
        })
    }

    fn create_user(&mut self, user: &UserRecord) -> Result<PrincipalId> {
        if user.name.trim().is_empty() {
            return Err(Error::Store("user name is empty".to_string()));
        }
        if self.lookup(PrincipalKind::User, &user.name).is_some() {
            return Err(Error::AlreadyExists(format!("user {}", user.name)));
        }
        for group in &user.groups {
            if self.lookup(PrincipalKind::Group, group).is_none() {
                return Err(Error::NotFound(format!("group {} of user {}", group, user.name)));
            }
        }
        Ok(self.add_principal(
            PrincipalKind::User,
            &user.name,
            user.full_name.clone(),
            user.groups.clone(),
        ))
    }

    fn create_group(&mut self, group: &GroupRecord) -> Result<PrincipalId> {
        if group.name.trim().is_empty() {
            return Err(Error::Store("group name is empty".to_string()));
        }
        if self.lookup(PrincipalKind::Group, &group.name).is_some() {
            return Err(Error::AlreadyExists(format!("group {}", group.name)));
        }
        Ok(self.add_principal(
            PrincipalKind::Group,
            &group.name,
            group.description.clone(),
            Vec::new(),
        ))
    }
}

impl PropertyCatalog for MemoryStore {
    fn is_defined(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    fn define(&mut self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::Store("property name is empty".to_string()));
        }
        if self.properties.insert(name.to_string()) {
            self.revision += 1;
        }
        Ok(())
    }
}

impl TypeCatalog for MemoryStore {
    fn kind_of(&self, type_name: &str) -> Option<TypeKind> {
        self.types.kind_of(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_root_and_principals() {
        let store = MemoryStore::new();
        assert!(store.exists("/"));
        assert_eq!(store.lookup(PrincipalKind::User, "admin"), Some(store.admin()));
        assert_eq!(store.lookup(PrincipalKind::Group, "users"), Some(store.users_group()));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_create_requires_parent() {
        let mut store = MemoryStore::new();
        let resource = NewResource::folder("/a/b", store.admin(), store.users_group());
        assert!(matches!(store.create_resource(resource), Err(Error::Store(_))));

        store.mkdir_p("/a/b").unwrap();
        assert_eq!(store.read_folder("/a").unwrap(), vec!["/a/b".to_string()]);
    }

    #[test]
    fn test_put_file_and_read_back() {
        let mut store = MemoryStore::new();
        store.put_file("/docs/a.bin", "binary", &[0, 1, 2]).unwrap();

        let header = store.read_header("/docs/a.bin").unwrap().unwrap();
        assert_eq!(header.size, 3);
        assert_eq!(header.type_name, "binary");
        assert!(header.is_live());
        assert_eq!(store.read_content("/docs/a.bin").unwrap(), vec![0, 1, 2]);
        assert!(store.read_header("/docs/missing").unwrap().is_none());
        assert!(store.read_folder("/docs/a.bin").is_err());
    }

    #[test]
    fn test_replace_keeps_node_and_children() {
        let mut store = MemoryStore::new();
        store.put_file("/docs/a.txt", "plain", b"one").unwrap();
        store.put_file("/docs/a.txt", "plain", b"two").unwrap();
        assert_eq!(store.read_content("/docs/a.txt").unwrap(), b"two");
        assert_eq!(store.read_folder("/docs").unwrap().len(), 1);

        store
            .create_resource(NewResource::folder("/docs", store.admin(), store.users_group()))
            .unwrap();
        assert_eq!(store.read_folder("/docs").unwrap().len(), 1);

        let mut file = NewResource::folder("/docs", store.admin(), store.users_group());
        file.type_name = "plain".to_string();
        assert!(store.create_resource(file).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut store = MemoryStore::new();
        let mut resource = NewResource::folder("/x", store.admin(), store.users_group());
        resource.type_name = "jsp".to_string();
        assert!(matches!(store.create_resource(resource), Err(Error::UnknownType(_))));
    }

    #[test]
    fn test_mark_deleted_and_revision() {
        let mut store = MemoryStore::new();
        store.put_file("/a.txt", "plain", b"x").unwrap();
        let before = store.revision();
        store.mark_deleted("/a.txt").unwrap();
        assert!(store.revision() > before);
        assert!(!store.read_header("/a.txt").unwrap().unwrap().is_live());
    }

    #[test]
    fn test_principal_creation() {
        let mut store = MemoryStore::new();
        let group = GroupRecord { name: "staff".to_string(), description: Some("Staff".to_string()) };
        store.create_group(&group).unwrap();
        assert!(matches!(store.create_group(&group), Err(Error::AlreadyExists(_))));

        let user = UserRecord {
            name: "alice".to_string(),
            full_name: None,
            groups: vec!["staff".to_string()],
        };
        let id = store.create_user(&user).unwrap();
        assert_eq!(store.name_of(id), Some((PrincipalKind::User, "alice".to_string())));
        assert_eq!(store.user_record("alice"), Some(user));
        assert_eq!(store.group_record("staff"), Some(group));

        let orphan = UserRecord {
            name: "bob".to_string(),
            full_name: None,
            groups: vec!["ghosts".to_string()],
        };
        assert!(matches!(store.create_user(&orphan), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_property_catalog() {
        let mut store = MemoryStore::new();
        assert!(!store.is_defined("title"));
        store.define("title").unwrap();
        assert!(store.is_defined("title"));
        assert!(store.define(" ").is_err());
    }
}
