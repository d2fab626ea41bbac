// src/store/types.rs
//! Resource-type catalog

use std::collections::HashMap;

/// Structural behavior of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Container of other resources, no content
    Folder,
    /// Opaque content
    File,
    /// Structured multi-body page
    Page,
    /// Template markup
    Template,
    /// Pointer to another resource; content is the target reference
    Link,
}

impl TypeKind {
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

/// Maps type names to structural behavior
pub trait TypeCatalog {
    fn kind_of(&self, type_name: &str) -> Option<TypeKind>;
}

/// Catalog of the built-in resource types
#[derive(Debug, Clone)]
pub struct StandardTypes {
    types: HashMap<String, TypeKind>,
}

impl StandardTypes {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Create a catalog with the built-in types
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("folder", TypeKind::Folder);
        catalog.register("plain", TypeKind::File);
        catalog.register("binary", TypeKind::File);
        catalog.register("image", TypeKind::File);
        catalog.register("page", TypeKind::Page);
        catalog.register("template", TypeKind::Template);
        // Legacy and current spelling of the link type
        catalog.register("link", TypeKind::Link);
        catalog.register("pointer", TypeKind::Link);
        catalog
    }

    pub fn register(&mut self, name: impl Into<String>, kind: TypeKind) {
        self.types.insert(name.into(), kind);
    }
}

impl Default for StandardTypes {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeCatalog for StandardTypes {
    fn kind_of(&self, type_name: &str) -> Option<TypeKind> {
        self.types.get(type_name).copied()
    }
}
