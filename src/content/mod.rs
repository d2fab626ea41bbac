// src/content/mod.rs
//! Content definitions for module datasets
//!
//! A module bundle carries datasets: typed records identified by a class key
//! and an id. On import each dataset is turned into a resource by the
//! content definition registered for its class key. Definitions are looked
//! up by key in an explicit registry; an unknown key fails that dataset
//! only.

pub mod page;

use crate::error::{Error, Result};
use crate::manifest::Property;
use page::{PageElement, StructuredPage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One relational record exported with a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Content definition key
    pub class: String,
    /// Identity within the class
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Dataset {
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    fn string_field(&self, name: &str) -> Result<&str> {
        match self.fields.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(Error::Conversion(format!(
                "{}/{}: field '{}' is not a string",
                self.class, self.id, name
            ))),
            None => Err(Error::Conversion(format!(
                "{}/{}: missing field '{}'",
                self.class, self.id, name
            ))),
        }
    }

    fn optional_string(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Resource produced from a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub type_name: &'static str,
    pub content: Vec<u8>,
    pub properties: Vec<Property>,
}

/// Turns datasets of one class into resources
pub trait ContentDefinition: Send + Sync {
    /// Stable key this definition is registered under
    fn class_key(&self) -> &'static str;

    fn materialize(&self, dataset: &Dataset) -> Result<Materialized>;
}

/// Constructor for a content definition
pub type DefinitionFactory = fn() -> Box<dyn ContentDefinition>;

/// Registry mapping class keys to definition constructors
pub struct DefinitionRegistry {
    factories: HashMap<String, DefinitionFactory>,
}

impl DefinitionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in definitions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("article", ArticleDefinition::create);
        registry.register("note", NoteDefinition::create);
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, factory: DefinitionFactory) {
        self.factories.insert(key.into(), factory);
    }

    /// Construct the definition for `key`
    pub fn create(&self, key: &str) -> Result<Box<dyn ContentDefinition>> {
        self.factories
            .get(key)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownDefinition(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Article: title + body rendered as a structured page
struct ArticleDefinition;

impl ArticleDefinition {
    fn create() -> Box<dyn ContentDefinition> {
        Box::new(Self)
    }
}

impl ContentDefinition for ArticleDefinition {
    fn class_key(&self) -> &'static str {
        "article"
    }

    fn materialize(&self, dataset: &Dataset) -> Result<Materialized> {
        let title = dataset.string_field("title")?;
        let body = dataset.string_field("body")?;
        let language = dataset.optional_string("language").unwrap_or("en");

        let page = StructuredPage::single(
            language,
            vec![
                PageElement {
                    name: "title".to_string(),
                    content: title.to_string(),
                },
                PageElement {
                    name: "body".to_string(),
                    content: body.to_string(),
                },
            ],
        );

        Ok(Materialized {
            type_name: "page",
            content: page.to_xml()?.into_bytes(),
            properties: vec![
                Property::new("title", title),
                Property::new("content-encoding", "UTF-8"),
            ],
        })
    }
}

/// Note: plain text
struct NoteDefinition;

impl NoteDefinition {
    fn create() -> Box<dyn ContentDefinition> {
        Box::new(Self)
    }
}

impl ContentDefinition for NoteDefinition {
    fn class_key(&self) -> &'static str {
        "note"
    }

    fn materialize(&self, dataset: &Dataset) -> Result<Materialized> {
        let text = dataset.string_field("text")?;
        Ok(Materialized {
            type_name: "plain",
            content: text.as_bytes().to_vec(),
            properties: Vec::new(),
        })
    }
}
