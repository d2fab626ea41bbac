// src/content/page.rs

//! Structured multi-body page format
//!
//! ```text
//! <pages>
//!   <page language="en">
//!     <element name="body"><content><![CDATA[...]]></content></element>
//!   </page>
//! </pages>
//! ```
//!
//! One `<page>` per language, one `<element>` per named body.

use crate::error::{Error, Result};
use crate::xml::{parse_document, write_document, Element};

/// A named body of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub name: String,
    pub content: String,
}

/// All bodies of one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocale {
    pub language: String,
    pub elements: Vec<PageElement>,
}

/// A structured page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredPage {
    pub locales: Vec<PageLocale>,
}

impl StructuredPage {
    /// Single-language page
    pub fn single(language: impl Into<String>, elements: Vec<PageElement>) -> Self {
        Self {
            locales: vec![PageLocale {
                language: language.into(),
                elements,
            }],
        }
    }

    /// Body of `name` in `language`
    pub fn element(&self, language: &str, name: &str) -> Option<&str> {
        self.locales
            .iter()
            .find(|l| l.language == language)?
            .elements
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.content.as_str())
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut root = Element::new("pages");
        for locale in &self.locales {
            let mut page = Element::new("page").with_attr("language", locale.language.clone());
            for element in &locale.elements {
                let mut content = Element::new("content");
                if !element.content.is_empty() {
                    content = content.with_text(element.content.clone());
                }
                page = page.with_child(
                    Element::new("element")
                        .with_attr("name", element.name.clone())
                        .with_child(content),
                );
            }
            root = root.with_child(page);
        }
        write_document(&root)
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let doc = parse_document(xml)?;
        if doc.root.name != "pages" {
            return Err(Error::Conversion(format!(
                "expected <pages>, found <{}>",
                doc.root.name
            )));
        }

        let mut page = StructuredPage::default();
        for locale in doc.root.children_named("page") {
            let language = locale
                .attr("language")
                .ok_or_else(|| Error::Conversion("<page> without language".to_string()))?;
            let mut elements = Vec::new();
            for element in locale.children_named("element") {
                let name = element
                    .attr("name")
                    .ok_or_else(|| Error::Conversion("<element> without name".to_string()))?;
                let content = element.child("content").map(Element::text).unwrap_or_default();
                elements.push(PageElement {
                    name: name.to_string(),
                    content,
                });
            }
            page.locales.push(PageLocale {
                language: language.to_string(),
                elements,
            });
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_round_trip() {
        let page = StructuredPage::single(
            "de",
            vec![
                PageElement {
                    name: "head".to_string(),
                    content: "<h1>Grüße</h1>".to_string(),
                },
                PageElement {
                    name: "body".to_string(),
                    content: String::new(),
                },
            ],
        );
        let xml = page.to_xml().unwrap();
        let parsed = StructuredPage::parse(&xml).unwrap();
        assert_eq!(parsed, page);
        assert_eq!(parsed.element("de", "head"), Some("<h1>Grüße</h1>"));
        assert_eq!(parsed.element("en", "head"), None);
    }

    #[test]
    fn test_parse_rejects_other_roots() {
        assert!(StructuredPage::parse("<page/>").is_err());
    }
}
