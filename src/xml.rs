// src/xml.rs

//! Minimal element tree over quick-xml events
//!
//! Manifests and legacy template bodies are small enough to hold in memory
//! once parsed. The tree keeps text nodes verbatim (no trimming) because the
//! compatibility checker must see whitespace-only and non-empty text apart.
//! Comments and processing instructions are dropped; CDATA becomes text.

use crate::error::{Error, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Write;

/// One node of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// All child elements with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Content of the element as markup
    ///
    /// Text-only content is returned as is. Once element children are
    /// present every child is serialized, so nested tags are kept.
    pub fn inner_markup(&self) -> Result<String> {
        if self.elements().next().is_none() {
            return Ok(self.text());
        }
        let mut writer = Writer::new(Vec::new());
        for child in &self.children {
            write_markup(&mut writer, child)?;
        }
        String::from_utf8(writer.into_inner()).map_err(Error::xml)
    }

    /// Trimmed text of a named child, `None` if the child is absent or empty
    pub fn child_text(&self, name: &str) -> Option<String> {
        let text = self.child(name)?.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// A parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Content of the `<!DOCTYPE ...>` declaration, if any
    pub doctype: Option<String>,
    pub root: Element,
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(Error::xml)
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(utf8(e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr.map_err(Error::xml)?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(Error::xml)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Parse a complete document with exactly one root element
pub fn parse_document(input: &str) -> Result<Document> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut doctype = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Xml(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;
        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(Error::Xml("content after root element".to_string()));
                }
                stack.push(start_element(&e)?);
            }
            Event::Empty(e) => {
                let element = start_element(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(Error::xml)?.into_owned();
                push_text(&mut stack, text)?;
            }
            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().into_owned()).map_err(Error::xml)?;
                push_text(&mut stack, text)?;
            }
            Event::DocType(e) => {
                doctype = Some(utf8(&e)?.trim().to_string());
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(Error::Xml(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
    }
    let root = root.ok_or_else(|| Error::Xml("document has no root element".to_string()))?;
    Ok(Document { doctype, root })
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            // Adjacent text and CDATA merge into one node
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(&text);
            } else {
                parent.children.push(Node::Text(text));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::Xml("text outside the root element".to_string())),
    }
}

/// Serialize an element tree as a standalone UTF-8 document
///
/// Text children that contain markup characters are emitted as CDATA
/// sections so legacy bodies survive unchanged.
pub fn write_document(root: &Element) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(Error::xml)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(Error::xml)
}

/// Write one element (and its subtree) to a quick-xml writer
pub fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (k, v) in &element.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(Error::xml)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(Error::xml)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => write_text(writer, t)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(Error::xml)?;
    Ok(())
}

/// Write a node as inline markup; text is escaped, never wrapped in CDATA
fn write_markup<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    match node {
        Node::Text(t) => writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(t))))
            .map_err(Error::xml),
        Node::Element(element) => {
            let mut start = BytesStart::new(element.name.as_str());
            for (k, v) in &element.attributes {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            if element.children.is_empty() {
                return writer.write_event(Event::Empty(start)).map_err(Error::xml);
            }
            writer.write_event(Event::Start(start)).map_err(Error::xml)?;
            for child in &element.children {
                write_markup(writer, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(element.name.as_str())))
                .map_err(Error::xml)
        }
    }
}

fn write_text<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<()> {
    if (text.contains('<') || text.contains('&')) && !text.contains("]]>") {
        writer
            .write_event(Event::CData(BytesCData::new(text)))
            .map_err(Error::xml)?;
    } else {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(Error::xml)?;
    }
    Ok(())
}
