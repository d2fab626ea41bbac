// src/import/legacy.rs

//! Legacy page conversion
//!
//! Before format version 3, pages stored their bodies as inline template
//! markup:
//!
//! ```text
//! <XMLTEMPLATE>
//!   <TEMPLATE><![CDATA[main body]]></TEMPLATE>
//!   <TEMPLATE name="sidebar"><![CDATA[...]]></TEMPLATE>
//! </XMLTEMPLATE>
//! ```
//!
//! Each `<TEMPLATE>` becomes one named element of a structured page; an
//! unnamed template is the `body`. Content is decoded with its declared
//! encoding first, and the converted page is always UTF-8.

use crate::content::page::{PageElement, StructuredPage};
use crate::error::{Error, Result};
use crate::xml::parse_document;
use std::fmt;

/// Property naming the encoding of a resource body
pub const ENCODING_PROPERTY: &str = "content-encoding";

/// Property naming the language of a page
pub const LOCALE_PROPERTY: &str = "locale";

/// Element name for templates without a `name` attribute
const DEFAULT_ELEMENT: &str = "body";

/// Language for pages that declare none
const DEFAULT_LOCALE: &str = "en";

/// Character encodings legacy content may be stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Look up an encoding label, case-insensitively
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Self::Latin1),
            "us-ascii" | "ascii" => Some(Self::Ascii),
            _ => None,
        }
    }

    /// Canonical label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::Conversion(format!("invalid UTF-8: {}", e))),
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(Error::Conversion(format!(
                    "non-ASCII byte 0x{:02x} at offset {}",
                    bytes[pos], pos
                ))),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert inline template markup into a structured page (UTF-8 bytes)
pub fn convert_legacy_page(
    content: &[u8],
    encoding: TextEncoding,
    language: Option<&str>,
) -> Result<Vec<u8>> {
    let text = encoding.decode(content)?;
    let doc = parse_document(text.trim_start_matches('\u{FEFF}'))
        .map_err(|e| Error::Conversion(format!("legacy page markup: {}", e)))?;

    if doc.root.name != "XMLTEMPLATE" {
        return Err(Error::Conversion(format!(
            "legacy page root is <{}>, expected <XMLTEMPLATE>",
            doc.root.name
        )));
    }

    let mut elements: Vec<PageElement> = Vec::new();
    for template in doc.root.children_named("TEMPLATE") {
        let name = template
            .attr("name")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_ELEMENT)
            .trim()
            .to_string();
        if elements.iter().any(|e| e.name == name) {
            return Err(Error::Conversion(format!("duplicate template body '{}'", name)));
        }
        let content = template
            .inner_markup()
            .map_err(|e| Error::Conversion(format!("template body '{}': {}", name, e)))?;
        elements.push(PageElement { name, content });
    }
    if elements.is_empty() {
        return Err(Error::Conversion("legacy page has no <TEMPLATE> body".to_string()));
    }

    let page = StructuredPage::single(language.unwrap_or(DEFAULT_LOCALE), elements);
    Ok(page.to_xml()?.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_labels() {
        assert_eq!(TextEncoding::from_label("UTF-8"), Some(TextEncoding::Utf8));
        assert_eq!(TextEncoding::from_label(" iso_8859-1 "), Some(TextEncoding::Latin1));
        assert_eq!(TextEncoding::from_label("Latin1"), Some(TextEncoding::Latin1));
        assert_eq!(TextEncoding::from_label("ascii"), Some(TextEncoding::Ascii));
        assert_eq!(TextEncoding::from_label("shift-jis"), None);
        assert_eq!(TextEncoding::Latin1.to_string(), "ISO-8859-1");
    }

    #[test]
    fn test_decode() {
        assert_eq!(TextEncoding::Latin1.decode(&[0x47, 0x72, 0xfc, 0xdf]).unwrap(), "Grüß");
        assert!(TextEncoding::Utf8.decode(&[0xfc]).is_err());
        assert!(TextEncoding::Ascii.decode(&[0x41, 0x80]).is_err());
        assert_eq!(TextEncoding::Ascii.decode(b"plain").unwrap(), "plain");
    }

    #[test]
    fn test_convert_named_and_default_bodies() {
        let markup = br#"<?xml version="1.0" encoding="UTF-8"?>
<XMLTEMPLATE>
  <TEMPLATE><![CDATA[<p>Main</p>]]></TEMPLATE>
  <TEMPLATE name="sidebar"><![CDATA[<ul><li>x</li></ul>]]></TEMPLATE>
</XMLTEMPLATE>"#;
        let out = convert_legacy_page(markup, TextEncoding::Utf8, Some("de")).unwrap();
        let page = StructuredPage::parse(std::str::from_utf8(&out).unwrap()).unwrap();

        assert_eq!(page.element("de", "body"), Some("<p>Main</p>"));
        assert_eq!(page.element("de", "sidebar"), Some("<ul><li>x</li></ul>"));
    }

    #[test]
    fn test_convert_keeps_nested_markup() {
        let markup = b"<XMLTEMPLATE><TEMPLATE><p>Hello <b>world</b> &amp; more</p><br/></TEMPLATE>\
<TEMPLATE name=\"teaser\">Intro <i>only</i></TEMPLATE></XMLTEMPLATE>";
        let out = convert_legacy_page(markup, TextEncoding::Utf8, None).unwrap();
        let page = StructuredPage::parse(std::str::from_utf8(&out).unwrap()).unwrap();

        assert_eq!(
            page.element("en", "body"),
            Some("<p>Hello <b>world</b> &amp; more</p><br/>")
        );
        assert_eq!(page.element("en", "teaser"), Some("Intro <i>only</i>"));
    }

    #[test]
    fn test_convert_decodes_latin1() {
        let mut markup = b"<XMLTEMPLATE><TEMPLATE>Gr".to_vec();
        markup.push(0xfc);
        markup.extend_from_slice(b"n</TEMPLATE></XMLTEMPLATE>");

        let out = convert_legacy_page(&markup, TextEncoding::Latin1, None).unwrap();
        let page = StructuredPage::parse(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(page.element("en", "body"), Some("Grün"));
    }

    #[test]
    fn test_convert_failures() {
        assert!(convert_legacy_page(b"<html/>", TextEncoding::Utf8, None).is_err());
        assert!(convert_legacy_page(b"<XMLTEMPLATE/>", TextEncoding::Utf8, None).is_err());
        assert!(convert_legacy_page(b"<XMLTEMPLATE><TEMPLATE>", TextEncoding::Utf8, None).is_err());
        assert!(
            convert_legacy_page(
                b"<XMLTEMPLATE><TEMPLATE>a</TEMPLATE><TEMPLATE name=\"body\">b</TEMPLATE></XMLTEMPLATE>",
                TextEncoding::Utf8,
                None
            )
            .is_err()
        );
    }
}
