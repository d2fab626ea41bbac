// src/compat.rs

//! Structural compatibility check for legacy templates
//!
//! A legacy template can be carried over only when it has exactly the shape
//! the converter understands: one `<XMLTEMPLATE>` without attributes and
//! exactly two `<ELEMENTDEF>` declarations, each carrying a single non-empty
//! `name` attribute. Whitespace-only text is allowed between them. Any other
//! tag, attribute or non-blank text disqualifies the template.

use crate::xml::{parse_document, Node};
use tracing::debug;

/// Type name whose content is subject to the check
pub const TEMPLATE_TYPE: &str = "template";

const TEMPLATE_TAG: &str = "XMLTEMPLATE";
const ELEMENTDEF_TAG: &str = "ELEMENTDEF";
const TEMPLATE_COUNT: usize = 1;
const ELEMENTDEF_COUNT: usize = 2;

/// Check whether a resource's content has a compatible shape
///
/// Only `template` resources are checked; every other type is compatible.
/// Content that is not well-formed XML is incompatible.
pub fn check_compatibility(path: &str, content: &[u8], type_name: &str) -> bool {
    if type_name != TEMPLATE_TYPE {
        return true;
    }
    match find_violation(content) {
        None => true,
        Some(reason) => {
            debug!("{} is not a compatible template: {}", path, reason);
            false
        }
    }
}

fn find_violation(content: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(content) {
        Ok(t) => t.trim_start_matches('\u{FEFF}'),
        Err(e) => return Some(format!("not UTF-8: {}", e)),
    };
    let doc = match parse_document(text) {
        Ok(doc) => doc,
        Err(e) => return Some(e.to_string()),
    };

    let mut templates = 0;
    let mut elementdefs = 0;

    // Preorder: a node's children are visited before its next sibling
    let root = Node::Element(doc.root);
    let mut stack: Vec<&Node> = vec![&root];
    while let Some(node) = stack.pop() {
        match node {
            Node::Text(text) => {
                if !text.trim().is_empty() {
                    return Some(format!("unexpected text '{}'", text.trim()));
                }
            }
            Node::Element(element) => {
                match element.name.as_str() {
                    TEMPLATE_TAG => {
                        templates += 1;
                        if templates > TEMPLATE_COUNT {
                            return Some(format!("more than {} <{}>", TEMPLATE_COUNT, TEMPLATE_TAG));
                        }
                        if !element.attributes.is_empty() {
                            return Some(format!("<{}> has attributes", TEMPLATE_TAG));
                        }
                    }
                    ELEMENTDEF_TAG => {
                        elementdefs += 1;
                        if elementdefs > ELEMENTDEF_COUNT {
                            return Some(format!("more than {} <{}>", ELEMENTDEF_COUNT, ELEMENTDEF_TAG));
                        }
                        match element.attributes.as_slice() {
                            [(key, value)] if key == "name" && !value.trim().is_empty() => {}
                            _ => {
                                return Some(format!(
                                    "<{}> must carry exactly one non-empty name attribute",
                                    ELEMENTDEF_TAG
                                ));
                            }
                        }
                    }
                    other => return Some(format!("unexpected tag <{}>", other)),
                }
                stack.extend(element.children.iter().rev());
            }
        }
    }

    if templates != TEMPLATE_COUNT {
        return Some(format!("expected {} <{}>, found {}", TEMPLATE_COUNT, TEMPLATE_TAG, templates));
    }
    if elementdefs != ELEMENTDEF_COUNT {
        return Some(format!(
            "expected {} <{}>, found {}",
            ELEMENTDEF_COUNT, ELEMENTDEF_TAG, elementdefs
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"<?xml version="1.0"?>
<XMLTEMPLATE>
    <ELEMENTDEF name="head"/>
    <ELEMENTDEF name="body"></ELEMENTDEF>
</XMLTEMPLATE>
"#;

    #[test]
    fn test_compatible_template() {
        assert!(check_compatibility("/t.xml", GOOD.as_bytes(), "template"));
    }

    #[test]
    fn test_other_types_are_not_checked() {
        assert!(check_compatibility("/a.txt", b"not xml at all", "plain"));
    }

    #[test]
    fn test_extra_tag_fails() {
        let content = GOOD.replace("<ELEMENTDEF name=\"head\"/>", "<ELEMENTDEF name=\"head\"/><CLASS/>");
        assert!(!check_compatibility("/t.xml", content.as_bytes(), "template"));
    }

    #[test]
    fn test_stray_text_fails() {
        let content = GOOD.replace("<ELEMENTDEF name=\"body\"></ELEMENTDEF>", "<ELEMENTDEF name=\"body\">x</ELEMENTDEF>");
        assert!(!check_compatibility("/t.xml", content.as_bytes(), "template"));
    }

    #[test]
    fn test_three_elementdefs_fail() {
        let content = GOOD.replace("<ELEMENTDEF name=\"head\"/>", "<ELEMENTDEF name=\"head\"/><ELEMENTDEF name=\"foot\"/>");
        assert!(!check_compatibility("/t.xml", content.as_bytes(), "template"));
    }

    #[test]
    fn test_cardinality_and_attribute_rules() {
        let one_def = "<XMLTEMPLATE><ELEMENTDEF name=\"a\"/></XMLTEMPLATE>";
        assert!(!check_compatibility("/t", one_def.as_bytes(), "template"));

        let template_attr = "<XMLTEMPLATE id=\"1\"><ELEMENTDEF name=\"a\"/><ELEMENTDEF name=\"b\"/></XMLTEMPLATE>";
        assert!(!check_compatibility("/t", template_attr.as_bytes(), "template"));

        let extra_attr = "<XMLTEMPLATE><ELEMENTDEF name=\"a\" x=\"y\"/><ELEMENTDEF name=\"b\"/></XMLTEMPLATE>";
        assert!(!check_compatibility("/t", extra_attr.as_bytes(), "template"));

        let empty_name = "<XMLTEMPLATE><ELEMENTDEF name=\" \"/><ELEMENTDEF name=\"b\"/></XMLTEMPLATE>";
        assert!(!check_compatibility("/t", empty_name.as_bytes(), "template"));
    }

    #[test]
    fn test_malformed_fails() {
        assert!(!check_compatibility("/t", b"<XMLTEMPLATE><ELEMENTDEF name=\"a\">", "template"));
        assert!(!check_compatibility("/t", &[0xff, 0xfe], "template"));
    }
}
