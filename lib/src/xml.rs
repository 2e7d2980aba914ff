//! Generic XML document tree.
//!
//! Element names are kept as written (qualified names keep their prefix), and
//! lookups of nested elements or attributes return `Option`, so callers can
//! tell a missing element apart from a document that failed to parse.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::{DrapeError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<XmlNode>,
    text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants (not including `self`) with the given name, in
    /// document order.
    pub fn descendants<'a, 'n>(&'a self, name: &'n str) -> Descendants<'a, 'n> {
        Descendants {
            stack: self.children.iter().rev().collect(),
            name,
        }
    }

    pub fn first_descendant(&self, name: &str) -> Option<&XmlNode> {
        self.descendants(name).next()
    }

    /// Character data directly inside this element, trimmed
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

pub struct Descendants<'a, 'n> {
    stack: Vec<&'a XmlNode>,
    name: &'n str,
}

impl<'a> Iterator for Descendants<'a, '_> {
    type Item = &'a XmlNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            if node.name == self.name {
                return Some(node);
            }
        }
        None
    }
}

fn malformed(e: impl std::fmt::Display) -> DrapeError {
    DrapeError::MalformedDocument(e.to_string())
}

fn start_node(start: &BytesStart) -> Result<XmlNode> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => return Err(malformed("more than one root element")),
        None => *root = Some(node),
    }
    Ok(())
}

/// Parse a whole document and return its root element.
pub fn parse_document(text: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => stack.push(start_node(&e)?),
            Event::Empty(e) => {
                let node = start_node(&e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed("unexpected closing tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(e) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&e.unescape().map_err(malformed)?);
                }
            }
            Event::CData(e) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <kml xmlns="http://www.opengis.net/kml/2.2">
              <Document>
                <Placemark id="a"><name>First &amp; best</name></Placemark>
                <Folder><Placemark id="b"/></Folder>
              </Document>
            </kml>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "kml");
        assert_eq!(doc.attribute("xmlns"), Some("http://www.opengis.net/kml/2.2"));

        let ids: Vec<_> = doc
            .descendants("Placemark")
            .filter_map(|p| p.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let name = doc.first_descendant("name").unwrap();
        assert_eq!(name.text(), "First & best");
    }

    #[test]
    fn test_missing_elements_are_absent() {
        let doc = parse_document("<kml><Placemark/></kml>").unwrap();
        let placemark = doc.child("Placemark").unwrap();
        assert!(placemark.attribute("id").is_none());
        assert!(placemark.first_descendant("Polygon").is_none());
        assert!(doc.child("Document").is_none());
    }

    #[test]
    fn test_cdata_text() {
        let doc = parse_document("<a><b><![CDATA[<i>raw</i>]]></b></a>").unwrap();
        assert_eq!(doc.child("b").unwrap().text(), "<i>raw</i>");
    }

    #[test]
    fn test_first_descendant_outlives_name() {
        let doc = parse_document("<kml><Document><Placemark id=\"p\"/></Document></kml>").unwrap();
        let found = {
            let name = String::from("Placemark");
            doc.first_descendant(&name)
        };
        assert_eq!(found.and_then(|p| p.attribute("id")), Some("p"));
    }

    #[test]
    fn test_descendants_do_not_include_self() {
        let doc = parse_document("<Polygon><Polygon/></Polygon>").unwrap();
        assert_eq!(doc.descendants("Polygon").count(), 1);
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let result = parse_document("<kml><Document></kml>");
        assert!(matches!(result, Err(DrapeError::MalformedDocument(_))));
    }

    #[test]
    fn test_unclosed_element_is_malformed() {
        let result = parse_document("<kml><Document>");
        assert!(matches!(result, Err(DrapeError::MalformedDocument(_))));
    }

    #[test]
    fn test_empty_document_is_malformed() {
        assert!(matches!(
            parse_document("   "),
            Err(DrapeError::MalformedDocument(_))
        ));
    }
}
