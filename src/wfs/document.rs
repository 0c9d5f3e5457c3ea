//! Namespace-aware XML element tree
//!
//! GetFeature responses are small enough (one page of sheets) to hold in
//! memory, and the interpreter needs random access (`boundedBy` sits before
//! the members, dates are scattered below them), so the streaming events
//! from `quick-xml` are folded into an owned tree once.

use crate::error::{OrthowatchError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

/// Element name resolved against its namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QualifiedName {
    /// True when both namespace URI and local name match
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// One XML element with its attributes, text and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QualifiedName,
    /// Attributes keyed by local name; namespace prefixes are dropped
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value by local name
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == local)
            .map(|(_, v)| v.as_str())
    }

    /// Text content, `None` when empty
    pub fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }

    /// First direct child with the given name
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name.is(namespace, local))
    }

    /// First descendant (document order, self excluded) with the given name
    pub fn find(&self, namespace: &str, local: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name.is(namespace, local) {
                return Some(child);
            }
            if let Some(found) = child.find(namespace, local) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant (document order, self excluded) with the given name
    pub fn find_all<'a>(&'a self, namespace: &str, local: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(namespace, local, &mut found);
        found
    }

    fn collect<'a>(&'a self, namespace: &str, local: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name.is(namespace, local) {
                out.push(child);
            }
            child.collect(namespace, local, out);
        }
    }
}

/// A parsed response body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parse a UTF-8 XML document
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Parse` for malformed XML, mismatched tags,
    /// or a document without a root element
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = NsReader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position() as u64;
            let (ns, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| parse_error(position, e))?;

            match event {
                Event::Start(start) => {
                    let element = open_element(ns, &start, position)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(ns, &start, position)?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        OrthowatchError::Parse(format!("unexpected end tag at byte {}", position))
                    })?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let value = text.unescape().map_err(|e| parse_error(position, e))?;
                        let value = value.trim();
                        if !value.is_empty() {
                            current.text.push_str(value);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(String::from_utf8_lossy(&data.into_inner()).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(OrthowatchError::Parse(format!(
                "document ended with {} unclosed element(s)",
                stack.len()
            ))
            .into());
        }

        root.map(|root| Self { root })
            .ok_or_else(|| OrthowatchError::Parse("document has no root element".to_string()).into())
    }
}

fn parse_error(position: u64, err: impl std::fmt::Display) -> OrthowatchError {
    OrthowatchError::Parse(format!("at byte {}: {}", position, err))
}

fn open_element(ns: ResolveResult<'_>, start: &BytesStart<'_>, position: u64) -> Result<Element> {
    let namespace = match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| parse_error(position, e))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name: QualifiedName { namespace, local },
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(OrthowatchError::Parse(format!(
                "second root element <{}> at byte {}",
                element.name, position
            ))
            .into())
        }
    }
    Ok(())
}
