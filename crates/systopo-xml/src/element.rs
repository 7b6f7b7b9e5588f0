//! Minimal owned XML element tree
//!
//! The exchange document is built and read as a tree of [`Element`]s so
//! custom codec fragments can be spliced in and cut out as plain XML text.
//! Parsing and writing go through quick-xml's event API.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

use crate::error::{Result, XmlError};

/// Deepest element nesting accepted when parsing or writing
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push_attr(key, value);
        self
    }

    pub fn push_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attributes.push((key.into(), value.to_string()));
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute that must be present, as a `Malformed` error otherwise
    pub fn required_attr(&self, key: &str) -> Result<&str> {
        self.attr(key).ok_or_else(|| {
            XmlError::Malformed(format!("<{}> is missing attribute '{}'", self.name, key))
        })
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Parse a document with exactly one root element
    pub fn parse(xml: &str) -> Result<Element> {
        let mut roots = parse_nodes(xml)?.into_iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        });
        let root = roots
            .next()
            .ok_or_else(|| XmlError::Malformed("document has no root element".to_string()))?;
        if roots.next().is_some() {
            return Err(XmlError::Malformed(
                "document has more than one root element".to_string(),
            ));
        }
        Ok(root)
    }

    /// Parse a fragment that may hold several top-level nodes
    pub fn parse_fragment(xml: &str) -> Result<Vec<Node>> {
        parse_nodes(xml)
    }

    /// Serialize this element alone, `indent` spaces per level (0 = compact)
    pub fn to_xml(&self, indent: usize) -> Result<String> {
        let mut writer = new_writer(indent);
        self.write(&mut writer, 1)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Serialize as a full document, optionally with an XML declaration
    pub fn to_document(&self, indent: usize, declaration: bool) -> Result<String> {
        let mut writer = new_writer(indent);
        if declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        self.write(&mut writer, 1)?;
        let mut out = String::from_utf8(writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(XmlError::TooDeep(MAX_DEPTH));
        }
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                Node::Element(e) => e.write(writer, depth + 1)?,
                Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn new_writer(indent: usize) -> Writer<Vec<u8>> {
    if indent > 0 {
        Writer::new_with_indent(Vec::new(), b' ', indent)
    } else {
        Writer::new(Vec::new())
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8(start.name().as_ref().to_vec())?);
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn push_node(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn check_depth(stack: &[Element]) -> Result<()> {
    if stack.len() >= MAX_DEPTH {
        return Err(XmlError::Malformed(format!(
            "elements nest deeper than {} levels",
            MAX_DEPTH
        )));
    }
    Ok(())
}

// Whitespace-only text is layout and gets dropped; any other text is kept
// verbatim, surrounding spaces included.
fn parse_nodes(xml: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut top = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                check_depth(&stack)?;
                stack.push(start_element(&start)?);
            }
            Event::Empty(start) => {
                check_depth(&stack)?;
                let element = start_element(&start)?;
                push_node(&mut stack, &mut top, Node::Element(element));
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced closing tag".to_string()))?;
                push_node(&mut stack, &mut top, Node::Element(element));
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                if !text.trim().is_empty() {
                    push_node(&mut stack, &mut top, Node::Text(text));
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())?;
                push_node(&mut stack, &mut top, Node::Text(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Malformed(format!("unclosed element <{}>", open.name)));
    }
    Ok(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let xml = r#"<?xml version="1.0"?>
<root a="1">
    <child name="x &amp; y"/>
    <child name="z">some &lt;text&gt;</child>
</root>"#;

        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.attr("a"), Some("1"));
        let children: Vec<_> = root.elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].attr("name"), Some("x & y"));
        assert_eq!(children[1].text(), "some <text>");
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn test_write_escapes_and_reparses() {
        let mut root = Element::new("root").with_attr("quote", "a\"b<c");
        let mut child = Element::new("child");
        child.children.push(Node::Text("1 < 2".to_string()));
        root.push_child(child);

        let xml = root.to_document(2, true).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(Element::parse(&xml).unwrap(), root);
        assert_eq!(Element::parse(&root.to_xml(0).unwrap()).unwrap(), root);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(Element::parse(""), Err(XmlError::Malformed(_))));
        assert!(matches!(Element::parse("<a/><b/>"), Err(XmlError::Malformed(_))));
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(matches!(Element::parse("<a>"), Err(XmlError::Malformed(_))));
    }

    #[test]
    fn test_fragment_with_several_nodes() {
        let nodes = Element::parse_fragment("<a/><b k=\"v\"/>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[1], Node::Element(e) if e.attr("k") == Some("v")));
    }

    #[test]
    fn test_text_keeps_inner_whitespace() {
        let root = Element::parse("<t>  two  spaces </t>").unwrap();
        assert_eq!(root.text(), "  two  spaces ");

        let mut outer = Element::new("outer");
        outer.push_child(root.clone());
        let xml = outer.to_document(2, false).unwrap();
        let back = Element::parse(&xml).unwrap();
        assert_eq!(back.find("t").unwrap().text(), "  two  spaces ");
        assert_eq!(back, outer);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "<n>".repeat(50_000) + &"</n>".repeat(50_000);
        assert!(matches!(Element::parse(&deep), Err(XmlError::Malformed(_))));
        let deep_empty = "<n>".repeat(MAX_DEPTH) + "<leaf/>" + &"</n>".repeat(MAX_DEPTH);
        assert!(matches!(
            Element::parse_fragment(&deep_empty),
            Err(XmlError::Malformed(_))
        ));

        let at_limit = "<n>".repeat(MAX_DEPTH) + &"</n>".repeat(MAX_DEPTH);
        let root = Element::parse(&at_limit).unwrap();
        assert_eq!(Element::parse(&root.to_xml(0).unwrap()).unwrap(), root);

        let mut too_deep = Element::new("n");
        for _ in 0..MAX_DEPTH {
            let mut parent = Element::new("n");
            parent.push_child(too_deep);
            too_deep = parent;
        }
        assert!(matches!(too_deep.to_xml(0), Err(XmlError::TooDeep(MAX_DEPTH))));
    }

    #[test]
    fn test_required_attr() {
        let e = Element::new("datapath").with_attr("source", 3);
        assert_eq!(e.required_attr("source").unwrap(), "3");
        assert!(matches!(e.required_attr("target"), Err(XmlError::Malformed(_))));
    }
}
