//! A small owned XML tree on top of `quick-xml`.
//!
//! Schema processing needs random access (descendant scans, parent
//! checks, namespace prefix lookups) so documents are read into a tree
//! once and written back out with namespace declarations computed on the
//! fly.

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::{collections::BTreeMap, io::Cursor, io::Write, sync::Arc};
use thiserror::Error;

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error parsing XML input")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Closing tag without a matching opening tag")]
    UnbalancedTags,

    #[error("Document has no root element")]
    EmptyDocument,

    #[error("Document is not valid UTF-8")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// Prefix to namespace bindings in scope at an element; the default
/// namespace is stored under the empty prefix.
type Scope = Arc<BTreeMap<String, String>>;

fn split_qualified_name(qualified_name: &str) -> (Option<&str>, &str) {
    match qualified_name.split_once(':') {
        Some((prefix, local_name)) => (Some(prefix), local_name),
        None => (None, qualified_name),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    declarations: Vec<(String, String)>,
    scope: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Attribute {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            namespace: None,
            value: value.into(),
        }
    }

    pub fn namespaced<V: Into<String>>(namespace: &str, prefix: &str, name: &str, value: V) -> Self {
        Self {
            prefix: Some(prefix.to_owned()),
            name: name.to_owned(),
            namespace: Some(namespace.to_owned()),
            value: value.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

impl Element {
    /// Creates an unprefixed element; when written it will carry a default
    /// namespace declaration if its namespace differs from its parent's.
    pub fn new<S: Into<String>>(namespace: Option<&str>, name: S) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            namespace: namespace.map(ToOwned::to_owned),
            attributes: Vec::new(),
            children: Vec::new(),
            declarations: Vec::new(),
            scope: Scope::default(),
        }
    }

    pub fn prefixed(namespace: &str, prefix: &str, name: &str) -> Self {
        let mut element = Self::new(Some(namespace), name);
        element.prefix = Some(prefix.to_owned());
        element.declare_namespace(Some(prefix), namespace);
        element
    }

    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Looks an attribute up by its qualified name, as written in the source.
    pub fn attribute(&self, qualified_name: &str) -> Option<&str> {
        let (prefix, name) = split_qualified_name(qualified_name);

        self.attributes
            .iter()
            .find(|attribute| attribute.prefix.as_deref() == prefix && attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    pub fn attribute_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| {
                attribute.namespace.as_deref() == Some(namespace) && attribute.name == name
            })
            .map(|attribute| attribute.value.as_str())
    }

    pub fn set_attribute<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.push_attribute(Attribute::new(name, value));
    }

    pub fn push_attribute(&mut self, attribute: Attribute) {
        let existing = self.attributes.iter_mut().find(|existing| {
            existing.name == attribute.name && existing.namespace == attribute.namespace
        });

        match existing {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn declare_namespace(&mut self, prefix: Option<&str>, namespace: &str) {
        let prefix = prefix.unwrap_or_default().to_owned();
        let mut scope = (*self.scope).clone();
        scope.insert(prefix.clone(), namespace.to_owned());
        self.scope = Arc::new(scope);

        self.declarations.retain(|(existing, _)| *existing != prefix);
        self.declarations.push((prefix, namespace.to_owned()));
    }

    /// Resolves a prefix against the declarations in scope at this element.
    /// `None` asks for the default namespace.
    pub fn lookup_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            Some("xml") => Some(XML_NAMESPACE),
            Some(prefix) => self.scope.get(prefix).map(String::as_str),
            None => self
                .scope
                .get("")
                .map(String::as_str)
                .filter(|namespace| !namespace.is_empty()),
        }
    }

    pub fn lookup_prefix(&self, namespace: &str) -> Option<&str> {
        self.scope
            .iter()
            .find(|(prefix, value)| !prefix.is_empty() && *value == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text<S: Into<String>>(&mut self, text: S) {
        let text = text.into();

        match self.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(&text),
            _ => self.children.push(Node::Text(text)),
        }
    }

    pub fn child_elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn first_child_element(&self) -> Option<&Element> {
        self.child_elements().next()
    }

    /// Depth-first, document-order walk over every element below this one.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.child_elements().rev().collect(),
        }
    }

    pub fn elements_by_tag_ns<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |element| element.is(namespace, name))
    }

    pub fn elements_by_local_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |element| element.name == name)
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(value) => text.push_str(value),
                Node::Element(element) => element.collect_text(text),
            }
        }
    }

    pub fn to_xml_string(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_element(&mut writer, self, &BTreeMap::new())?;
        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.child_elements().rev());
        Some(element)
    }
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        parse(text)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let text = String::from_utf8(bytes.to_vec())?;
        parse(&text)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    /// Like [`Element::elements_by_tag_ns`] but includes the root itself.
    pub fn elements_by_tag_ns<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        std::iter::once(&self.root)
            .chain(self.root.descendants())
            .filter(move |element| element.is(namespace, name))
    }

    pub fn elements_by_local_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        std::iter::once(&self.root)
            .chain(self.root.descendants())
            .filter(move |element| element.name == name)
    }

    pub fn to_xml_string(&self) -> Result<String, Error> {
        self.root.to_xml_string()
    }
}

fn open_element<B: std::io::BufRead>(
    reader: &Reader<B>,
    start: &BytesStart<'_>,
    parent_scope: Option<&Scope>,
) -> Result<Element, Error> {
    let (prefix, name) = {
        let qualified_name = reader.decode(start.name())?;
        let (prefix, name) = split_qualified_name(qualified_name);
        (prefix.map(ToOwned::to_owned), name.to_owned())
    };

    let mut declarations = Vec::new();
    let mut attributes = Vec::new();

    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = reader.decode(attribute.key)?;
        let value = attribute.unescape_and_decode_value(reader)?;

        match split_qualified_name(key) {
            (None, "xmlns") => declarations.push((String::new(), value)),
            (Some("xmlns"), declared) => declarations.push((declared.to_owned(), value)),
            (prefix, local_name) => attributes.push(Attribute {
                prefix: prefix.map(ToOwned::to_owned),
                name: local_name.to_owned(),
                namespace: None,
                value,
            }),
        }
    }

    let scope = match (parent_scope, declarations.is_empty()) {
        (Some(scope), true) => scope.clone(),
        (parent, _) => {
            let mut scope = parent.map(|scope| (**scope).clone()).unwrap_or_default();
            scope.extend(declarations.iter().cloned());
            Arc::new(scope)
        }
    };

    let mut element = Element {
        prefix,
        name,
        namespace: None,
        attributes,
        children: Vec::new(),
        declarations,
        scope,
    };

    element.namespace = element
        .lookup_namespace(element.prefix.as_deref())
        .map(ToOwned::to_owned);

    for index in 0..element.attributes.len() {
        let namespace = element.attributes[index]
            .prefix
            .as_deref()
            .and_then(|prefix| element.lookup_namespace(Some(prefix)))
            .map(ToOwned::to_owned);
        element.attributes[index].namespace = namespace;
    }

    Ok(element)
}

fn parse(text: &str) -> Result<Document, Error> {
    let mut reader = Reader::from_str(text);
    reader.expand_empty_elements(true);

    let mut buffer = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event(&mut buffer)? {
            Event::Start(start) => {
                let element = open_element(&reader, &start, stack.last().map(|parent| &parent.scope))?;
                stack.push(element);
            }

            Event::End(..) => {
                let element = stack.pop().ok_or(Error::UnbalancedTags)?;

                match stack.last_mut() {
                    Some(parent) => parent.push_child(element),
                    None => root = Some(element),
                }
            }

            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(text.unescape_and_decode(&reader)?);
                }
            }

            Event::CData(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(reader.decode(&text)?);
                }
            }

            Event::Eof => break,

            _ => (),
        }

        buffer.clear();
    }

    if !stack.is_empty() {
        return Err(Error::UnbalancedTags);
    }

    root.map(Document::new).ok_or(Error::EmptyDocument)
}

fn in_scope<'a>(scope: &'a BTreeMap<String, String>, prefix: &str) -> Option<&'a str> {
    match scope.get(prefix) {
        Some(namespace) => Some(namespace.as_str()),
        None if prefix.is_empty() => Some(""),
        None => None,
    }
}

fn declare(start: &mut BytesStart<'_>, scope: &mut BTreeMap<String, String>, prefix: &str, namespace: &str) {
    if in_scope(scope, prefix) == Some(namespace) {
        return;
    }

    let key = if prefix.is_empty() {
        "xmlns".to_owned()
    } else {
        format!("xmlns:{}", prefix)
    };

    start.push_attribute((key.as_str(), namespace));
    scope.insert(prefix.to_owned(), namespace.to_owned());
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    parent_scope: &BTreeMap<String, String>,
) -> Result<(), Error> {
    let mut scope = parent_scope.clone();
    let name = element.qualified_name();
    let mut start = BytesStart::owned_name(name.clone());

    for (prefix, namespace) in &element.declarations {
        declare(&mut start, &mut scope, prefix, namespace);
    }

    declare(
        &mut start,
        &mut scope,
        element.prefix.as_deref().unwrap_or_default(),
        element.namespace.as_deref().unwrap_or_default(),
    );

    for attribute in &element.attributes {
        if let (Some(prefix), Some(namespace)) = (&attribute.prefix, &attribute.namespace) {
            if prefix != "xml" {
                declare(&mut start, &mut scope, prefix, namespace);
            }
        }
    }

    for attribute in &element.attributes {
        let key = attribute.qualified_name();
        start.push_attribute((key.as_str(), attribute.value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    for child in &element.children {
        match child {
            Node::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_plain_str(text)))?;
            }
            Node::Element(child) => write_element(writer, child, &scope)?,
        }
    }

    writer.write_event(Event::End(BytesEnd::owned(name.into_bytes())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:tns="urn:test" targetNamespace="urn:test">
  <xsd:complexType name="Pair">
    <xsd:sequence>
      <xsd:element name="left" type="xsd:string"/>
      <xsd:element name="right" type="tns:Other"/>
    </xsd:sequence>
  </xsd:complexType>
</xsd:schema>"#;

    #[test]
    fn resolves_element_namespaces_from_prefixes() {
        let document = Document::parse(SCHEMA).unwrap();
        let root = document.root();

        assert_eq!(root.name, "schema");
        assert_eq!(root.namespace.as_deref(), Some("http://www.w3.org/2001/XMLSchema"));
        assert_eq!(root.attribute("targetNamespace"), Some("urn:test"));

        let elements = root
            .elements_by_tag_ns("http://www.w3.org/2001/XMLSchema", "element")
            .map(|element| element.attribute("name").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(elements, ["left", "right"]);
    }

    #[test]
    fn nested_elements_see_ancestor_declarations() {
        let document = Document::parse(SCHEMA).unwrap();
        let right = document.elements_by_local_name("element").nth(1).unwrap();

        assert_eq!(right.lookup_namespace(Some("tns")), Some("urn:test"));
        assert_eq!(right.lookup_namespace(Some("missing")), None);
        assert_eq!(right.lookup_prefix("urn:test"), Some("tns"));
    }

    #[test]
    fn descendants_are_in_document_order() {
        let document = Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let names = document
            .root()
            .descendants()
            .map(|element| element.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, ["b", "c", "d"]);
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let document = Document::parse("<a>one<b>two</b><![CDATA[<three>]]></a>").unwrap();
        assert_eq!(document.root().text_content(), "onetwo<three>");
    }

    #[test]
    fn writer_declares_default_namespace_once() {
        let mut parent = Element::new(Some("urn:echo"), "Echo");
        let mut child = Element::new(Some("urn:echo"), "message");
        child.push_text("a < b");
        parent.push_child(child);

        assert_eq!(
            parent.to_xml_string().unwrap(),
            r#"<Echo xmlns="urn:echo"><message>a &lt; b</message></Echo>"#
        );
    }

    #[test]
    fn writer_declares_attribute_prefixes() {
        let mut element = Element::new(Some("urn:a"), "item");
        element.push_attribute(Attribute::namespaced(
            "http://www.w3.org/2001/XMLSchema-instance",
            "xsi",
            "type",
            "Derived",
        ));

        let text = element.to_xml_string().unwrap();
        let reparsed = Document::parse(&text).unwrap();

        assert_eq!(
            reparsed
                .root()
                .attribute_ns("http://www.w3.org/2001/XMLSchema-instance", "type"),
            Some("Derived")
        );
        assert_eq!(reparsed.root().namespace.as_deref(), Some("urn:a"));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(Document::parse("<a><b></a>").is_err());
        assert!(matches!(Document::parse(""), Err(Error::EmptyDocument)));
    }
}
