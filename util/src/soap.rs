use super::xml::{self, Document, Element};

pub const SOAP_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// A SOAP 1.1 envelope, either built for a request or parsed from a
/// response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    document: Document,
}

impl Envelope {
    pub fn new(body: Element) -> Self {
        let mut envelope = Self::empty();

        if let Some(container) = envelope.body_mut() {
            container.push_child(body);
        }

        envelope
    }

    pub fn empty() -> Self {
        let mut envelope = Element::prefixed(SOAP_NAMESPACE, "soapenv", "Envelope");
        envelope.declare_namespace(Some("xsd"), XSD_NAMESPACE);
        envelope.declare_namespace(Some("xsi"), XSI_NAMESPACE);
        envelope.push_child(Element::prefixed(SOAP_NAMESPACE, "soapenv", "Body"));

        Self {
            document: Document::new(envelope),
        }
    }

    pub fn from_response(bytes: &[u8]) -> Result<Self, xml::Error> {
        Ok(Self {
            document: Document::from_bytes(bytes)?,
        })
    }

    pub fn to_request(&self) -> Result<String, xml::Error> {
        self.document.to_xml_string()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn root_mut(&mut self) -> &mut Element {
        self.document.root_mut()
    }

    pub fn body(&self) -> Option<&Element> {
        self.document
            .root()
            .child_elements()
            .find(|element| element.is(SOAP_NAMESPACE, "Body"))
    }

    pub fn body_mut(&mut self) -> Option<&mut Element> {
        self.document
            .root_mut()
            .children
            .iter_mut()
            .find_map(|child| match child {
                xml::Node::Element(element) if element.is(SOAP_NAMESPACE, "Body") => Some(element),
                _ => None,
            })
    }

    /// First element anywhere in the envelope with the given name.
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.is(namespace, name))
    }

    /// First element anywhere in the envelope with the given local name,
    /// regardless of namespace. Fault parts are unqualified in practice.
    pub fn find_local(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        let root = self.document.root();
        std::iter::once(root).chain(root.descendants())
    }
}
