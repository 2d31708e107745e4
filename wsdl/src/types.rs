use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved pointer into the namespace/type tables: `(namespace index,
/// type index)`. Namespace 0 is always the built-in XSD namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef(pub usize, pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// `None` for an `xsd:any` wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurs: Option<MaxOccurs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// `None` for an `xsd:anyAttribute` wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurs: Option<MaxOccurs>,
    /// Present (possibly empty) for every simple type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unions: Option<Vec<TypeRef>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageElement {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub soap_action: String,
    pub input: MessageElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<MessageElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<MessageElement>,
}

/// The compiled, serializable form of a schema: everything needed to
/// rebuild an engine without touching the WSDL graph again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub namespaces: Vec<Namespace>,
    pub types: Vec<Vec<TypeDescriptor>>,
    pub operations: BTreeMap<String, Operation>,
}

impl TypeRef {
    pub fn namespace(self) -> usize {
        self.0
    }

    pub fn index(self) -> usize {
        self.1
    }
}

impl Namespace {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|value| value == name)
    }
}

impl MaxOccurs {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "unbounded" => Some(Self::Unbounded),
            value => value.parse().ok().map(Self::Bounded),
        }
    }

    pub fn allows_many(self) -> bool {
        match self {
            Self::Bounded(max) => max > 1,
            Self::Unbounded => true,
        }
    }

    pub fn allows(self, count: usize) -> bool {
        match self {
            Self::Bounded(max) => count <= max as usize,
            Self::Unbounded => true,
        }
    }
}

impl ElementDescriptor {
    pub fn is_wildcard(&self) -> bool {
        self.name.is_none()
    }
}

impl AttributeDescriptor {
    pub fn is_wildcard(&self) -> bool {
        self.name.is_none()
    }
}

impl TypeDescriptor {
    pub fn is_simple(&self) -> bool {
        self.enumerations.is_some()
    }
}
