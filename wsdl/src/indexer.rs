use suds_util::{
    soap::XSD_NAMESPACE,
    xml::{Document, Element},
};
use std::collections::HashMap;

use crate::loader::WSDL_NAMESPACE;

/// A string-keyed map that remembers first insertion order. Replacing a key
/// keeps its original position, so a later document that redefines a name
/// does not reorder the tables built from it.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    keys: Vec<String>,
    values: HashMap<String, V>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            values: HashMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn insert(&mut self, key: &str, value: V) {
        if self.values.insert(key.to_owned(), value).is_none() {
            self.keys.push(key.to_owned());
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.values.get(key)
    }

    pub fn entry(&mut self, key: &str) -> &mut V
    where
        V: Default,
    {
        if !self.values.contains_key(key) {
            self.keys.push(key.to_owned());
        }

        self.values.entry(key.to_owned()).or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.keys
            .iter()
            .filter_map(move |key| self.values.get(key).map(|value| (key.as_str(), value)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Definitions grouped by target namespace, then by name.
pub type Bucket = OrderedMap<OrderedMap<Element>>;

/// Collects every named definition out of the documents handed to it.
#[derive(Debug, Default)]
pub struct Indexer {
    pub(crate) messages: Bucket,
    pub(crate) operations: Bucket,
    pub(crate) bindings: Bucket,
    pub(crate) attributes: Bucket,
    pub(crate) types: Bucket,
    pub(crate) elements: Bucket,
    pub(crate) attribute_groups: Bucket,
}

impl Indexer {
    pub fn index(&mut self, document: &Document) {
        for definitions in document.elements_by_tag_ns(WSDL_NAMESPACE, "definitions") {
            self.index_definitions(definitions);
        }

        for schema in document.elements_by_tag_ns(XSD_NAMESPACE, "schema") {
            self.index_schema(schema);
        }
    }

    fn index_definitions(&mut self, definitions: &Element) {
        let target = definitions.attribute("targetNamespace").unwrap_or_default();

        for node in definitions.child_elements() {
            match node.name.as_str() {
                "message" => {
                    if let Some(name) = node.attribute("name") {
                        self.messages.entry(target).insert(name, node.clone());
                    }
                }

                "portType" => {
                    for operation in node.child_elements().filter(|child| child.name == "operation") {
                        if let Some(name) = operation.attribute("name") {
                            self.operations.entry(target).insert(name, operation.clone());
                        }
                    }
                }

                "binding" => {
                    for operation in node.child_elements().filter(|child| child.name == "operation") {
                        let name = match operation.attribute("name") {
                            Some(name) => name,
                            None => continue,
                        };

                        if let Some(soap) = operation.child_elements().find(|child| child.name == "operation") {
                            self.bindings.entry(target).insert(name, soap.clone());
                        }
                    }
                }

                _ => (),
            }
        }
    }

    fn index_schema(&mut self, schema: &Element) {
        let target = match schema.attribute("targetNamespace") {
            Some(target) => target,
            None => return,
        };

        // Keep namespace order stable even for schemas that only import.
        self.types.entry(target);

        for node in schema.child_elements() {
            let name = match node.attribute("name") {
                Some(name) => name,
                None => continue,
            };

            match node.name.as_str() {
                "attribute" => self.attributes.entry(target).insert(name, node.clone()),
                "attributeGroup" => self.attribute_groups.entry(target).insert(name, node.clone()),
                "complexType" | "simpleType" => self.types.entry(target).insert(name, node.clone()),

                "element" => {
                    let mut element = node.clone();

                    let inline = node
                        .child_elements()
                        .find(|child| matches!(child.name.as_str(), "complexType" | "simpleType"));

                    if let Some(inline) = inline {
                        let mut ty = inline.clone();
                        ty.set_attribute("name", name);
                        self.types.entry(target).insert(name, ty);
                        element.set_attribute("type", format!("{{{}}}{}", target, name));
                    }

                    self.elements.entry(target).insert(name, element);
                }

                _ => (),
            }
        }
    }
}
