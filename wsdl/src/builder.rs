//! Compiles indexed schema definitions into the namespace/type tables.

use std::collections::BTreeMap;
use suds_util::{
    soap::XSD_NAMESPACE,
    xml::{Element, XML_NAMESPACE},
};
use tracing::{debug, warn};

use crate::{
    error::Error,
    indexer::{Bucket, Indexer, OrderedMap},
    schema::{split_reference, xsd_namespace, xsd_type, TypeIndex, ANY_TYPE, XSD_TYPES},
    types::{
        AttributeDescriptor, ElementDescriptor, MaxOccurs, MessageElement, Namespace, Operation, Snapshot,
        TypeDescriptor,
    },
};

pub fn build(indexer: &Indexer) -> Result<Snapshot, Error> {
    let buckets: Vec<(&str, &OrderedMap<Element>)> = indexer
        .types
        .iter()
        .filter(|(namespace, _)| *namespace != XSD_NAMESPACE)
        .collect();

    let mut namespaces = vec![xsd_namespace()];
    namespaces.extend(buckets.iter().map(|(namespace, types)| Namespace {
        name: (*namespace).to_owned(),
        types: types.keys().map(ToOwned::to_owned).collect(),
    }));

    let builder = Builder {
        indexer,
        index: TypeIndex::new(&namespaces),
    };

    let mut types = vec![vec![TypeDescriptor::default(); XSD_TYPES.len()]];
    for (namespace, bucket) in buckets {
        debug!(namespace, types = bucket.len(), "building types");

        let descriptors = bucket
            .iter()
            .map(|(_, node)| builder.descriptor(node))
            .collect::<Result<Vec<_>, _>>()?;

        types.push(descriptors);
    }

    let operations = builder.operations()?;

    Ok(Snapshot {
        namespaces,
        types,
        operations,
    })
}

struct Builder<'a> {
    indexer: &'a Indexer,
    index: TypeIndex,
}

fn is_xsd(node: &Element) -> bool {
    node.namespace.as_deref() == Some(XSD_NAMESPACE)
}

/// Schema nodes below `parent` paired with their parent, in document order.
/// Does not descend into element or attribute declarations, so nested
/// anonymous types stay out of the enclosing type.
fn walk<'a>(parent: &'a Element, out: &mut Vec<(&'a Element, &'a Element)>) {
    for child in parent.child_elements().filter(|child| is_xsd(child)) {
        out.push((parent, child));

        if !matches!(child.name.as_str(), "element" | "attribute") {
            walk(child, out);
        }
    }
}

fn min_occurs(node: &Element) -> Option<u32> {
    node.attribute("minOccurs").and_then(|value| value.trim().parse().ok())
}

fn max_occurs(node: &Element) -> Option<MaxOccurs> {
    node.attribute("maxOccurs").and_then(MaxOccurs::parse)
}

fn wildcard(node: &Element) -> ElementDescriptor {
    ElementDescriptor {
        name: None,
        ty: ANY_TYPE,
        min_occurs: min_occurs(node),
        max_occurs: max_occurs(node),
    }
}

fn any_attribute() -> AttributeDescriptor {
    AttributeDescriptor {
        name: None,
        ty: ANY_TYPE,
        required: false,
    }
}

impl<'a> Builder<'a> {
    fn descriptor(&self, node: &Element) -> Result<TypeDescriptor, Error> {
        let mut nodes = Vec::new();
        walk(node, &mut nodes);

        if node.name == "simpleType" {
            return self.simple(&nodes);
        }

        let mut descriptor = TypeDescriptor::default();

        for group in node
            .child_elements()
            .filter(|child| is_xsd(child) && matches!(child.name.as_str(), "sequence" | "choice" | "all"))
        {
            descriptor.min_occurs = min_occurs(group).or(descriptor.min_occurs);
            descriptor.max_occurs = max_occurs(group).or(descriptor.max_occurs);
        }

        for (parent, child) in nodes.iter().filter(|(_, child)| child.name == "element") {
            let mut element = self.element(child)?;

            if parent.name == "choice" {
                element.min_occurs = Some(0);
                descriptor.max_occurs = max_occurs(parent).or(descriptor.max_occurs);
            }

            descriptor.elements.push(element);
        }

        for (_, child) in nodes.iter().filter(|(_, child)| child.name == "any") {
            descriptor.elements.push(wildcard(child));
        }

        for element in &mut descriptor.elements {
            element.min_occurs = element.min_occurs.or(descriptor.min_occurs);
            element.max_occurs = element.max_occurs.or(descriptor.max_occurs);
        }

        for (_, child) in nodes.iter().filter(|(_, child)| child.name == "attribute") {
            descriptor.attributes.push(self.attribute(child)?);
        }

        for _ in nodes.iter().filter(|(_, child)| child.name == "anyAttribute") {
            descriptor.attributes.push(any_attribute());
        }

        for (_, child) in nodes.iter().filter(|(_, child)| child.name == "attributeGroup") {
            let reference = match child.attribute("ref") {
                Some(reference) => reference,
                None => continue,
            };

            let group = self.global(&self.indexer.attribute_groups, child, reference, "attributeGroup")?;
            for member in group.descendants().filter(|member| is_xsd(member)) {
                match member.name.as_str() {
                    "attribute" => descriptor.attributes.push(self.attribute(member)?),
                    "anyAttribute" => descriptor.attributes.push(any_attribute()),
                    _ => (),
                }
            }
        }

        descriptor.base = nodes
            .iter()
            .find(|(_, child)| child.name == "extension")
            .map(|(_, extension)| {
                let base = extension.attribute("base").ok_or(Error::MissingAttribute {
                    element: "extension".into(),
                    attribute: "base",
                })?;

                self.index.resolve(extension, base, None)
            })
            .transpose()?;

        Ok(descriptor)
    }

    fn simple(&self, nodes: &[(&Element, &Element)]) -> Result<TypeDescriptor, Error> {
        let enumerations = nodes
            .iter()
            .filter(|(parent, child)| parent.name == "restriction" && child.name == "enumeration")
            .filter_map(|(_, child)| child.attribute("value"))
            .map(ToOwned::to_owned)
            .collect();

        let unions = match nodes.iter().find(|(_, child)| child.name == "union") {
            Some((_, union)) => Some(
                union
                    .attribute("memberTypes")
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(|member| self.index.resolve(union, member, None))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        Ok(TypeDescriptor {
            enumerations: Some(enumerations),
            unions,
            ..TypeDescriptor::default()
        })
    }

    fn element(&self, node: &Element) -> Result<ElementDescriptor, Error> {
        let source = match node.attribute("ref") {
            Some(reference) => self.global(&self.indexer.elements, node, reference, "element")?,
            None => node,
        };

        let name = source.attribute("name").ok_or(Error::MissingAttribute {
            element: "element".into(),
            attribute: "name",
        })?;

        let ty = match source.attribute("type") {
            Some(ty) => self.index.resolve(source, ty, None)?,
            None => ANY_TYPE,
        };

        Ok(ElementDescriptor {
            name: Some(name.to_owned()),
            ty,
            min_occurs: min_occurs(node),
            max_occurs: max_occurs(node),
        })
    }

    fn attribute(&self, node: &Element) -> Result<AttributeDescriptor, Error> {
        let string = xsd_type("string").unwrap_or(ANY_TYPE);
        let required = node.attribute("use") == Some("required");

        let source = match node.attribute("ref") {
            Some(reference) => match self.global(&self.indexer.attributes, node, reference, "attribute") {
                Ok(source) => source,

                // xml:lang and friends are never declared by the services
                Err(_) if split_reference(node, reference, None).0 == Some(XML_NAMESPACE) => {
                    return Ok(AttributeDescriptor {
                        name: Some(split_reference(node, reference, None).1.to_owned()),
                        ty: string,
                        required,
                    })
                }

                Err(err) => return Err(err),
            },
            None => node,
        };

        let name = source.attribute("name").ok_or(Error::MissingAttribute {
            element: "attribute".into(),
            attribute: "name",
        })?;

        let ty = match source.attribute("type") {
            Some(ty) => self.index.resolve(source, ty, None)?,
            None => string,
        };

        Ok(AttributeDescriptor {
            name: Some(name.to_owned()),
            ty,
            required,
        })
    }

    /// Looks up a global definition by QName, falling back to any namespace
    /// that defines the name.
    fn global<'b>(
        &self,
        bucket: &'b Bucket,
        node: &Element,
        reference: &str,
        kind: &'static str,
    ) -> Result<&'b Element, Error> {
        let (namespace, name) = split_reference(node, reference, node.lookup_namespace(None));

        namespace
            .and_then(|namespace| bucket.get(namespace))
            .and_then(|definitions| definitions.get(name))
            .or_else(|| bucket.iter().find_map(|(_, definitions)| definitions.get(name)))
            .ok_or_else(|| Error::UnresolvedReference {
                kind,
                name: reference.to_owned(),
            })
    }

    fn operations(&self) -> Result<BTreeMap<String, Operation>, Error> {
        let mut operations = BTreeMap::new();

        for (namespace, port) in self.indexer.operations.iter() {
            for (name, node) in port.iter() {
                let message = |kind: &str| node.child_elements().find(|child| child.name == kind);

                let input = match message("input") {
                    Some(input) => self.message_element(input)?,
                    None => None,
                };

                let input = match input {
                    Some(input) => input,
                    None => {
                        warn!(operation = name, "skipping operation without a document style input");
                        continue;
                    }
                };

                let output = match message("output") {
                    Some(output) => self.message_element(output)?,
                    None => None,
                };

                let mut faults = Vec::new();
                for fault in node.child_elements().filter(|child| child.name == "fault") {
                    faults.extend(self.message_element(fault)?);
                }

                let soap_action = self
                    .indexer
                    .bindings
                    .get(namespace)
                    .and_then(|bindings| bindings.get(name))
                    .and_then(|binding| binding.attribute("soapAction"))
                    .unwrap_or_default()
                    .to_owned();

                operations.insert(
                    name.to_owned(),
                    Operation {
                        soap_action,
                        input,
                        output,
                        faults,
                    },
                );
            }
        }

        Ok(operations)
    }

    /// The element carried by the first part of the referenced message.
    fn message_element(&self, node: &Element) -> Result<Option<MessageElement>, Error> {
        let reference = node.attribute("message").ok_or_else(|| Error::MissingAttribute {
            element: node.name.clone(),
            attribute: "message",
        })?;

        let message = self.global(&self.indexer.messages, node, reference, "message")?;

        let part = match message.child_elements().find(|child| child.name == "part") {
            Some(part) => part,
            None => {
                debug!(message = reference, "message has no parts");
                return Ok(None);
            }
        };

        let reference = match part.attribute("element") {
            Some(reference) => reference,
            None => {
                warn!(message = reference, "message part has no element, rpc style messages are unsupported");
                return Ok(None);
            }
        };

        let element = self.global(&self.indexer.elements, part, reference, "element")?;
        let name = element.attribute("name").ok_or(Error::MissingAttribute {
            element: "element".into(),
            attribute: "name",
        })?;

        let ty = match element.attribute("type") {
            Some(ty) => self.index.resolve(element, ty, None)?,
            None => ANY_TYPE,
        };

        Ok(Some(MessageElement {
            name: name.to_owned(),
            ty,
        }))
    }
}
