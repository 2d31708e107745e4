use suds_util::{
    soap::XSI_NAMESPACE,
    xml::{Attribute, Element},
};
use suds_wsdl::{
    schema::ANY_TYPE,
    types::{ElementDescriptor, TypeRef},
    Schema,
};

use crate::{
    error::Error,
    registry::Registry,
    scalar,
    value::{Array, Object, Value},
};

pub(crate) fn is_valid_enum_value(schema: &Schema, ty: TypeRef, value: &str) -> bool {
    let descriptor = schema.descriptor(ty);
    let enumerations = descriptor.enumerations.as_deref().unwrap_or_default();

    enumerations.is_empty()
        || enumerations.iter().any(|allowed| allowed == value)
        || descriptor
            .unions
            .iter()
            .flatten()
            .any(|member| schema.is_xsd(*member) || is_valid_enum_value(schema, *member, value))
}

pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Scalar(scalar) => format!("{:?}", scalar),
        Value::Object(_) => "object".into(),
        Value::Array(_) => "array".into(),
        Value::List(_) => "list".into(),
    }
}

/// Text of an enumeration leaf: either a bare scalar or an instance's
/// `value`.
fn enum_text(schema: &Schema, ty: TypeRef, value: &Value) -> Result<String, Error> {
    let text = match value {
        Value::Scalar(scalar) => scalar.to_string(),
        Value::Object(Object { value: Some(scalar), .. }) => scalar.to_string(),
        other => {
            return Err(Error::UnexpectedType {
                expected: schema.qualified_name(ty),
                actual: describe(other),
            })
        }
    };

    if !is_valid_enum_value(schema, ty, &text) {
        return Err(Error::InvalidEnumValue {
            ty: schema.qualified_name(ty),
            value: text,
        });
    }

    Ok(text)
}

fn text_element(namespace: &str, name: &str, text: String) -> Element {
    let mut element = Element::new(Some(namespace), name);
    element.push_text(text);
    element
}

fn set_xsi_type(schema: &Schema, element: &mut Element, actual: TypeRef) {
    let namespace = schema.namespace_uri(actual);
    let name = schema.type_name(actual);

    let value = if element.namespace.as_deref() == Some(namespace) {
        name.to_owned()
    } else {
        let prefix = format!("ns{}", actual.namespace());
        element.declare_namespace(Some(&prefix), namespace);
        format!("{}:{}", prefix, name)
    };

    element.push_attribute(Attribute::namespaced(XSI_NAMESPACE, "xsi", "type", value));
}

pub(crate) fn serialize(
    registry: &Registry,
    value: &Value,
    name: &str,
    expected: Option<TypeRef>,
) -> Result<Element, Error> {
    let schema = registry.schema();
    let actual = registry
        .type_of(value)
        .ok_or_else(|| Error::UnrecognizedType(describe(value)))?;

    let mut element = match expected {
        Some(expected) => {
            let mut element = Element::new(Some(schema.namespace_uri(expected)), name);

            if expected != actual {
                if expected != ANY_TYPE && !schema.derives_from(actual, expected) {
                    return Err(Error::UnexpectedType {
                        expected: schema.qualified_name(expected),
                        actual: schema.qualified_name(actual),
                    });
                }

                set_xsi_type(schema, &mut element, actual);
            }

            element
        }

        None => Element::new(Some(schema.namespace_uri(actual)), name),
    };

    match value {
        Value::Object(object) => write_object(registry, object, &mut element)?,
        Value::Array(array) => write_array(registry, array, &mut element)?,
        other => return Err(Error::UnrecognizedType(describe(other))),
    }

    Ok(element)
}

fn write_array(registry: &Registry, array: &Array, element: &mut Element) -> Result<(), Error> {
    let schema = registry.schema();
    let item = schema.elements(array.ty()).iter().find(|item| !item.is_wildcard()).cloned();

    let item = match item {
        Some(item) => item,
        None if array.items.is_empty() => return Ok(()),
        None => {
            return Err(Error::UnnecessaryProperty {
                ty: schema.qualified_name(array.ty()),
                property: "0".into(),
            })
        }
    };

    for member in &array.items {
        element.push_child(write_member(registry, array.ty(), &item, member)?);
    }

    Ok(())
}

/// One occurrence of a named element.
fn write_member(
    registry: &Registry,
    owner: TypeRef,
    descriptor: &ElementDescriptor,
    member: &Value,
) -> Result<Element, Error> {
    let schema = registry.schema();
    let name = descriptor.name.as_deref().unwrap_or_default();

    match member {
        Value::Scalar(value) if schema.is_xsd(descriptor.ty) => Ok(text_element(
            schema.namespace_uri(owner),
            name,
            scalar::to_text(schema, descriptor.ty, value)?,
        )),

        member if !schema.is_xsd(descriptor.ty) && schema.is_simple(descriptor.ty) => Ok(text_element(
            schema.namespace_uri(descriptor.ty),
            name,
            enum_text(schema, descriptor.ty, member)?,
        )),

        member => serialize(registry, member, name, Some(descriptor.ty)),
    }
}

fn write_object(registry: &Registry, object: &Object, element: &mut Element) -> Result<(), Error> {
    let schema = registry.schema();
    let ty = object.ty();
    let mut pending: Vec<&str> = object.fields.keys().map(String::as_str).collect();

    let mut wildcard = None;
    for descriptor in schema.elements(ty).iter() {
        let name = match &descriptor.name {
            Some(name) => name,
            None => {
                wildcard = Some(descriptor.clone());
                continue;
            }
        };

        match object.get(name) {
            None if descriptor.min_occurs == Some(0) => (),

            None => {
                return Err(Error::MissingProperty {
                    ty: schema.qualified_name(ty),
                    property: name.clone(),
                })
            }

            Some(value) => {
                for member in value.members() {
                    element.push_child(write_member(registry, ty, descriptor, member)?);
                }
            }
        }

        pending.retain(|field| *field != name.as_str());
    }

    let mut any_attribute = false;
    for descriptor in schema.attributes(ty).iter() {
        let name = match &descriptor.name {
            Some(name) => name,
            None => {
                any_attribute = true;
                continue;
            }
        };

        let value = match object.get(name) {
            Some(value) => value,
            None if descriptor.required => {
                return Err(Error::MissingAttribute {
                    ty: schema.qualified_name(ty),
                    attribute: name.clone(),
                })
            }
            None => continue,
        };

        let text = match value {
            Value::Scalar(scalar) if schema.is_xsd(descriptor.ty) => scalar::to_text(schema, descriptor.ty, scalar)?,
            value if !schema.is_xsd(descriptor.ty) => enum_text(schema, descriptor.ty, value)?,
            other => {
                return Err(Error::UnexpectedType {
                    expected: schema.qualified_name(descriptor.ty),
                    actual: describe(other),
                })
            }
        };

        element.set_attribute(name.as_str(), text);
        pending.retain(|field| *field != name.as_str());
    }

    if let Some(value) = &object.value {
        match schema.scalar_base(ty) {
            Some(base) => element.push_text(scalar::to_text(schema, base, value)?),
            None if schema.is_simple(ty) => element.push_text(enum_text(schema, ty, &value.clone().into())?),
            None => (),
        }
    }

    if let Some(wildcard) = wildcard {
        if let Some(max) = wildcard.max_occurs {
            if !max.allows(pending.len()) {
                return Err(Error::UnnecessaryProperty {
                    ty: schema.qualified_name(ty),
                    property: pending.last().copied().unwrap_or_default().to_owned(),
                });
            }
        }

        for name in pending.drain(..) {
            let value = match object.get(name) {
                Some(value) => value,
                None => continue,
            };

            for member in value.members() {
                element.push_child(match member {
                    Value::Scalar(scalar) => text_element(schema.namespace_uri(ty), name, scalar.to_string()),
                    other => serialize(registry, other, name, None)?,
                });
            }
        }
    }

    if any_attribute {
        for name in pending.drain(..) {
            let text = match object.get(name) {
                Some(Value::Scalar(scalar)) => scalar.to_string(),
                Some(Value::Object(Object { value: Some(scalar), .. })) => scalar.to_string(),
                Some(other) => {
                    return Err(Error::UnexpectedType {
                        expected: "attribute".into(),
                        actual: describe(other),
                    })
                }
                None => continue,
            };

            element.set_attribute(name, text);
        }
    }

    match pending.first() {
        Some(property) => Err(Error::UnnecessaryProperty {
            ty: schema.qualified_name(ty),
            property: (*property).to_owned(),
        }),
        None => Ok(()),
    }
}
