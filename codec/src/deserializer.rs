use suds_util::{soap::XSI_NAMESPACE, xml::Element};
use suds_wsdl::{schema::ANY_TYPE, types::TypeRef};
use tracing::warn;

use crate::{
    error::Error,
    registry::Registry,
    scalar,
    serializer::is_valid_enum_value,
    value::{Object, Scalar, Value},
};

/// Reads have to survive types the schema does not know about; they come
/// back as an empty untyped object.
fn unknown() -> Value {
    Object::new(ANY_TYPE).into()
}

fn enum_value(registry: &Registry, ty: TypeRef, text: String) -> Result<Scalar, Error> {
    let schema = registry.schema();

    if !is_valid_enum_value(schema, ty, &text) {
        return Err(Error::InvalidEnumValue {
            ty: schema.qualified_name(ty),
            value: text,
        });
    }

    Ok(Scalar::String(text))
}

pub(crate) fn deserialize(registry: &Registry, ty: TypeRef, node: &Element) -> Result<Option<Value>, Error> {
    if node.children.is_empty() && node.attributes.is_empty() {
        return Ok(None);
    }

    let schema = registry.schema();

    let ty = match node.attribute_ns(XSI_NAMESPACE, "type") {
        Some(reference) => match schema.resolve(node, reference, node.namespace.as_deref()) {
            Ok(ty) => ty,
            Err(_) => {
                warn!(%reference, element = %node.name, "unknown xsi:type");
                return Ok(Some(unknown()));
            }
        },
        None => ty,
    };

    if schema.is_xsd(ty) {
        return scalar::from_text(schema, ty, &node.text_content()).map(|value| Some(value.into()));
    }

    let class = match registry.class_for(ty) {
        Ok(class) => class,
        Err(err) => {
            warn!(%err, element = %node.name, "no class for element");
            return Ok(Some(unknown()));
        }
    };

    let mut result = class.instantiate();

    if let Value::Object(object) = &mut result {
        if let Some(base) = schema.scalar_base(ty) {
            object.value = Some(scalar::from_text(schema, base, &node.text_content())?);
        } else if schema.is_simple(ty) {
            object.value = Some(enum_value(registry, ty, node.text_content())?);
        }
    }

    for descriptor in schema.elements(ty).iter() {
        let name = match &descriptor.name {
            Some(name) => name,
            None => continue,
        };

        let repeated = descriptor.max_occurs.map_or(false, |max| max.allows_many());

        for child in node.child_elements().filter(|child| child.name == *name) {
            let value = match deserialize(registry, descriptor.ty, child)? {
                Some(value) => value,
                None => continue,
            };

            match &mut result {
                Value::Array(array) => array.items.push(value),

                Value::Object(object) if repeated => {
                    match object.fields.entry(name.clone()).or_insert_with(|| Value::List(Vec::new())) {
                        Value::List(items) => items.push(value),
                        single => *single = Value::List(vec![single.clone(), value]),
                    }
                }

                Value::Object(object) => {
                    object.fields.insert(name.clone(), value);
                }

                Value::Scalar(_) | Value::List(_) => (),
            }
        }
    }

    if let Value::Object(object) = &mut result {
        for descriptor in schema.attributes(ty).iter() {
            let name = match &descriptor.name {
                Some(name) => name,
                None => continue,
            };

            let text = match node.attributes.iter().find(|attribute| attribute.qualified_name() == *name) {
                Some(attribute) => attribute.value.clone(),
                None => continue,
            };

            let value = if schema.is_xsd(descriptor.ty) {
                scalar::from_text(schema, descriptor.ty, &text)?.into()
            } else {
                let mut instance = Object::new(descriptor.ty);
                instance.value = Some(if schema.is_simple(descriptor.ty) {
                    enum_value(registry, descriptor.ty, text)?
                } else {
                    Scalar::String(text)
                });
                instance.into()
            };

            object.fields.insert(name.clone(), value);
        }
    }

    Ok(Some(result))
}
