//! Lazily materialized classes, one per schema type.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use suds_wsdl::{types::TypeRef, Schema};
use tracing::debug;

use crate::{
    error::Error,
    value::{Array, Object, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `ArrayOf...`: instances are plain ordered sequences.
    Sequence,
    Structure,
}

/// The constructible side of a schema type.
#[derive(Debug)]
pub struct Class {
    ty: TypeRef,
    name: String,
    kind: Kind,
    fields: Vec<String>,
    has_value: bool,
    base: Option<Arc<Class>>,
}

impl Class {
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// `{namespace}Name`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn base(&self) -> Option<&Arc<Class>> {
        self.base.as_ref()
    }

    /// Element and attribute names declared by this type itself.
    pub fn own_fields(&self) -> &[String] {
        &self.fields
    }

    /// Every field name, inherited ones first.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = self.base.as_ref().map(|base| base.fields()).unwrap_or_default();
        fields.extend(self.fields.iter().map(String::as_str));
        fields
    }

    /// Whether instances carry a scalar `value` payload.
    pub fn has_value(&self) -> bool {
        self.has_value
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ty == other.ty || self.base.as_ref().map_or(false, |base| base.is_subclass_of(other))
    }

    pub fn instantiate(&self) -> Value {
        match self.kind {
            Kind::Sequence => Array::new(self.ty).into(),
            Kind::Structure => Object::new(self.ty).into(),
        }
    }

    /// An instance with the given fields set. Sequence classes take the
    /// values as items, in order.
    pub fn construct<N, I>(&self, fields: I) -> Value
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        match self.instantiate() {
            Value::Array(mut array) => {
                array.items.extend(fields.into_iter().map(|(_, value)| value));
                array.into()
            }

            Value::Object(mut object) => {
                for (name, value) in fields {
                    object.set(name, value);
                }
                object.into()
            }

            other => other,
        }
    }
}

/// Maps type references to their classes. Materializing the same type
/// twice hands back the same class.
#[derive(Debug)]
pub struct Registry {
    schema: Arc<Schema>,
    classes: Mutex<HashMap<TypeRef, Arc<Class>>>,
}

impl Registry {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            classes: Mutex::default(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn class_for(&self, ty: TypeRef) -> Result<Arc<Class>, Error> {
        if !self.schema.contains(ty) || self.schema.is_xsd(ty) {
            return Err(Error::UnrecognizedType(format!("{:?}", ty)));
        }

        if let Some(class) = self.classes.lock().unwrap_or_else(PoisonError::into_inner).get(&ty) {
            return Ok(class.clone());
        }

        let base = self.schema.base(ty).map(|base| self.class_for(base)).transpose()?;
        let descriptor = self.schema.descriptor(ty);

        let fields = descriptor
            .elements
            .iter()
            .filter_map(|element| element.name.clone())
            .chain(descriptor.attributes.iter().filter_map(|attribute| attribute.name.clone()))
            .collect();

        let class = Class {
            ty,
            name: self.schema.qualified_name(ty),
            kind: if self.schema.is_array(ty) {
                Kind::Sequence
            } else {
                Kind::Structure
            },
            fields,
            has_value: self.schema.scalar_base(ty).is_some() || descriptor.is_simple(),
            base,
        };

        debug!(class = %class.name, "materialized class");

        let mut classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(classes.entry(ty).or_insert_with(|| Arc::new(class)).clone())
    }

    /// The schema type that produced `value`, if it is one of ours.
    pub fn type_of(&self, value: &Value) -> Option<TypeRef> {
        value
            .type_ref()
            .filter(|ty| self.schema.contains(*ty) && !self.schema.is_xsd(*ty))
    }

    /// Number of classes materialized so far.
    pub fn len(&self) -> usize {
        self.classes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
