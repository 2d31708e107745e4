//! Converts between schema-typed values and XML, driven entirely by the
//! compiled type tables.

use std::sync::Arc;
use suds_util::{soap::Envelope, xml::Element};
use suds_wsdl::{
    types::{MessageElement, TypeRef},
    Schema,
};

mod deserializer;
mod serializer;

pub mod error;
pub mod fault;
pub mod registry;
pub mod scalar;
pub mod value;

pub use error::Error;
pub use fault::Fault;
pub use registry::{Class, Kind, Registry};
pub use value::{Array, Object, Scalar, Value};

#[derive(Debug)]
pub struct Codec {
    registry: Registry,
}

impl Codec {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            registry: Registry::new(schema),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.registry.schema()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn class_for(&self, ty: TypeRef) -> Result<Arc<Class>, Error> {
        self.registry.class_for(ty)
    }

    /// Writes `value` as an element called `name`. When `expected` is given
    /// and differs from the value's own type, the element carries an
    /// `xsi:type` naming the actual type.
    ///
    /// Fails without producing anything if a required element or attribute
    /// is missing, an enum value is not allowed or a field has nowhere to go.
    pub fn serialize(&self, value: &Value, name: &str, expected: Option<TypeRef>) -> Result<Element, Error> {
        serializer::serialize(&self.registry, value, name, expected)
    }

    /// Reads `node` as type `ty`, honouring `xsi:type`. Empty elements read
    /// as `None`.
    pub fn deserialize(&self, ty: TypeRef, node: &Element) -> Result<Option<Value>, Error> {
        deserializer::deserialize(&self.registry, ty, node)
    }

    pub fn deserialize_fault(&self, faults: &[MessageElement], envelope: &Envelope) -> Fault {
        fault::deserialize_fault(&self.registry, faults, envelope)
    }
}
