use base64::{engine::general_purpose::STANDARD, Engine};
use std::{collections::BTreeMap, fmt};
use suds_wsdl::types::TypeRef;

/// A leaf value. Dates and other lexical types travel as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Binary(Vec<u8>),
}

/// Anything the codec reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Object(Object),
    Array(Array),
    /// A repeated element.
    List(Vec<Value>),
}

/// An instance of a structured schema type. The type tag is fixed at
/// construction, which is how the serializer knows what it is writing.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    ty: TypeRef,
    pub fields: BTreeMap<String, Value>,
    /// Text payload of types derived from an XSD scalar, and of
    /// enumerations.
    pub value: Option<Scalar>,
}

/// An instance of an `ArrayOf...` type: just its items, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    ty: TypeRef,
    pub items: Vec<Value>,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) if value.is_infinite() => f.write_str(if *value > 0.0 { "INF" } else { "-INF" }),
            Self::Float(value) => write!(f, "{}", value),
            Self::Binary(value) => f.write_str(&STANDARD.encode(value)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

macro_rules! scalar_values {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_values!(Scalar, &str, String, bool, i32, i64, f64, Vec<u8>);

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Self::Array(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl Value {
    /// The schema type that produced this value, for objects and arrays.
    pub fn type_ref(&self) -> Option<TypeRef> {
        match self {
            Self::Object(object) => Some(object.ty),
            Self::Array(array) => Some(array.ty),
            Self::Scalar(_) | Self::List(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Each member of a repeated value, or the value itself.
    pub fn members(&self) -> &[Value] {
        match self {
            Self::List(values) => values,
            value => std::slice::from_ref(value),
        }
    }

    /// Walks a dotted path of field names, e.g. `about.apiVersion`.
    pub fn path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |value, segment| value.as_object()?.get(segment))
    }
}

impl Object {
    pub(crate) fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            fields: BTreeMap::new(),
            value: None,
        }
    }

    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set<N: Into<String>, V: Into<Value>>(&mut self, name: N, value: V) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_value<V: Into<Scalar>>(mut self, value: V) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl Array {
    pub(crate) fn new(ty: TypeRef) -> Self {
        Self { ty, items: Vec::new() }
    }

    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    pub fn push<V: Into<Value>>(&mut self, value: V) {
        self.items.push(value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_dotted_paths() {
        let about = Object::new(TypeRef(1, 1)).with("apiVersion", "8.0");
        let content = Value::from(Object::new(TypeRef(1, 0)).with("about", about));

        assert_eq!(content.path("about.apiVersion").and_then(Value::as_str), Some("8.0"));
        assert!(content.path("about.missing").is_none());
        assert_eq!(content.path(""), Some(&content));
    }

    #[test]
    fn binary_scalars_display_as_base64() {
        assert_eq!(Scalar::from(b"hi".to_vec()).to_string(), "aGk=");
        assert_eq!(Scalar::from(3).to_string(), "3");
    }

    #[test]
    fn special_floats_use_xsd_spellings() {
        assert_eq!(Scalar::from(f64::INFINITY).to_string(), "INF");
        assert_eq!(Scalar::from(f64::NEG_INFINITY).to_string(), "-INF");
        assert_eq!(Scalar::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Scalar::from(2.5).to_string(), "2.5");
    }
}
