use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Type not recognized: {0}")]
    UnrecognizedType(String),

    #[error("Unexpected object type {actual}, expected {expected}")]
    UnexpectedType { expected: String, actual: String },

    #[error("Required property not defined: {property} on {ty}")]
    MissingProperty { ty: String, property: String },

    #[error("Required attribute not defined: {attribute} on {ty}")]
    MissingAttribute { ty: String, attribute: String },

    #[error("Invalid enum value {value:?} for {ty}")]
    InvalidEnumValue { ty: String, value: String },

    #[error("Unnecessary property specified: {property} on {ty}")]
    UnnecessaryProperty { ty: String, property: String },

    #[error("Unsupported scalar type {0}")]
    UnsupportedScalar(String),

    #[error("Malformed {ty} value {value:?}")]
    MalformedScalar { ty: String, value: String },
}
