use base64::{engine::general_purpose::STANDARD, Engine};
use suds_wsdl::{types::TypeRef, Schema};

use crate::{error::Error, value::Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Any,
    Text,
    Boolean,
    Integer,
    Float,
    Binary,
    HexBinary,
}

impl ScalarKind {
    pub fn of(name: &str) -> Option<Self> {
        Some(match name {
            "anyType" | "anySimpleType" => Self::Any,

            "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "NMTOKEN" | "NMTOKENS"
            | "ID" | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "NOTATION" | "QName" | "anyURI" => Self::Text,

            "date" | "dateTime" | "time" | "duration" | "gDay" | "gMonth" | "gMonthDay" | "gYear" | "gYearMonth" => {
                Self::Text
            }

            "boolean" => Self::Boolean,

            "byte" | "short" | "int" | "integer" | "long" | "negativeInteger" | "nonNegativeInteger"
            | "nonPositiveInteger" | "positiveInteger" | "unsignedByte" | "unsignedShort" | "unsignedInt"
            | "unsignedLong" => Self::Integer,

            "float" | "double" | "decimal" => Self::Float,

            "base64Binary" => Self::Binary,
            "hexBinary" => Self::HexBinary,

            _ => return None,
        })
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02X}", byte)).collect()
}

fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }

    (0..text.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(&text[at..at + 2], 16).ok())
        .collect()
}

fn kind(schema: &Schema, ty: TypeRef) -> Result<ScalarKind, Error> {
    let name = schema.type_name(ty);
    ScalarKind::of(name).ok_or_else(|| Error::UnsupportedScalar(name.to_owned()))
}

/// Text form of `value` as the XSD scalar type `ty`.
pub fn to_text(schema: &Schema, ty: TypeRef, value: &Scalar) -> Result<String, Error> {
    match (kind(schema, ty)?, value) {
        (ScalarKind::Binary, Scalar::Binary(bytes)) => Ok(STANDARD.encode(bytes)),

        // already encoded
        (ScalarKind::Binary, Scalar::String(text)) => Ok(text.clone()),

        (ScalarKind::HexBinary, Scalar::Binary(bytes)) => Ok(to_hex(bytes)),
        (ScalarKind::HexBinary, Scalar::String(text)) => Ok(text.clone()),

        (ScalarKind::Binary | ScalarKind::HexBinary, other) => Err(Error::UnexpectedType {
            expected: schema.type_name(ty).to_owned(),
            actual: format!("{:?}", other),
        }),

        (_, value) => Ok(value.to_string()),
    }
}

/// Parses element or attribute text as the XSD scalar type `ty`.
pub fn from_text(schema: &Schema, ty: TypeRef, text: &str) -> Result<Scalar, Error> {
    let malformed = || Error::MalformedScalar {
        ty: schema.type_name(ty).to_owned(),
        value: text.to_owned(),
    };

    Ok(match kind(schema, ty)? {
        ScalarKind::Any | ScalarKind::Text => Scalar::String(text.to_owned()),

        ScalarKind::Boolean => match text.trim() {
            "true" | "1" => Scalar::Boolean(true),
            "false" | "0" => Scalar::Boolean(false),
            _ => return Err(malformed()),
        },

        ScalarKind::Integer => Scalar::Integer(text.trim().parse().map_err(|_| malformed())?),

        ScalarKind::Float => Scalar::Float(match text.trim() {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            text => text.parse().map_err(|_| malformed())?,
        }),

        ScalarKind::Binary => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Scalar::Binary(STANDARD.decode(compact).map_err(|_| malformed())?)
        }

        ScalarKind::HexBinary => Scalar::Binary(from_hex(text.trim()).ok_or_else(malformed)?),
    })
}
