use suds_util::transport::TransportError;
use thiserror::Error;

/// Loading and compiling errors. Cloneable so a failed document load can be
/// handed to every caller that was waiting on the same URL.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path {0}")]
    PathConversionError(String),

    #[error("Unable to get {url}")]
    TransportError {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Unable to get {url}: {status} {status_text}")]
    StatusError {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("Error parsing XML input from {url}: {message}")]
    XmlParseError { url: String, message: String },

    #[error("Missing {attribute} attribute on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Unresolved type reference {0}")]
    UnresolvedType(String),

    #[error("Unresolved {kind} reference {name}")]
    UnresolvedReference { kind: &'static str, name: String },

    #[error("Invalid schema snapshot: {0}")]
    InvalidSnapshot(String),
}
