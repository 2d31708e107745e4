use suds_codec::Fault;
use suds_util::{transport::TransportError, xml};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error loading schema")]
    SchemaError(#[from] suds_wsdl::error::Error),

    #[error("Error marshaling call")]
    MarshalError(#[from] suds_codec::Error),

    #[error("Error sending request")]
    TransportError(#[from] TransportError),

    #[error("Request failed with {status} {status_text}")]
    StatusError { status: u16, status_text: String },

    #[error("Service returned a fault: {0}")]
    Fault(Box<Fault>),

    #[error("Unknown operation {0}")]
    UnknownOperation(String),

    #[error("Unknown type {0}")]
    UnknownType(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Error parsing response")]
    XmlError(#[from] xml::Error),

    #[error("Error accessing schema store")]
    StoreError(#[from] StoreError),

    #[error("Error")]
    IoError(#[from] std::io::Error),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Fault(Box::new(fault))
    }
}
