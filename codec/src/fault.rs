use std::fmt;
use suds_util::soap::Envelope;
use suds_wsdl::{schema::ANY_TYPE, types::MessageElement};
use tracing::warn;

use crate::{deserializer::deserialize, registry::Registry, value::Value};

const NO_FAULT_MESSAGE: &str = "no fault message";

/// A SOAP fault returned by the service. Always has a cause and at least
/// one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: Option<String>,
    pub string: Option<String>,
    /// The declared fault element that matched, if any.
    pub name: Option<String>,
    pub detail: Option<Value>,
    pub cause: String,
    pub messages: Vec<String>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.cause, self.messages.join("; "))
    }
}

impl std::error::Error for Fault {}

impl Fault {
    /// A fault for an error response whose body is not an envelope. The
    /// body text, or the status text when there is none, is the message.
    pub fn from_status(status: u16, status_text: &str, body: &str) -> Self {
        let message = match body.trim() {
            "" => status_text.to_owned(),
            body => body.to_owned(),
        };

        Fault {
            code: None,
            string: None,
            name: None,
            detail: None,
            cause: format!("{} {}", status, status_text),
            messages: vec![message],
        }
    }
}

pub(crate) fn deserialize_fault(registry: &Registry, faults: &[MessageElement], envelope: &Envelope) -> Fault {
    let schema = registry.schema();

    let declared = faults.iter().find_map(|fault| {
        envelope
            .find(schema.namespace_uri(fault.ty), &fault.name)
            .map(|node| (fault, node))
    });

    let (name, ty, node) = match declared {
        Some((fault, node)) => (Some(fault.name.clone()), fault.ty, Some(node)),
        None => (
            None,
            ANY_TYPE,
            envelope
                .find_local("detail")
                .and_then(|detail| detail.first_child_element()),
        ),
    };

    let detail = node.and_then(|node| match deserialize(registry, ty, node) {
        Ok(detail) => detail,
        Err(err) => {
            warn!(%err, "unreadable fault detail");
            None
        }
    });

    let text = |name: &str| envelope.find_local(name).map(|node| node.text_content());
    let code = text("faultcode");
    let string = text("faultstring");

    let cause = detail
        .as_ref()
        .and_then(|detail| detail.path("faultCause.localizedMessage"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .or_else(|| code.clone())
        .unwrap_or_else(|| NO_FAULT_MESSAGE.to_owned());

    let mut messages: Vec<String> = detail
        .as_ref()
        .and_then(|detail| detail.path("faultMessage"))
        .map(|messages| {
            messages
                .members()
                .iter()
                .filter_map(|message| message.path("message").and_then(Value::as_str))
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        messages.push(string.clone().unwrap_or_else(|| NO_FAULT_MESSAGE.to_owned()));
    }

    Fault {
        code,
        string,
        name,
        detail,
        cause,
        messages,
    }
}
