//! Turns operation calls into SOAP exchanges.

use std::sync::Arc;
use suds_codec::{Class, Codec, Fault, Value};
use suds_util::{
    soap::Envelope,
    transport::{Request, Transport},
};
use suds_wsdl::{
    types::{Operation, TypeRef},
    Schema,
};
use tracing::{debug, warn};

use crate::{
    error::Error,
    handler::{Exchange, HandlerChain},
    options::{Options, RequestStyle},
};

/// `RetrieveServiceContent` becomes `retrieveServiceContent`.
pub fn method_name(operation: &str) -> String {
    let mut chars = operation.chars();

    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct Engine<T> {
    options: Options,
    transport: T,
    codec: Codec,
    handlers: HandlerChain,
}

impl<T: Transport> Engine<T> {
    pub fn new(options: Options, transport: T, schema: Arc<Schema>) -> Self {
        Self {
            options,
            transport,
            codec: Codec::new(schema),
            handlers: HandlerChain::default(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.codec.schema()
    }

    pub fn handlers(&self) -> &HandlerChain {
        &self.handlers
    }

    /// Resolves `prefix:Name` or `{namespace}Name`. A namespace without a
    /// configured prefix is addressed by its URI.
    pub fn find_type(&self, name: &str) -> Result<TypeRef, Error> {
        let found = match name.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
            Some((namespace, local)) => self.schema().find(namespace, local),
            None => name.rsplit_once(':').and_then(|(prefix, local)| {
                let namespace = self.options.namespace_for(prefix).unwrap_or(prefix);
                self.schema().find(namespace, local)
            }),
        };

        found.ok_or_else(|| Error::UnknownType(name.to_owned()))
    }

    pub fn class(&self, name: &str) -> Result<Arc<Class>, Error> {
        Ok(self.codec.class_for(self.find_type(name)?)?)
    }

    /// Looks an operation up by its WSDL name or its method name.
    pub fn operation(&self, name: &str) -> Result<(&str, &Operation), Error> {
        let operations = self.schema().operations();

        operations
            .get_key_value(name)
            .or_else(|| operations.iter().find(|(operation, _)| method_name(operation) == name))
            .map(|(name, operation)| (name.as_str(), operation))
            .ok_or_else(|| Error::UnknownOperation(name.to_owned()))
    }

    pub fn build_envelope(&self, operation: &Operation, args: Vec<Value>) -> Result<Envelope, Error> {
        let input = &operation.input;
        let class = self.codec.class_for(input.ty)?;

        let request = match self.options.request_style {
            RequestStyle::Positional => {
                let names = self
                    .schema()
                    .elements(input.ty)
                    .iter()
                    .filter_map(|element| element.name.clone())
                    .collect::<Vec<_>>();

                class.construct(names.into_iter().zip(args))
            }

            RequestStyle::Document => args.into_iter().next().unwrap_or_else(|| class.instantiate()),
        };

        let body = self.codec.serialize(&request, &input.name, Some(input.ty))?;
        Ok(Envelope::new(body))
    }

    /// The value of the first declared output element present in the
    /// response wrapper, if any.
    pub fn read_result(&self, operation: &Operation, envelope: &Envelope) -> Result<Option<Value>, Error> {
        let output = match &operation.output {
            Some(output) => output,
            None => return Ok(None),
        };

        let node = match envelope.find(self.schema().namespace_uri(output.ty), &output.name) {
            Some(node) => node,
            None => return Ok(None),
        };

        let result = match self.codec.deserialize(output.ty, node)? {
            Some(Value::Object(mut object)) => self
                .schema()
                .elements(output.ty)
                .iter()
                .filter_map(|element| element.name.as_deref())
                .find_map(|name| object.fields.remove(name)),

            other => other,
        };

        Ok(result)
    }

    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Error> {
        let (name, operation) = self.operation(name)?;

        let mut envelope = self.build_envelope(operation, args)?;
        let mut headers = self.options.headers();
        headers.insert("Content-Type".into(), "text/xml".into());
        headers.insert("SOAPAction".into(), operation.soap_action.clone());

        self.handlers.run(&mut Exchange {
            envelope: &mut envelope,
            headers: &mut headers,
            outgoing: true,
        });

        let request = Request::post(self.options.endpoint.clone(), envelope.to_request()?).with_headers(&headers);

        debug!(operation = %name, endpoint = %self.options.endpoint, "invoking");
        let response = self.transport.send(request).await?;

        if response.status == 500 {
            let fault = match Envelope::from_response(&response.body) {
                Ok(envelope) => self.codec.deserialize_fault(&operation.faults, &envelope),
                Err(err) => {
                    warn!(%err, operation = %name, "fault response is not an envelope");
                    Fault::from_status(
                        response.status,
                        &response.status_text,
                        &String::from_utf8_lossy(&response.body),
                    )
                }
            };

            return Err(fault.into());
        }

        if !response.is_success() {
            return Err(Error::StatusError {
                status: response.status,
                status_text: response.status_text,
            });
        }

        let mut envelope = Envelope::from_response(&response.body)?;
        let mut headers = response.headers;

        self.handlers.run(&mut Exchange {
            envelope: &mut envelope,
            headers: &mut headers,
            outgoing: false,
        });

        self.read_result(operation, &envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_camel_cased() {
        assert_eq!(method_name("RetrieveServiceContent"), "retrieveServiceContent");
        assert_eq!(method_name("echo"), "echo");
        assert_eq!(method_name(""), "");
    }
}
