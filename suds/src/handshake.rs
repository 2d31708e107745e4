//! The exchange performed once an engine is ready, which decides the key
//! its compiled schema is cached under.

use std::collections::BTreeMap;
use suds_codec::{Codec, Value};
use suds_util::transport::Transport;

use crate::{engine::Engine, error::Error};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Cache key for the live service.
    pub key: String,
    pub properties: BTreeMap<String, Value>,
}

pub trait Handshake {
    #[allow(async_fn_in_trait)]
    async fn connect<T: Transport>(&self, engine: &Engine<T>) -> Result<Session, Error>;
}

/// Keys the cache by service name alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceName;

impl Handshake for ServiceName {
    async fn connect<T: Transport>(&self, engine: &Engine<T>) -> Result<Session, Error> {
        Ok(Session {
            key: engine.options().service_name.clone(),
            properties: BTreeMap::new(),
        })
    }
}

type Arguments = dyn Fn(&Codec) -> Result<Vec<Value>, Error>;

fn no_arguments(_: &Codec) -> Result<Vec<Value>, Error> {
    Ok(Vec::new())
}

/// Calls an operation and builds the cache key from fields of its result,
/// e.g. `service/8.0` from `about.apiVersion`.
pub struct Probe {
    operation: String,
    property: String,
    arguments: Box<Arguments>,
    versions: Vec<String>,
}

impl Probe {
    /// Stores the result of `operation` as session property `property`.
    pub fn new<O: Into<String>, P: Into<String>>(operation: O, property: P) -> Self {
        Self {
            operation: operation.into(),
            property: property.into(),
            arguments: Box::new(no_arguments),
            versions: Vec::new(),
        }
    }

    pub fn with_arguments<F>(mut self, arguments: F) -> Self
    where
        F: Fn(&Codec) -> Result<Vec<Value>, Error> + 'static,
    {
        self.arguments = Box::new(arguments);
        self
    }

    /// Appends the value at a dotted path of the result to the key.
    pub fn with_version<S: Into<String>>(mut self, path: S) -> Self {
        self.versions.push(path.into());
        self
    }
}

impl Handshake for Probe {
    async fn connect<T: Transport>(&self, engine: &Engine<T>) -> Result<Session, Error> {
        let arguments = (self.arguments)(engine.codec())?;
        let result = engine.invoke(&self.operation, arguments).await?;

        let mut key = engine.options().service_name.clone();
        for path in &self.versions {
            let version = result
                .as_ref()
                .and_then(|result| result.path(path))
                .and_then(Value::as_scalar)
                .ok_or_else(|| Error::HandshakeError(format!("{} returned no {}", self.operation, path)))?;

            key.push('/');
            key.push_str(&version.to_string());
        }

        let mut properties = BTreeMap::new();
        if let Some(result) = result {
            properties.insert(self.property.clone(), result);
        }

        Ok(Session { key, properties })
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("operation", &self.operation)
            .field("property", &self.property)
            .field("versions", &self.versions)
            .finish()
    }
}
