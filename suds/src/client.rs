use std::sync::Arc;
use suds_codec::{Class, Value};
use suds_util::{transport::Transport, xml::Element};
use suds_wsdl::{types::TypeRef, Schema};
use tracing::{info, warn};

use crate::{
    cache::Cache,
    engine::{method_name, Engine},
    error::Error,
    handler::{ControlFlow, Exchange, HandlerId},
    handshake::{Handshake, ServiceName, Session},
    options::Options,
    store::Store,
};

/// A connected service. Only the handler chain changes after
/// construction.
pub struct Client<T> {
    engine: Engine<T>,
    session: Session,
}

/// Builds a [`Client`], reusing a cached schema when the handshake agrees
/// it is still current.
pub struct Connector<T, H = ServiceName> {
    options: Options,
    transport: T,
    handshake: H,
    store: Option<Arc<dyn Store>>,
}

impl<T: Transport> Connector<T> {
    pub fn new(options: Options, transport: T) -> Self {
        Self {
            options,
            transport,
            handshake: ServiceName,
            store: None,
        }
    }
}

impl<T: Transport, H: Handshake> Connector<T, H> {
    pub fn handshake<G: Handshake>(self, handshake: G) -> Connector<T, G> {
        Connector {
            options: self.options,
            transport: self.transport,
            handshake,
            store: self.store,
        }
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn connect(self) -> Result<Client<T>, Error> {
        let Self {
            options,
            mut transport,
            handshake,
            store,
        } = self;

        let cache = store.map(|store| Cache::new(store, options.service_name.clone()));

        if let Some((cache, key)) = cache.as_ref().and_then(|cache| Some((cache, cache.find_key()?))) {
            match cache.rehydrate(&key) {
                Ok(schema) => {
                    let engine = Engine::new(options.clone(), transport, schema);
                    let session = handshake.connect(&engine).await?;

                    if session.key == key {
                        info!(%key, "using cached schema");
                        return Ok(Client { engine, session });
                    }

                    info!(cached = %key, live = %session.key, "cached schema is stale");
                    cache.discard(&key);
                    transport = engine.into_transport();
                }

                Err(miss) => {
                    info!(%key, %miss, "cache miss");
                    cache.discard(&key);
                }
            }
        }

        let schema = suds_wsdl::load(&transport, &options.wsdl, &options.headers()).await?;
        let engine = Engine::new(options, transport, Arc::new(schema));
        let session = handshake.connect(&engine).await?;

        if let Some(cache) = &cache {
            if let Err(err) = cache.flush(&session.key, &engine.schema().snapshot()) {
                warn!(%err, key = %session.key, "unable to cache schema");
            }
        }

        Ok(Client { engine, session })
    }
}

impl<T: Transport> Client<T> {
    /// Loads the service with the default handshake and no cache.
    pub async fn connect(options: Options, transport: T) -> Result<Self, Error> {
        Connector::new(options, transport).connect().await
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn schema(&self) -> &Schema {
        self.engine.schema()
    }

    pub fn session_key(&self) -> &str {
        &self.session.key
    }

    /// A property the handshake stored, e.g. the service content.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.session.properties.get(name)
    }

    /// `prefix:Name` or `{namespace}Name`.
    pub fn class(&self, name: &str) -> Result<Arc<Class>, Error> {
        self.engine.class(name)
    }

    pub fn new_object<N, I>(&self, name: &str, fields: I) -> Result<Value, Error>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        Ok(self.class(name)?.construct(fields))
    }

    /// Method names of every operation.
    pub fn operations(&self) -> Vec<String> {
        self.schema().operations().keys().map(|name| method_name(name)).collect()
    }

    pub async fn call(&self, operation: &str, args: Vec<Value>) -> Result<Option<Value>, Error> {
        self.engine.invoke(operation, args).await
    }

    pub fn add_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&mut Exchange<'_>) -> ControlFlow + Send + Sync + 'static,
    {
        self.engine.handlers().add(handler)
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.engine.handlers().remove(id)
    }

    pub fn serialize_object(&self, value: &Value, name: &str, expected: Option<TypeRef>) -> Result<Element, Error> {
        Ok(self.engine.codec().serialize(value, name, expected)?)
    }

    pub fn deserialize_object(&self, ty: TypeRef, element: &Element) -> Result<Option<Value>, Error> {
        Ok(self.engine.codec().deserialize(ty, element)?)
    }
}
