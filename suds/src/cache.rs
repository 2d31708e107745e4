//! Compiled schemas kept in a [`Store`] so later engines can skip the
//! WSDL graph entirely.

use std::sync::Arc;
use suds_codec::Registry;
use suds_wsdl::{
    types::{Snapshot, TypeRef},
    Schema,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{Store, StoreError};

/// A cached entry that cannot be used. Never leaves [`crate::Client::connect`].
#[derive(Debug, Error)]
pub enum CacheMiss {
    #[error("No entry for {0}")]
    Missing(String),

    #[error("Entry is not a snapshot")]
    Corrupt(#[from] serde_json::Error),

    #[error("Entry does not describe a valid schema")]
    Invalid(#[from] suds_wsdl::error::Error),

    #[error("Entry does not produce usable classes")]
    Classes(#[from] suds_codec::Error),
}

pub struct Cache {
    store: Arc<dyn Store>,
    service_name: String,
}

impl Cache {
    pub fn new<S: Into<String>>(store: Arc<dyn Store>, service_name: S) -> Self {
        Self {
            store,
            service_name: service_name.into(),
        }
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.store.len())
            .filter_map(|index| self.store.key_at(index))
            .filter(|key| key.starts_with(&self.service_name))
    }

    /// The first key belonging to this service.
    pub fn find_key(&self) -> Option<String> {
        self.keys().next()
    }

    pub fn rehydrate(&self, key: &str) -> Result<Arc<Schema>, CacheMiss> {
        let text = self.store.get(key).ok_or_else(|| CacheMiss::Missing(key.to_owned()))?;
        let schema = Arc::new(Schema::from_snapshot(serde_json::from_str(&text)?)?);

        // Materialize every class up front; anything broken is a miss now
        // rather than a failure mid-call.
        let registry = Registry::new(schema.clone());
        for (index, namespace) in schema.namespaces().iter().enumerate().skip(1) {
            for ty in 0..namespace.types.len() {
                registry.class_for(TypeRef(index, ty))?;
            }
        }

        debug!(%key, classes = registry.len(), "rehydrated schema");
        Ok(schema)
    }

    /// Writes `snapshot` under `key`. When the store is full the oldest
    /// entry of this service is evicted and the write retried once.
    pub fn flush(&self, key: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let text = match serde_json::to_string(snapshot) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, %key, "unable to encode snapshot");
                return Ok(());
            }
        };

        match self.store.set(key, text.clone()) {
            Err(StoreError::QuotaExceeded) => {
                let oldest = self.keys().find(|oldest| oldest != key);

                match oldest {
                    Some(oldest) => {
                        info!(evicted = %oldest, %key, "schema store full");
                        self.store.remove(&oldest);
                        self.store.set(key, text)
                    }

                    None => Err(StoreError::QuotaExceeded),
                }
            }

            result => result,
        }
    }

    pub fn discard(&self, key: &str) {
        self.store.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use suds_wsdl::{
        schema::xsd_namespace,
        types::{Namespace, TypeDescriptor},
    };

    /// Just the built-in namespace.
    fn snapshot() -> Snapshot {
        let xsd = xsd_namespace();

        Snapshot {
            types: vec![vec![TypeDescriptor::default(); xsd.types.len()]],
            namespaces: vec![xsd],
            operations: Default::default(),
        }
    }

    #[test]
    fn finds_keys_by_service_prefix() {
        let store = Arc::new(MemoryStore::new());
        store.set("other/1", "{}".into()).unwrap();
        store.set("echo/1", "{}".into()).unwrap();
        store.set("echo/2", "{}".into()).unwrap();

        let cache = Cache::new(store, "echo");
        assert_eq!(cache.find_key().as_deref(), Some("echo/1"));
    }

    #[test]
    fn broken_entries_are_misses() {
        let store = Arc::new(MemoryStore::new());
        store.set("echo/garbage", "not json".into()).unwrap();
        let mut invalid = snapshot();
        invalid.namespaces.push(Namespace::new("urn:test"));
        store.set("echo/invalid", serde_json::to_string(&invalid).unwrap()).unwrap();

        let cache = Cache::new(store, "echo");

        assert!(matches!(cache.rehydrate("echo/missing"), Err(CacheMiss::Missing(_))));
        assert!(matches!(cache.rehydrate("echo/garbage"), Err(CacheMiss::Corrupt(_))));
        assert!(matches!(cache.rehydrate("echo/invalid"), Err(CacheMiss::Invalid(_))));
    }

    #[test]
    fn evicts_the_oldest_entry_of_the_service_once() {
        let valid = snapshot();
        let size = serde_json::to_string(&valid).unwrap().len();
        let store = Arc::new(MemoryStore::with_quota(2 * (size + 10)));
        store.set("other", "x".repeat(size)).unwrap();
        store.set("echo/old", "x".repeat(size)).unwrap();

        let cache = Cache::new(store.clone(), "echo");
        cache.flush("echo/new", &valid).unwrap();

        assert_eq!(store.keys(), vec!["other", "echo/new"]);
        assert!(cache.rehydrate("echo/new").is_ok());

        // nothing left to evict that belongs to us
        let crowded = Cache::new(store, "third");
        assert!(matches!(crowded.flush("third/1", &valid), Err(StoreError::QuotaExceeded)));
    }

    #[test]
    fn eviction_skips_the_key_being_written() {
        let valid = snapshot();
        let size = serde_json::to_string(&valid).unwrap().len();
        let store = Arc::new(MemoryStore::with_quota(2 * size + 28));
        store.set("other", "x".repeat(size)).unwrap();
        store.set("echo/new", "x".into()).unwrap();
        store.set("echo/old", "x".repeat(size)).unwrap();

        let cache = Cache::new(store.clone(), "echo");
        cache.flush("echo/new", &valid).unwrap();

        assert_eq!(store.keys(), vec!["other", "echo/new"]);
        assert!(cache.rehydrate("echo/new").is_ok());
    }
}
