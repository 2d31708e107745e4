//! Persistent string stores for compiled schemas.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::SystemTime,
};
use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Error writing {key}")]
    IoError {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// A string-keyed, string-valued store shared by every engine in the
/// process. Keys enumerate oldest first.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    fn remove(&self, key: &str);

    fn len(&self) -> usize;

    fn key_at(&self, index: usize) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|index| self.key_at(index)).collect()
    }
}

/// Entries in insertion order, optionally capped at a total byte size.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<(String, String)>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps keys plus values at `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(bytes),
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing != key)
                .map(|(existing, value)| existing.len() + value.len())
                .sum();

            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        match entries.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, existing)) => *existing = value,
            None => entries.push((key.to_owned(), value)),
        }

        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| existing != key);
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .map(|(key, _)| key.clone())
    }
}

/// One file per key in a directory. File names are the form-encoded keys.
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> io::Result<Self> {
        fs::create_dir_all(directory.as_ref())?;

        Ok(Self {
            directory: directory.as_ref().to_owned(),
            quota: None,
        })
    }

    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, key: &str) -> PathBuf {
        self.directory.join(form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>())
    }

    /// `(modified, key, size)` for every entry, oldest first.
    fn entries(&self) -> Vec<(SystemTime, String, u64)> {
        let listing = match fs::read_dir(&self.directory) {
            Ok(listing) => listing,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<_> = listing
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let metadata = entry.metadata().ok().filter(|metadata| metadata.is_file())?;
                let name = entry.file_name().into_string().ok()?;
                let (key, _) = form_urlencoded::parse(name.as_bytes()).next()?;

                Some((
                    metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    key.into_owned(),
                    metadata.len(),
                ))
            })
            .collect();

        entries.sort();
        entries
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let used: u64 = self
                .entries()
                .iter()
                .filter(|(_, existing, _)| existing != key)
                .map(|(_, _, size)| size)
                .sum();

            if used + value.len() as u64 > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        fs::write(self.path(key), value).map_err(|source| StoreError::IoError {
            key: key.to_owned(),
            source,
        })
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path(key));
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.entries().into_iter().nth(index).map(|(_, key, _)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_keeps_insertion_order() {
        let store = MemoryStore::new();
        store.set("b", "1".into()).unwrap();
        store.set("a", "2".into()).unwrap();
        store.set("b", "3".into()).unwrap();

        assert_eq!(store.keys(), vec!["b", "a"]);
        assert_eq!(store.get("b").as_deref(), Some("3"));

        store.remove("b");
        assert_eq!(store.keys(), vec!["a"]);
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn memory_store_enforces_its_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("a", "1234".into()).unwrap();

        assert!(matches!(store.set("b", "123456".into()), Err(StoreError::QuotaExceeded)));

        // replacing an entry only counts the new value
        store.set("a", "12345678".into()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_store_round_trips_awkward_keys() {
        let directory = std::env::temp_dir().join(format!("suds-store-{}", std::process::id()));
        let store = FileStore::new(&directory).unwrap();

        store.set("echo/1.0 beta", "{}".into()).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.key_at(0).as_deref(), Some("echo/1.0 beta"));
        assert_eq!(store.get("echo/1.0 beta").as_deref(), Some("{}"));

        store.remove("echo/1.0 beta");
        assert!(store.is_empty());

        fs::remove_dir_all(directory).unwrap();
    }
}
