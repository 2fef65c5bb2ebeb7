//! Persisted progress, meta-progression and settings
//!
//! Each concern is a flat JSON document stored under its own key. Reads and
//! writes go through the [`Storage`] trait so the browser's LocalStorage and
//! an in-memory map are interchangeable. Failures never reach gameplay: a
//! failed read yields the default document and a failed write is logged.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod documents;

pub use documents::{Achievement, Meta, Progress};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not available")]
    Unavailable,
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Named string slots
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// A JSON document with a fixed storage key
pub trait Document: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
}

/// Volatile storage for native runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Browser LocalStorage
#[cfg(target_arch = "wasm32")]
pub struct LocalStorage {
    inner: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    pub fn open() -> Result<Self, StorageError> {
        let inner = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(StorageError::Unavailable)?;
        Ok(Self { inner })
    }
}

#[cfg(target_arch = "wasm32")]
impl Storage for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner
            .get_item(key)
            .map_err(|e| StorageError::Backend(format!("{:?}", e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .set_item(key, value)
            .map_err(|e| StorageError::Backend(format!("{:?}", e)))
    }
}

/// Read and parse a document
pub fn load<T: Document>(storage: &dyn Storage) -> Result<Option<T>, StorageError> {
    match storage.get(T::KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Read a document, falling back to its default on any failure
pub fn load_or_default<T: Document>(storage: &dyn Storage) -> T {
    match load::<T>(storage) {
        Ok(Some(doc)) => {
            log::info!("Loaded {}", T::KEY);
            doc
        }
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("Could not read {}: {}, using defaults", T::KEY, e);
            T::default()
        }
    }
}

/// Serialize and write a document
pub fn save<T: Document>(storage: &mut dyn Storage, doc: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string(doc)?;
    storage.set(T::KEY, &json)
}

/// Write a document, logging instead of failing
pub fn save_or_warn<T: Document>(storage: &mut dyn Storage, doc: &T) {
    match save(storage, doc) {
        Ok(()) => log::debug!("Saved {}", T::KEY),
        Err(e) => log::warn!("Could not save {}: {}", T::KEY, e),
    }
}
