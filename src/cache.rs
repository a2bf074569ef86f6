//! Two-level cache: a process-local map in front of a persistent store.
//!
//! Reads try memory first, then the store (populating memory on a hit).
//! Writes go to the store and to memory. Nothing is synchronized; concurrent
//! builders of the same entry simply overwrite each other with equal content.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::IndexError;
use crate::store::{KeyValueStore, Record};

const DATA_FIELD: &str = "data";
const CREATION_DATE_FIELD: &str = "creationdate";

/// A persisted cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// Store key the entry lives under
    pub key: String,
    /// The cached value
    pub data: V,
    /// When the entry was built
    pub creation_date: DateTime<Utc>,
}

impl<V: Serialize + DeserializeOwned> CacheEntry<V> {
    /// Creates an entry stamped with the current time.
    pub fn new(key: impl Into<String>, data: V) -> Self {
        Self {
            key: key.into(),
            data,
            creation_date: Utc::now(),
        }
    }

    /// Encodes the entry as a store record: the value as JSON under `data`
    /// and the RFC 3339 timestamp under `creationdate`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] if the value cannot be encoded.
    pub fn to_record(&self) -> Result<Record, IndexError> {
        let data = serde_json::to_string(&self.data)
            .map_err(|err| IndexError::Serialization(err.to_string()))?;
        Ok(Record::from([
            (DATA_FIELD.to_string(), data),
            (CREATION_DATE_FIELD.to_string(), self.creation_date.to_rfc3339()),
        ]))
    }

    /// Decodes an entry previously written by [`to_record`](Self::to_record).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] if a field is missing or invalid.
    pub fn from_record(key: impl Into<String>, record: &Record) -> Result<Self, IndexError> {
        let field = |name: &str| {
            record
                .get(name)
                .ok_or_else(|| IndexError::Serialization(format!("missing field '{}'", name)))
        };

        let data = serde_json::from_str(field(DATA_FIELD)?)
            .map_err(|err| IndexError::Serialization(err.to_string()))?;
        let creation_date = DateTime::parse_from_rfc3339(field(CREATION_DATE_FIELD)?)
            .map_err(|err| IndexError::Serialization(err.to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            key: key.into(),
            data,
            creation_date,
        })
    }
}

/// In-memory map with write-through to a [`KeyValueStore`].
#[derive(Debug)]
pub struct TieredCache<S, V> {
    store: S,
    kind: String,
    memory: RefCell<HashMap<String, V>>,
}

impl<S, V> TieredCache<S, V>
where
    S: KeyValueStore,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Creates a cache persisting entries under the store kind `kind`.
    pub fn new(store: S, kind: impl Into<String>) -> Self {
        Self {
            store,
            kind: kind.into(),
            memory: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the store kind entries are persisted under.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns `true` if `key` is held in the memory tier.
    pub fn is_memory_cached(&self, key: &str) -> bool {
        self.memory.borrow().contains_key(key)
    }

    /// Looks `key` up in memory, then in the store.
    ///
    /// A missing record is a miss. A record that cannot be decoded is logged
    /// and treated as a miss so that it gets rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] if the store fails for any reason other
    /// than a missing record.
    pub fn get(&self, key: &str) -> Result<Option<V>, IndexError> {
        if let Some(value) = self.memory.borrow().get(key) {
            tracing::debug!(key, "memory cache hit");
            return Ok(Some(value.clone()));
        }

        let record = match self.store.get(&self.kind, key) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match CacheEntry::<V>::from_record(key, &record) {
            Ok(entry) => {
                tracing::debug!(key, created = %entry.creation_date, "store cache hit");
                self.memory
                    .borrow_mut()
                    .insert(key.to_string(), entry.data.clone());
                Ok(Some(entry.data))
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Persists `value` under `key` and keeps a copy in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the store fails;
    /// memory is left untouched in that case.
    pub fn put(&self, key: &str, value: V) -> Result<(), IndexError> {
        let entry = CacheEntry::new(key, value);
        self.store.put(&self.kind, key, entry.to_record()?)?;
        self.memory.borrow_mut().insert(key.to_string(), entry.data);
        Ok(())
    }

    /// Removes `key` from both tiers. A key that is not persisted is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] if the store fails for any reason other
    /// than a missing record. The memory tier is evicted regardless.
    pub fn evict(&self, key: &str) -> Result<(), IndexError> {
        self.memory.borrow_mut().remove(key);
        match self.store.delete(&self.kind, key) {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
