use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;

/// A persisted record: a flat map of string fields.
pub type Record = BTreeMap<String, String>;

/// A key/value entity store addressed by `(kind, key)`.
///
/// `get` and `delete` report a missing record as
/// [`StoreErrorKind::NotFound`](crate::StoreErrorKind::NotFound).
pub trait KeyValueStore {
    /// Loads the record stored under `(kind, key)`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if there is no such record, or a `Backend`
    /// error if the store fails.
    fn get(&self, kind: &str, key: &str) -> Result<Record, StoreError>;

    /// Stores `record` under `(kind, key)`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns a `Backend` error if the store fails.
    fn put(&self, kind: &str, key: &str, record: Record) -> Result<(), StoreError>;

    /// Removes the record stored under `(kind, key)`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if there is no such record, or a `Backend`
    /// error if the store fails.
    fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, kind: &str, key: &str) -> Result<Record, StoreError> {
        (**self).get(kind, key)
    }

    fn put(&self, kind: &str, key: &str, record: Record) -> Result<(), StoreError> {
        (**self).put(kind, key, record)
    }

    fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError> {
        (**self).delete(kind, key)
    }
}

/// An in-process [`KeyValueStore`] backed by a hash map.
///
/// Uses interior mutability so it can be shared by reference, the same way
/// a client handle to a real datastore would be.
///
/// # Examples
///
/// ```
/// use content_core::{KeyValueStore, MemoryStore, Record};
///
/// let store = MemoryStore::new();
/// let mut record = Record::new();
/// record.insert("data".to_string(), "[null]".to_string());
///
/// store.put("indexes", "k1", record).expect("put");
/// assert_eq!(store.get("indexes", "k1").expect("get")["data"], "[null]");
/// assert!(store.get("indexes", "k2").unwrap_err().is_not_found());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<(String, String), Record>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Returns `true` if a record exists under `(kind, key)`.
    pub fn contains(&self, kind: &str, key: &str) -> bool {
        self.records
            .borrow()
            .contains_key(&(kind.to_string(), key.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, kind: &str, key: &str) -> Result<Record, StoreError> {
        self.records
            .borrow()
            .get(&(kind.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(StoreError::not_found)
    }

    fn put(&self, kind: &str, key: &str, record: Record) -> Result<(), StoreError> {
        self.records
            .borrow_mut()
            .insert((kind.to_string(), key.to_string()), record);
        Ok(())
    }

    fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError> {
        self.records
            .borrow_mut()
            .remove(&(kind.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(StoreError::not_found)
    }
}
