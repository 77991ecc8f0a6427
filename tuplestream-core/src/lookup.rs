//! Read-only key-value lookups from inside field functions.
//!
//! ```rust
//! use std::collections::HashMap;
//! use tuplestream::lookup::Lookup;
//! use tuplestream::types::Value;
//!
//! let names: HashMap<Value, Value> = [(Value::Int(1), Value::from("ada"))].into();
//! let lookup: Lookup<i64, String> = Lookup::new(names).with_default("unknown".to_string());
//! assert_eq!(lookup.try_get(1).unwrap(), "ada");
//! assert_eq!(lookup.try_get(2).unwrap(), "unknown");
//! ```
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::types::{FromValue, IntoValue, TypeMismatch, Value};

/// Errors of lookups
#[derive(Debug, Error)]
pub enum LookupError {
    /// No value is stored for the key and no default was declared
    #[error("no value found for key '{0}'")]
    NotFound(Value),
    /// Stored value has an unexpected type
    #[error(transparent)]
    Type(#[from] TypeMismatch),
    /// The store could not answer
    #[error("lookup store unavailable: {0}")]
    Unavailable(String),
}

/// A synchronous, read-only key-value store
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored for a key
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError>;
}

impl<S: ::std::hash::BuildHasher + Send + Sync> KeyValueStore for HashMap<Value, Value, S> {
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError> {
        Ok(HashMap::get(self, key).cloned())
    }
}

impl KeyValueStore for BTreeMap<Value, Value> {
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError> {
        Ok(BTreeMap::get(self, key).cloned())
    }
}

impl KeyValueStore for IndexMap<Value, Value> {
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError> {
        Ok(IndexMap::get(self, key).cloned())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError> {
        (**self).get(key)
    }
}

/// Typed access to a [KeyValueStore], optionally falling back to a default value.
/// Lookups are cheap to clone and can be moved into field functions.
pub struct Lookup<K, V> {
    store: Arc<dyn KeyValueStore>,
    default: Option<V>,
    _key: PhantomData<fn(K)>,
}

impl<K, V: Clone> Clone for Lookup<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default: self.default.clone(),
            _key: PhantomData,
        }
    }
}

impl<K, V> Lookup<K, V>
where
    K: IntoValue,
    V: FromValue + Clone,
{
    /// Typed lookups into the given store
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
            default: None,
            _key: PhantomData,
        }
    }

    /// Return this value for keys which are not found
    pub fn with_default(mut self, default: V) -> Self {
        self.default = Some(default);
        self
    }

    /// Get the value for a key, `None` if it is not stored and no default is declared
    pub fn get(&self, key: K) -> Result<Option<V>, LookupError> {
        match self.store.get(&key.into_value())? {
            Some(v) => Ok(Some(V::from_value(v)?)),
            None => Ok(self.default.clone()),
        }
    }

    /// Get the value for a key, failing with [LookupError::NotFound] if there is neither a
    /// stored value nor a default
    pub fn try_get(&self, key: K) -> Result<V, LookupError> {
        let key = key.into_value();
        match self.store.get(&key)? {
            Some(v) => Ok(V::from_value(v)?),
            None => self.default.clone().ok_or(LookupError::NotFound(key)),
        }
    }
}
