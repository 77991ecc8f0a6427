//! The record type flowing through every stream.

use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::{FromValue, IntoValue, TypeMismatch, Value};

/// An ordered record of named fields.
///
/// Within one stream all tuples share the field set and field order declared by the
/// stream's [Schema](super::Schema). Equality ignores field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    fields: IndexMap<String, Value>,
}

impl Tuple {
    /// Create a tuple with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, returning the extended tuple.
    /// An existing field of the same name is replaced in place.
    pub fn with(mut self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.insert(name, value.into_value());
        self
    }

    /// Set a field. New fields are appended, existing fields keep their position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Remove a field, shifting all following fields one position forward
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Get the value of a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get the value of a field converted to a Rust type.
    /// Returns `None` if the field does not exist.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<Result<T, TypeMismatch>> {
        self.get(name).map(|v| T::from_value(v.clone()))
    }

    /// True if the tuple has a field of this name
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field values in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    /// Iterate `(name, value)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the tuple has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A new tuple holding only the given fields, in the given order.
    /// Fields this tuple does not have are skipped.
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Tuple {
        names
            .into_iter()
            .filter_map(|n| self.fields.get_key_value(n))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Compare two tuples including their field order
    pub fn eq_ordered(&self, other: &Tuple) -> bool {
        self.fields.iter().eq(other.fields.iter())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Tuple {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for Tuple {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Str(s) => write!(f, "{name}: {s:?}")?,
                other => write!(f, "{name}: {other}")?,
            }
        }
        f.write_str("}")
    }
}

/// Build a [Tuple] from `name => value` pairs.
///
/// ```rust
/// use tuplestream::tuple;
///
/// let t = tuple! { "id" => 1i64, "name" => "ada" };
/// assert_eq!(t.names().collect::<Vec<_>>(), vec!["id", "name"]);
/// ```
#[macro_export]
macro_rules! tuple {
    () => { $crate::types::Tuple::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::types::Tuple::new()$(.with($name, $value))+
    };
}
