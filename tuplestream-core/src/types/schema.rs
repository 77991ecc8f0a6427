//! Declared field layouts of streams

use std::fmt::Display;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::value::ValueType;

/// The ordered field layout of a stream: every tuple in the stream has exactly these
/// fields, in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: IndexMap<String, ValueType>,
}

impl Schema {
    /// A schema with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Redeclaring an existing field replaces its type in place.
    pub fn with(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.insert(name.into(), value_type);
        self
    }

    /// Declared type of a field
    pub fn get(&self, name: &str) -> Option<ValueType> {
        self.fields.get(name).copied()
    }

    /// True if the schema declares this field
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Position of a field
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(name, type)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ValueType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema declares no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value_type: ValueType) {
        self.fields.insert(name.into(), value_type);
    }

    /// True if both schemas have the same field names in the same order
    pub fn same_layout(&self, other: &Schema) -> bool {
        self.names().eq(other.names())
    }
}

impl<K: Into<String>> FromIterator<(K, ValueType)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, ValueType)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self
            .fields
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .join(", ");
        write!(f, "({fields})")
    }
}

/// A list of field names given to an operator.
///
/// Usually constructed implicitly from a `&str`, an array or a `Vec` of names:
/// ```rust
/// use tuplestream::types::Fields;
///
/// let one: Fields = "plays".into();
/// let two: Fields = ["user", "plays"].into();
/// assert_eq!(one.len(), 1);
/// assert_eq!(two.names().collect::<Vec<_>>(), vec!["user", "plays"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fields(Vec<String>);

impl Fields {
    /// No fields at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no names are given
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the list names this field
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|x| x == name)
    }

    /// Return the first name which occurs more than once
    pub fn first_duplicate(&self) -> Option<&str> {
        self.0.iter().duplicates().next().map(String::as_str)
    }

    pub(crate) fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Fields {
    fn from(value: &str) -> Self {
        Self(vec![value.to_owned()])
    }
}

impl From<String> for Fields {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|x| (*x).to_owned()).collect())
    }
}

impl From<&[&str]> for Fields {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|x| (*x).to_owned()).collect())
    }
}

impl From<Vec<&str>> for Fields {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<String>> for Fields {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&Schema> for Fields {
    fn from(value: &Schema) -> Self {
        Self(value.names().map(str::to_owned).collect())
    }
}

impl Display for Fields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_duplicates() {
        let f: Fields = ["a", "b", "a"].into();
        assert_eq!(f.first_duplicate(), Some("a"));
        let f: Fields = ["a", "b"].into();
        assert_eq!(f.first_duplicate(), None);
    }

    #[test]
    fn schema_keeps_order() {
        let s = Schema::new()
            .with("b", ValueType::Int)
            .with("a", ValueType::Str);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(s.index_of("a"), Some(1));
        assert_eq!(s.to_string(), "(b: int, a: string)");
    }
}
