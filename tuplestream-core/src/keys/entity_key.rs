use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One typed component of an [EntityKey]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyComponent {
    /// A string component, stored as is
    Str(String),
    /// An integer component, stored in an order preserving encoding
    Int(i64),
    /// A string component, stored as its hash
    Hashed(String),
}

impl From<&str> for KeyComponent {
    fn from(value: &str) -> Self {
        KeyComponent::Str(value.to_owned())
    }
}

impl From<String> for KeyComponent {
    fn from(value: String) -> Self {
        KeyComponent::Str(value)
    }
}

impl From<i64> for KeyComponent {
    fn from(value: i64) -> Self {
        KeyComponent::Int(value)
    }
}

impl Display for KeyComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyComponent::Str(s) => f.write_str(s),
            KeyComponent::Int(i) => write!(f, "{i}"),
            KeyComponent::Hashed(s) => write!(f, "#{s}"),
        }
    }
}

/// The structured identifier of one row in storage.
///
/// Keys compare component-wise and order sensitive. How a key is laid out as bytes is
/// decided by a [KeyFormat](super::KeyFormat).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    components: Vec<KeyComponent>,
}

impl EntityKey {
    /// Create a key from its components
    pub fn new<C: Into<KeyComponent>>(components: impl IntoIterator<Item = C>) -> Self {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// The components in order
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    /// Component at the given position
    pub fn get(&self, index: usize) -> Option<&KeyComponent> {
        self.components.get(index)
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True for the key without components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self::new([value])
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        Self::new([value])
    }
}

impl From<Vec<KeyComponent>> for EntityKey {
    fn from(components: Vec<KeyComponent>) -> Self {
        Self { components }
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_component_wise() {
        let a = EntityKey::new([KeyComponent::from("u1"), KeyComponent::Int(9)]);
        let b = EntityKey::new([KeyComponent::from("u1"), KeyComponent::Int(10)]);
        let c = EntityKey::new([KeyComponent::from("u2"), KeyComponent::Int(0)]);
        assert!(a < b);
        assert!(b < c);
        assert_ne!(a, EntityKey::new([KeyComponent::Int(9), KeyComponent::from("u1")]));
    }

    #[test]
    fn display() {
        let k = EntityKey::new([
            KeyComponent::from("u1"),
            KeyComponent::Int(3),
            KeyComponent::Hashed("x".into()),
        ]);
        assert_eq!(k.to_string(), "(u1, 3, #x)");
    }
}
