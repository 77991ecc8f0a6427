//! Byte layout of entity keys
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EntityKey, KeyComponent};

/// Declared type of one key component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// [KeyComponent::Str]
    Str,
    /// [KeyComponent::Int]
    Int,
    /// [KeyComponent::Hashed]
    Hashed,
}

impl ComponentType {
    fn of(component: &KeyComponent) -> Self {
        match component {
            KeyComponent::Str(_) => ComponentType::Str,
            KeyComponent::Int(_) => ComponentType::Int,
            KeyComponent::Hashed(_) => ComponentType::Hashed,
        }
    }
}

/// Errors encoding or decoding entity keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key has a different number of components than the format declares
    #[error("key has {found} components, format declares {expected}")]
    Arity {
        /// declared components
        expected: usize,
        /// actual components
        found: usize,
    },
    /// Component type differs from the declaration
    #[error("key component {index} is {found:?}, format declares {expected:?}")]
    ComponentType {
        /// position of the component
        index: usize,
        /// declared type
        expected: ComponentType,
        /// actual type
        found: ComponentType,
    },
    /// Hashed components can not be turned back into their original value
    #[error("format contains hashed components and can not be decoded")]
    NotDecodable,
    /// Bytes are not a valid encoding for this format
    #[error("malformed key encoding: {0}")]
    Malformed(&'static str),
}

/// Deterministic byte encoding of entity keys.
///
/// Without hashed components and hash prefix, the encoding preserves order: for two keys
/// `a < b` the encoding of `a` sorts before the encoding of `b` bytewise.
/// Strings are escaped (`0x00` becomes `0x00 0xFF`) and terminated by `0x00 0x00`, integers
/// are stored big endian with the sign bit flipped, hashed components are the big endian
/// [seahash] of the string.
///
/// A hash prefix puts the first bytes of the hash of the whole encoded key in front, which
/// spreads consecutive keys across storage regions at the cost of ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFormat {
    components: Vec<ComponentType>,
    hash_prefix: usize,
}

const INT_LEN: usize = 8;

impl KeyFormat {
    /// Create a format for keys with these components
    pub fn new(components: impl IntoIterator<Item = ComponentType>) -> Self {
        Self {
            components: components.into_iter().collect(),
            hash_prefix: 0,
        }
    }

    /// Prefix each encoded key with `bytes` bytes of its hash. At most 8 bytes are used.
    pub fn with_hash_prefix(mut self, bytes: usize) -> Self {
        self.hash_prefix = bytes.min(INT_LEN);
        self
    }

    /// Declared component types
    pub fn components(&self) -> &[ComponentType] {
        &self.components
    }

    /// True if encoded keys sort like the keys themselves
    pub fn is_order_preserving(&self) -> bool {
        self.hash_prefix == 0 && !self.components.contains(&ComponentType::Hashed)
    }

    /// Check a key against this format
    pub fn validate(&self, key: &EntityKey) -> Result<(), KeyError> {
        if key.len() != self.components.len() {
            return Err(KeyError::Arity {
                expected: self.components.len(),
                found: key.len(),
            });
        }
        for (index, (component, expected)) in
            key.components().iter().zip(self.components.iter()).enumerate()
        {
            let found = ComponentType::of(component);
            if found != *expected {
                return Err(KeyError::ComponentType {
                    index,
                    expected: *expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Encode a key to bytes
    pub fn encode(&self, key: &EntityKey) -> Result<Vec<u8>, KeyError> {
        self.validate(key)?;
        let mut body = Vec::new();
        for component in key.components() {
            match component {
                KeyComponent::Str(s) => encode_str(s, &mut body),
                KeyComponent::Int(i) => body.extend_from_slice(&encode_int(*i)),
                KeyComponent::Hashed(s) => {
                    body.extend_from_slice(&seahash::hash(s.as_bytes()).to_be_bytes())
                }
            }
        }
        if self.hash_prefix == 0 {
            return Ok(body);
        }
        let prefix = seahash::hash(&body).to_be_bytes();
        let mut out = Vec::with_capacity(self.hash_prefix + body.len());
        out.extend_from_slice(&prefix[..self.hash_prefix]);
        out.extend(body);
        Ok(out)
    }

    /// Decode bytes produced by [KeyFormat::encode]. The hash prefix must match the body.
    pub fn decode(&self, bytes: &[u8]) -> Result<EntityKey, KeyError> {
        if self.components.contains(&ComponentType::Hashed) {
            return Err(KeyError::NotDecodable);
        }
        if bytes.len() < self.hash_prefix {
            return Err(KeyError::Malformed("shorter than hash prefix"));
        }
        let (prefix, mut rest) = bytes.split_at(self.hash_prefix);
        if prefix != &seahash::hash(rest).to_be_bytes()[..self.hash_prefix] {
            return Err(KeyError::Malformed("hash prefix does not match key"));
        }
        let mut components = Vec::with_capacity(self.components.len());
        for ty in &self.components {
            let component = match ty {
                ComponentType::Str => {
                    let (s, tail) = decode_str(rest)?;
                    rest = tail;
                    KeyComponent::Str(s)
                }
                ComponentType::Int => {
                    let (head, tail) = rest
                        .split_first_chunk::<INT_LEN>()
                        .ok_or(KeyError::Malformed("truncated integer"))?;
                    rest = tail;
                    KeyComponent::Int(decode_int(*head))
                }
                ComponentType::Hashed => return Err(KeyError::NotDecodable),
            };
            components.push(component);
        }
        if !rest.is_empty() {
            return Err(KeyError::Malformed("trailing bytes"));
        }
        Ok(EntityKey::from(components))
    }
}

fn encode_int(i: i64) -> [u8; INT_LEN] {
    ((i as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_int(bytes: [u8; INT_LEN]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    for b in s.bytes() {
        out.push(b);
        if b == 0 {
            out.push(0xFF);
        }
    }
    out.extend_from_slice(&[0, 0]);
}

fn decode_str(bytes: &[u8]) -> Result<(String, &[u8]), KeyError> {
    let mut raw = Vec::new();
    let mut i = 0;
    loop {
        match (bytes.get(i), bytes.get(i + 1)) {
            (Some(0), Some(0)) => break,
            (Some(0), Some(0xFF)) => {
                raw.push(0);
                i += 2;
            }
            (Some(0), _) => return Err(KeyError::Malformed("invalid string escape")),
            (Some(b), _) => {
                raw.push(*b);
                i += 1;
            }
            (None, _) => return Err(KeyError::Malformed("unterminated string")),
        }
    }
    let s = String::from_utf8(raw).map_err(|_| KeyError::Malformed("string is not utf-8"))?;
    Ok((s, &bytes[i + 2..]))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn user_day() -> KeyFormat {
        KeyFormat::new([ComponentType::Str, ComponentType::Int])
    }

    #[test]
    fn roundtrip_with_nul_bytes() {
        let key = EntityKey::new([KeyComponent::from("a\0b"), KeyComponent::Int(-5)]);
        let fmt = user_day();
        let bytes = fmt.encode(&key).unwrap();
        assert_eq!(fmt.decode(&bytes).unwrap(), key);
    }

    #[test]
    fn rejects_wrong_shape() {
        let fmt = user_day();
        assert_eq!(
            fmt.encode(&EntityKey::from("u1")),
            Err(KeyError::Arity {
                expected: 2,
                found: 1
            })
        );
        let swapped = EntityKey::new([KeyComponent::Int(1), KeyComponent::from("u1")]);
        assert!(matches!(
            fmt.encode(&swapped),
            Err(KeyError::ComponentType { index: 0, .. })
        ));
    }

    #[test]
    fn hashed_is_deterministic_not_decodable() {
        let fmt = KeyFormat::new([ComponentType::Hashed]);
        let key = EntityKey::new([KeyComponent::Hashed("user-17".into())]);
        assert_eq!(fmt.encode(&key), fmt.encode(&key.clone()));
        assert_eq!(fmt.encode(&key).unwrap().len(), 8);
        assert_eq!(fmt.decode(&[0; 8]), Err(KeyError::NotDecodable));
        assert!(!fmt.is_order_preserving());
    }

    #[test]
    fn hash_prefix_is_checked_on_decode() {
        let fmt = user_day().with_hash_prefix(2);
        let key = EntityKey::new([KeyComponent::from("u"), KeyComponent::Int(1)]);
        let mut bytes = fmt.encode(&key).unwrap();
        assert_eq!(bytes.len(), 2 + 3 + 8);
        assert_eq!(fmt.decode(&bytes).unwrap(), key);

        bytes[0] ^= 0xFF;
        assert_eq!(
            fmt.decode(&bytes),
            Err(KeyError::Malformed("hash prefix does not match key"))
        );
        assert_eq!(
            fmt.decode(&[0]),
            Err(KeyError::Malformed("shorter than hash prefix"))
        );
    }

    #[test]
    fn malformed_input() {
        let fmt = user_day();
        assert_eq!(
            fmt.decode(b"abc"),
            Err(KeyError::Malformed("unterminated string"))
        );
        assert_eq!(
            fmt.decode(&[b'a', 0, 0, 1]),
            Err(KeyError::Malformed("truncated integer"))
        );
    }

    proptest! {
        #[test]
        fn encoding_preserves_order(a in ".*", x in any::<i64>(), b in ".*", y in any::<i64>()) {
            let fmt = user_day();
            let ka = EntityKey::new([KeyComponent::Str(a), KeyComponent::Int(x)]);
            let kb = EntityKey::new([KeyComponent::Str(b), KeyComponent::Int(y)]);
            let (ea, eb) = (fmt.encode(&ka).unwrap(), fmt.encode(&kb).unwrap());
            prop_assert_eq!(ka.cmp(&kb), ea.cmp(&eb));
        }
    }
}
