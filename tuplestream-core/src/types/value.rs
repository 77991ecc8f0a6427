//! Dynamically typed field values and their conversion to and from Rust types.

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::EntityKey;
use crate::slice::Slice;

/// The type of a field or of a function parameter.
///
/// `Any` marks a dynamically typed field (or a parameter accepting any value) and is
/// compatible with every other type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// dynamically typed
    Any,
    /// only ever `Null`
    Null,
    /// boolean
    Bool,
    /// 64 bit signed integer
    Int,
    /// 64 bit float
    Float,
    /// UTF-8 string
    Str,
    /// versioned cell values, see [Slice]
    Slice,
    /// entity key, see [EntityKey]
    Key,
}

impl ValueType {
    /// Check whether a parameter of type `self` can receive values of a field
    /// declared as `field`. Integers widen to floats.
    pub fn accepts(self, field: ValueType) -> bool {
        match (self, field) {
            (ValueType::Any, _) | (_, ValueType::Any) => true,
            (ValueType::Float, ValueType::Int) => true,
            (a, b) => a == b,
        }
    }

    /// Merge two declared types into the most specific type covering both.
    pub fn unify(self, other: ValueType) -> ValueType {
        if self == other {
            self
        } else {
            ValueType::Any
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Any => "any",
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "string",
            ValueType::Slice => "slice",
            ValueType::Key => "entity key",
        };
        f.write_str(name)
    }
}

/// A value was not of the type an operation required
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a value of type {expected}, found {found}")]
pub struct TypeMismatch {
    /// type the operation required
    pub expected: ValueType,
    /// type of the value actually encountered
    pub found: ValueType,
}

/// A single field value.
///
/// Values are totally ordered, comparable and hashable so they can be used as join
/// and group keys. Floats compare by [f64::total_cmp], and values of different types
/// are never equal: `Int(1) != Float(1.0)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absent value, e.g. the unmatched side of an outer join
    #[default]
    Null,
    /// A boolean
    Bool(bool),
    /// A signed integer
    Int(i64),
    /// A float
    Float(f64),
    /// A string
    Str(String),
    /// All versioned values of a cell
    Slice(Slice),
    /// An entity key
    Key(EntityKey),
}

impl Value {
    /// The runtime type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Slice(_) => ValueType::Slice,
            Value::Key(_) => ValueType::Key,
        }
    }

    /// True for [Value::Null]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// View this value as a float if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert this value into a Rust type
    pub fn cast<T: FromValue>(self) -> Result<T, TypeMismatch> {
        T::from_value(self)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::Slice(_) => 5,
            Value::Key(_) => 6,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Slice(a), Value::Slice(b)) => a.iter().cmp(b.iter()),
            (Value::Key(a), Value::Key(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => (),
            Value::Bool(x) => x.hash(state),
            Value::Int(x) => x.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Str(x) => x.hash(state),
            Value::Slice(x) => x.hash(state),
            Value::Key(x) => x.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(x) => write!(f, "{x}"),
            Value::Int(x) => write!(f, "{x}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(x) => f.write_str(x),
            Value::Slice(x) => write!(f, "{x}"),
            Value::Key(x) => write!(f, "{x}"),
        }
    }
}

/// Types which can be extracted from a [Value].
///
/// `VALUE_TYPE` is the field type this Rust type declares in operator signatures.
/// It is checked against the stream schema when the pipeline is built.
pub trait FromValue: Sized {
    /// Declared field type
    const VALUE_TYPE: ValueType;

    /// Convert a value, failing if it is of the wrong runtime type
    fn from_value(value: Value) -> Result<Self, TypeMismatch>;
}

/// Types which can be stored in a [Value]
pub trait IntoValue {
    /// Declared field type of values produced from this type
    const VALUE_TYPE: ValueType;

    /// Convert into a value
    fn into_value(self) -> Value;
}

macro_rules! value_conversion {
    ($t:ty, $variant:ident, $vt:ident) => {
        impl FromValue for $t {
            const VALUE_TYPE: ValueType = ValueType::$vt;

            fn from_value(value: Value) -> Result<Self, TypeMismatch> {
                match value {
                    Value::$variant(x) => Ok(x),
                    other => Err(TypeMismatch {
                        expected: ValueType::$vt,
                        found: other.value_type(),
                    }),
                }
            }
        }

        impl IntoValue for $t {
            const VALUE_TYPE: ValueType = ValueType::$vt;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::$variant(value)
            }
        }
    };
}

value_conversion!(bool, Bool, Bool);
value_conversion!(i64, Int, Int);
value_conversion!(String, Str, Str);
value_conversion!(Slice, Slice, Slice);
value_conversion!(EntityKey, Key, Key);

impl FromValue for f64 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        value.as_f64().ok_or(TypeMismatch {
            expected: ValueType::Float,
            found: value.value_type(),
        })
    }
}

impl IntoValue for f64 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl IntoValue for usize {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoValue for i32 {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn into_value(self) -> Value {
        Value::Int(self.into())
    }
}

impl IntoValue for &str {
    const VALUE_TYPE: ValueType = ValueType::Str;

    fn into_value(self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl FromValue for Value {
    const VALUE_TYPE: ValueType = ValueType::Any;

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        Ok(value)
    }
}

impl IntoValue for Value {
    const VALUE_TYPE: ValueType = ValueType::Any;

    fn into_value(self) -> Value {
        self
    }
}

/// `None` maps to [Value::Null], e.g. for the missing side of an outer join
impl<T: FromValue> FromValue for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;

    fn from_value(value: Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;

    fn into_value(self) -> Value {
        match self {
            Some(x) => x.into_value(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn int_widens_to_float() {
        assert!(ValueType::Float.accepts(ValueType::Int));
        assert!(!ValueType::Int.accepts(ValueType::Float));
        assert_eq!(Value::Int(3).cast::<f64>(), Ok(3.0));
    }

    #[test]
    fn any_accepts_everything() {
        assert!(ValueType::Any.accepts(ValueType::Slice));
        assert!(ValueType::Str.accepts(ValueType::Any));
        assert!(!ValueType::Str.accepts(ValueType::Int));
    }

    #[test]
    fn cast_reports_mismatch() {
        let err = Value::from("x").cast::<i64>().unwrap_err();
        assert_eq!(
            err,
            TypeMismatch {
                expected: ValueType::Int,
                found: ValueType::Str
            }
        );
    }

    #[test]
    fn null_is_none() {
        assert_eq!(Value::Null.cast::<Option<i64>>(), Ok(None));
        assert_eq!(Value::Int(4).cast::<Option<i64>>(), Ok(Some(4)));
        assert!(Value::Null.cast::<i64>().is_err());
    }

    #[test]
    fn ints_and_floats_are_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        let set: HashSet<Value> = [Value::Int(1), Value::Float(1.0), Value::Int(1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn nan_equals_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn orders_by_type_then_value() {
        let mut values = vec![
            Value::from("b"),
            Value::Int(2),
            Value::Null,
            Value::from("a"),
            Value::Int(-1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(-1),
                Value::Int(2),
                Value::from("a"),
                Value::from("b")
            ]
        );
    }
}
