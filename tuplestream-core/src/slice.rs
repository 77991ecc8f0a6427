//! Versioned, multi-valued cells.
//!
//! A storage cell may hold many values, each written at a different version. A [Slice] holds
//! all of them, ordered newest first, and offers the selections and reductions operators use
//! to turn a history of values into a single value.
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IntoValue, TypeMismatch, Value, ValueType};

/// One versioned value of a cell
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Version (usually a timestamp) the value was written at
    pub version: i64,
    /// The stored value
    pub value: Value,
}

impl Cell {
    /// Create a new cell
    pub fn new(version: i64, value: impl IntoValue) -> Self {
        Self {
            version,
            value: value.into_value(),
        }
    }
}

/// Errors of slice selections and reductions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceError {
    /// A reduction was applied to a slice without values
    #[error("slice is empty")]
    Empty,
    /// Index does not address a value of the slice
    #[error("index {index} is out of range for slice of length {len}")]
    IndexOutOfRange {
        /// requested index
        index: usize,
        /// length of the slice
        len: usize,
    },
    /// A numeric reduction encountered a non-numeric value
    #[error("slice holds non-numeric values: {0}")]
    NotNumeric(TypeMismatch),
    /// Integer sum exceeded the range of i64
    #[error("integer overflow in slice reduction")]
    Overflow,
}

/// An immutable, ordered collection of versioned values for one logical cell.
///
/// Slices created with [Slice::new] are ordered newest first; ties between equal versions
/// keep the order in which the cells were given. All operations return new slices or
/// values, the slice itself never changes. Cloning is cheap as cells are shared.
///
/// ```rust
/// use tuplestream::slice::{Cell, Slice};
/// use tuplestream::types::Value;
///
/// let plays = Slice::new([Cell::new(1, 3i64), Cell::new(3, 7i64), Cell::new(2, 2i64)]);
/// assert_eq!(plays.first().unwrap(), &Value::Int(7));
/// assert_eq!(plays.sum().unwrap(), Value::Int(12));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slice {
    cells: Arc<Vec<Cell>>,
}

impl Slice {
    /// Create a slice from cells in any order, normalizing it to newest first
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut cells: Vec<Cell> = cells.into_iter().collect();
        cells.sort_by(|a, b| b.version.cmp(&a.version));
        Self::from_ordered(cells)
    }

    /// A slice without any values
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap cells keeping their order as given
    fn from_ordered(cells: Vec<Cell>) -> Self {
        Self {
            cells: Arc::new(cells),
        }
    }

    /// Value at the given position
    pub fn get(&self, index: usize) -> Result<&Value, SliceError> {
        self.cell(index).map(|c| &c.value)
    }

    /// Versioned cell at the given position
    pub fn cell(&self, index: usize) -> Result<&Cell, SliceError> {
        self.cells.get(index).ok_or(SliceError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    /// The first value, which is the newest one unless the slice was reordered
    pub fn first(&self) -> Result<&Value, SliceError> {
        self.cells.first().map(|c| &c.value).ok_or(SliceError::Empty)
    }

    /// The last value, which is the oldest one unless the slice was reordered
    pub fn last(&self) -> Result<&Value, SliceError> {
        self.cells.last().map(|c| &c.value).ok_or(SliceError::Empty)
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Number of values, same as [Slice::len]
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Number of values as a field value, e.g. for use as map output
    pub fn count(&self) -> i64 {
        i64::try_from(self.len()).unwrap_or(i64::MAX)
    }

    /// True if the slice holds no values
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate the cells in order
    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    /// Iterate the values in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().map(|c| &c.value)
    }

    /// Return a new slice sorted by the given key.
    /// The sort is stable, cells with equal keys keep their relative order.
    pub fn order_by<K: Ord>(&self, key: impl FnMut(&Cell) -> K) -> Slice {
        let mut cells = self.cells.as_ref().clone();
        cells.sort_by_key(key);
        Self::from_ordered(cells)
    }

    /// Return a new slice ordered newest first
    pub fn order_by_version(&self) -> Slice {
        Self::new(self.cells.iter().cloned())
    }

    /// Split the slice into sub-slices by key.
    /// Groups appear in order of their first cell, each group keeps the order of this slice.
    pub fn group_by<K: Hash + Eq>(&self, mut key: impl FnMut(&Cell) -> K) -> IndexMap<K, Slice> {
        let mut groups: IndexMap<K, Vec<Cell>> = IndexMap::new();
        for cell in self.cells.iter() {
            groups.entry(key(cell)).or_default().push(cell.clone());
        }
        groups
            .into_iter()
            .map(|(k, cells)| (k, Self::from_ordered(cells)))
            .collect()
    }

    /// The first `n` cells
    pub fn limit(&self, n: usize) -> Slice {
        Self::from_ordered(self.cells.iter().take(n).cloned().collect())
    }

    /// Transform every value, keeping versions and order
    pub fn project(&self, mut f: impl FnMut(&Value) -> Value) -> Slice {
        Self::from_ordered(
            self.cells
                .iter()
                .map(|c| Cell {
                    version: c.version,
                    value: f(&c.value),
                })
                .collect(),
        )
    }

    /// Keep only the cells matching the predicate
    pub fn filter(&self, mut pred: impl FnMut(&Cell) -> bool) -> Slice {
        Self::from_ordered(self.cells.iter().filter(|c| pred(c)).cloned().collect())
    }

    /// Smallest numeric value
    pub fn min(&self) -> Result<Value, SliceError> {
        self.numeric_extreme(Ordering::Less)
    }

    /// Largest numeric value
    pub fn max(&self) -> Result<Value, SliceError> {
        self.numeric_extreme(Ordering::Greater)
    }

    /// Sum of all values. The sum of integers is an integer, as soon as any value is a
    /// float the sum is a float.
    pub fn sum(&self) -> Result<Value, SliceError> {
        self.check_numeric()?;
        if self.values().all(|v| matches!(v, Value::Int(_))) {
            let mut total: i64 = 0;
            for v in self.values() {
                if let Value::Int(i) = v {
                    total = total.checked_add(*i).ok_or(SliceError::Overflow)?;
                }
            }
            Ok(Value::Int(total))
        } else {
            Ok(Value::Float(self.values().filter_map(Value::as_f64).sum()))
        }
    }

    /// Arithmetic mean of all values
    pub fn avg(&self) -> Result<f64, SliceError> {
        self.check_numeric()?;
        let total: f64 = self.values().filter_map(Value::as_f64).sum();
        Ok(total / self.len() as f64)
    }

    /// Fails on empty slices and slices holding non-numeric values
    fn check_numeric(&self) -> Result<(), SliceError> {
        if self.is_empty() {
            return Err(SliceError::Empty);
        }
        match self.values().find(|v| v.as_f64().is_none()) {
            Some(v) => Err(SliceError::NotNumeric(TypeMismatch {
                expected: ValueType::Float,
                found: v.value_type(),
            })),
            None => Ok(()),
        }
    }

    fn numeric_extreme(&self, wanted: Ordering) -> Result<Value, SliceError> {
        self.check_numeric()?;
        let mut best: Option<&Value> = None;
        for v in self.values() {
            best = match best {
                Some(b) if cmp_numeric(v, b) != wanted => Some(b),
                _ => Some(v),
            };
        }
        best.cloned().ok_or(SliceError::Empty)
    }
}

fn cmp_numeric(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => a
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&b.as_f64().unwrap_or(f64::NAN)),
    }
}

impl<V: IntoValue> FromIterator<(i64, V)> for Slice {
    fn from_iter<I: IntoIterator<Item = (i64, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(version, v)| Cell::new(version, v)))
    }
}

impl<'a> IntoIterator for &'a Slice {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.values().join(", "))
    }
}
