//! A versioned in-memory table, usable as source, sink and lookup store at once.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use super::{CellWriter, SinkError};
use crate::keys::EntityKey;
use crate::lookup::{KeyValueStore, LookupError};
use crate::slice::{Cell, Slice};
use crate::sources::{Row, RowSource, SourceError};
use crate::types::{TypeMismatch, Value, ValueType};

type Rows = BTreeMap<EntityKey, IndexMap<String, Vec<Cell>>>;

/// Rows addressed by entity keys, each holding any number of cells with all their versions.
/// Clones refer to the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    rows: Arc<Mutex<Rows>>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no cell was written yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Add a versioned value to a cell
    pub fn put(&self, key: impl Into<EntityKey>, column: impl Into<String>, cell: Cell) {
        self.lock()
            .entry(key.into())
            .or_default()
            .entry(column.into())
            .or_default()
            .push(cell);
    }

    /// All versions of a cell, newest first
    pub fn cells(&self, key: &EntityKey, column: &str) -> Vec<Cell> {
        self.lock()
            .get(key)
            .and_then(|row| row.get(column))
            .map(|cells| Slice::new(cells.iter().cloned()).iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Read the given columns of all rows, see [StorageSource](crate::sources::StorageSource)
    pub fn reader<C: Into<String>>(&self, columns: impl IntoIterator<Item = C>) -> TableReader {
        TableReader {
            table: self.clone(),
            columns: columns.into_iter().map(Into::into).collect(),
            partitions: 1,
        }
    }

    /// Look up the newest value of `column` by entity key
    pub fn lookup(&self, column: impl Into<String>) -> TableLookup {
        TableLookup {
            table: self.clone(),
            column: column.into(),
        }
    }
}

impl CellWriter for InMemoryTable {
    fn write_cell(&mut self, key: &EntityKey, column: &str, cell: Cell) -> Result<(), SinkError> {
        self.put(key.clone(), column, cell);
        Ok(())
    }
}

/// [RowSource] over the rows of an [InMemoryTable]
#[derive(Debug, Clone)]
pub struct TableReader {
    table: InMemoryTable,
    columns: Vec<String>,
    partitions: usize,
}

impl TableReader {
    /// Split the rows into `n` partitions, assigned round robin in key order
    pub fn partitions(mut self, n: usize) -> Self {
        self.partitions = n.max(1);
        self
    }
}

impl RowSource for TableReader {
    type Part = usize;
    type Partition = std::vec::IntoIter<Row>;

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn list_parts(&self) -> Vec<Self::Part> {
        (0..self.partitions).collect()
    }

    fn build_part(&self, part: &Self::Part) -> Result<Self::Partition, SourceError> {
        let rows = self.table.lock();
        let partition: Vec<Row> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.partitions == *part)
            .map(|(_, (key, cells))| Row {
                entity_id: key.clone(),
                cells: self
                    .columns
                    .iter()
                    .filter_map(|c| {
                        cells
                            .get(c)
                            .map(|cells| (c.clone(), Slice::new(cells.iter().cloned())))
                    })
                    .collect(),
            })
            .collect();
        Ok(partition.into_iter())
    }
}

/// [KeyValueStore] returning the newest value of one column of an [InMemoryTable].
/// Keys may be entity keys, strings or integers.
#[derive(Debug, Clone)]
pub struct TableLookup {
    table: InMemoryTable,
    column: String,
}

impl KeyValueStore for TableLookup {
    fn get(&self, key: &Value) -> Result<Option<Value>, LookupError> {
        let key = match key {
            Value::Key(k) => k.clone(),
            Value::Str(s) => EntityKey::from(s.as_str()),
            Value::Int(i) => EntityKey::from(*i),
            other => {
                return Err(LookupError::Type(TypeMismatch {
                    expected: ValueType::Key,
                    found: other.value_type(),
                }))
            }
        };
        Ok(self
            .table
            .cells(&key, &self.column)
            .into_iter()
            .next()
            .map(|c| c.value))
    }
}
