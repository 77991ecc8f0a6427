use std::fmt::Debug;

use indexmap::IndexMap;
use tracing::debug;

use super::{SourceError, StreamSource, TupleIter};
use crate::keys::EntityKey;
use crate::slice::Slice;
use crate::types::{Schema, Tuple, Value, ValueType};

/// One row read from storage: the entity it belongs to and the slices of its cells
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    /// key of the entity this row belongs to
    pub entity_id: EntityKey,
    /// column name to all versioned values of the cell
    pub cells: IndexMap<String, Slice>,
}

impl Row {
    /// An empty row of the given entity
    pub fn new(entity_id: impl Into<EntityKey>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cells: IndexMap::new(),
        }
    }

    /// Add a cell to this row
    pub fn with_cell(mut self, column: impl Into<String>, slice: Slice) -> Self {
        self.cells.insert(column.into(), slice);
        self
    }
}

/// Implementation of a partitioned, row-oriented storage source
pub trait RowSource: Send + Sync + 'static {
    /// A `Part` of a partition is a key by which any partition of the source is
    /// uniquely identified. It is perfectly valid for a source to only have a single part and in
    /// turn only a single partition.
    type Part: Debug;
    /// A partition of this source. Each partition must read a disjoint set of rows.
    type Partition: RowPartition;

    /// Columns this source reads. Every row yields one slice per column.
    fn columns(&self) -> Vec<String>;

    /// List all partitions of this source
    fn list_parts(&self) -> Vec<Self::Part>;

    /// Build the partition for the given part
    fn build_part(&self, part: &Self::Part) -> Result<Self::Partition, SourceError>;
}

/// A single partition of a [RowSource]
pub trait RowPartition {
    /// Poll this partition for the next row, `None` once the partition is exhausted
    fn poll(&mut self) -> Option<Result<Row, SourceError>>;
}

impl RowPartition for std::vec::IntoIter<Row> {
    fn poll(&mut self) -> Option<Result<Row, SourceError>> {
        self.next().map(Ok)
    }
}

/// Adapts a [RowSource] into a stream: every row becomes a tuple of the entity key field
/// followed by one [Slice] field per column. Cells missing in a row become empty slices.
///
/// ```rust
/// use tuplestream::sinks::InMemoryTable;
/// use tuplestream::sources::{StorageSource, StreamSource};
///
/// let table = InMemoryTable::new();
/// let source = StorageSource::new(table.reader(["plays"])).key_field("user");
/// assert_eq!(source.schema().unwrap().to_string(), "(user: entity key, plays: slice)");
/// ```
pub struct StorageSource<R> {
    source: R,
    key_field: String,
}

impl<R: RowSource> StorageSource<R> {
    /// Wrap a row source, the entity key is read into the field `entity_id`
    pub fn new(source: R) -> Self {
        Self {
            source,
            key_field: "entity_id".to_owned(),
        }
    }

    /// Name of the field holding the entity key
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = name.into();
        self
    }
}

impl<R: RowSource> StreamSource for StorageSource<R> {
    fn schema(&self) -> Result<Schema, SourceError> {
        let mut schema = Schema::new().with(self.key_field.clone(), ValueType::Key);
        for column in self.source.columns() {
            if schema.contains(&column) {
                return Err(SourceError::Invalid(format!(
                    "column '{column}' is declared twice or shadows the key field"
                )));
            }
            schema = schema.with(column, ValueType::Slice);
        }
        Ok(schema)
    }

    fn scan(&self) -> Result<TupleIter<'_>, SourceError> {
        Ok(Box::new(StorageScan {
            source: &self.source,
            key_field: &self.key_field,
            columns: self.source.columns(),
            parts: self.source.list_parts().into_iter(),
            current: None,
        }))
    }
}

/// Reads all partitions of a row source one after the other
struct StorageScan<'a, R: RowSource> {
    source: &'a R,
    key_field: &'a str,
    columns: Vec<String>,
    parts: std::vec::IntoIter<R::Part>,
    current: Option<R::Partition>,
}

impl<R: RowSource> StorageScan<'_, R> {
    fn to_tuple(&self, mut row: Row) -> Tuple {
        let mut tuple = Tuple::new().with(self.key_field, row.entity_id);
        for column in &self.columns {
            let slice = row.cells.swap_remove(column).unwrap_or_default();
            tuple.insert(column.clone(), Value::Slice(slice));
        }
        tuple
    }
}

impl<R: RowSource> Iterator for StorageScan<'_, R> {
    type Item = Result<Tuple, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(partition) = self.current.as_mut() {
                match partition.poll() {
                    Some(Ok(row)) => return Some(Ok(self.to_tuple(row))),
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.current = None,
                }
            }
            let part = self.parts.next()?;
            debug!(?part, "reading partition");
            match self.source.build_part(&part) {
                Ok(partition) => self.current = Some(partition),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
