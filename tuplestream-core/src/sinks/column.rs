use std::time::{SystemTime, UNIX_EPOCH};

use super::{require_field, SinkError, TupleSink};
use crate::keys::EntityKey;
use crate::slice::Cell;
use crate::types::{Schema, Tuple, Value, ValueType};

/// Storage accepting versioned cell writes
pub trait CellWriter: Send + 'static {
    /// Write one versioned value into the cell `column` of the row `key`
    fn write_cell(&mut self, key: &EntityKey, column: &str, cell: Cell) -> Result<(), SinkError>;

    /// Called once after the last write of a run
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Version attached to the cells written by a [ColumnSink]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Microseconds since the unix epoch at the time of the write
    #[default]
    Now,
    /// Taken from an integer field of the tuple
    Field(String),
}

/// Writes tuples into column storage: one cell per mapped field, in the row addressed by the
/// entity key field.
///
/// ```rust
/// use tuplestream::operators::*;
/// use tuplestream::sinks::{ColumnSink, InMemoryTable, VersionPolicy};
/// use tuplestream::sources::TupleSource;
/// use tuplestream::stream::Pipeline;
/// use tuplestream::tuple;
///
/// let table = InMemoryTable::new();
/// let sink = ColumnSink::new(table.clone(), "user")
///     .map("total", "plays_total")
///     .version(VersionPolicy::Field("day".into()));
///
/// let totals = TupleSource::infer(vec![tuple! {"user" => "a", "total" => 12i64, "day" => 3i64}]);
/// Pipeline::new()
///     .source("totals", totals)
///     .unwrap()
///     .write("store", sink)
///     .unwrap();
///
/// assert_eq!(table.len(), 1);
/// ```
pub struct ColumnSink<W> {
    writer: W,
    key_field: String,
    mappings: Vec<(String, String)>,
    version: VersionPolicy,
}

impl<W: CellWriter> ColumnSink<W> {
    /// Write into `writer`, addressing rows by the entity key in `key_field`
    pub fn new(writer: W, key_field: impl Into<String>) -> Self {
        Self {
            writer,
            key_field: key_field.into(),
            mappings: Vec::new(),
            version: VersionPolicy::default(),
        }
    }

    /// Write the values of `field` into `column`
    pub fn map(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.mappings.push((field.into(), column.into()));
        self
    }

    /// Set how written cells are versioned, [VersionPolicy::Now] by default
    pub fn version(mut self, version: VersionPolicy) -> Self {
        self.version = version;
        self
    }

    fn entity_key(&self, tuple: &Tuple) -> Result<EntityKey, SinkError> {
        match tuple.get(&self.key_field) {
            Some(Value::Key(key)) => Ok(key.clone()),
            Some(Value::Str(s)) => Ok(EntityKey::from(s.as_str())),
            Some(Value::Int(i)) => Ok(EntityKey::from(*i)),
            Some(other) => Err(SinkError::FieldType {
                field: self.key_field.clone(),
                expected: ValueType::Key,
                found: other.value_type(),
            }),
            None => Err(SinkError::MissingField(self.key_field.clone())),
        }
    }

    fn version_of(&self, tuple: &Tuple) -> Result<i64, SinkError> {
        match &self.version {
            VersionPolicy::Now => {
                let micros = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| SinkError::Invalid(e.to_string()))?
                    .as_micros();
                i64::try_from(micros).map_err(|e| SinkError::Invalid(e.to_string()))
            }
            VersionPolicy::Field(field) => match tuple.get(field) {
                Some(Value::Int(v)) => Ok(*v),
                Some(other) => Err(SinkError::FieldType {
                    field: field.clone(),
                    expected: ValueType::Int,
                    found: other.value_type(),
                }),
                None => Err(SinkError::MissingField(field.clone())),
            },
        }
    }
}

impl<W: CellWriter> TupleSink for ColumnSink<W> {
    fn validate(&mut self, _name: &str, schema: &Schema) -> Result<(), SinkError> {
        if self.mappings.is_empty() {
            return Err(SinkError::Invalid("no field is mapped to a column".to_owned()));
        }
        require_field(
            schema,
            &self.key_field,
            &[ValueType::Key, ValueType::Str, ValueType::Int],
        )?;
        if let VersionPolicy::Field(field) = &self.version {
            require_field(schema, field, &[ValueType::Int])?;
        }
        for (field, _) in &self.mappings {
            if !schema.contains(field) {
                return Err(SinkError::MissingField(field.clone()));
            }
        }
        Ok(())
    }

    /// `Null` values are not written
    fn write(&mut self, tuple: Tuple) -> Result<(), SinkError> {
        let key = self.entity_key(&tuple)?;
        let version = self.version_of(&tuple)?;
        for (field, column) in &self.mappings {
            let value = tuple
                .get(field)
                .ok_or_else(|| SinkError::MissingField(field.clone()))?;
            if value.is_null() {
                continue;
            }
            self.writer
                .write_cell(&key, column, Cell::new(version, value.clone()))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()
    }
}
