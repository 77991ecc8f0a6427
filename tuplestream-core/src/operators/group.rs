//! Grouping and reduction.
//!
//! A grouped stream collects all tuples sharing the same key values before handing each group
//! to a reducer, so grouping is a barrier: nothing downstream of a reduction sees a tuple
//! before the whole input was read.
use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;

use super::transform::{check_unique, gather};
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::slice::{Cell, Slice};
use crate::stream::{node::NodeKind, StreamBuilder};
use crate::types::{FieldOutput, Fields, Schema, Tuple, Value, ValueType};

/// Properties of a reduction function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// The result does not depend on the order of tuples within a group
    /// (e.g. counts, sums, minima).
    Commutative,
    /// The result depends on the order of tuples within a group. Requires
    /// [GroupedStream::sort_by].
    Ordered,
}

/// All tuples of one group, in stream order or in the declared sort order
#[derive(Debug, Clone)]
pub struct Group {
    key: Tuple,
    tuples: Vec<Tuple>,
}

impl Group {
    /// The key fields shared by all tuples of this group
    pub fn key(&self) -> &Tuple {
        &self.key
    }

    /// All tuples of the group, in sort order if one was declared
    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    /// Number of tuples in this group
    pub fn count(&self) -> i64 {
        self.tuples.len() as i64
    }

    /// Values of `field` in all tuples of the group
    pub fn values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.tuples.iter().filter_map(move |t| t.get(field))
    }

    /// Sum of the numeric field `field` over the group, see [Slice::sum]
    pub fn sum(&self, field: &str) -> Result<Value, OperatorError> {
        let cells = self
            .tuples
            .iter()
            .map(|t| {
                t.get(field)
                    .map(|v| Cell::new(0, v.clone()))
                    .ok_or_else(|| OperatorError::MissingField(field.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Slice::new(cells).sum()?)
    }

    /// Gather the values of `value_field` into a [Slice], versioned by the integer field
    /// `version_field`
    pub fn collect_slice(
        &self,
        value_field: &str,
        version_field: &str,
    ) -> Result<Slice, OperatorError> {
        let cells = self
            .tuples
            .iter()
            .map(|t| -> Result<Cell, OperatorError> {
                let version = t
                    .get_as::<i64>(version_field)
                    .ok_or_else(|| OperatorError::MissingField(version_field.to_owned()))??;
                let value = t
                    .get(value_field)
                    .cloned()
                    .ok_or_else(|| OperatorError::MissingField(value_field.to_owned()))?;
                Ok(Cell::new(version, value))
            })
            .collect::<Result<Vec<_>, OperatorError>>()?;
        Ok(Slice::new(cells))
    }
}

/// Type-erased reducer: receives a group and emits zero or more lists of output values
pub(crate) type ReduceFn =
    dyn Fn(&Group, &mut dyn FnMut(Vec<Value>)) -> Result<(), OperatorError> + Send + Sync;

/// Resolved layout of a group-reduce node
pub(crate) struct GroupLayout {
    keys: Vec<String>,
    sort: Option<Vec<String>>,
    outputs: Vec<String>,
    reducer: Arc<ReduceFn>,
}

impl std::fmt::Debug for GroupLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupLayout")
            .field("keys", &self.keys)
            .field("sort", &self.sort)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Group a stream by key fields
pub trait GroupBy: super::sealed::Sealed {
    /// Group the tuples of this stream by the values of the `keys` fields.
    /// Tuples whose keys are `Null` form a group of their own.
    ///
    /// # Example
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    ///
    /// let source = TupleSource::infer(vec![
    ///     tuple! {"user" => "a", "plays" => 3i64},
    ///     tuple! {"user" => "b", "plays" => 1i64},
    ///     tuple! {"user" => "a", "plays" => 2i64},
    /// ]);
    /// let sink = VecSink::new();
    /// Pipeline::new()
    ///     .source("plays", source).unwrap()
    ///     .group_by("per-user", "user").unwrap()
    ///     .reduce("total", Reduction::Commutative, |g: &Group| g.sum("plays")).unwrap()
    ///     .write("sink", sink.clone()).unwrap();
    ///
    /// assert_eq!(
    ///     sink.drain_vec(..),
    ///     vec![
    ///         tuple! {"user" => "a", "total" => 5i64},
    ///         tuple! {"user" => "b", "total" => 1i64},
    ///     ]
    /// );
    /// ```
    fn group_by(
        self,
        name: &str,
        keys: impl Into<Fields>,
    ) -> Result<GroupedStream, ConstructionError>;
}

impl GroupBy for StreamBuilder {
    fn group_by(
        self,
        name: &str,
        keys: impl Into<Fields>,
    ) -> Result<GroupedStream, ConstructionError> {
        let keys = keys.into();
        check_known(name, self.schema(), &keys)?;
        Ok(GroupedStream {
            stream: self,
            name: name.to_owned(),
            keys,
            sort: None,
        })
    }
}

fn check_known(operator: &str, schema: &Schema, fields: &Fields) -> Result<(), ConstructionError> {
    check_unique(operator, fields)?;
    match fields.names().find(|f| !schema.contains(f)) {
        Some(field) => Err(ConstructionError::UnknownField {
            operator: operator.to_owned(),
            field: field.to_owned(),
        }),
        None => Ok(()),
    }
}

/// A stream grouped by key fields, waiting for a reduction
#[derive(Debug)]
pub struct GroupedStream {
    stream: StreamBuilder,
    name: String,
    keys: Fields,
    sort: Option<Fields>,
}

impl GroupedStream {
    /// Order the tuples within each group ascending by the given fields.
    /// Tuples with equal sort values keep their stream order.
    pub fn sort_by(mut self, fields: impl Into<Fields>) -> Result<Self, ConstructionError> {
        let fields = fields.into();
        check_known(&self.name, self.stream.schema(), &fields)?;
        self.sort = Some(fields);
        Ok(self)
    }

    /// Reduce every group to exactly one tuple of the key fields followed by `outputs`
    pub fn reduce<O>(
        self,
        outputs: impl Into<Fields>,
        reduction: Reduction,
        reducer: impl Fn(&Group) -> O + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        O: FieldOutput + 'static,
    {
        let outputs = outputs.into();
        let types = O::value_types(outputs.len());
        let erased = Arc::new(
            move |group: &Group, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
                emit(reducer(group).into_values()?);
                Ok(())
            },
        );
        self.finish(outputs, O::ARITY, types, reduction, erased)
    }

    /// Reduce every group to any number of tuples, one per item the reducer returns
    pub fn flat_reduce<It>(
        self,
        outputs: impl Into<Fields>,
        reduction: Reduction,
        reducer: impl Fn(&Group) -> It + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        It: IntoIterator + 'static,
        It::Item: FieldOutput,
    {
        let outputs = outputs.into();
        let types = <It::Item as FieldOutput>::value_types(outputs.len());
        let erased = Arc::new(
            move |group: &Group, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
                for item in reducer(group) {
                    emit(item.into_values()?);
                }
                Ok(())
            },
        );
        self.finish(
            outputs,
            <It::Item as FieldOutput>::ARITY,
            types,
            reduction,
            erased,
        )
    }

    fn finish(
        self,
        outputs: Fields,
        arity: Option<usize>,
        types: Vec<ValueType>,
        reduction: Reduction,
        reducer: Arc<ReduceFn>,
    ) -> Result<StreamBuilder, ConstructionError> {
        let name = self.name;
        if reduction == Reduction::Ordered && self.sort.is_none() {
            return Err(ConstructionError::UnorderedReduction { operator: name });
        }
        check_unique(&name, &outputs)?;
        if let Some(expected) = arity {
            if expected != outputs.len() {
                return Err(ConstructionError::OutputArity {
                    operator: name,
                    expected,
                    found: outputs.len(),
                });
            }
        }
        if let Some(field) = outputs.names().find(|f| self.keys.contains(f)) {
            return Err(ConstructionError::FieldCollision {
                operator: name.clone(),
                field: field.to_owned(),
            });
        }

        let input = self.stream.schema();
        let mut schema: Schema = self
            .keys
            .names()
            .map(|k| (k, input.get(k).unwrap_or(ValueType::Any)))
            .collect();
        for (i, field) in outputs.names().enumerate() {
            schema.insert(field, types.get(i).copied().unwrap_or(ValueType::Any));
        }

        let layout = GroupLayout {
            keys: self.keys.as_slice().to_vec(),
            sort: self.sort.map(|s| s.as_slice().to_vec()),
            outputs: outputs.as_slice().to_vec(),
            reducer,
        };
        self.stream
            .then(&name, NodeKind::Group(Arc::new(layout)), schema)
    }
}

/// Groups collected during one execution of a group-reduce node
pub(crate) struct GroupState<'a> {
    layout: &'a GroupLayout,
    groups: IndexMap<Vec<Value>, Vec<Tuple>>,
}

impl<'a> GroupState<'a> {
    pub(crate) fn new(layout: &'a GroupLayout) -> Self {
        Self {
            layout,
            groups: IndexMap::new(),
        }
    }

    pub(crate) fn add(&mut self, tuple: Tuple) -> Result<(), OperatorError> {
        let key = gather(&tuple, &self.layout.keys)?;
        self.groups.entry(key).or_default().push(tuple);
        Ok(())
    }

    /// Reduce all groups in order of their first appearance
    pub(crate) fn finish(self, out: &mut Vec<Tuple>) -> Result<(), OperatorError> {
        let layout = self.layout;
        for (key, mut tuples) in self.groups {
            if let Some(sort) = &layout.sort {
                tuples.sort_by(|a, b| compare_on(a, b, sort));
            }
            let key: Tuple = layout.keys.iter().cloned().zip(key).collect();
            let group = Group { key, tuples };
            let mut produced = Vec::new();
            (layout.reducer)(&group, &mut |values: Vec<Value>| produced.push(values))?;
            for values in produced {
                if values.len() != layout.outputs.len() {
                    return Err(OperatorError::Arity {
                        expected: layout.outputs.len(),
                        found: values.len(),
                    });
                }
                let mut result = group.key.clone();
                for (field, value) in layout.outputs.iter().zip(values) {
                    result.insert(field.clone(), value);
                }
                out.push(result);
            }
        }
        Ok(())
    }
}

fn compare_on(a: &Tuple, b: &Tuple, fields: &[String]) -> Ordering {
    let null = Value::Null;
    fields
        .iter()
        .map(|f| {
            a.get(f)
                .unwrap_or(&null)
                .cmp(b.get(f).unwrap_or(&null))
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::operators::*;
    use crate::runtime::ExecutionError;
    use crate::sources::TupleSource;
    use crate::stream::Pipeline;
    use crate::testing::{collect, try_collect};
    use crate::tuple;

    fn listens() -> TupleSource {
        TupleSource::infer(vec![
            tuple! {"user" => "a", "ts" => 3i64, "song" => "x"},
            tuple! {"user" => "b", "ts" => 1i64, "song" => "y"},
            tuple! {"user" => "a", "ts" => 1i64, "song" => "y"},
            tuple! {"user" => "a", "ts" => 2i64, "song" => "z"},
        ])
    }

    fn grouped() -> GroupedStream {
        Pipeline::new()
            .source("listens", listens())
            .unwrap()
            .group_by("per-user", "user")
            .unwrap()
    }

    #[test]
    fn count_per_key() {
        let stream = grouped()
            .reduce("n", Reduction::Commutative, Group::count)
            .unwrap();
        assert_eq!(stream.schema().names().collect_vec(), vec!["user", "n"]);
        assert_eq!(stream.schema().get("n"), Some(ValueType::Int));
        assert_eq!(
            collect(stream),
            vec![
                tuple! {"user" => "a", "n" => 3i64},
                tuple! {"user" => "b", "n" => 1i64}
            ]
        );
    }

    #[test]
    fn ordered_reduction_sees_sorted_group() {
        let stream = grouped()
            .sort_by("ts")
            .unwrap()
            .reduce("songs", Reduction::Ordered, |g: &Group| {
                g.values("song").map(|v| v.to_string()).join(",")
            })
            .unwrap();
        let out = collect(stream);
        assert_eq!(out[0].get("songs"), Some(&Value::from("y,z,x")));
    }

    #[test]
    fn ordered_requires_sort() {
        let err = grouped()
            .reduce("n", Reduction::Ordered, Group::count)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::UnorderedReduction { .. }));
    }

    #[test]
    fn outputs_must_not_shadow_keys() {
        let err = grouped()
            .reduce("user", Reduction::Commutative, Group::count)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::FieldCollision { .. }));
    }

    #[test]
    fn collect_slice_orders_by_version() {
        let stream = grouped()
            .reduce("history", Reduction::Commutative, |g: &Group| {
                g.collect_slice("song", "ts")
            })
            .unwrap();
        let out = collect(stream);
        let history = out[0].get_as::<Slice>("history").unwrap().unwrap();
        assert_eq!(
            history.values().map(|v| v.to_string()).collect_vec(),
            vec!["x", "z", "y"]
        );
    }

    #[test]
    fn flat_reduce_emits_many() {
        let stream = grouped()
            .flat_reduce("song", Reduction::Commutative, |g: &Group| {
                g.values("song").cloned().collect_vec()
            })
            .unwrap();
        assert_eq!(collect(stream).len(), 4);
    }

    #[test]
    fn reducer_failure_is_fatal() {
        let stream = grouped()
            .reduce("total", Reduction::Commutative, |g: &Group| g.sum("song"))
            .unwrap();
        let err = try_collect(stream).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Barrier {
                operator,
                source: OperatorError::Slice(_)
            } if operator == "per-user"
        ));
    }

    #[test]
    fn null_keys_group_together() {
        let source = TupleSource::infer(vec![
            tuple! {"k" => Value::Null, "v" => 1i64},
            tuple! {"k" => Value::Null, "v" => 2i64},
        ]);
        let stream = Pipeline::new()
            .source("s", source)
            .unwrap()
            .group_by("g", "k")
            .unwrap()
            .reduce("sum", Reduction::Commutative, |g: &Group| g.sum("v"))
            .unwrap();
        assert_eq!(collect(stream), vec![tuple! {"k" => Value::Null, "sum" => 3i64}]);
    }
}
