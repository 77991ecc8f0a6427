//! Relational equi-join of two streams.
//!
//! One side (the build side) is collected completely into a hash table, the other side
//! (the probe side) is streamed through it. The build side is a barrier, the probe side is
//! never buffered by the join itself.
use std::collections::HashMap;
use std::sync::Arc;

use bon::Builder;

use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::{node::NodeKind, StreamBuilder};
use crate::types::{Fields, Schema, Tuple, Value, ValueType};

/// Which unmatched tuples a join keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinMode {
    /// Only matching pairs
    #[default]
    Inner,
    /// Every left tuple, right fields are `Null` if it has no partner
    LeftOuter,
    /// Every right tuple, left fields are `Null` if it has no partner
    RightOuter,
    /// Every tuple of both sides
    FullOuter,
}

impl JoinMode {
    fn keeps_left(self) -> bool {
        matches!(self, JoinMode::LeftOuter | JoinMode::FullOuter)
    }

    fn keeps_right(self) -> bool {
        matches!(self, JoinMode::RightOuter | JoinMode::FullOuter)
    }
}

/// Which side of the join is held in memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Collect the right stream, stream the left one. Use this if the right side is small.
    #[default]
    BuildRight,
    /// Collect the left stream, stream the right one
    BuildLeft,
}

/// Configuration of a [Join].
///
/// ```rust
/// use tuplestream::operators::{JoinMode, JoinSpec};
///
/// let spec = JoinSpec::builder()
///     .left_on("id")
///     .right_on("user")
///     .mode(JoinMode::LeftOuter)
///     .build();
/// assert_eq!(spec.strategy(), Default::default());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct JoinSpec {
    /// Key fields of the left stream
    #[builder(into)]
    left_on: Fields,
    /// Key fields of the right stream, compared position by position with `left_on`
    #[builder(into)]
    right_on: Fields,
    #[builder(default)]
    mode: JoinMode,
    #[builder(default)]
    strategy: JoinStrategy,
}

impl JoinSpec {
    /// Which unmatched tuples are kept
    pub fn mode(&self) -> JoinMode {
        self.mode
    }

    /// Which side is collected in memory
    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }
}

/// Join two streams
pub trait Join: super::sealed::Sealed {
    /// Join this stream (left) with `right` on equal key values.
    ///
    /// The output carries all left fields followed by all right fields. A right key field
    /// with the same name as its left counterpart is merged into the left one, any other
    /// field present on both sides must be renamed before joining. Keys containing `Null`
    /// never match.
    ///
    /// # Example
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    ///
    /// let pipeline = Pipeline::new();
    /// let plays = pipeline.source("plays", TupleSource::infer(vec![
    ///     tuple! {"user" => "a", "song" => 1i64},
    ///     tuple! {"user" => "b", "song" => 2i64},
    /// ])).unwrap();
    /// let users = pipeline.source("users", TupleSource::infer(vec![
    ///     tuple! {"user" => "a", "country" => "de"},
    /// ])).unwrap();
    ///
    /// let sink = VecSink::new();
    /// plays
    ///     .join(
    ///         "with-country",
    ///         users,
    ///         JoinSpec::builder().left_on("user").right_on("user").build(),
    ///     )
    ///     .unwrap()
    ///     .write("sink", sink.clone())
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     sink.drain_vec(..),
    ///     vec![tuple! {"user" => "a", "song" => 1i64, "country" => "de"}]
    /// );
    /// ```
    fn join(
        self,
        name: &str,
        right: StreamBuilder,
        spec: JoinSpec,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl Join for StreamBuilder {
    fn join(
        self,
        name: &str,
        right: StreamBuilder,
        spec: JoinSpec,
    ) -> Result<StreamBuilder, ConstructionError> {
        if !self.pipeline().same_as(right.pipeline()) {
            return Err(ConstructionError::ForeignPipeline {
                operator: name.to_owned(),
            });
        }
        let layout = JoinLayout::new(name, self.schema(), right.schema(), &spec)?;
        let schema = layout.output_schema(self.schema(), right.schema());
        let upstream = vec![self.tail().clone(), right.tail().clone()];
        let node =
            self.pipeline()
                .add_node(name, upstream, NodeKind::Join(Arc::new(layout)), schema)?;
        Ok(StreamBuilder::new(node, self.pipeline().clone()))
    }
}

fn check_keys(operator: &str, schema: &Schema, keys: &Fields) -> Result<(), ConstructionError> {
    super::transform::check_unique(operator, keys)?;
    match keys.names().find(|k| !schema.contains(k)) {
        Some(field) => Err(ConstructionError::UnknownField {
            operator: operator.to_owned(),
            field: field.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Resolved field layout of a join
#[derive(Debug)]
pub(crate) struct JoinLayout {
    left_keys: Vec<String>,
    right_keys: Vec<String>,
    left_fields: Vec<String>,
    /// right fields which are not merged into a left key
    right_fields: Vec<String>,
    /// positions of keys with the same name on both sides
    coalesced: Vec<usize>,
    mode: JoinMode,
    strategy: JoinStrategy,
}

impl JoinLayout {
    fn new(
        operator: &str,
        left: &Schema,
        right: &Schema,
        spec: &JoinSpec,
    ) -> Result<Self, ConstructionError> {
        check_keys(operator, left, &spec.left_on)?;
        check_keys(operator, right, &spec.right_on)?;
        if spec.left_on.len() != spec.right_on.len() {
            return Err(ConstructionError::JoinKeyArity {
                operator: operator.to_owned(),
                left: spec.left_on.len(),
                right: spec.right_on.len(),
            });
        }
        let mut coalesced = Vec::new();
        for (i, (l, r)) in spec.left_on.names().zip(spec.right_on.names()).enumerate() {
            let left_type = left.get(l).unwrap_or(ValueType::Any);
            let right_type = right.get(r).unwrap_or(ValueType::Any);
            let compatible = left_type == right_type
                || left_type == ValueType::Any
                || right_type == ValueType::Any;
            if !compatible {
                return Err(ConstructionError::JoinKeyType {
                    operator: operator.to_owned(),
                    left: l.to_owned(),
                    right: r.to_owned(),
                    left_type,
                    right_type,
                });
            }
            if l == r {
                coalesced.push(i);
            }
        }

        let merged: Vec<&str> = coalesced
            .iter()
            .filter_map(|i| spec.right_on.names().nth(*i))
            .collect();
        let right_fields: Vec<String> = right
            .names()
            .filter(|f| !merged.contains(f))
            .map(str::to_owned)
            .collect();
        if let Some(field) = right_fields.iter().find(|f| left.contains(f)) {
            return Err(ConstructionError::FieldCollision {
                operator: operator.to_owned(),
                field: field.clone(),
            });
        }
        Ok(Self {
            left_keys: spec.left_on.as_slice().to_vec(),
            right_keys: spec.right_on.as_slice().to_vec(),
            left_fields: left.names().map(str::to_owned).collect(),
            right_fields,
            coalesced,
            mode: spec.mode,
            strategy: spec.strategy,
        })
    }

    fn output_schema(&self, left: &Schema, right: &Schema) -> Schema {
        let mut schema = left.clone();
        for i in &self.coalesced {
            let key = &self.left_keys[*i];
            let ty = left
                .get(key)
                .unwrap_or(ValueType::Any)
                .unify(right.get(key).unwrap_or(ValueType::Any));
            schema.insert(key.clone(), ty);
        }
        for field in &self.right_fields {
            schema.insert(field.clone(), right.get(field).unwrap_or(ValueType::Any));
        }
        schema
    }

    /// Index of the upstream which is collected into memory
    pub(crate) fn build_input(&self) -> usize {
        match self.strategy {
            JoinStrategy::BuildRight => 1,
            JoinStrategy::BuildLeft => 0,
        }
    }

    fn build_is_left(&self) -> bool {
        self.strategy == JoinStrategy::BuildLeft
    }

    fn combine(&self, left: Option<&Tuple>, right: Option<&Tuple>) -> Tuple {
        let mut out = Tuple::new();
        for field in &self.left_fields {
            let value = match left {
                Some(l) => l.get(field).cloned(),
                None => self
                    .coalesced
                    .iter()
                    .find(|i| &self.left_keys[**i] == field)
                    .and_then(|i| right.and_then(|r| r.get(&self.right_keys[*i]).cloned())),
            };
            out.insert(field.clone(), value.unwrap_or_default());
        }
        for field in &self.right_fields {
            let value = right.and_then(|r| r.get(field).cloned());
            out.insert(field.clone(), value.unwrap_or_default());
        }
        out
    }
}

fn key_of(tuple: &Tuple, keys: &[String]) -> Result<Vec<Value>, OperatorError> {
    super::transform::gather(tuple, keys)
}

/// Hash table over the build side of one join execution
pub(crate) struct JoinState<'a> {
    layout: &'a JoinLayout,
    rows: Vec<Tuple>,
    matched: Vec<bool>,
    index: HashMap<Vec<Value>, Vec<usize>>,
}

impl<'a> JoinState<'a> {
    pub(crate) fn new(layout: &'a JoinLayout) -> Self {
        Self {
            layout,
            rows: Vec::new(),
            matched: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn build_keys(&self) -> &[String] {
        if self.layout.build_is_left() {
            &self.layout.left_keys
        } else {
            &self.layout.right_keys
        }
    }

    fn probe_keys(&self) -> &[String] {
        if self.layout.build_is_left() {
            &self.layout.right_keys
        } else {
            &self.layout.left_keys
        }
    }

    fn keeps_build(&self) -> bool {
        if self.layout.build_is_left() {
            self.layout.mode.keeps_left()
        } else {
            self.layout.mode.keeps_right()
        }
    }

    fn keeps_probe(&self) -> bool {
        if self.layout.build_is_left() {
            self.layout.mode.keeps_right()
        } else {
            self.layout.mode.keeps_left()
        }
    }

    fn emit(&self, build: Option<&Tuple>, probe: Option<&Tuple>) -> Tuple {
        if self.layout.build_is_left() {
            self.layout.combine(build, probe)
        } else {
            self.layout.combine(probe, build)
        }
    }

    /// Add a tuple of the build side
    pub(crate) fn build(&mut self, tuple: Tuple) -> Result<(), OperatorError> {
        let key = key_of(&tuple, self.build_keys())?;
        let row = self.rows.len();
        if !key.iter().any(Value::is_null) {
            self.index.entry(key).or_default().push(row);
        }
        self.rows.push(tuple);
        self.matched.push(false);
        Ok(())
    }

    /// Join a tuple of the probe side against all collected build tuples
    pub(crate) fn probe(
        &mut self,
        tuple: &Tuple,
        out: &mut Vec<Tuple>,
    ) -> Result<(), OperatorError> {
        let key = key_of(tuple, self.probe_keys())?;
        let partners = if key.iter().any(Value::is_null) {
            None
        } else {
            self.index.get(&key)
        };
        match partners {
            Some(rows) => {
                for row in rows {
                    self.matched[*row] = true;
                    out.push(self.emit(Some(&self.rows[*row]), Some(tuple)));
                }
            }
            None if self.keeps_probe() => out.push(self.emit(None, Some(tuple))),
            None => (),
        }
        Ok(())
    }

    /// Emit the unmatched build tuples if the mode keeps them
    pub(crate) fn finish(self, out: &mut Vec<Tuple>) {
        if !self.keeps_build() {
            return;
        }
        for (row, matched) in self.rows.iter().zip(self.matched.iter()) {
            if !matched {
                out.push(self.emit(Some(row), None));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::prelude::*;

    use super::*;
    use crate::operators::*;
    use crate::runtime::ExecutionError;
    use crate::sources::TupleSource;
    use crate::stream::{Output, Pipeline};
    use crate::testing::{collect, numbers, plays, try_collect};
    use crate::tuple;

    fn users() -> TupleSource {
        TupleSource::infer(vec![
            tuple! {"user" => 1i64, "country" => "de"},
            tuple! {"user" => 2i64, "country" => "ch"},
            tuple! {"user" => 4i64, "country" => "at"},
        ])
    }

    fn join_plays(mode: JoinMode, strategy: JoinStrategy) -> Vec<Tuple> {
        let pipeline = Pipeline::new();
        let left = pipeline
            .source("plays", plays())
            .unwrap()
            .insert("extra", "x", 0i64)
            .unwrap();
        let right = pipeline.source("users", users()).unwrap();
        let spec = JoinSpec::builder()
            .left_on("id")
            .right_on("user")
            .mode(mode)
            .strategy(strategy)
            .build();
        collect(left.join("join", right, spec).unwrap())
    }

    #[test]
    fn inner_join() {
        let out = join_plays(JoinMode::Inner, JoinStrategy::BuildRight);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].names().collect_vec(),
            vec!["id", "plays", "x", "user", "country"]
        );
        assert_eq!(out[1].get("country"), Some(&Value::from("ch")));
    }

    #[test]
    fn strategies_agree() {
        for mode in [
            JoinMode::Inner,
            JoinMode::LeftOuter,
            JoinMode::RightOuter,
            JoinMode::FullOuter,
        ] {
            let a = join_plays(mode, JoinStrategy::BuildRight);
            let b = join_plays(mode, JoinStrategy::BuildLeft);
            assert_eq!(
                a.iter().map(Tuple::to_string).sorted().collect_vec(),
                b.iter().map(Tuple::to_string).sorted().collect_vec(),
                "{mode:?}"
            );
        }
    }

    #[test]
    fn outer_modes_fill_null() {
        let right = join_plays(JoinMode::RightOuter, JoinStrategy::BuildRight);
        assert_eq!(right.len(), 3);
        let lonely = right
            .iter()
            .find(|t| t.get("user") == Some(&Value::Int(4)))
            .unwrap();
        assert_eq!(lonely.get("id"), Some(&Value::Null));
        assert_eq!(lonely.get("plays"), Some(&Value::Null));

        let full = join_plays(JoinMode::FullOuter, JoinStrategy::BuildRight);
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn coalesces_same_named_keys() {
        let pipeline = Pipeline::new();
        let left = pipeline
            .source("left", TupleSource::infer(vec![tuple! {"k" => 1i64, "a" => "l"}]))
            .unwrap();
        let right = pipeline
            .source(
                "right",
                TupleSource::infer(vec![
                    tuple! {"k" => 1i64, "b" => "r"},
                    tuple! {"k" => 2i64, "b" => "s"},
                ]),
            )
            .unwrap();
        let spec = JoinSpec::builder()
            .left_on("k")
            .right_on("k")
            .mode(JoinMode::FullOuter)
            .build();
        let stream = left.join("j", right, spec).unwrap();
        assert_eq!(stream.schema().names().collect_vec(), vec!["k", "a", "b"]);
        let out = collect(stream);
        assert_eq!(
            out,
            vec![
                tuple! {"k" => 1i64, "a" => "l", "b" => "r"},
                tuple! {"k" => 2i64, "a" => Value::Null, "b" => "s"},
            ]
        );
    }

    #[test]
    fn inner_join_on_shared_key_field() {
        let pipeline = Pipeline::new();
        let left = pipeline
            .source("left", TupleSource::infer(vec![tuple! {"k" => 1i64, "a" => "x"}]))
            .unwrap();
        let right = pipeline
            .source(
                "right",
                TupleSource::infer(vec![
                    tuple! {"k" => 1i64, "b" => "p"},
                    tuple! {"k" => 2i64, "b" => "z"},
                    tuple! {"k" => 1i64, "b" => "q"},
                ]),
            )
            .unwrap();
        let spec = JoinSpec::builder().left_on("k").right_on("k").build();
        let out = collect(left.join("j", right, spec).unwrap());
        assert_eq!(
            out,
            vec![
                tuple! {"k" => 1i64, "a" => "x", "b" => "p"},
                tuple! {"k" => 1i64, "a" => "x", "b" => "q"},
            ]
        );
    }

    #[test]
    fn build_side_failure_is_fatal() {
        let pipeline = Pipeline::new();
        let left = pipeline.source("plays", plays()).unwrap();
        let users = pipeline.source("users", users()).unwrap();
        let schema = users.schema().clone();
        // declares the key field but never emits it
        let broken = users
            .stateless_op(
                "lose-key",
                schema,
                |_: &Tuple, out: &mut Output| -> Result<(), OperatorError> {
                    out.send(tuple! {"country" => "nowhere"});
                    Ok(())
                },
            )
            .unwrap();
        let spec = JoinSpec::builder().left_on("id").right_on("user").build();
        let err = try_collect(left.join("j", broken, spec).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Barrier {
                operator,
                source: OperatorError::MissingField(field)
            } if operator == "j" && field == "user"
        ));
    }

    #[test]
    fn null_keys_never_match() {
        let pipeline = Pipeline::new();
        let left = pipeline
            .source(
                "left",
                TupleSource::infer(vec![tuple! {"k" => Value::Null, "a" => 1i64}]),
            )
            .unwrap();
        let right = pipeline
            .source(
                "right",
                TupleSource::infer(vec![tuple! {"r" => Value::Null, "b" => 2i64}]),
            )
            .unwrap();
        let spec = JoinSpec::builder()
            .left_on("k")
            .right_on("r")
            .mode(JoinMode::LeftOuter)
            .build();
        let out = collect(left.join("j", right, spec).unwrap());
        assert_eq!(
            out,
            vec![tuple! {"k" => Value::Null, "a" => 1i64, "r" => Value::Null, "b" => Value::Null}]
        );
    }

    #[test]
    fn construction_errors() {
        let pipeline = Pipeline::new();
        let left = pipeline.source("plays", plays()).unwrap();
        let right = pipeline.source("users", users()).unwrap();
        let join = |spec: JoinSpec| left.clone().join("j", right.clone(), spec).unwrap_err();

        assert!(matches!(
            join(JoinSpec::builder().left_on(["id", "plays"]).right_on("user").build()),
            ConstructionError::JoinKeyArity { left: 2, right: 1, .. }
        ));
        assert!(matches!(
            join(JoinSpec::builder().left_on("plays").right_on("user").build()),
            ConstructionError::JoinKeyType { .. }
        ));
        assert!(matches!(
            join(JoinSpec::builder().left_on("id").right_on("nope").build()),
            ConstructionError::UnknownField { .. }
        ));
        let colliding = pipeline
            .source("again", plays())
            .unwrap()
            .rename("r", "id", "user")
            .unwrap();
        assert!(matches!(
            left.clone()
                .join("j2", colliding, JoinSpec::builder().left_on("id").right_on("user").build())
                .unwrap_err(),
            ConstructionError::FieldCollision { field, .. } if field == "plays"
        ));
        let foreign = Pipeline::new().source("users", users()).unwrap();
        assert!(matches!(
            left.join("j3", foreign, JoinSpec::builder().left_on("id").right_on("user").build())
                .unwrap_err(),
            ConstructionError::ForeignPipeline { .. }
        ));
    }

    fn keyed(keys: &[i64], field: &str) -> TupleSource {
        let schema = Schema::new()
            .with(field, ValueType::Int)
            .with(format!("{field}_pos"), ValueType::Int);
        let tuples = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                Tuple::new()
                    .with(field, *k)
                    .with(format!("{field}_pos"), i)
            })
            .collect();
        TupleSource::new(schema, tuples)
    }

    proptest! {
        #[test]
        fn inner_cardinality(
            left in prop::collection::vec(0i64..5, 0..20),
            right in prop::collection::vec(0i64..5, 0..20),
        ) {
            let pipeline = Pipeline::new();
            let l = pipeline.source("l", keyed(&left, "l")).unwrap();
            let r = pipeline.source("r", keyed(&right, "r")).unwrap();
            let spec = JoinSpec::builder().left_on("l").right_on("r").build();
            let out = collect(l.join("j", r, spec).unwrap());

            let left_counts = left.iter().counts();
            let right_counts = right.iter().counts();
            let expected: usize = left_counts
                .iter()
                .map(|(k, n)| n * right_counts.get(k).copied().unwrap_or(0))
                .sum();
            prop_assert_eq!(out.len(), expected);
        }

        #[test]
        fn left_outer_keeps_every_left_tuple(
            left in prop::collection::vec(0i64..5, 0..20),
            right in prop::collection::vec(0i64..5, 0..20),
        ) {
            let pipeline = Pipeline::new();
            let l = pipeline.source("l", keyed(&left, "l")).unwrap();
            let r = pipeline.source("r", keyed(&right, "r")).unwrap();
            let spec = JoinSpec::builder()
                .left_on("l")
                .right_on("r")
                .mode(JoinMode::LeftOuter)
                .build();
            let out = collect(l.join("j", r, spec).unwrap());
            let positions: std::collections::HashSet<Value> = out
                .iter()
                .filter_map(|t| t.get("l_pos").cloned())
                .collect();
            prop_assert_eq!(positions.len(), left.len());
        }
    }

    #[test]
    fn join_after_branch() {
        // both sides of the join read the same source
        let pipeline = Pipeline::new();
        let base = pipeline.source("numbers", numbers(3)).unwrap();
        let renamed = base.clone().rename("r", "n", "m").unwrap();
        let spec = JoinSpec::builder().left_on("n").right_on("m").build();
        let out = collect(base.join("self-join", renamed, spec).unwrap());
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|t| t.get("n") == t.get("m")));
    }
}
