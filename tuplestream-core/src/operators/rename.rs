use super::stateless_op::StatelessOp;
use super::transform::check_unique;
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::{Output, StreamBuilder};
use crate::types::{Fields, Schema, Tuple};

/// Rename fields
pub trait Rename: super::sealed::Sealed {
    /// Rename the `from` fields to the `to` fields, position by position. Renamed fields keep
    /// their position in the tuple. Use this to resolve name collisions before a
    /// [map](super::Map::map) or [join](super::Join::join).
    fn rename(
        self,
        name: &str,
        from: impl Into<Fields>,
        to: impl Into<Fields>,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl Rename for StreamBuilder {
    fn rename(
        self,
        name: &str,
        from: impl Into<Fields>,
        to: impl Into<Fields>,
    ) -> Result<StreamBuilder, ConstructionError> {
        let (from, to) = (from.into(), to.into());
        check_unique(name, &from)?;
        check_unique(name, &to)?;
        if from.len() != to.len() {
            return Err(ConstructionError::OutputArity {
                operator: name.to_owned(),
                expected: from.len(),
                found: to.len(),
            });
        }
        let schema = self.schema();
        if let Some(field) = from.names().find(|f| !schema.contains(f)) {
            return Err(ConstructionError::UnknownField {
                operator: name.to_owned(),
                field: field.to_owned(),
            });
        }
        if let Some(field) = to
            .names()
            .find(|f| schema.contains(f) && !from.contains(f))
        {
            return Err(ConstructionError::FieldCollision {
                operator: name.to_owned(),
                field: field.to_owned(),
            });
        }

        let mapping: Vec<(String, String)> = from
            .names()
            .zip(to.names())
            .map(|(a, b)| (a.to_owned(), b.to_owned()))
            .collect();
        let renamed = move |field: &str| -> String {
            mapping
                .iter()
                .find(|(a, _)| a == field)
                .map_or_else(|| field.to_owned(), |(_, b)| b.clone())
        };
        let out_schema: Schema = schema.iter().map(|(f, ty)| (renamed(f), ty)).collect();
        self.stateless_op(
            name,
            out_schema,
            move |tuple: &Tuple, out: &mut Output| -> Result<(), OperatorError> {
                out.send(
                    tuple
                        .iter()
                        .map(|(f, v)| (renamed(f), v.clone()))
                        .collect(),
                );
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::errorhandling::ConstructionError;
    use crate::operators::*;
    use crate::stream::Pipeline;
    use crate::testing::{collect, plays};

    #[test]
    fn rename_in_place() {
        let stream = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .rename("r", "id", "user")
            .unwrap();
        assert_eq!(stream.schema().names().collect_vec(), vec!["user", "plays"]);
        let out = collect(stream);
        assert_eq!(out[0].names().collect_vec(), vec!["user", "plays"]);
    }

    #[test]
    fn swap_is_allowed() {
        let stream = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .rename("swap", ["id", "plays"], ["plays", "id"])
            .unwrap();
        assert_eq!(stream.schema().names().collect_vec(), vec!["plays", "id"]);
    }

    #[test]
    fn collision() {
        let err = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .rename("r", "id", "plays")
            .unwrap_err();
        assert!(matches!(err, ConstructionError::FieldCollision { .. }));
    }
}
