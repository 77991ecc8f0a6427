//! Typed signatures of field functions.
//!
//! Operators like [map](crate::operators::Map::map) take plain Rust closures. The argument
//! and return types of these closures declare how many fields they consume and produce and
//! which types those fields must have. [FieldInput] and [FieldOutput] expose these
//! declarations so they can be checked against the stream schema when the pipeline is
//! built, long before any tuple is processed.
use crate::errorhandling::OperatorError;

use super::value::{FromValue, IntoValue, Value, ValueType};

/// A variadic group of field values. Use this as argument or return type of a field
/// function to consume or produce any number of fields. Arity is then checked at runtime
/// instead of when building the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values(pub Vec<Value>);

/// Argument types of field functions
pub trait FieldInput: Sized {
    /// Number of fields consumed or `None` if any number is accepted
    const ARITY: Option<usize>;

    /// Declared type of each consumed field, given the number of fields actually bound
    fn value_types(fields: usize) -> Vec<ValueType>;

    /// Build the argument from the field values
    fn from_values(values: Vec<Value>) -> Result<Self, OperatorError>;
}

/// Return types of field functions
pub trait FieldOutput {
    /// Number of fields produced or `None` if it is only known at runtime
    const ARITY: Option<usize>;

    /// Declared type of each produced field, given the number of target fields
    fn value_types(fields: usize) -> Vec<ValueType>;

    /// Turn the return value into field values
    fn into_values(self) -> Result<Vec<Value>, OperatorError>;
}

/// Return types of filter predicates
pub trait FilterOutput {
    /// Evaluate to the keep/drop decision
    fn into_bool(self) -> Result<bool, OperatorError>;
}

impl FilterOutput for bool {
    fn into_bool(self) -> Result<bool, OperatorError> {
        Ok(self)
    }
}

impl<E: Into<OperatorError>> FilterOutput for Result<bool, E> {
    fn into_bool(self) -> Result<bool, OperatorError> {
        self.map_err(Into::into)
    }
}

macro_rules! scalar_input {
    ($($t:ty),+) => {
        $(
        impl FieldInput for $t {
            const ARITY: Option<usize> = Some(1);

            fn value_types(_fields: usize) -> Vec<ValueType> {
                vec![<$t as FromValue>::VALUE_TYPE]
            }

            fn from_values(values: Vec<Value>) -> Result<Self, OperatorError> {
                let value = single(values)?;
                Ok(<$t as FromValue>::from_value(value)?)
            }
        }
        )+
    };
}

macro_rules! scalar_output {
    ($($t:ty),+) => {
        $(
        impl FieldOutput for $t {
            const ARITY: Option<usize> = Some(1);

            fn value_types(_fields: usize) -> Vec<ValueType> {
                vec![<$t as IntoValue>::VALUE_TYPE]
            }

            fn into_values(self) -> Result<Vec<Value>, OperatorError> {
                Ok(vec![self.into_value()])
            }
        }
        )+
    };
}

scalar_input!(
    bool,
    i64,
    f64,
    String,
    crate::slice::Slice,
    crate::keys::EntityKey,
    Value
);
scalar_output!(
    bool,
    i64,
    i32,
    usize,
    f64,
    String,
    &str,
    crate::slice::Slice,
    crate::keys::EntityKey,
    Value
);

fn single(values: Vec<Value>) -> Result<Value, OperatorError> {
    let found = values.len();
    let mut iter = values.into_iter();
    match (iter.next(), iter.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(OperatorError::Arity { expected: 1, found }),
    }
}

impl<T: FromValue> FieldInput for Option<T> {
    const ARITY: Option<usize> = Some(1);

    fn value_types(_fields: usize) -> Vec<ValueType> {
        vec![T::VALUE_TYPE]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, OperatorError> {
        let value = single(values)?;
        Ok(Option::<T>::from_value(value)?)
    }
}

impl<T: IntoValue> FieldOutput for Option<T> {
    const ARITY: Option<usize> = Some(1);

    fn value_types(_fields: usize) -> Vec<ValueType> {
        vec![T::VALUE_TYPE]
    }

    fn into_values(self) -> Result<Vec<Value>, OperatorError> {
        Ok(vec![self.into_value()])
    }
}

/// Functions reading no fields at all, e.g. to generate constants
impl FieldInput for () {
    const ARITY: Option<usize> = Some(0);

    fn value_types(_fields: usize) -> Vec<ValueType> {
        Vec::new()
    }

    fn from_values(values: Vec<Value>) -> Result<Self, OperatorError> {
        match values.len() {
            0 => Ok(()),
            found => Err(OperatorError::Arity { expected: 0, found }),
        }
    }
}

impl FieldInput for Values {
    const ARITY: Option<usize> = None;

    fn value_types(fields: usize) -> Vec<ValueType> {
        vec![ValueType::Any; fields]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, OperatorError> {
        Ok(Values(values))
    }
}

impl FieldOutput for Values {
    const ARITY: Option<usize> = None;

    fn value_types(fields: usize) -> Vec<ValueType> {
        vec![ValueType::Any; fields]
    }

    fn into_values(self) -> Result<Vec<Value>, OperatorError> {
        Ok(self.0)
    }
}

/// Fallible field functions
impl<O, E> FieldOutput for Result<O, E>
where
    O: FieldOutput,
    E: Into<OperatorError>,
{
    const ARITY: Option<usize> = O::ARITY;

    fn value_types(fields: usize) -> Vec<ValueType> {
        O::value_types(fields)
    }

    fn into_values(self) -> Result<Vec<Value>, OperatorError> {
        self.map_err(Into::into)?.into_values()
    }
}

macro_rules! tuple_signature {
    ($n:expr; $($name:ident),+) => {
        impl<$($name: FromValue),+> FieldInput for ($($name,)+) {
            const ARITY: Option<usize> = Some($n);

            fn value_types(_fields: usize) -> Vec<ValueType> {
                vec![$(<$name as FromValue>::VALUE_TYPE),+]
            }

            fn from_values(values: Vec<Value>) -> Result<Self, OperatorError> {
                if values.len() != $n {
                    return Err(OperatorError::Arity { expected: $n, found: values.len() });
                }
                let mut iter = values.into_iter();
                Ok(($(<$name as FromValue>::from_value(iter.next().unwrap_or_default())?,)+))
            }
        }

        impl<$($name: IntoValue),+> FieldOutput for ($($name,)+) {
            const ARITY: Option<usize> = Some($n);

            fn value_types(_fields: usize) -> Vec<ValueType> {
                vec![$(<$name as IntoValue>::VALUE_TYPE),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<Value>, OperatorError> {
                let ($($name,)+) = self;
                Ok(vec![$($name.into_value()),+])
            }
        }
    };
}

tuple_signature!(1; A);
tuple_signature!(2; A, B);
tuple_signature!(3; A, B, C);
tuple_signature!(4; A, B, C, D);
tuple_signature!(5; A, B, C, D, E);
tuple_signature!(6; A, B, C, D, E, F);
tuple_signature!(7; A, B, C, D, E, F, G);
tuple_signature!(8; A, B, C, D, E, F, G, H);
