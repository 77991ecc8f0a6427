use super::{SinkError, TupleSink};
use crate::types::Tuple;

/// Prints every tuple on its own line
pub struct StdOutSink;

impl TupleSink for StdOutSink {
    fn write(&mut self, tuple: Tuple) -> Result<(), SinkError> {
        println!("{tuple}");
        Ok(())
    }
}
