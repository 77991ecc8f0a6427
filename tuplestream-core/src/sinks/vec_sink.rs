use std::ops::RangeBounds;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{SinkError, TupleSink};
use crate::types::Tuple;

/// A Helper to write tuples into a shared vector and take them out
/// again.
/// This is mainly useful to extract tuples from a stream in unit tests.
/// This struct uses an `Arc<Mutex<Vec<Tuple>>>` internally, so it can be freely
/// cloned
#[derive(Clone, Default)]
pub struct VecSink {
    inner: Arc<Mutex<Vec<Tuple>>>,
}

impl VecSink {
    /// Create a new sink which collects all tuples into a `Vec`
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Tuple>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a tuple into this sink
    pub fn give(&self, tuple: Tuple) {
        self.lock().push(tuple)
    }

    /// Take the given range out of this sink
    pub fn drain_vec<R: RangeBounds<usize>>(&self, range: R) -> Vec<Tuple> {
        self.lock().drain(range).collect()
    }

    /// Number of tuples currently held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no tuples are held
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl IntoIterator for VecSink {
    type Item = Tuple;

    type IntoIter = std::vec::IntoIter<Tuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.drain_vec(..).into_iter()
    }
}

impl TupleSink for VecSink {
    fn write(&mut self, tuple: Tuple) -> Result<(), SinkError> {
        self.give(tuple);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple;

    #[test]
    fn clones_share_storage() {
        let sink = VecSink::new();
        let mut writer = sink.clone();
        writer.write(tuple! {"a" => 1i64}).unwrap();
        writer.write(tuple! {"a" => 2i64}).unwrap();
        assert_eq!(sink.drain_vec(..1), vec![tuple! {"a" => 1i64}]);
        assert_eq!(sink.into_iter().count(), 1);
    }
}
