use crate::types::Tuple;

/// Collects the tuples an operator emits for one input tuple
#[derive(Debug, Default)]
pub struct Output {
    buffer: Vec<Tuple>,
}

impl Output {
    /// Emit a tuple downstream
    pub fn send(&mut self, tuple: Tuple) {
        self.buffer.push(tuple)
    }

    /// Number of tuples emitted so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, Tuple> {
        self.buffer.drain(..)
    }
}
