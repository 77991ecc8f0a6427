//! Entity keys address rows in storage
mod entity_key;
mod format;

pub use entity_key::{EntityKey, KeyComponent};
pub use format::{ComponentType, KeyError, KeyFormat};
