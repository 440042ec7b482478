//! Persistence abstraction.
//!
//! Two interchangeable backends round-trip the canonical values:
//! - [`file::FileStorage`] — one `name=value` line per entry in a flat
//!   UTF-8 file
//! - [`keyvalue::KeyValueStorage`] — typed entries in a namespaced
//!   key-value store (NVS-style)
//!
//! A backend is selected once at construction. Neither backend is
//! transactional: a failed `save` may leave a partially written store, and
//! the caller surfaces that as the render-time error banner rather than
//! rolling back.

pub mod file;
pub mod keyvalue;

use thiserror::Error;

use crate::state::ConfigState;

pub use file::FileStorage;
pub use keyvalue::{KeyValueBackend, KeyValueStorage, MemoryKeyValue};

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read the backing store.
    #[error("failed to read configuration: {0}")]
    Read(String),

    /// Failed to write the backing store. Writes that already succeeded
    /// are not rolled back.
    #[error("failed to write configuration: {0}")]
    Write(String),

    /// Failed to delete the backing store.
    #[error("failed to delete configuration: {0}")]
    Delete(String),
}

/// Abstract persistence for one portal instance.
///
/// All methods are synchronous and blocking to support embedded targets;
/// async wrappers can be added at the transport layer.
pub trait ConfigStorage {
    /// Overlay stored values onto the state.
    ///
    /// Parameters absent from the store keep their schema defaults, and
    /// stored keys matching no parameter are skipped.
    fn load(&mut self, state: &mut ConfigState) -> Result<(), StorageError>;

    /// Write every parameter value and the device identity.
    fn save(&mut self, state: &ConfigState) -> Result<(), StorageError>;

    /// Remove the whole stored collection. There is no per-key delete.
    fn delete(&mut self) -> Result<(), StorageError>;
}
