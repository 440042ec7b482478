//! # confportal-core
//!
//! Core data model for the device configuration portal.
//!
//! This crate provides:
//! - Parameter schema types and schema-document parsing
//! - The canonical value store with typed coercion
//! - The structured value document codec (JSON export/import)
//! - The persistence abstraction with file and key-value backends
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and embedded (esp-idf) targets.
//! The HTTP form layer lives in `confportal-web`.

pub mod document;
pub mod schema;
pub mod state;
pub mod storage;

pub use schema::{
    FieldType, LoadReport, ParamDescriptor, Schema, SchemaError, KV_NAME_LIMIT, LABEL_LIMIT,
    MAX_OPTIONS, MAX_PARAMS, NAME_LIMIT,
};
pub use state::ConfigState;
pub use storage::{ConfigStorage, StorageError};
