// /src/errors.rs
//! Error taxonomy for the reconciler. The core works on trusted local data, so
//! most of these describe caller misuse rather than runtime failures.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Duplicate key '{key}' in {scope}: first at index {first}, again at index {second}")]
    DuplicateKey {
        scope: String,
        key: String,
        first: usize,
        second: usize,
    },

    #[error("Index path [{section}, {item}] out of bounds")]
    IndexPathOutOfBounds { section: usize, item: usize },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
