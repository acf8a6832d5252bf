use std::time::Duration;

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot encode {table}.{column} at row {row}: {source}")]
    Serialization {
        table: String,
        column: String,
        row: usize,
        #[source]
        source: CodecError,
    },

    #[error("cannot decode {table}.{column} at row {row}: {source}")]
    Deserialization {
        table: String,
        column: String,
        row: usize,
        #[source]
        source: CodecError,
    },

    #[error("store at {address} did not become ready within {timeout:?}: {reason}")]
    StoreUnavailable {
        address: String,
        timeout: Duration,
        reason: String,
    },

    #[error("store command `{command}` failed: {detail}")]
    StoreCommand { command: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
