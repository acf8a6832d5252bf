use graphstore::errors::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, FetchError>;

impl From<FetchError> for StorageError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Storage(inner) => inner,
            FetchError::Io(inner) => StorageError::Io(inner),
            FetchError::Json(inner) => StorageError::Json(inner),
            FetchError::Csv(inner) => StorageError::Csv(inner),
            FetchError::InvalidParam(msg) => StorageError::InvalidArg(msg),
            FetchError::MalformedRecord(msg) => StorageError::MalformedRecord(msg),
            FetchError::MissingField(field) => {
                StorageError::MalformedRecord(format!("missing field: {field}"))
            }
        }
    }
}
