//! Storage errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error in {table}: {message}")]
    Parse { table: String, message: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for cfgcover_core::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(io) => cfgcover_core::Error::Io(io),
            other => cfgcover_core::Error::Storage(other.to_string()),
        }
    }
}
