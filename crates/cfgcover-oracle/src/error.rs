//! Oracle errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the external tool wrappers
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{0} not found. Please install it or point the settings at it.")]
    NotFound(String),

    #[error("Failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with status {code:?}: {stderr}", program.display())]
    Exit {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

impl From<OracleError> for cfgcover_core::Error {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::NotFound(name) => cfgcover_core::Error::OracleNotFound(name),
            other => cfgcover_core::Error::Other(other.to_string()),
        }
    }
}
