//! Error types for cfgcover

use std::path::PathBuf;
use thiserror::Error;

/// cfgcover error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle program not found: {0}")]
    OracleNotFound(String),

    #[error("Source tree root is unreadable: {}", .0.display())]
    TreeRootUnreadable(PathBuf),

    #[error("Configuration assignment file not found: {}", .0.display())]
    ConfigFileMissing(PathBuf),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for cfgcover
pub type Result<T> = std::result::Result<T, Error>;
