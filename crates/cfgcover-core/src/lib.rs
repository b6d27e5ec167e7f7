//! cfgcover Core
//!
//! Core types shared by every cfgcover stage: line identities, configuration
//! literals, the per-line condition map and the run configuration.

pub mod config;
pub mod error;
pub mod location;
pub mod map;
pub mod types;

pub use error::{Error, Result};
pub use location::LineKey;
pub use map::ConditionMap;
pub use types::*;
