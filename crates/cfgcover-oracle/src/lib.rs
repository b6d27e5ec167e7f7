//! cfgcover Oracle
//!
//! Wrappers around the external tools cfgcover trusts for gating conditions:
//!
//! - `client` - the per-line condition oracle, one process per `file:line`
//! - `pool` - bounded worker pool fanning units out to the client
//! - `dumper` - the build-rule dumper, one process per tree
//! - `program` - executable lookup on `PATH`

pub mod client;
pub mod dumper;
pub mod error;
pub mod pool;
pub mod program;

pub use client::{LineUnit, OracleClient, UnitFailure, UnitOutcome, UnitReport};
pub use dumper::BuildRuleDumper;
pub use error::OracleError;
pub use pool::{PoolStats, WorkerPool};
pub use program::locate_program;
