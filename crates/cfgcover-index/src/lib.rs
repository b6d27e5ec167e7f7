//! cfgcover Index
//!
//! Persists every stage as CSV so stages can run separately and a long oracle
//! batch can be resumed.

mod checkpoint;
mod storage;
pub mod tables;

pub use checkpoint::{load_checkpoint, CheckpointEntry, CheckpointWriter, UnitStatus};
pub use storage::{Result, StorageError};
pub use tables::{parse_output_lines, FailureRow, StageTables, StoredStageB};
