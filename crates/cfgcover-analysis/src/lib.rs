//! cfgcover Analysis
//!
//! The stages that run after the oracle has answered:
//! - Build-rule merge into the per-line condition map
//! - Coverage evaluation against a configuration (strict or lenient)
//! - Statistics rollups over the evaluation

pub mod evaluator;
pub mod merge;
pub mod stats;

pub use evaluator::{Evaluation, Evaluator};
pub use merge::{merge_build_rules, MergeReport};
pub use stats::{aggregate, Statistics, StatsAccumulator, UNPARSEABLE_KEY};
