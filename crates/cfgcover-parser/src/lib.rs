//! cfgcover Parser
//!
//! Everything that turns text into cfgcover types, plus the source tree walk.
//!
//! ## Modules
//!
//! - `scan` - Source Enumerator: per-file line counts using walkdir + rayon
//! - `normalize` - Condition Normalizer for raw oracle literals and path keys
//! - `kbuild` - Build-rule dump grammar (`path <- A && !B`)
//! - `dotconfig` - Configuration assignment file (`.config`) store
//! - `unmet` - Canonical unmet-condition strings (`SYM=actual (need expected)`)

pub mod dotconfig;
pub mod kbuild;
pub mod normalize;
pub mod scan;
pub mod unmet;

pub use dotconfig::ConfigStore;
pub use kbuild::{parse_build_rule, parse_build_rules, BuildRule};
pub use normalize::{normalize_literals, PathCanonicalizer};
pub use scan::{ScanSummary, SourceEnumerator, SourceFile};
pub use unmet::parse_unmet;
