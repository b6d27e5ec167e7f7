//! Configuration types
//!
//! Every section has defaults; a YAML settings file may override any subset
//! and command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::EvalMode;

/// cfgcover run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source enumeration
    pub scan: ScanConfig,

    /// Per-line condition oracle
    pub oracle: OracleConfig,

    /// Build-rule dumper
    pub dumper: DumperConfig,

    /// Coverage evaluation
    pub evaluation: EvaluationConfig,

    /// Stage table locations
    pub output: OutputConfig,
}

impl Config {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid settings file: {e}")))
    }
}

/// Source enumeration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as source
    pub extensions: Vec<String>,

    /// Glob patterns (relative to the tree root) to skip
    pub exclude: Vec<String>,

    /// Canonical repo-relative prefix for the tree root, e.g. `arch/riscv`
    pub prefix: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["c".into(), "S".into(), "h".into()],
            exclude: vec![],
            prefix: None,
        }
    }
}

/// Per-line oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Oracle executable
    pub program: PathBuf,

    /// Arguments placed before the `file:line` unit (the oracle mode flag)
    pub args: Vec<String>,

    /// Concurrent oracle invocations
    pub workers: usize,

    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,

    /// Completed units between checkpoint flushes
    pub flush_every: usize,

    /// Completed units between progress log lines
    pub progress_every: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("undertaker"),
            args: vec!["-j".into(), "blockconf".into()],
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(8),
            timeout_secs: 60,
            flush_every: 5000,
            progress_every: 1000,
        }
    }
}

/// Build-rule dumper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumperConfig {
    /// Whether the merge stage runs at all
    pub enabled: bool,

    /// Dumper executable
    pub program: PathBuf,

    /// Dumper arguments; it runs with the tree root as working directory
    pub args: Vec<String>,
}

impl Default for DumperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: PathBuf::from("kbuildparser"),
            args: vec!["-a".into(), "riscv".into()],
        }
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Strict or lenient literal matching
    pub mode: EvalMode,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding every stage table
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.oracle.program, PathBuf::from("undertaker"));
        assert_eq!(config.oracle.args, vec!["-j", "blockconf"]);
        assert!(config.oracle.workers >= 1);
        assert!(config.scan.extensions.contains(&"S".to_string()));
        assert_eq!(config.evaluation.mode, EvalMode::Strict);
        assert!(config.dumper.enabled);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
oracle:
  workers: 128
  timeout_secs: 5
evaluation:
  mode: lenient
scan:
  prefix: arch/riscv
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.oracle.workers, 128);
        assert_eq!(config.oracle.timeout_secs, 5);
        assert_eq!(config.oracle.program, PathBuf::from("undertaker"));
        assert_eq!(config.evaluation.mode, EvalMode::Lenient);
        assert_eq!(config.scan.prefix.as_deref(), Some("arch/riscv"));
        assert_eq!(config.dumper.program, PathBuf::from("kbuildparser"));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Config::from_yaml_str("oracle: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfgcover.yaml");
        std::fs::write(&path, "output:\n  dir: out\n").unwrap();
        let config = Config::from_yaml_file(&path).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }
}
