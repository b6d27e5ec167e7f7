//! Per-line condition oracle client
//!
//! Runs the oracle once per `file:line` unit and keeps the non-comment lines
//! of its output. A unit that times out, exits nonzero or prints nothing
//! meaningful is reported as such; it is never an error for the batch.

use cfgcover_core::config::OracleConfig;
use cfgcover_parser::normalize::meaningful_lines;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::OracleError;
use crate::program::locate_program;

/// One unit of oracle work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineUnit {
    /// File as passed to the oracle; shared by every line of the file
    pub path: Arc<Path>,
    /// Line number (1-based)
    pub line: u32,
}

impl LineUnit {
    pub fn new(path: Arc<Path>, line: u32) -> Self {
        Self { path, line }
    }
}

impl std::fmt::Display for LineUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// Why a unit produced no answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitFailure {
    Timeout(Duration),
    Exit { code: Option<i32>, stderr: String },
    Spawn(String),
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitFailure::Timeout(d) => write!(f, "timed out after {}s", d.as_secs_f64()),
            UnitFailure::Exit { code, stderr } if stderr.is_empty() => {
                write!(f, "exited with status {code:?}")
            }
            UnitFailure::Exit { code, stderr } => {
                write!(f, "exited with status {code:?}: {stderr}")
            }
            UnitFailure::Spawn(msg) => write!(f, "could not start: {msg}"),
        }
    }
}

/// What the oracle said about one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Non-comment output lines, untouched
    Answered(Vec<String>),
    /// Ran fine but printed nothing meaningful
    Empty,
    Failed(UnitFailure),
}

/// A unit together with its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: LineUnit,
    pub outcome: UnitOutcome,
}

/// Invokes the per-line oracle
#[derive(Debug, Clone)]
pub struct OracleClient {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl OracleClient {
    /// Create a client, resolving the oracle executable up front.
    /// A missing oracle is fatal for a run.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let program = locate_program(&config.program)?;
        Ok(Self::with_program(
            program,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        ))
    }

    /// Create a client for an already resolved executable
    pub fn with_program(program: PathBuf, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Ask the oracle about one unit
    pub async fn query(&self, unit: &LineUnit) -> UnitOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(unit.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                debug!("Oracle timed out on {}", unit);
                return UnitOutcome::Failed(UnitFailure::Timeout(self.timeout));
            }
            Ok(Err(e)) => return UnitOutcome::Failed(UnitFailure::Spawn(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            return UnitOutcome::Failed(UnitFailure::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<String> = meaningful_lines(&stdout)
            .into_iter()
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            UnitOutcome::Empty
        } else {
            UnitOutcome::Answered(lines)
        }
    }
}
