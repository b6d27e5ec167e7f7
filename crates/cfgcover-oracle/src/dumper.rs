//! Build-rule dumper
//!
//! Runs the dumper once with the tree root as working directory and returns
//! its raw output. Turning that text into rules is the parser's job.

use cfgcover_core::config::DumperConfig;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::error::OracleError;
use crate::program::locate_program;

/// Invokes the build-rule dumper
#[derive(Debug, Clone)]
pub struct BuildRuleDumper {
    program: PathBuf,
    args: Vec<String>,
}

impl BuildRuleDumper {
    /// Create a dumper, resolving the executable up front
    pub fn new(config: &DumperConfig) -> Result<Self, OracleError> {
        let program = locate_program(&config.program)?;
        Ok(Self::with_program(program, config.args.clone()))
    }

    /// Create a dumper for an already resolved executable
    pub fn with_program(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Dump the build rules of the tree rooted at `root`
    pub fn dump(&self, root: &Path) -> Result<String, OracleError> {
        debug!("Running {:?} {:?} in {:?}", self.program, self.args, root);

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| OracleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OracleError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
