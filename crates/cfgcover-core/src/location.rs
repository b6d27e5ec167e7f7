//! Source line identity

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Identity of one source line: `relative/path:line`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    /// Canonical repo-relative file path
    pub file: String,
    /// Line number (1-based)
    pub line: u32,
}

impl LineKey {
    /// Create a new line key
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for LineKey {
    type Err = Error;

    /// Parse `path:line`. The split happens at the last colon so paths that
    /// themselves contain colons survive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Parse(format!("line key without ':' separator: {s}")))?;
        if file.is_empty() {
            return Err(Error::Parse(format!("line key without a path: {s}")));
        }
        let line = line
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid line number in key: {s}")))?;
        if line == 0 {
            return Err(Error::Parse(format!("line numbers are 1-based: {s}")));
        }
        Ok(Self::new(file, line))
    }
}
