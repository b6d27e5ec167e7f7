//! Oracle checkpoint
//!
//! Every completed oracle unit is appended to `oracle_checkpoint.csv` as
//! `file_line, status, output_lines`. A resumed scan reuses `ok` and `empty`
//! units and asks the oracle again for `failed` ones. When a unit appears
//! more than once the last row wins.

use cfgcover_core::split_joined;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::storage::Result;

/// Outcome of one oracle unit as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Ok,
    Empty,
    Failed,
}

impl UnitStatus {
    /// Whether a resumed run can skip this unit
    pub fn is_settled(self) -> bool {
        matches!(self, UnitStatus::Ok | UnitStatus::Empty)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRow {
    file_line: String,
    status: UnitStatus,
    output_lines: String,
}

/// What a previous run recorded for one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub status: UnitStatus,
    /// Raw oracle lines, comments already removed
    pub output_lines: Vec<String>,
}

/// Appends unit outcomes and flushes them periodically
pub struct CheckpointWriter {
    writer: csv::Writer<File>,
    flush_every: usize,
    pending: usize,
    written: usize,
}

impl CheckpointWriter {
    /// Start a fresh checkpoint, discarding any previous one
    pub fn create(path: &Path, flush_every: usize) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_file(file, true, flush_every))
    }

    /// Continue an existing checkpoint, or start one if there is none
    pub fn append(path: &Path, flush_every: usize) -> Result<Self> {
        let has_rows = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_file(file, !has_rows, flush_every))
    }

    fn from_file(file: File, write_header: bool, flush_every: usize) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder.has_headers(write_header);
        Self {
            writer: builder.from_writer(file),
            flush_every: flush_every.max(1),
            pending: 0,
            written: 0,
        }
    }

    /// Record one unit
    pub fn record(&mut self, file_line: &str, status: UnitStatus, output: &[String]) -> Result<()> {
        self.writer.serialize(CheckpointRow {
            file_line: file_line.to_string(),
            status,
            output_lines: output.join(";"),
        })?;
        self.written += 1;
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending > 0 {
            self.writer.flush()?;
            debug!("Checkpoint flushed at {} units", self.written);
            self.pending = 0;
        }
        Ok(())
    }

    /// Flush what is left
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.written)
    }
}

/// Load a checkpoint keyed by `file_line`. A missing file is an empty
/// checkpoint.
pub fn load_checkpoint(path: &Path) -> Result<HashMap<String, CheckpointEntry>> {
    let mut entries = HashMap::new();
    if !path.exists() {
        return Ok(entries);
    }

    let mut reader = csv::Reader::from_path(path)?;
    for row in reader.deserialize::<CheckpointRow>() {
        let row = row?;
        let output_lines = split_joined(&row.output_lines)
            .into_iter()
            .map(str::to_string)
            .collect();
        entries.insert(
            row.file_line,
            CheckpointEntry {
                status: row.status,
                output_lines,
            },
        );
    }

    let settled = entries.values().filter(|e| e.status.is_settled()).count();
    info!(
        "Loaded checkpoint with {} units ({} settled) from {:?}",
        entries.len(),
        settled,
        path
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oracle_checkpoint.csv");

        let mut writer = CheckpointWriter::create(&path, 2).unwrap();
        writer
            .record(
                "arch/riscv/mm/init.c:1",
                UnitStatus::Ok,
                &["CONFIG_MMU=y".into(), "CONFIG_SMP=m".into()],
            )
            .unwrap();
        writer.record("arch/riscv/mm/init.c:2", UnitStatus::Empty, &[]).unwrap();
        writer.record("arch/riscv/mm/init.c:3", UnitStatus::Failed, &[]).unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let entries = load_checkpoint(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries["arch/riscv/mm/init.c:1"].output_lines,
            vec!["CONFIG_MMU=y", "CONFIG_SMP=m"]
        );
        assert!(entries["arch/riscv/mm/init.c:2"].status.is_settled());
        assert!(!entries["arch/riscv/mm/init.c:3"].status.is_settled());
    }

    #[test]
    fn test_append_keeps_one_header_and_last_row_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oracle_checkpoint.csv");

        let mut first = CheckpointWriter::create(&path, 10).unwrap();
        first.record("a.c:1", UnitStatus::Failed, &[]).unwrap();
        first.finish().unwrap();

        let mut resumed = CheckpointWriter::append(&path, 10).unwrap();
        resumed.record("a.c:1", UnitStatus::Ok, &["CONFIG_A=y".into()]).unwrap();
        resumed.finish().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("file_line").count(), 1);

        let entries = load_checkpoint(&path).unwrap();
        assert_eq!(entries["a.c:1"].status, UnitStatus::Ok);
    }

    #[test]
    fn test_quoted_semicolon_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oracle_checkpoint.csv");

        let lines = vec![
            "CONFIG_CMDLINE=\"console=ttyS0;earlycon\"".to_string(),
            "CONFIG_MMU=y".to_string(),
        ];
        let mut writer = CheckpointWriter::create(&path, 1).unwrap();
        writer.record("a.c:1", UnitStatus::Ok, &lines).unwrap();
        writer.finish().unwrap();

        assert_eq!(load_checkpoint(&path).unwrap()["a.c:1"].output_lines, lines);
    }

    #[test]
    fn test_missing_checkpoint_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_checkpoint(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_append_to_missing_file_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oracle_checkpoint.csv");
        let mut writer = CheckpointWriter::append(&path, 1).unwrap();
        writer.record("a.c:1", UnitStatus::Empty, &[]).unwrap();
        writer.finish().unwrap();
        assert_eq!(load_checkpoint(&path).unwrap().len(), 1);
    }
}
