//! Stage tables
//!
//! | Stage | File | Columns |
//! |-------|------|---------|
//! | A | `fileline_output.csv` | `file_line, output_lines` |
//! | B | `compiled_lines.csv` | `file_line, output_lines` |
//! | B | `skipped_lines.csv` | `file_line, output_lines, unmet_conditions` |
//! | C | `stats_*.csv` | one table per rollup |
//!
//! `output_lines` and `unmet_conditions` are `;`-joined.

use cfgcover_analysis::stats::{
    BlockedRow, CompiledDueRow, Statistics, SymbolRow, UnmetAggRow, UnmetDetailRow,
};
use cfgcover_analysis::{Evaluation, StatsAccumulator};
use cfgcover_core::{split_joined, ConditionMap, ConditionSet, LineKey, Literal};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::storage::{Result, StorageError};

pub const FILELINE_OUTPUT: &str = "fileline_output.csv";
pub const COMPILED_LINES: &str = "compiled_lines.csv";
pub const SKIPPED_LINES: &str = "skipped_lines.csv";
pub const UNMET_DETAIL: &str = "stats_unmet_detail.csv";
pub const UNMET_AGG: &str = "stats_unmet_agg.csv";
pub const BLOCKED_BY_ACTUAL: &str = "stats_blocked_by_actual.csv";
pub const COMPILED_DUE_TO: &str = "stats_compiled_due_to_value.csv";
pub const SYMBOLS: &str = "stats_symbols.csv";
pub const ORACLE_CHECKPOINT: &str = "oracle_checkpoint.csv";
pub const ORACLE_FAILURES: &str = "oracle_failures.csv";

#[derive(Debug, Serialize, Deserialize)]
struct LineRow {
    file_line: String,
    output_lines: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkippedRow {
    file_line: String,
    output_lines: String,
    unmet_conditions: String,
}

/// `file_line, reason` for a unit the oracle could not answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRow {
    pub file_line: String,
    pub reason: String,
}

/// Line counts of a stored stage B
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredStageB {
    pub compiled: usize,
    pub skipped: usize,
}

/// Every stage table of one output directory
#[derive(Debug, Clone)]
pub struct StageTables {
    dir: PathBuf,
}

impl StageTables {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the output directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, table: &str) -> PathBuf {
        self.dir.join(table)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.path(ORACLE_CHECKPOINT)
    }

    /// Write stage A
    pub fn write_condition_map(&self, map: &ConditionMap) -> Result<usize> {
        let rows = map.iter().map(|(key, set)| LineRow {
            file_line: key.to_string(),
            output_lines: set.joined(),
        });
        let written = write_rows(&self.path(FILELINE_OUTPUT), rows)?;
        info!("Wrote {} line records to {:?}", written, self.path(FILELINE_OUTPUT));
        Ok(written)
    }

    /// Read stage A. Literals are deduplicated again and malformed ones
    /// dropped; a malformed `file_line` is an error.
    pub fn read_condition_map(&self) -> Result<ConditionMap> {
        let path = self.path(FILELINE_OUTPUT);
        let mut map = ConditionMap::new();
        for row in read_rows::<LineRow>(&path)? {
            let key = parse_key(FILELINE_OUTPUT, &row.file_line)?;
            map.insert(key, parse_output_lines(&row.output_lines));
        }
        debug!("Read {} line records from {:?}", map.len(), path);
        Ok(map)
    }

    /// Write both stage B tables
    pub fn write_evaluation(&self, evaluation: &Evaluation) -> Result<StoredStageB> {
        let compiled = write_rows(
            &self.path(COMPILED_LINES),
            evaluation.compiled().map(|r| LineRow {
                file_line: r.key.to_string(),
                output_lines: r.conditions.joined(),
            }),
        )?;
        let skipped = write_rows(
            &self.path(SKIPPED_LINES),
            evaluation.skipped().map(|r| SkippedRow {
                file_line: r.key.to_string(),
                output_lines: r.conditions.joined(),
                unmet_conditions: r.unmet_joined(),
            }),
        )?;
        Ok(StoredStageB { compiled, skipped })
    }

    /// Rebuild statistics from the stored stage B tables alone
    pub fn read_statistics(&self) -> Result<Statistics> {
        let mut acc = StatsAccumulator::new();
        for row in read_rows::<LineRow>(&self.path(COMPILED_LINES))? {
            acc.record_compiled(&parse_output_lines(&row.output_lines));
        }
        for row in read_rows::<SkippedRow>(&self.path(SKIPPED_LINES))? {
            acc.record_skipped(&parse_output_lines(&row.output_lines), &row.unmet_conditions);
        }
        Ok(acc.finish())
    }

    /// Write every stage C table
    pub fn write_statistics(&self, stats: &Statistics) -> Result<()> {
        write_rows(&self.path(UNMET_DETAIL), stats.unmet_detail.iter())?;
        write_rows(&self.path(UNMET_AGG), stats.unmet_agg.iter())?;
        write_rows(
            &self.path(BLOCKED_BY_ACTUAL),
            stats.blocked_by_actual.iter(),
        )?;
        write_rows(
            &self.path(COMPILED_DUE_TO),
            stats.compiled_due_to.iter(),
        )?;
        write_rows(&self.path(SYMBOLS), stats.symbols.iter())?;
        info!("Wrote statistics tables to {:?}", self.dir);
        Ok(())
    }

    pub fn write_failures(&self, failures: &[FailureRow]) -> Result<usize> {
        write_rows(&self.path(ORACLE_FAILURES), failures.iter())
    }

    pub fn read_failures(&self) -> Result<Vec<FailureRow>> {
        read_rows(&self.path(ORACLE_FAILURES))
    }
}

/// Parse a `;`-joined literal list, dropping malformed entries
pub fn parse_output_lines(joined: &str) -> ConditionSet {
    split_joined(joined)
        .into_iter()
        .filter_map(|item| item.parse::<Literal>().ok())
        .collect()
}

fn parse_key(table: &str, raw: &str) -> Result<LineKey> {
    raw.parse().map_err(|e| StorageError::Parse {
        table: table.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

/// A stage table row with a fixed column list
trait Table {
    const HEADER: &'static [&'static str];
}

impl<T: Table> Table for &T {
    const HEADER: &'static [&'static str] = T::HEADER;
}

impl Table for LineRow {
    const HEADER: &'static [&'static str] = &["file_line", "output_lines"];
}

impl Table for SkippedRow {
    const HEADER: &'static [&'static str] = &["file_line", "output_lines", "unmet_conditions"];
}

impl Table for FailureRow {
    const HEADER: &'static [&'static str] = &["file_line", "reason"];
}

impl Table for UnmetDetailRow {
    const HEADER: &'static [&'static str] = &["config", "expected", "actual", "skipped_count"];
}

impl Table for UnmetAggRow {
    const HEADER: &'static [&'static str] = &["config", "expected", "skipped_count"];
}

impl Table for BlockedRow {
    const HEADER: &'static [&'static str] = &["config", "actual", "skipped_count"];
}

impl Table for CompiledDueRow {
    const HEADER: &'static [&'static str] = &["config", "value", "compiled_count"];
}

impl Table for SymbolRow {
    const HEADER: &'static [&'static str] = &["config", "count", "type"];
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<usize>
where
    T: Table + Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    // Empty tables still carry their columns
    if count == 0 {
        writer.write_record(T::HEADER)?;
    }
    writer.flush()?;
    Ok(count)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}
