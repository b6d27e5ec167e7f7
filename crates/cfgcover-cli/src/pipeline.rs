//! Stage glue
//!
//! Each stage reads what the previous one persisted, so `scan`, `evaluate`
//! and `stats` can run as separate invocations. `run` chains them in memory.

use anyhow::{Context, Result};
use cfgcover_analysis::{aggregate, merge_build_rules, Evaluation, Evaluator, Statistics};
use cfgcover_core::config::Config;
use cfgcover_core::{ConditionMap, Diagnostic, DiagnosticKind, LineKey};
use cfgcover_index::{
    load_checkpoint, CheckpointWriter, FailureRow, StageTables, StorageError, UnitStatus,
};
use cfgcover_oracle::{
    BuildRuleDumper, LineUnit, OracleClient, PoolStats, UnitFailure, UnitOutcome, WorkerPool,
};
use cfgcover_parser::{
    normalize_literals, parse_build_rules, ConfigStore, PathCanonicalizer, ScanSummary,
    SourceEnumerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of the scan stage
#[derive(Debug)]
pub struct ScanReport {
    pub summary: ScanSummary,
    pub map: ConditionMap,
    pub oracle: PoolStats,
    /// Units answered from the checkpoint instead of the oracle
    pub reused: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Enumerate the tree. An unreadable root is fatal.
pub fn enumerate(config: &Config, root: &Path) -> Result<ScanSummary> {
    let enumerator = SourceEnumerator::new(&config.scan)?;
    let summary = enumerator.enumerate(root)?;
    for (path, reason) in &summary.unreadable {
        debug!("Skipped unreadable {:?}: {}", path, reason);
    }
    Ok(summary)
}

pub fn canonicalizer(config: &Config, root: &Path) -> PathCanonicalizer {
    let canon = PathCanonicalizer::new(root, config.scan.prefix.as_deref());
    info!("Canonical prefix for {:?}: {:?}", root, canon.prefix());
    canon
}

/// Oracle batch, build-rule merge and stage A
pub fn scan(config: &Config, root: &Path, tables: &StageTables, resume: bool) -> Result<ScanReport> {
    // Resolve the oracle before walking a large tree
    let client = OracleClient::new(&config.oracle)?;
    let summary = enumerate(config, root)?;
    let canon = canonicalizer(config, root);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let mut report = runtime.block_on(query_oracle(config, client, summary, &canon, tables, resume))?;

    if config.dumper.enabled {
        merge_dump(config, root, &canon, &mut report);
    } else {
        info!("Build-rule merge disabled");
    }

    tables
        .write_condition_map(&report.map)
        .context("Failed to write condition map")?;
    Ok(report)
}

async fn query_oracle(
    config: &Config,
    client: OracleClient,
    summary: ScanSummary,
    canon: &PathCanonicalizer,
    tables: &StageTables,
    resume: bool,
) -> Result<ScanReport> {
    let checkpoint_path = tables.checkpoint_path();
    let previous = if resume {
        load_checkpoint(&checkpoint_path).context("Failed to load oracle checkpoint")?
    } else {
        Default::default()
    };

    let mut map = ConditionMap::new();
    let mut diagnostics: Vec<Diagnostic> = summary
        .unreadable
        .iter()
        .map(|(path, reason)| {
            Diagnostic::new(
                DiagnosticKind::UnreadableFile,
                Some(canon.canonicalize(&path.to_string_lossy())),
                reason.clone(),
            )
        })
        .collect();
    let mut reused = 0;
    let mut pending = Vec::new();

    for file in &summary.files {
        let path: Arc<Path> = Arc::from(file.path.as_path());
        for line in 1..=file.lines {
            let key = canon.relative_key(&file.relative, line);
            match previous.get(&key.to_string()) {
                Some(entry) if entry.status.is_settled() => {
                    reused += 1;
                    record_answer(&mut map, &mut diagnostics, key, &entry.output_lines);
                }
                _ => pending.push(LineUnit::new(Arc::clone(&path), line)),
            }
        }
    }
    if resume {
        info!("Resuming: {} units reused, {} to query", reused, pending.len());
    }

    let mut checkpoint = if resume {
        CheckpointWriter::append(&checkpoint_path, config.oracle.flush_every)?
    } else {
        CheckpointWriter::create(&checkpoint_path, config.oracle.flush_every)?
    };
    let mut failures = Vec::new();

    let pool = WorkerPool::new(config.oracle.workers)
        .with_progress(config.oracle.progress_every, pending.len());
    info!(
        "Querying {} units with {} workers ({})",
        pending.len(),
        pool.workers(),
        client.program().display()
    );

    let oracle = pool
        .run(Arc::new(client), pending, |report| -> Result<(), StorageError> {
            let key = unit_key(canon, &report.unit);
            match report.outcome {
                UnitOutcome::Answered(lines) => {
                    checkpoint.record(&key.to_string(), UnitStatus::Ok, &lines)?;
                    record_answer(&mut map, &mut diagnostics, key, &lines);
                }
                UnitOutcome::Empty => {
                    checkpoint.record(&key.to_string(), UnitStatus::Empty, &[])?;
                }
                UnitOutcome::Failed(failure) => {
                    checkpoint.record(&key.to_string(), UnitStatus::Failed, &[])?;
                    debug!("Oracle failed on {}: {}", key, failure);
                    diagnostics.push(Diagnostic::new(
                        failure_kind(&failure),
                        Some(key.to_string()),
                        failure.to_string(),
                    ));
                    failures.push(FailureRow {
                        file_line: key.to_string(),
                        reason: failure.to_string(),
                    });
                }
            }
            Ok(())
        })
        .await
        .context("Failed to record oracle results")?;

    checkpoint.finish().context("Failed to flush oracle checkpoint")?;
    tables
        .write_failures(&failures)
        .context("Failed to write oracle failures")?;

    if oracle.failed > 0 {
        warn!(
            "{} units failed ({} timed out); their lines count as ungated",
            oracle.failed, oracle.timed_out
        );
    }
    info!(
        "Condition map has {} records from {} units",
        map.len(),
        reused + oracle.submitted
    );

    Ok(ScanReport {
        summary,
        map,
        oracle,
        reused,
        diagnostics,
    })
}

fn unit_key(canon: &PathCanonicalizer, unit: &LineUnit) -> LineKey {
    LineKey::new(canon.canonicalize(&unit.path.to_string_lossy()), unit.line)
}

fn record_answer(
    map: &mut ConditionMap,
    diagnostics: &mut Vec<Diagnostic>,
    key: LineKey,
    lines: &[String],
) {
    let normalized = normalize_literals(lines.iter().map(String::as_str));
    for raw in normalized.malformed {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MalformedLiteral,
            Some(key.to_string()),
            raw,
        ));
    }
    if !normalized.conditions.is_empty() {
        map.insert(key, normalized.conditions);
    }
}

fn failure_kind(failure: &UnitFailure) -> DiagnosticKind {
    match failure {
        UnitFailure::Timeout(_) => DiagnosticKind::OracleTimeout,
        UnitFailure::Exit { .. } => DiagnosticKind::OracleExit,
        UnitFailure::Spawn(_) => DiagnosticKind::OracleSpawn,
    }
}

/// Run the dumper and merge its rules. Any dumper problem leaves the map
/// untouched and becomes a diagnostic.
fn merge_dump(config: &Config, root: &Path, canon: &PathCanonicalizer, report: &mut ScanReport) {
    let dumped = BuildRuleDumper::new(&config.dumper).and_then(|dumper| dumper.dump(root));
    let text = match dumped {
        Ok(text) => text,
        Err(e) => {
            warn!("Build-rule merge skipped: {}", e);
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DumperFailed,
                None,
                e.to_string(),
            ));
            return;
        }
    };

    let rules = parse_build_rules(&text);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        debug!("dumper: {}", line);
    }
    let merged = merge_build_rules(&mut report.map, &rules, canon);
    report.diagnostics.extend(merged.diagnostics);
}

/// Evaluate a condition map and write stage B
pub fn evaluate(
    config: &Config,
    map: &ConditionMap,
    dotconfig: &Path,
    tables: &StageTables,
) -> Result<Evaluation> {
    let store = ConfigStore::from_dot_config(dotconfig)?;
    info!("Loaded {} symbols from {:?}", store.len(), dotconfig);

    let evaluation = Evaluator::new(&store, config.evaluation.mode).evaluate_map(map);
    let stored = tables
        .write_evaluation(&evaluation)
        .context("Failed to write evaluation tables")?;
    info!(
        "Wrote {} compiled and {} skipped lines to {:?}",
        stored.compiled,
        stored.skipped,
        tables.dir()
    );
    Ok(evaluation)
}

/// Write stage C from an in-memory evaluation
pub fn statistics(evaluation: &Evaluation, tables: &StageTables) -> Result<Statistics> {
    let stats = aggregate(&evaluation.results);
    write_statistics(&stats, tables)?;
    Ok(stats)
}

/// Write stage C from the stored stage B tables
pub fn statistics_from_tables(tables: &StageTables) -> Result<Statistics> {
    let stats = tables
        .read_statistics()
        .context("Failed to read evaluation tables")?;
    write_statistics(&stats, tables)?;
    Ok(stats)
}

fn write_statistics(stats: &Statistics, tables: &StageTables) -> Result<()> {
    if stats.unparseable() > 0 {
        warn!("{} unmet conditions could not be parsed", stats.unparseable());
    }
    tables
        .write_statistics(stats)
        .context("Failed to write statistics tables")?;
    Ok(())
}

/// Tables for `dir`, creating the directory
pub fn output_tables(dir: PathBuf) -> Result<StageTables> {
    let tables = StageTables::new(dir);
    tables
        .ensure_dir()
        .with_context(|| format!("Output directory {:?} is not writable", tables.dir()))?;
    Ok(tables)
}
