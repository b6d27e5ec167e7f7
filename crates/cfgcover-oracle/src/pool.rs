//! Bounded oracle worker pool
//!
//! At most `workers` oracle processes are in flight. Completed reports are
//! handed to a single sink on the calling task, so whatever the sink
//! accumulates needs no locking.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::client::{LineUnit, OracleClient, UnitFailure, UnitOutcome, UnitReport};

/// Counters for one pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub answered: usize,
    pub empty: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Worker tasks that died before reporting
    pub panicked: usize,
}

impl PoolStats {
    pub fn completed(&self) -> usize {
        self.answered + self.empty + self.failed + self.panicked
    }

    fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Answered(_) => self.answered += 1,
            UnitOutcome::Empty => self.empty += 1,
            UnitOutcome::Failed(failure) => {
                self.failed += 1;
                if matches!(failure, UnitFailure::Timeout(_)) {
                    self.timed_out += 1;
                }
            }
        }
    }
}

/// Fans oracle units out over a fixed number of concurrent workers
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    progress_every: usize,
    total: Option<usize>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress_every: 0,
            total: None,
        }
    }

    /// Log progress every `every` completed units (0 disables)
    pub fn with_progress(mut self, every: usize, total: usize) -> Self {
        self.progress_every = every;
        self.total = Some(total);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every unit through `client`, feeding reports to `sink` in
    /// completion order. A sink error stops the run; in-flight oracle
    /// processes are killed when their tasks are dropped.
    pub async fn run<I, F, E>(
        &self,
        client: Arc<OracleClient>,
        units: I,
        mut sink: F,
    ) -> Result<PoolStats, E>
    where
        I: IntoIterator<Item = LineUnit>,
        F: FnMut(UnitReport) -> Result<(), E>,
    {
        let mut stats = PoolStats::default();
        let mut in_flight: JoinSet<UnitReport> = JoinSet::new();

        for unit in units {
            while in_flight.len() >= self.workers {
                if let Some(joined) = in_flight.join_next().await {
                    self.complete(joined, &mut stats, &mut sink)?;
                }
            }

            let client = Arc::clone(&client);
            stats.submitted += 1;
            in_flight.spawn(async move {
                let outcome = client.query(&unit).await;
                UnitReport { unit, outcome }
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            self.complete(joined, &mut stats, &mut sink)?;
        }

        info!(
            "Oracle finished: {} units, {} answered, {} empty, {} failed ({} timed out)",
            stats.submitted, stats.answered, stats.empty, stats.failed, stats.timed_out
        );
        Ok(stats)
    }

    fn complete<F, E>(
        &self,
        joined: Result<UnitReport, tokio::task::JoinError>,
        stats: &mut PoolStats,
        sink: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(UnitReport) -> Result<(), E>,
    {
        match joined {
            Ok(report) => {
                stats.record(&report.outcome);
                sink(report)?;
            }
            Err(e) => {
                error!("Oracle worker failed: {}", e);
                stats.panicked += 1;
            }
        }

        let done = stats.completed();
        if self.progress_every > 0 && done % self.progress_every == 0 {
            match self.total {
                Some(total) if total > 0 => info!(
                    "Oracle progress: {}/{} ({:.1}%)",
                    done,
                    total,
                    done as f64 * 100.0 / total as f64
                ),
                _ => info!("Oracle progress: {} units", done),
            }
        }
        Ok(())
    }
}
