//! Statistics Aggregator
//!
//! Rolls evaluation results up into count tables. In memory, unmet literals
//! are counted from the evaluator's typed results. Tables rebuilt from a
//! persisted skipped-lines file parse the canonical
//! `SYMBOL=actual (need expected)` form back; strings that do not parse are
//! kept under [`UNPARSEABLE_KEY`]. Accumulators are plain values that can be
//! folded per partition and merged.

use cfgcover_core::{
    split_joined, ConditionSet, ConfigValue, EvaluationResult, Literal, UnmetLiteral,
};
use cfgcover_parser::parse_unmet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Detail-table symbol for unmet strings that do not parse
pub const UNPARSEABLE_KEY: &str = "__UNPARSEABLE__";

/// `(config, expected, actual) -> skipped_count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetDetailRow {
    pub config: String,
    pub expected: String,
    pub actual: String,
    pub skipped_count: usize,
}

/// `(config, expected) -> skipped_count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetAggRow {
    pub config: String,
    pub expected: String,
    pub skipped_count: usize,
}

/// `(config, actual) -> skipped_count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRow {
    pub config: String,
    pub actual: String,
    pub skipped_count: usize,
}

/// `(config, value) -> compiled_count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDueRow {
    pub config: String,
    pub value: String,
    pub compiled_count: usize,
}

/// Which values a symbol is expected to hold across all lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    /// Expected both enabled and disabled somewhere
    All,
    Y,
    N,
}

/// `(config) -> count, type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRow {
    pub config: String,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: SymbolType,
}

#[derive(Debug, Clone, Copy, Default)]
struct SymbolUsage {
    count: usize,
    expects_y: bool,
    expects_n: bool,
}

impl SymbolUsage {
    fn record(&mut self, value: &ConfigValue) {
        self.count += 1;
        match value {
            ConfigValue::Yes | ConfigValue::Module => self.expects_y = true,
            ConfigValue::No => self.expects_n = true,
            ConfigValue::Other(_) => {}
        }
    }

    fn merge(&mut self, other: SymbolUsage) {
        self.count += other.count;
        self.expects_y |= other.expects_y;
        self.expects_n |= other.expects_n;
    }

    fn kind(&self) -> SymbolType {
        match (self.expects_y, self.expects_n) {
            (true, true) => SymbolType::All,
            (true, false) => SymbolType::Y,
            _ => SymbolType::N,
        }
    }
}

/// Incremental statistics over evaluation results
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    unmet_detail: HashMap<(String, String, String), usize>,
    unmet_agg: HashMap<(String, String), usize>,
    blocked_by_actual: HashMap<(String, String), usize>,
    compiled_due_to: HashMap<(String, String), usize>,
    symbols: HashMap<String, SymbolUsage>,
    compiled_lines: usize,
    skipped_lines: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evaluated line
    pub fn record(&mut self, result: &EvaluationResult) {
        if result.classification.is_compiled() {
            self.record_compiled(&result.conditions);
        } else {
            self.skipped_lines += 1;
            self.record_symbols(&result.conditions);
            for unmet in result.classification.unmet() {
                self.record_unmet_literal(unmet);
            }
        }
    }

    /// Record a compiled line: each of its literals contributed to it
    pub fn record_compiled(&mut self, conditions: &ConditionSet) {
        self.compiled_lines += 1;
        self.record_symbols(conditions);
        for literal in conditions {
            bump(
                &mut self.compiled_due_to,
                (literal.symbol.clone(), literal.value.to_string()),
            );
        }
    }

    /// Record a skipped line from its stored `;`-joined unmet list
    pub fn record_skipped(&mut self, conditions: &ConditionSet, unmet_joined: &str) {
        self.skipped_lines += 1;
        self.record_symbols(conditions);
        for item in split_joined(unmet_joined) {
            self.record_unmet(item);
        }
    }

    /// Record one unmet string in canonical form
    fn record_unmet(&mut self, item: &str) {
        match parse_unmet(item) {
            Some(unmet) => self.record_unmet_literal(&unmet),
            None => bump(
                &mut self.unmet_detail,
                (UNPARSEABLE_KEY.to_string(), item.to_string(), String::new()),
            ),
        }
    }

    fn record_unmet_literal(&mut self, unmet: &UnmetLiteral) {
        let expected = unmet.expected.to_string();
        let actual = unmet.actual.to_string();
        bump(
            &mut self.unmet_detail,
            (unmet.symbol.clone(), expected.clone(), actual.clone()),
        );
        bump(&mut self.unmet_agg, (unmet.symbol.clone(), expected));
        bump(&mut self.blocked_by_actual, (unmet.symbol.clone(), actual));
    }

    fn record_symbols(&mut self, conditions: &ConditionSet) {
        for Literal { symbol, value } in conditions {
            self.symbols.entry(symbol.clone()).or_default().record(value);
        }
    }

    /// Combine two partial accumulators
    pub fn merge(mut self, other: StatsAccumulator) -> Self {
        merge_counts(&mut self.unmet_detail, other.unmet_detail);
        merge_counts(&mut self.unmet_agg, other.unmet_agg);
        merge_counts(&mut self.blocked_by_actual, other.blocked_by_actual);
        merge_counts(&mut self.compiled_due_to, other.compiled_due_to);
        for (symbol, usage) in other.symbols {
            self.symbols.entry(symbol).or_default().merge(usage);
        }
        self.compiled_lines += other.compiled_lines;
        self.skipped_lines += other.skipped_lines;
        self
    }

    /// Sort every table by descending count, then key
    pub fn finish(self) -> Statistics {
        let mut symbols: Vec<SymbolRow> = self
            .symbols
            .into_iter()
            .map(|(config, usage)| SymbolRow {
                config,
                count: usage.count,
                kind: usage.kind(),
            })
            .collect();
        symbols.sort_by(|a, b| a.config.cmp(&b.config));

        Statistics {
            unmet_detail: sorted(self.unmet_detail)
                .map(|((config, expected, actual), skipped_count)| UnmetDetailRow {
                    config,
                    expected,
                    actual,
                    skipped_count,
                })
                .collect(),
            unmet_agg: sorted(self.unmet_agg)
                .map(|((config, expected), skipped_count)| UnmetAggRow {
                    config,
                    expected,
                    skipped_count,
                })
                .collect(),
            blocked_by_actual: sorted(self.blocked_by_actual)
                .map(|((config, actual), skipped_count)| BlockedRow {
                    config,
                    actual,
                    skipped_count,
                })
                .collect(),
            compiled_due_to: sorted(self.compiled_due_to)
                .map(|((config, value), compiled_count)| CompiledDueRow {
                    config,
                    value,
                    compiled_count,
                })
                .collect(),
            symbols,
            compiled_lines: self.compiled_lines,
            skipped_lines: self.skipped_lines,
        }
    }
}

fn bump<K: Hash + Eq>(counts: &mut HashMap<K, usize>, key: K) {
    *counts.entry(key).or_insert(0) += 1;
}

fn merge_counts<K: Hash + Eq>(into: &mut HashMap<K, usize>, from: HashMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

fn sorted<K: Ord>(counts: HashMap<K, usize>) -> impl Iterator<Item = (K, usize)> {
    let mut rows: Vec<(K, usize)> = counts.into_iter().collect();
    rows.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
    rows.into_iter()
}

/// Finished statistics tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub unmet_detail: Vec<UnmetDetailRow>,
    pub unmet_agg: Vec<UnmetAggRow>,
    pub blocked_by_actual: Vec<BlockedRow>,
    pub compiled_due_to: Vec<CompiledDueRow>,
    pub symbols: Vec<SymbolRow>,
    pub compiled_lines: usize,
    pub skipped_lines: usize,
}

impl Statistics {
    pub fn total_lines(&self) -> usize {
        self.compiled_lines + self.skipped_lines
    }

    /// Sum of the detail table, unparseable entries included
    pub fn unmet_total(&self) -> usize {
        self.unmet_detail.iter().map(|r| r.skipped_count).sum()
    }

    pub fn unparseable(&self) -> usize {
        self.unmet_detail
            .iter()
            .filter(|r| r.config == UNPARSEABLE_KEY)
            .map(|r| r.skipped_count)
            .sum()
    }
}

/// Aggregate a whole evaluation, partitioned across threads
pub fn aggregate(results: &[EvaluationResult]) -> Statistics {
    results
        .par_iter()
        .fold(StatsAccumulator::new, |mut acc, result| {
            acc.record(result);
            acc
        })
        .reduce(StatsAccumulator::new, StatsAccumulator::merge)
        .finish()
}
