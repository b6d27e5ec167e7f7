//! Coverage Evaluator
//!
//! Decides per line whether the configuration satisfies every literal of its
//! condition set. An empty set is always compiled.

use cfgcover_core::{
    Classification, ConditionMap, ConditionSet, EvalMode, EvaluationResult, LineKey, UnmetLiteral,
};
use cfgcover_parser::ConfigStore;
use rayon::prelude::*;
use tracing::info;

/// Evaluates condition sets against one configuration
pub struct Evaluator<'a> {
    store: &'a ConfigStore,
    mode: EvalMode,
}

impl<'a> Evaluator<'a> {
    pub fn new(store: &'a ConfigStore, mode: EvalMode) -> Self {
        Self { store, mode }
    }

    /// Classify one condition set
    pub fn classify(&self, conditions: &ConditionSet) -> Classification {
        let unmet: Vec<UnmetLiteral> = conditions
            .iter()
            .filter_map(|literal| {
                let actual = self.store.lookup(&literal.symbol);
                if self.mode.accepts(&literal.value, actual) {
                    None
                } else {
                    Some(UnmetLiteral::new(
                        literal.symbol.as_str(),
                        actual.clone(),
                        literal.value.clone(),
                    ))
                }
            })
            .collect();

        if unmet.is_empty() {
            Classification::Compiled
        } else {
            Classification::Skipped(unmet)
        }
    }

    pub fn evaluate(&self, key: LineKey, conditions: &ConditionSet) -> EvaluationResult {
        EvaluationResult {
            classification: self.classify(conditions),
            conditions: conditions.clone(),
            key,
        }
    }

    /// Evaluate every record of `map`, in key order
    pub fn evaluate_map(&self, map: &ConditionMap) -> Evaluation {
        let results: Vec<EvaluationResult> = map
            .files()
            .par_iter()
            .flat_map_iter(|(file, lines)| {
                lines
                    .iter()
                    .map(move |(line, set)| self.evaluate(LineKey::new(file.as_str(), *line), set))
            })
            .collect();

        let evaluation = Evaluation { results };
        info!(
            "Evaluated {} lines ({:?}): {} compiled, {} skipped, {:.2}% compiled",
            evaluation.len(),
            self.mode,
            evaluation.compiled_count(),
            evaluation.skipped_count(),
            evaluation.compiled_ratio() * 100.0
        );
        evaluation
    }
}

/// Every evaluation result of one run
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub results: Vec<EvaluationResult>,
}

impl Evaluation {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn compiled(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| r.classification.is_compiled())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| !r.classification.is_compiled())
    }

    pub fn compiled_count(&self) -> usize {
        self.compiled().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.len() - self.compiled_count()
    }

    /// Compiled share in `0.0..=1.0`; zero for an empty run
    pub fn compiled_ratio(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.compiled_count() as f64 / self.len() as f64
        }
    }
}
