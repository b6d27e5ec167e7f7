//! Build-rule dump grammar
//!
//! The dumper prints one record per compiled object:
//!
//! ```text
//! arch/riscv/kernel/module.c <- CONFIG_MODULES && !CONFIG_XIP_KERNEL
//! ```
//!
//! Plain tokens become `(token, y)`, tokens prefixed with `!` become
//! `(token, n)`.

use cfgcover_core::types::is_symbol_name;
use cfgcover_core::{ConfigValue, Literal};

const ARROW: &str = "<-";
const AND: &str = "&&";

/// One parsed dump record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRule {
    /// Path as printed by the dumper
    pub path: String,
    /// Conjunction gating every line of the file
    pub literals: Vec<Literal>,
    /// Tokens that were not plain or negated identifiers
    pub rejected: Vec<String>,
}

/// Parse one dump line.
///
/// Returns `None` for blank lines, comments, records without `<-` and
/// records whose condition holds no usable token.
pub fn parse_build_rule(line: &str) -> Option<BuildRule> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (path, condition) = line.split_once(ARROW)?;
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut literals: Vec<Literal> = Vec::new();
    let mut rejected = Vec::new();

    for token in condition.split(AND).map(str::trim).filter(|t| !t.is_empty()) {
        let (symbol, value) = match token.strip_prefix('!') {
            Some(negated) => (negated.trim(), ConfigValue::No),
            None => (token, ConfigValue::Yes),
        };
        if !is_symbol_name(symbol) {
            rejected.push(token.to_string());
            continue;
        }
        let literal = Literal::new(symbol, value);
        if !literals.contains(&literal) {
            literals.push(literal);
        }
    }

    if literals.is_empty() {
        return None;
    }

    Some(BuildRule {
        path: path.to_string(),
        literals,
        rejected,
    })
}

/// Parse a whole dump, skipping lines that carry no rule
pub fn parse_build_rules(text: &str) -> Vec<BuildRule> {
    text.lines().filter_map(parse_build_rule).collect()
}
