//! Core type definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::Error;
use crate::location::LineKey;

/// Value of a configuration symbol, either assigned or expected by a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConfigValue {
    /// `y`, built in
    Yes,
    /// `n`, absent
    No,
    /// `m`, built as a module
    Module,
    /// Any other value (strings, integers, hex)
    Other(String),
}

impl ConfigValue {
    /// Classify a raw value string
    pub fn parse(raw: &str) -> Self {
        match raw {
            "y" => ConfigValue::Yes,
            "n" => ConfigValue::No,
            "m" => ConfigValue::Module,
            other => ConfigValue::Other(other.to_string()),
        }
    }

    /// The value as it appears in assignment files and literals
    pub fn as_str(&self) -> &str {
        match self {
            ConfigValue::Yes => "y",
            ConfigValue::No => "n",
            ConfigValue::Module => "m",
            ConfigValue::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::parse(&s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::parse(s)
    }
}

impl From<ConfigValue> for String {
    fn from(v: ConfigValue) -> Self {
        match v {
            ConfigValue::Other(s) => s,
            tristate => tristate.as_str().to_string(),
        }
    }
}

/// Whether `name` is a well-formed configuration identifier
pub fn is_symbol_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One AND-ed gating condition: `symbol` must hold `value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub symbol: String,
    pub value: ConfigValue,
}

impl Literal {
    pub fn new(symbol: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self {
            symbol: symbol.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.symbol, self.value)
    }
}

impl FromStr for Literal {
    type Err = Error;

    /// Parse `SYMBOL=value`. Fails when the separator is missing, the symbol
    /// is not an identifier or the value is empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, value) = s
            .split_once('=')
            .ok_or_else(|| Error::Parse(format!("literal without '=': {s}")))?;
        let (symbol, value) = (symbol.trim(), value.trim());
        if !is_symbol_name(symbol) {
            return Err(Error::Parse(format!("invalid symbol in literal: {s}")));
        }
        if value.is_empty() {
            return Err(Error::Parse(format!("literal without a value: {s}")));
        }
        Ok(Literal::new(symbol, value))
    }
}

/// Deduplicated conjunction of literals gating one line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    literals: BTreeSet<Literal>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal, returning whether it was new
    pub fn insert(&mut self, literal: Literal) -> bool {
        self.literals.insert(literal)
    }

    /// Set union; returns how many literals were new
    pub fn union_with<'a, I>(&mut self, literals: I) -> usize
    where
        I: IntoIterator<Item = &'a Literal>,
    {
        literals
            .into_iter()
            .filter(|lit| self.literals.insert((*lit).clone()))
            .count()
    }

    pub fn contains(&self, literal: &Literal) -> bool {
        self.literals.contains(literal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Semicolon-joined literal strings, as stored in the stage tables
    pub fn joined(&self) -> String {
        self.literals
            .iter()
            .map(Literal::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Split a `;`-joined list of `SYMBOL=...` items into trimmed, non-empty
/// items.
///
/// A `;` starts a new item only outside double quotes, and only when what
/// follows is `SYMBOL=...` or a segment without any `=`. String values that
/// contain `;` stay whole. With unbalanced quotes only the `SYMBOL=` check
/// applies.
pub fn split_joined(joined: &str) -> Vec<&str> {
    split_items(joined, true).unwrap_or_else(|| {
        split_items(joined, false).unwrap_or_default()
    })
}

fn split_items(joined: &str, track_quotes: bool) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (pos, c) in joined.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' if track_quotes => in_quotes = !in_quotes,
            ';' if !in_quotes && starts_new_item(&joined[pos + 1..]) => {
                items.push(&joined[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return None;
    }
    items.push(&joined[start..]);

    Some(
        items
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

fn starts_new_item(rest: &str) -> bool {
    let rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
    let segment = rest.split(';').next().unwrap_or_default();
    match segment.split_once('=') {
        Some((symbol, _)) => is_symbol_name(symbol.trim_end()),
        None => true,
    }
}

impl FromIterator<Literal> for ConditionSet {
    fn from_iter<T: IntoIterator<Item = Literal>>(iter: T) -> Self {
        Self {
            literals: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ConditionSet {
    type Item = &'a Literal;
    type IntoIter = std::collections::btree_set::Iter<'a, Literal>;

    fn into_iter(self) -> Self::IntoIter {
        self.literals.iter()
    }
}

/// How expected and actual values are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Exact equality
    #[default]
    Strict,
    /// Module counts as built in when `y` is expected
    Lenient,
}

impl EvalMode {
    /// Whether a symbol holding `actual` satisfies a literal expecting `expected`
    pub fn accepts(self, expected: &ConfigValue, actual: &ConfigValue) -> bool {
        match self {
            EvalMode::Strict => expected == actual,
            EvalMode::Lenient => match expected {
                ConfigValue::Yes => matches!(actual, ConfigValue::Yes | ConfigValue::Module),
                ConfigValue::Module => matches!(actual, ConfigValue::Module),
                other => other == actual,
            },
        }
    }
}

impl FromStr for EvalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(EvalMode::Strict),
            "lenient" => Ok(EvalMode::Lenient),
            _ => Err(Error::Config(format!("unknown evaluation mode: {s}"))),
        }
    }
}

/// A literal that the configuration does not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnmetLiteral {
    pub symbol: String,
    pub actual: ConfigValue,
    pub expected: ConfigValue,
}

impl UnmetLiteral {
    pub fn new(
        symbol: impl Into<String>,
        actual: impl Into<ConfigValue>,
        expected: impl Into<ConfigValue>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }
}

/// Canonical string form: `SYMBOL=actual (need expected)`
impl std::fmt::Display for UnmetLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={} (need {})", self.symbol, self.actual, self.expected)
    }
}

/// Compilation verdict for one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Compiled,
    /// Unmet literals in condition order
    Skipped(Vec<UnmetLiteral>),
}

impl Classification {
    pub fn is_compiled(&self) -> bool {
        matches!(self, Classification::Compiled)
    }

    pub fn unmet(&self) -> &[UnmetLiteral] {
        match self {
            Classification::Compiled => &[],
            Classification::Skipped(unmet) => unmet,
        }
    }
}

/// Evaluation of one line record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub key: LineKey,
    pub conditions: ConditionSet,
    pub classification: Classification,
}

impl EvaluationResult {
    /// Unmet literals joined in canonical form, as stored in stage B
    pub fn unmet_joined(&self) -> String {
        self.classification
            .unmet()
            .iter()
            .map(UnmetLiteral::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Kind of a non-fatal problem met during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    OracleTimeout,
    OracleExit,
    OracleSpawn,
    MalformedLiteral,
    UnreadableFile,
    DumperFailed,
    RejectedToken,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiagnosticKind::OracleTimeout => "oracle_timeout",
            DiagnosticKind::OracleExit => "oracle_exit",
            DiagnosticKind::OracleSpawn => "oracle_spawn",
            DiagnosticKind::MalformedLiteral => "malformed_literal",
            DiagnosticKind::UnreadableFile => "unreadable_file",
            DiagnosticKind::DumperFailed => "dumper_failed",
            DiagnosticKind::RejectedToken => "rejected_token",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem, collected instead of raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// `file:line` or file path the problem belongs to, if any
    pub subject: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{}] {}: {}", self.kind, subject, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_roundtrip_strings() {
        assert_eq!(ConfigValue::parse("y"), ConfigValue::Yes);
        assert_eq!(ConfigValue::parse("m"), ConfigValue::Module);
        assert_eq!(ConfigValue::parse("n"), ConfigValue::No);
        assert_eq!(
            ConfigValue::parse("\"-custom\""),
            ConfigValue::Other("\"-custom\"".into())
        );
        assert_eq!(ConfigValue::Other("110400".into()).to_string(), "110400");
    }

    #[test]
    fn test_literal_parse() {
        let lit: Literal = " CONFIG_MMU = y ".parse().unwrap();
        assert_eq!(lit, Literal::new("CONFIG_MMU", "y"));
        assert!("CONFIG_MMU".parse::<Literal>().is_err());
        assert!("=y".parse::<Literal>().is_err());
        assert!("CONFIG MMU=y".parse::<Literal>().is_err());
        assert!("CONFIG_MMU=".parse::<Literal>().is_err());
    }

    #[test]
    fn test_condition_set_dedup() {
        let mut set = ConditionSet::new();
        assert!(set.insert(Literal::new("A", "y")));
        assert!(!set.insert(Literal::new("A", "y")));
        assert!(set.insert(Literal::new("A", "n")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.joined(), "A=y;A=n");
    }

    #[test]
    fn test_split_joined_keeps_semicolons_inside_values() {
        assert_eq!(
            split_joined("CONFIG_A=y;CONFIG_CMDLINE=\"a;b\" ; CONFIG_B=n"),
            vec!["CONFIG_A=y", "CONFIG_CMDLINE=\"a;b\"", "CONFIG_B=n"]
        );
        assert_eq!(
            split_joined("X=\"\" (need \"a;b\");Y=n (need y)"),
            vec!["X=\"\" (need \"a;b\")", "Y=n (need y)"]
        );
        assert_eq!(
            split_joined("CONFIG_CMDLINE=\"root=/dev/vda;console=ttyS0\";CONFIG_B=n"),
            vec!["CONFIG_CMDLINE=\"root=/dev/vda;console=ttyS0\"", "CONFIG_B=n"]
        );
        assert_eq!(split_joined(" A=y ;;B=n"), vec!["A=y", "B=n"]);
        assert_eq!(split_joined("A=\"open;B=n"), vec!["A=\"open", "B=n"]);
        assert!(split_joined("").is_empty());
    }

    #[test]
    fn test_split_joined_round_trips_a_set() {
        let set: ConditionSet = [
            Literal::new("CONFIG_CMDLINE", "\"console=ttyS0;earlycon\""),
            Literal::new("CONFIG_MMU", "y"),
        ]
        .into_iter()
        .collect();
        let parsed: ConditionSet = split_joined(&set.joined())
            .into_iter()
            .map(|item| item.parse::<Literal>().unwrap())
            .collect();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_union_counts_new_literals() {
        let mut set: ConditionSet = [Literal::new("A", "y")].into_iter().collect();
        let other = vec![Literal::new("A", "y"), Literal::new("B", "n")];
        assert_eq!(set.union_with(&other), 1);
        assert_eq!(set.union_with(&other), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_lenient_table() {
        use ConfigValue::*;
        let cases = [
            (Yes, Yes, true),
            (Yes, Module, true),
            (Yes, No, false),
            (Module, Yes, false),
            (Module, Module, true),
            (Module, No, false),
            (No, Yes, false),
            (No, Module, false),
            (No, No, true),
        ];
        for (expected, actual, ok) in cases {
            assert_eq!(
                EvalMode::Lenient.accepts(&expected, &actual),
                ok,
                "expected {expected} actual {actual}"
            );
        }
    }

    #[test]
    fn test_strict_is_exact() {
        use ConfigValue::*;
        assert!(EvalMode::Strict.accepts(&Yes, &Yes));
        assert!(!EvalMode::Strict.accepts(&Yes, &Module));
        assert!(EvalMode::Strict.accepts(&Other("0x10".into()), &Other("0x10".into())));
        assert!(!EvalMode::Lenient.accepts(&Other("1".into()), &Other("2".into())));
    }

    #[test]
    fn test_unmet_display() {
        let unmet = UnmetLiteral::new("CONFIG_SMP", "n", "y");
        assert_eq!(unmet.to_string(), "CONFIG_SMP=n (need y)");
    }
}
