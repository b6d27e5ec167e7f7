//! Unmet-condition strings
//!
//! Skipped lines persist their unmet literals as
//! `SYMBOL=actual (need expected)`, joined with `;`. Values may contain
//! spaces and `;`; lists are split with [`cfgcover_core::split_joined`].

use cfgcover_core::UnmetLiteral;
use once_cell::sync::Lazy;
use regex::Regex;

static UNMET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_]+)=(.*?) \(need (.*)\)\s*$")
        .expect("valid unmet pattern")
});

/// Parse one canonical unmet string
pub fn parse_unmet(item: &str) -> Option<UnmetLiteral> {
    let cap = UNMET_RE.captures(item)?;
    Some(UnmetLiteral::new(&cap[1], &cap[2], &cap[3]))
}
