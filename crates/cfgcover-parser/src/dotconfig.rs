//! Configuration Store
//!
//! Loads a kernel configuration assignment file (`.config`) into a
//! symbol -> value map. Symbols that never appear read as `n`.

use cfgcover_core::types::is_symbol_name;
use cfgcover_core::{ConfigValue, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

static NOT_SET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*([A-Za-z0-9_]+)\s+is\s+not\s+set\s*$").expect("valid not-set pattern")
});

static NOT_SET: ConfigValue = ConfigValue::No;

/// Immutable symbol -> value assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    values: HashMap<String, ConfigValue>,
}

impl ConfigStore {
    /// Load a `.config` file. A missing file is fatal for a run.
    pub fn from_dot_config(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigFileMissing(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let store = Self::parse(&String::from_utf8_lossy(&bytes));
        debug!("Loaded {} symbols from {:?}", store.len(), path);
        Ok(store)
    }

    /// Parse `.config` content. Later assignments of a symbol win.
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // "# CONFIG_XXX is not set" is the only comment that carries data
            if line.starts_with('#') {
                if let Some(cap) = NOT_SET_RE.captures(line) {
                    values.insert(cap[1].to_string(), ConfigValue::No);
                }
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if is_symbol_name(key) {
                    values.insert(key.to_string(), ConfigValue::parse(value.trim()));
                }
            }
        }

        Self { values }
    }

    /// Value of `symbol`, `n` when unassigned
    pub fn lookup(&self, symbol: &str) -> &ConfigValue {
        self.values.get(symbol).unwrap_or(&NOT_SET)
    }

    /// Explicit assignment of `symbol`, if any
    pub fn get(&self, symbol: &str) -> Option<&ConfigValue> {
        self.values.get(symbol)
    }

    /// Number of explicitly assigned symbols
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
