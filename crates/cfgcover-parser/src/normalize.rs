//! Condition Normalizer
//!
//! Cleans the raw literal lines an oracle prints for one source line and
//! rewrites path keys to the canonical repo-relative form used for joins.

use cfgcover_core::{ConditionSet, ConfigValue, LineKey, Literal, Result};
use std::path::{Component, Path, PathBuf};

/// Suffix of the companion symbol kconfig generates for tristate modules
pub const MODULE_SUFFIX: &str = "_MODULE";

/// Marker that starts an oracle comment line
pub const COMMENT_MARKER: char = '#';

/// What a single raw literal line turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawLiteral {
    /// A literal to keep (already module-folded)
    Kept(Literal),
    /// `SYMBOL_MODULE=n`, which carries no gating information
    ModuleAbsent,
    /// No `=` separator, bad symbol or empty value
    Malformed,
}

/// Classify one raw literal line
pub fn classify_literal(raw: &str) -> RawLiteral {
    let literal: Literal = match raw.trim().parse() {
        Ok(lit) => lit,
        Err(_) => return RawLiteral::Malformed,
    };

    if literal.symbol.ends_with(MODULE_SUFFIX) && literal.value == ConfigValue::No {
        return RawLiteral::ModuleAbsent;
    }

    if literal.value == ConfigValue::Module {
        return RawLiteral::Kept(Literal::new(literal.symbol, ConfigValue::Yes));
    }

    RawLiteral::Kept(literal)
}

/// Result of normalizing the literal lines of one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Deduplicated literals
    pub conditions: ConditionSet,
    /// Dropped `SYMBOL_MODULE=n` lines
    pub module_absent: usize,
    /// Lines that were not literals at all
    pub malformed: Vec<String>,
}

/// Non-blank oracle output lines that are not comments
pub fn meaningful_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(COMMENT_MARKER))
        .collect()
}

/// Normalize raw literal lines into a condition set
pub fn normalize_literals<'a, I>(raw: I) -> Normalized
where
    I: IntoIterator<Item = &'a str>,
{
    let mut normalized = Normalized::default();

    for line in raw {
        match classify_literal(line) {
            RawLiteral::Kept(lit) => {
                normalized.conditions.insert(lit);
            }
            RawLiteral::ModuleAbsent => normalized.module_absent += 1,
            RawLiteral::Malformed => normalized.malformed.push(line.trim().to_string()),
        }
    }

    normalized
}

/// Rewrites paths under the tree root to the canonical repo-relative prefix
#[derive(Debug, Clone)]
pub struct PathCanonicalizer {
    root: PathBuf,
    root_str: String,
    prefix: String,
}

impl PathCanonicalizer {
    /// `prefix` is the repo-relative location of `root`, e.g. `arch/riscv`.
    /// When `None`, the last two components of `root` are used.
    pub fn new(root: &Path, prefix: Option<&str>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_else(|| Self::default_prefix(root));
        let root_str = root.to_string_lossy().trim_end_matches('/').to_string();

        Self {
            root: root.to_path_buf(),
            root_str,
            prefix,
        }
    }

    /// Last two normal components of `root`, joined with `/`
    pub fn default_prefix(root: &Path) -> String {
        let parts: Vec<String> = root
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let start = parts.len().saturating_sub(2);
        parts[start..].join("/")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rewrite an absolute path under the root to `prefix/relative`.
    /// Paths outside the root are returned unchanged.
    pub fn canonicalize(&self, path: &str) -> String {
        if path == self.root_str {
            return self.prefix.clone();
        }
        match path
            .strip_prefix(self.root_str.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(rest) if !self.root_str.is_empty() => self.join_prefix(rest),
            _ => path.to_string(),
        }
    }

    /// Canonicalize a path printed by a tool running in the tree root.
    ///
    /// Absolute paths are handled as in [`Self::canonicalize`]. A relative
    /// path that lacks the prefix but names a file under the root is taken
    /// as root-relative and gets the prefix.
    pub fn canonicalize_tree_path(&self, path: &str) -> String {
        let canonical = self.canonicalize(path);
        if Path::new(&canonical).is_absolute() || self.has_prefix(&canonical) {
            return canonical;
        }
        let relative = canonical.trim_start_matches("./");
        if self.root.join(relative).is_file() {
            self.join_prefix(relative)
        } else {
            canonical
        }
    }

    fn has_prefix(&self, path: &str) -> bool {
        self.prefix.is_empty()
            || path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Parse `path:line` and canonicalize the path part
    pub fn canonical_key(&self, raw: &str) -> Result<LineKey> {
        let key: LineKey = raw.parse()?;
        Ok(LineKey::new(self.canonicalize(&key.file), key.line))
    }

    /// Canonical key for a path given relative to the root
    pub fn relative_key(&self, relative: &str, line: u32) -> LineKey {
        LineKey::new(self.join_prefix(relative.trim_start_matches('/')), line)
    }

    /// Filesystem location of a canonical (or absolute) path
    pub fn resolve(&self, canonical: &str) -> PathBuf {
        let as_path = Path::new(canonical);
        if as_path.is_absolute() {
            return as_path.to_path_buf();
        }
        if self.prefix.is_empty() {
            return self.root.join(canonical);
        }
        match canonical
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(rest) => self.root.join(rest),
            None => self.root.join(canonical),
        }
    }

    fn join_prefix(&self, rest: &str) -> String {
        if self.prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.prefix, rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_rewrite_and_drop() {
        assert_eq!(
            classify_literal("CONFIG_X=m"),
            RawLiteral::Kept(Literal::new("CONFIG_X", "y"))
        );
        assert_eq!(classify_literal("CONFIG_X_MODULE=n"), RawLiteral::ModuleAbsent);
        // Only the negative module marker is dropped
        assert_eq!(
            classify_literal("CONFIG_X_MODULE=y"),
            RawLiteral::Kept(Literal::new("CONFIG_X_MODULE", "y"))
        );
        assert_eq!(classify_literal("CONFIG_X"), RawLiteral::Malformed);
    }

    #[test]
    fn test_normalize_dedups_after_folding() {
        let normalized = normalize_literals(["CONFIG_A=y", "CONFIG_A=m", "CONFIG_B_MODULE=n", "junk"]);
        assert_eq!(normalized.conditions.len(), 1);
        assert!(normalized.conditions.contains(&Literal::new("CONFIG_A", "y")));
        assert_eq!(normalized.module_absent, 1);
        assert_eq!(normalized.malformed, vec!["junk".to_string()]);
    }

    #[test]
    fn test_meaningful_lines_skip_comments() {
        let out = "# blockconf for foo.c:10\n\nCONFIG_A=y\n  # trailing\nCONFIG_B=n\n";
        assert_eq!(meaningful_lines(out), vec!["CONFIG_A=y", "CONFIG_B=n"]);
    }

    #[test]
    fn test_canonical_key_rewrites_root() {
        let canon = PathCanonicalizer::new(Path::new("/abs/root/arch/riscv"), Some("arch/riscv"));
        let key = canon.canonical_key("/abs/root/arch/riscv/foo.c:5").unwrap();
        assert_eq!(key.to_string(), "arch/riscv/foo.c:5");
    }

    #[test]
    fn test_default_prefix_is_last_two_components() {
        assert_eq!(
            PathCanonicalizer::default_prefix(Path::new("/home/rv/linux/arch/riscv/")),
            "arch/riscv"
        );
        assert_eq!(PathCanonicalizer::default_prefix(Path::new("/riscv")), "riscv");
        let canon = PathCanonicalizer::new(Path::new("/src/linux/arch/riscv/"), None);
        assert_eq!(canon.canonicalize("/src/linux/arch/riscv/mm/init.c"), "arch/riscv/mm/init.c");
    }

    #[test]
    fn test_paths_outside_root_untouched() {
        let canon = PathCanonicalizer::new(Path::new("/abs/root"), Some("arch/riscv"));
        assert_eq!(canon.canonicalize("/abs/rootless/x.c"), "/abs/rootless/x.c");
        assert_eq!(canon.canonicalize("arch/riscv/x.c"), "arch/riscv/x.c");
    }

    #[test]
    fn test_empty_prefix() {
        let canon = PathCanonicalizer::new(Path::new("/abs/root"), Some(""));
        assert_eq!(canon.canonicalize("/abs/root/kernel/a.c"), "kernel/a.c");
        assert_eq!(canon.resolve("kernel/a.c"), PathBuf::from("/abs/root/kernel/a.c"));
    }

    #[test]
    fn test_resolve_strips_prefix() {
        let canon = PathCanonicalizer::new(Path::new("/abs/root"), Some("arch/riscv"));
        assert_eq!(
            canon.resolve("arch/riscv/kernel/head.S"),
            PathBuf::from("/abs/root/kernel/head.S")
        );
        assert_eq!(canon.resolve("kernel/head.S"), PathBuf::from("/abs/root/kernel/head.S"));
        assert_eq!(
            canon.relative_key("kernel/head.S", 3).to_string(),
            "arch/riscv/kernel/head.S:3"
        );
    }

    #[test]
    fn test_tree_path_relative_to_root_gets_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("kernel")).unwrap();
        std::fs::write(dir.path().join("kernel/setup.c"), "x\n").unwrap();
        let canon = PathCanonicalizer::new(dir.path(), Some("arch/riscv"));

        assert_eq!(canon.canonicalize_tree_path("kernel/setup.c"), "arch/riscv/kernel/setup.c");
        assert_eq!(canon.canonicalize_tree_path("./kernel/setup.c"), "arch/riscv/kernel/setup.c");
        assert_eq!(
            canon.canonicalize_tree_path("arch/riscv/kernel/setup.c"),
            "arch/riscv/kernel/setup.c"
        );
        let absolute = dir.path().join("kernel/setup.c");
        assert_eq!(
            canon.canonicalize_tree_path(&absolute.to_string_lossy()),
            "arch/riscv/kernel/setup.c"
        );
        // Not under the root: left alone
        assert_eq!(canon.canonicalize_tree_path("drivers/tty/serial.c"), "drivers/tty/serial.c");
    }
}
