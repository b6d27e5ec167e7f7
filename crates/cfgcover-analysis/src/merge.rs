//! Build-Condition Merger
//!
//! Unions file-level build rules into the per-line condition map. A file the
//! oracle already answered for only has its existing lines updated; a file
//! with no records gets one synthesized record per line first.

use cfgcover_core::{ConditionMap, Diagnostic, DiagnosticKind, LineKey};
use cfgcover_parser::scan::count_lines;
use cfgcover_parser::{BuildRule, PathCanonicalizer};
use tracing::{debug, info, warn};

/// What a merge did to the map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Rules applied
    pub rules: usize,
    /// Files whose existing records were updated
    pub files_updated: usize,
    /// Files that had no records and were expanded line by line
    pub files_synthesized: usize,
    /// Records created for synthesized files
    pub lines_synthesized: u64,
    /// Literals that were not already present
    pub literals_added: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Merge `rules` into `map`.
///
/// Merging the same rules again adds nothing: every update is a set union.
pub fn merge_build_rules(
    map: &mut ConditionMap,
    rules: &[BuildRule],
    canonicalizer: &PathCanonicalizer,
) -> MergeReport {
    let mut report = MergeReport::default();

    for rule in rules {
        let file = canonicalizer.canonicalize_tree_path(&rule.path);
        debug!("Build rule: {} <- {:?}", file, rule.literals);

        for token in &rule.rejected {
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::RejectedToken,
                Some(file.clone()),
                format!("ignored build condition token {token:?}"),
            ));
        }
        if rule.literals.is_empty() {
            continue;
        }
        report.rules += 1;

        if map.file(&file).is_some() {
            report.literals_added += map.union_into_file(&file, &rule.literals);
            report.files_updated += 1;
            continue;
        }

        let path = canonicalizer.resolve(&file);
        match count_lines(&path) {
            Ok((lines, _)) => {
                for line in 1..=lines {
                    let key = LineKey::new(file.as_str(), line);
                    report.literals_added += map.union_into(&key, &rule.literals);
                }
                report.files_synthesized += 1;
                report.lines_synthesized += u64::from(lines);
            }
            Err(e) => {
                warn!("Cannot read {:?} for build rule: {}", path, e);
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnreadableFile,
                    Some(file.clone()),
                    e.to_string(),
                ));
            }
        }
    }

    info!(
        "Merged {} build rules: {} files updated, {} files synthesized ({} lines), {} literals added",
        report.rules,
        report.files_updated,
        report.files_synthesized,
        report.lines_synthesized,
        report.literals_added
    );
    report
}
