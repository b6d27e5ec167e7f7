//! End-to-end analysis on a small kernel-like tree
//!
//! Oracle answers are fed in as raw output text, then merged with a build-rule
//! dump, evaluated against a `.config` and aggregated.

use cfgcover_analysis::{aggregate, merge_build_rules, Evaluator};
use cfgcover_core::{ConditionMap, EvalMode, LineKey};
use cfgcover_parser::normalize::meaningful_lines;
use cfgcover_parser::{normalize_literals, parse_build_rules, ConfigStore, PathCanonicalizer};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DOT_CONFIG: &str = "\
CONFIG_MMU=y
CONFIG_SMP=y
CONFIG_KVM=m
# CONFIG_XIP_KERNEL is not set
CONFIG_NR_CPUS=64
";

const BUILD_RULES: &str = "\
# generated by kbuildparser
arch/riscv/kernel/setup.c <- CONFIG_MMU
arch/riscv/kernel/smp.c <- CONFIG_SMP && !CONFIG_XIP_KERNEL
arch/riscv/kvm/main.c <- CONFIG_KVM
arch/riscv/kernel/probes/kprobes.c <- CONFIG_KPROBES && CONFIG_MMU
";

fn write(root: &Path, rel: &str, lines: usize) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "x\n".repeat(lines)).unwrap();
}

fn kernel_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "kernel/setup.c", 4);
    write(dir.path(), "kernel/smp.c", 2);
    write(dir.path(), "kvm/main.c", 3);
    write(dir.path(), "kernel/probes/kprobes.c", 2);
    dir
}

/// Oracle answers as `(absolute file:line, raw stdout)`
fn oracle_map(root: &Path, canon: &PathCanonicalizer) -> ConditionMap {
    let answers = [
        ("kernel/setup.c:1", "# B0\n"),
        ("kernel/setup.c:2", "# B1\nCONFIG_SMP=y\nCONFIG_NR_CPUS=\"8\"\n"),
        ("kernel/setup.c:3", "CONFIG_XIP_KERNEL=y\nCONFIG_XIP_KERNEL_MODULE=n\n"),
        ("kvm/main.c:2", "CONFIG_KVM=m\nCONFIG_KVM_MODULE=n\nnot-a-literal\n"),
    ];

    let mut map = ConditionMap::new();
    for (unit, stdout) in answers {
        let raw_key = format!("{}/{}", root.display(), unit);
        let key = canon.canonical_key(&raw_key).unwrap();
        let normalized = normalize_literals(meaningful_lines(stdout));
        if !normalized.conditions.is_empty() {
            map.insert(key, normalized.conditions);
        }
    }
    map
}

#[test]
fn test_merge_evaluate_aggregate() {
    let tree = kernel_tree();
    let canon = PathCanonicalizer::new(tree.path(), Some("arch/riscv"));
    let mut map = oracle_map(tree.path(), &canon);
    assert_eq!(map.len(), 3);

    let rules = parse_build_rules(BUILD_RULES);
    merge_build_rules(&mut map, &rules, &canon);

    // Answered files keep only their answered lines; the others are synthesized
    assert_eq!(map.len(), 2 + 2 + 1 + 2);
    assert_eq!(
        map.get(&LineKey::new("arch/riscv/kernel/setup.c", 2)).unwrap().joined(),
        "CONFIG_MMU=y;CONFIG_NR_CPUS=\"8\";CONFIG_SMP=y"
    );
    assert_eq!(
        map.get(&LineKey::new("arch/riscv/kvm/main.c", 2)).unwrap().joined(),
        "CONFIG_KVM=y"
    );

    let sizes: Vec<usize> = map.iter().map(|(_, set)| set.len()).collect();
    merge_build_rules(&mut map, &rules, &canon);
    let again: Vec<usize> = map.iter().map(|(_, set)| set.len()).collect();
    assert_eq!(sizes, again);

    let store = ConfigStore::parse(DOT_CONFIG);
    let strict = Evaluator::new(&store, EvalMode::Strict).evaluate_map(&map);
    assert_eq!(strict.compiled_count() + strict.skipped_count(), map.len());

    let skipped: Vec<String> = strict
        .skipped()
        .map(|r| format!("{} {}", r.key, r.unmet_joined()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            "arch/riscv/kernel/probes/kprobes.c:1 CONFIG_KPROBES=n (need y)",
            "arch/riscv/kernel/probes/kprobes.c:2 CONFIG_KPROBES=n (need y)",
            "arch/riscv/kernel/setup.c:2 CONFIG_NR_CPUS=64 (need \"8\")",
            "arch/riscv/kernel/setup.c:3 CONFIG_XIP_KERNEL=n (need y)",
            "arch/riscv/kvm/main.c:2 CONFIG_KVM=m (need y)",
        ]
    );

    let stats = aggregate(&strict.results);
    assert_eq!(stats.total_lines(), map.len());
    let unmet_listed: usize = strict.results.iter().map(|r| r.classification.unmet().len()).sum();
    assert_eq!(stats.unmet_total(), unmet_listed);
    assert_eq!(stats.unparseable(), 0);
    assert_eq!(stats.blocked_by_actual[0].config, "CONFIG_KPROBES");
    assert_eq!(stats.blocked_by_actual[0].actual, "n");
    assert_eq!(stats.blocked_by_actual[0].skipped_count, 2);
    assert_eq!(stats.compiled_lines, 2);

    let lenient = Evaluator::new(&store, EvalMode::Lenient).evaluate_map(&map);
    assert_eq!(lenient.skipped_count(), 4);
    assert_eq!(lenient.compiled_count(), strict.compiled_count() + 1);
}
