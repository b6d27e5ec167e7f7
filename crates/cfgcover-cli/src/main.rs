//! cfgcover CLI
//!
//! Per-line kernel configuration coverage: which lines of a tree a `.config`
//! compiles, and which symbols keep the rest out.

mod pipeline;

use anyhow::{Context, Result};
use cfgcover_analysis::{Evaluation, Statistics};
use cfgcover_core::config::Config;
use cfgcover_core::{Diagnostic, EvalMode};
use cfgcover_parser::ScanSummary;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cfgcover")]
#[command(author, version, about = "Per-line kernel configuration coverage", long_about = None)]
struct Cli {
    /// YAML settings file
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count source lines under a tree
    Lines {
        /// Source tree root, e.g. linux/arch/riscv
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Ask the oracle about every line and merge build rules (stage A)
    Scan {
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Evaluate the stored condition map against a .config (stage B)
    Evaluate {
        #[command(flatten)]
        eval: EvalArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Roll the stored evaluation up into statistics tables (stage C)
    Stats {
        #[command(flatten)]
        output: OutputArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Scan, evaluate and roll up in one go
    Run {
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        #[command(flatten)]
        eval: EvalArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Repo-relative prefix of ROOT (default: its last two components)
    #[arg(long)]
    prefix: Option<String>,

    /// Concurrent oracle invocations
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-invocation oracle timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Skip the build-rule merge
    #[arg(long)]
    no_dumper: bool,

    /// Reuse answered units from the oracle checkpoint
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct EvalArgs {
    /// Configuration assignment file
    #[arg(long, value_name = "FILE")]
    dotconfig: PathBuf,

    /// Let a module satisfy a built-in requirement
    #[arg(long)]
    lenient: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Directory for stage tables
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.settings {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Lines { root, format } => cmd_lines(&config, &root, &format),
        Commands::Scan { root, scan, output } => {
            apply_scan_args(&mut config, &scan);
            apply_output_args(&mut config, &output);
            cmd_scan(&config, &root, scan.resume)
        }
        Commands::Evaluate { eval, output } => {
            apply_eval_args(&mut config, &eval);
            apply_output_args(&mut config, &output);
            cmd_evaluate(&config, &eval.dotconfig)
        }
        Commands::Stats { output, format } => {
            apply_output_args(&mut config, &output);
            cmd_stats(&config, &format)
        }
        Commands::Run {
            root,
            scan,
            eval,
            output,
        } => {
            apply_scan_args(&mut config, &scan);
            apply_eval_args(&mut config, &eval);
            apply_output_args(&mut config, &output);
            cmd_run(&config, &root, &eval.dotconfig, scan.resume)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_scan_args(config: &mut Config, args: &ScanArgs) {
    if let Some(prefix) = &args.prefix {
        config.scan.prefix = Some(prefix.clone());
    }
    if let Some(jobs) = args.jobs {
        config.oracle.workers = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.oracle.timeout_secs = timeout;
    }
    if args.no_dumper {
        config.dumper.enabled = false;
    }
}

fn apply_eval_args(config: &mut Config, args: &EvalArgs) {
    if args.lenient {
        config.evaluation.mode = EvalMode::Lenient;
    }
}

fn apply_output_args(config: &mut Config, args: &OutputArgs) {
    if let Some(dir) = &args.output {
        config.output.dir = dir.clone();
    }
}

fn cmd_lines(config: &Config, root: &Path, format: &str) -> Result<()> {
    let summary = pipeline::enumerate(config, root)?;

    if format == "json" {
        let result = serde_json::json!({
            "root": root.to_string_lossy(),
            "files": summary.files.len(),
            "lines": summary.total_lines(),
            "non_empty_lines": summary.non_empty_lines(),
            "unreadable": summary.unreadable.len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_lines(root, &summary);
    }
    Ok(())
}

fn cmd_scan(config: &Config, root: &Path, resume: bool) -> Result<()> {
    let tables = pipeline::output_tables(config.output.dir.clone())?;
    let report = pipeline::scan(config, root, &tables, resume)?;

    print_lines(root, &report.summary);
    println!("\n🔎 Oracle:");
    println!("   Reused from checkpoint: {}", report.reused);
    println!("   Answered: {}", report.oracle.answered);
    println!("   Empty: {}", report.oracle.empty);
    println!(
        "   Failed: {} ({} timed out)",
        report.oracle.failed, report.oracle.timed_out
    );
    println!("   Line records: {}", report.map.len());
    print_diagnostics(&report.diagnostics);
    Ok(())
}

fn cmd_evaluate(config: &Config, dotconfig: &Path) -> Result<()> {
    let tables = pipeline::output_tables(config.output.dir.clone())?;
    let map = tables
        .read_condition_map()
        .context("Failed to read condition map; run `cfgcover scan` first")?;
    let evaluation = pipeline::evaluate(config, &map, dotconfig, &tables)?;
    print_evaluation(config.evaluation.mode, &evaluation);
    Ok(())
}

fn cmd_stats(config: &Config, format: &str) -> Result<()> {
    let tables = pipeline::output_tables(config.output.dir.clone())?;
    let stats = pipeline::statistics_from_tables(&tables)?;

    if format == "json" {
        let result = serde_json::json!({
            "compiled_lines": stats.compiled_lines,
            "skipped_lines": stats.skipped_lines,
            "unmet_conditions": stats.unmet_total(),
            "unparseable": stats.unparseable(),
            "symbols": stats.symbols.len(),
            "top_blocked_by_actual": stats.blocked_by_actual.iter().take(10).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_statistics(&stats);
    }
    Ok(())
}

fn cmd_run(config: &Config, root: &Path, dotconfig: &Path, resume: bool) -> Result<()> {
    // A missing .config should fail before the oracle batch, not after it
    if !dotconfig.is_file() {
        return Err(cfgcover_core::Error::ConfigFileMissing(dotconfig.to_path_buf()).into());
    }

    let tables = pipeline::output_tables(config.output.dir.clone())?;
    let report = pipeline::scan(config, root, &tables, resume)?;
    let evaluation = pipeline::evaluate(config, &report.map, dotconfig, &tables)?;
    let stats = pipeline::statistics(&evaluation, &tables)?;

    print_lines(root, &report.summary);
    print_evaluation(config.evaluation.mode, &evaluation);
    print_statistics(&stats);
    print_diagnostics(&report.diagnostics);
    println!("\n   Tables written to: {}", tables.dir().display());
    Ok(())
}

fn print_lines(root: &Path, summary: &ScanSummary) {
    println!("📂 {}", root.display());
    println!("   Files: {}", summary.files.len());
    println!("   Lines: {}", summary.total_lines());
    println!("   Non-empty lines: {}", summary.non_empty_lines());
    if !summary.unreadable.is_empty() {
        println!("   Unreadable files: {}", summary.unreadable.len());
    }
}

fn print_evaluation(mode: EvalMode, evaluation: &Evaluation) {
    println!("\n📊 Evaluation ({:?}):", mode);
    println!("   Lines: {}", evaluation.len());
    println!("   Compiled: {}", evaluation.compiled_count());
    println!("   Skipped: {}", evaluation.skipped_count());
    println!("   Compiled ratio: {:.2}%", evaluation.compiled_ratio() * 100.0);
}

fn print_statistics(stats: &Statistics) {
    println!("\n📈 Statistics:");
    println!("   Unmet conditions: {}", stats.unmet_total());
    if stats.unparseable() > 0 {
        println!("   Unparseable: {}", stats.unparseable());
    }
    println!("   Symbols: {}", stats.symbols.len());
    if !stats.blocked_by_actual.is_empty() {
        println!("   Most blocking:");
        for row in stats.blocked_by_actual.iter().take(10) {
            println!("     {}={}  {} lines", row.config, row.actual, row.skipped_count);
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for diagnostic in diagnostics {
        *by_kind.entry(diagnostic.kind.to_string()).or_insert(0) += 1;
    }
    println!("\n⚠️  Diagnostics:");
    for (kind, count) in by_kind {
        println!("   {}: {}", kind, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "cfgcover",
            "run",
            "linux/arch/riscv",
            "--dotconfig",
            "linux/.config",
            "-j",
            "64",
            "--timeout",
            "5",
            "--prefix",
            "arch/riscv",
            "--no-dumper",
            "--lenient",
            "-o",
            "out",
        ])
        .unwrap();

        let Commands::Run {
            scan, eval, output, ..
        } = cli.command
        else {
            panic!("expected run");
        };

        let mut config = Config::default();
        apply_scan_args(&mut config, &scan);
        apply_eval_args(&mut config, &eval);
        apply_output_args(&mut config, &output);

        assert_eq!(config.oracle.workers, 64);
        assert_eq!(config.oracle.timeout_secs, 5);
        assert_eq!(config.scan.prefix.as_deref(), Some("arch/riscv"));
        assert!(!config.dumper.enabled);
        assert_eq!(config.evaluation.mode, EvalMode::Lenient);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert!(!scan.resume);
    }

    #[test]
    fn test_defaults_survive_without_flags() {
        let cli = Cli::try_parse_from(["cfgcover", "-v", "scan", "arch/riscv", "--resume"]).unwrap();
        assert!(cli.verbose);

        let Commands::Scan { scan, output, .. } = cli.command else {
            panic!("expected scan");
        };
        let mut config = Config::default();
        apply_scan_args(&mut config, &scan);
        apply_output_args(&mut config, &output);

        assert!(scan.resume);
        assert!(config.dumper.enabled);
        assert_eq!(config.scan.prefix, None);
        assert_eq!(config.oracle.timeout_secs, 60);
        assert_eq!(config.evaluation.mode, EvalMode::Strict);
    }

    #[test]
    fn test_evaluate_requires_dotconfig() {
        assert!(Cli::try_parse_from(["cfgcover", "evaluate"]).is_err());
    }
}
