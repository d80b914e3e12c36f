//! Schema Compatibility CLI
//!
//! Compares two canonical schema files and reports breaking changes.
//!
//! Exit codes: 0 compatible, 1 breaking, 2 incompatible, 3 analysis failure.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use schema_compat::{
    emit_decision, AnalysisCategory, AnalysisOptions, AnalysisResponse, Analyzer, Severity,
    Strictness, TracingEventSink,
};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 3;

#[derive(Parser)]
#[command(name = "schema-compat")]
#[command(about = "Check compatibility between two schema versions")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a source schema against a target schema
    Validate {
        /// Source (current) schema, JSON
        source: PathBuf,
        /// Target (proposed) schema, JSON
        target: PathBuf,
        /// strict, standard or lenient
        #[arg(short, long)]
        strictness: Option<Strictness>,
        /// Comma separated: types,endpoints,authentication,errors
        #[arg(long, value_delimiter = ',')]
        categories: Vec<AnalysisCategory>,
        /// Path prefix to ignore (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        /// Include source/target values on each change
        #[arg(long)]
        detailed: bool,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let analyzer = Analyzer::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Validate {
            source,
            target,
            strictness,
            categories,
            ignore,
            detailed,
            json,
        } => {
            let mut options = AnalysisOptions::from_config(analyzer.config());
            if let Some(strictness) = strictness {
                options.strictness = strictness;
            }
            if !categories.is_empty() {
                options.analyze_categories = categories;
            }
            options.ignore_paths.extend(ignore);
            options.include_detailed_diff |= detailed;

            let response =
                analyzer.analyze_documents(&read_text(&source)?, &read_text(&target)?, options);
            emit_decision(&TracingEventSink, &response);

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_report(&response);
            }

            Ok(match response.verdict {
                Some(verdict) if response.success => verdict.exit_code(),
                _ => EXIT_FAILURE,
            })
        }

        Commands::Config => {
            print!("{}", analyzer.config().to_toml()?);
            Ok(0)
        }
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))
}

fn print_report(response: &AnalysisResponse) {
    if !response.success {
        println!("❌ Analysis failed");
        for error in &response.errors {
            println!("   {} - {}", error.code, error.message);
        }
        return;
    }

    if let (Some(source), Some(target)) = (&response.source_version, &response.target_version) {
        println!("🔍 Checking compatibility: {} -> {}", source, target);
        println!();
    }

    for change in &response.changes {
        let marker = match change.severity {
            Severity::Breaking => "❌",
            Severity::NonBreaking => "✅",
            Severity::Patch => "🩹",
            Severity::Informational => "ℹ️ ",
        };
        println!("{} [{}] {} at {}", marker, change.severity, change.description, change.path);
        if let Some(guidance) = &change.upgrade_guidance {
            if change.severity == Severity::Breaking {
                println!("   └─ {}", guidance);
            }
        }
    }

    for warning in &response.warnings {
        println!("⚠️  {} - {}", warning.code, warning.message);
    }

    println!();
    if let Some(summary) = &response.summary {
        println!(
            "{} changes: {} breaking, {} non-breaking, {} patch, {} informational",
            summary.total_changes,
            summary.breaking_changes,
            summary.non_breaking_changes,
            summary.patch_changes,
            summary.informational_changes
        );
    }
    if let Some(verdict) = response.verdict {
        println!("Verdict: {}", verdict);
    }
    if let Some(rec) = &response.version_recommendation {
        println!("Recommended version: {} ({}) - {}", rec.recommended_version, rec.bump_type, rec.rationale);
    }
}
