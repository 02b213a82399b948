//! terrasem CLI - support-type checks for spatial operations

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use terrasem_algorithms::MeaningfulnessEngine;
use terrasem_core::rules::{Effect, TABLE};
use terrasem_core::{EngineConfig, Error};

use scenario::{Outcome, Scenario};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terrasem")]
#[command(author, version, about = "Support-type checks for spatial operations", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the meaningfulness rule table
    Rules,
    /// Run a JSON scenario through the engine
    Check {
        /// Scenario file
        scenario: PathBuf,
        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn print_rules() {
    println!("{:<4} {:<7} {:<28} summary", "rule", "effect", "code");
    for rule in &TABLE {
        let effect = match rule.effect {
            Effect::Warn => "warn",
            Effect::Refuse => "refuse",
        };
        println!("{:<4} {:<7} {:<28} {}", rule.id, effect, rule.code, rule.summary);
    }
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!("{} ({} values)", outcome.kind, outcome.values.len());
    for (i, v) in outcome.values.iter().enumerate() {
        let variance = outcome.variances.as_ref().and_then(|vs| vs.get(i));
        match (v, variance) {
            (Some(v), Some(var)) => println!("  [{i}] {v} (variance {var})"),
            (Some(v), None) => println!("  [{i}] {v}"),
            (None, _) => println!("  [{i}] no value"),
        }
    }
    for d in outcome.diagnostics.iter() {
        println!("{d}");
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Rules => {
            print_rules();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            scenario,
            config,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            let engine = MeaningfulnessEngine::new(config)?;
            let scenario = Scenario::from_file(&scenario)?;

            match scenario.run(engine) {
                Ok(outcome) => {
                    print_outcome(&outcome, json)?;
                    info!(
                        diagnostics = outcome.diagnostics.len(),
                        "{}",
                        if outcome.diagnostics.is_empty() {
                            "proceed"
                        } else {
                            "proceed with warning"
                        }
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => match err.downcast_ref::<Error>() {
                    Some(Error::Refused(d)) | Some(Error::Escalated(d)) => {
                        eprintln!("{d}");
                        Ok(ExitCode::from(2))
                    }
                    _ => Err(err),
                },
            }
        }
    }
}
