//! CLI entry point for the waymark migration orchestrator.
//! Wires a concrete `IndexBackend`/`LockProvider` pair, loads CLI
//! configuration, and exposes `status`/`run` subcommands with colored
//! table output.

mod config;
mod output;

use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use waymark_core::backend::MemoryIndexBackend;
use waymark_core::lock::LocalLockProvider;
use waymark_core::{Manager, MigrationResult, Result, WaymarkError};

use config::WaymarkCliConfig;

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "waymark",
    about = "Schema migration orchestrator for document-oriented search-index backends",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file path (defaults to ./waymark.toml if present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// All available waymark subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show which migrations are pending and the current version
    Status,

    /// Apply all pending migrations
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error kinds to differentiated exit codes.
fn exit_code(error: &WaymarkError) -> i32 {
    match error {
        WaymarkError::Configuration(_) => 2,
        WaymarkError::Storage(_) => 4,
        WaymarkError::Lock { .. } => 6,
        WaymarkError::Migration { .. } => 5,
    }
}

/// Build configuration, wire the reference collaborators, and dispatch
/// the chosen subcommand.
///
/// The bundled in-memory `IndexBackend`/`LockProvider` pair is the only
/// implementation this workspace carries; an application embedding
/// `waymark-core` against a real search-index cluster would supply its own
/// backend and lock provider here instead, and register its own migrations
/// before calling either subcommand.
async fn run(cli: Cli) -> Result<()> {
    let config = WaymarkCliConfig::load(cli.config.as_deref())?;
    let json_output = cli.json;
    let quiet = cli.quiet;

    let manager = Manager::new(MemoryIndexBackend::new(), LocalLockProvider::new())
        .with_index_name(config.index_name.clone())
        .with_run_lock_timeouts(config.lock.to_timeouts());

    match cli.command {
        Commands::Status => {
            let status = manager.get_migration_status().await?;
            if json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "currentVersion": status.current_version,
                        "needsMigration": status.needs_migration,
                        "pendingCount": status.pending_migrations.len(),
                    })
                );
            } else if !quiet {
                output::print_status_table(&status);
            }
        }
        Commands::Run => {
            let result = manager.run_migrations_async().await?;
            if json_output {
                println!("{}", serde_json::json!({"result": result}));
            } else if !quiet {
                output::print_run_result(result);
            }
            // `MigrationResult::Failed` collapses lock-contention and migration
            // failures into one outcome (§4.7); `run_migrations_async` has
            // already logged which one occurred, so the exit code here is
            // deliberately generic rather than guessing a `WaymarkError` kind.
            if result == MigrationResult::Failed {
                process::exit(1);
            }
        }
    }

    Ok(())
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &WaymarkError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        WaymarkError::Configuration(_) => {
            eprintln!(
                "{}",
                "Hint: check your waymark.toml or the flags passed on the command line.".dimmed()
            );
        }
        WaymarkError::Storage(_) => {
            eprintln!(
                "{}",
                "Hint: verify the index backend is reachable and healthy.".dimmed()
            );
        }
        WaymarkError::Lock { .. } => {
            eprintln!(
                "{}",
                "Hint: another process may be running migrations. Wait and retry.".dimmed()
            );
        }
        WaymarkError::Migration { .. } => {
            eprintln!(
                "{}",
                "Hint: run with --verbose to see which migration failed and why.".dimmed()
            );
        }
    }
}
