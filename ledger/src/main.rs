//! Read-only inspector for a decision ledger storage root.
//!
//! Lists recorded runs (newest first) and prints a run's full record, so an
//! operator can replay what an agent decided and how each decision executed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use ledger::LedgerError;
use ledger::exit_codes;
use ledger::io::config::load_config;
use ledger::query::{RunSummary, list_summaries, show_run};

#[derive(Parser)]
#[command(
    name = "ledger",
    version,
    about = "Inspect runs recorded by the decision ledger"
)]
struct Cli {
    /// Path to the ledger TOML config.
    #[arg(long, default_value = "ledger.toml", global = true)]
    config: PathBuf,

    /// Storage root; overrides `storage_root` from the config.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log more to stderr (repeat for more detail); `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List runs, newest first.
    List {
        /// Emit summaries as a JSON array.
        #[arg(long)]
        json: bool,
    },
    /// Print one run's full record as JSON.
    Show {
        /// Identifier returned by `start_run`.
        run_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    ledger::logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = load_config(&cli.config)?;
    if let Some(root) = cli.root {
        cfg.storage_root = root;
    }
    let store = cfg.file_store();
    match cli.command {
        Command::List { json } => cmd_list(&store, json),
        Command::Show { run_id } => cmd_show(&store, &run_id),
    }
}

fn cmd_list(store: &ledger::io::store::FileStore, json: bool) -> Result<()> {
    let summaries = list_summaries(store)?;
    if json {
        let payload = serde_json::to_string_pretty(&summaries).context("serialize summaries")?;
        println!("{payload}");
        return Ok(());
    }
    for summary in &summaries {
        println!("{}", render_summary(summary));
    }
    Ok(())
}

fn cmd_show(store: &ledger::io::store::FileStore, run_id: &str) -> Result<()> {
    let run = show_run(store, run_id)?;
    let payload = serde_json::to_string_pretty(&run).context("serialize run")?;
    println!("{payload}");
    Ok(())
}

/// One tab-separated line per run.
fn render_summary(summary: &RunSummary) -> String {
    format!(
        "{}\t{}\t{}\t{} decisions ({} failed)\t{}",
        summary.run_id,
        summary.status.as_str(),
        summary.started_at.to_rfc3339(),
        summary.metrics.total_decisions,
        summary.metrics.failed_decisions,
        summary.goal_description
    )
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LedgerError>() {
        Some(LedgerError::RunNotFound { .. }) => exit_codes::NOT_FOUND,
        _ => exit_codes::INVALID,
    }
}
