//! # tally-admin
//!
//! Command-line front door for the Tally ledger.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Parse arguments
//! 3. Load `EngineConfig` (file, `TALLY_*` env, `--tenant` / `--branch`)
//! 4. Open the ledger & run migrations
//! 5. Run one command, print the result
//!
//! ```text
//! tally-admin resolve 42            partial ──► paid in full
//! tally-admin delete 42             restock every item, remove the sale
//! tally-admin audit 42              Clean / Pending / PartiallyReversed / Orphaned
//! tally-admin summary --refresh     in stock / low / out of stock
//! tally-admin search co --limit 5   cached name-prefix suggestions
//! tally-admin categories
//! ```
//!
//! Exits non-zero when the command fails.

mod cli;
mod render;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tally_engine::{Engine, EngineConfig};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
/// Override the filter with `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        EngineConfig::load(cli.config.clone()).context("failed to load configuration")?;
    cli.apply_scope(&mut config);
    config.validate()?;

    let engine = Engine::open(config)
        .await
        .context("failed to open the ledger")?;
    info!(scope = %engine.scope(), command = ?cli.command, "Running command");

    match &cli.command {
        Command::Resolve { sale_id } => {
            let report = engine.resolve_partial_payment(*sale_id).await?;
            emit(cli.json, &report, render::resolution)?;
        }
        Command::Delete { sale_id } => {
            let report = engine.delete_transaction(*sale_id).await?;
            emit(cli.json, &report, render::reversal)?;
        }
        Command::Audit { sale_id } => {
            let status = engine.inspect_reversal(*sale_id).await?;
            emit(cli.json, &status, |s| render::status(*sale_id, s))?;
        }
        Command::Summary { refresh } => {
            let summary = engine.stock_summary(*refresh).await?;
            emit(cli.json, &summary, render::summary)?;
        }
        Command::Search {
            prefix,
            limit,
            live,
        } => {
            if *live {
                let products = engine.search(prefix, *limit).await?;
                emit(cli.json, &products, |p| render::products(p))?;
            } else {
                let entries = engine.suggestions(prefix, *limit).await?;
                emit(cli.json, &entries, |e| render::entries(e))?;
            }
        }
        Command::Categories => {
            let categories = engine.categories().await?;
            emit(cli.json, &categories, |c| c.join("\n"))?;
        }
    }

    Ok(())
}

fn emit<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    human: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = human(value);
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}
