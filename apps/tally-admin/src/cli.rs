//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_engine::EngineConfig;

#[derive(Debug, Parser)]
#[command(name = "tally-admin")]
#[command(about = "Reconcile partial payments, reverse sales and inspect catalog summaries")]
pub struct Cli {
    /// Config file (defaults to tally.toml in the platform config directory).
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tenant to operate on, overriding the configuration.
    #[arg(long, global = true)]
    pub tenant: Option<i64>,

    /// Branch to operate on, overriding the configuration.
    #[arg(long, global = true)]
    pub branch: Option<i64>,

    /// Print results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mark a partially paid sale as paid in full.
    Resolve { sale_id: i64 },

    /// Delete a sale and restock everything it sold. Safe to re-run.
    Delete { sale_id: i64 },

    /// Show how far the reversal of a sale has progressed.
    Audit { sale_id: i64 },

    /// Stock-level counts for the catalog.
    Summary {
        /// Bypass the cache.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },

    /// Products whose name starts with PREFIX.
    Search {
        prefix: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Query the store directly (name and SKU) instead of the cached index.
        #[arg(long, default_value_t = false)]
        live: bool,
    },

    /// Distinct product categories.
    Categories,
}

impl Cli {
    /// Applies `--tenant` / `--branch` on top of the loaded configuration.
    pub fn apply_scope(&self, config: &mut EngineConfig) {
        if let Some(tenant) = self.tenant {
            config.scope.tenant_id = tenant;
        }
        if let Some(branch) = self.branch {
            config.scope.branch_id = Some(branch);
        }
    }
}
