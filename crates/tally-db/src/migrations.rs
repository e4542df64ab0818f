//! # Schema Migrations
//!
//! The ledger schema is embedded at compile time from `migrations/sqlite/`
//! and applied by `Database::new` unless `DbConfig::run_migrations` is off.
//!
//! ```text
//! 001_initial_schema.sql        sales, sale_items, products
//! 002_inventory_movements.sql   append-only ledger + idempotency_key UNIQUE
//! ```
//!
//! Files are applied in sequence order and recorded in `_sqlx_migrations`.
//! Shipped files are never edited; schema changes get a new file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every pending migration, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying ledger migrations");
    MIGRATOR.run(pool).await?;

    let (total, applied) = migration_status(pool).await?;
    info!(total, applied, "Ledger schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
///
/// A database that was never migrated reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let embedded = MIGRATOR.migrations.len();

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok((embedded, usize::try_from(applied).unwrap_or(0)))
}
