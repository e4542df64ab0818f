//! # Ledger Store Errors
//!
//! ```text
//! sqlx::Error ──► DbError ──► EngineError::Store / EngineError::NotFound
//! ```
//!
//! SQLite reports constraint failures as text, so `From<sqlx::Error>` sorts
//! them by message prefix. The categories the ledger relies on:
//!
//! | Variant               | Raised by                                         |
//! |-----------------------|---------------------------------------------------|
//! | `UniqueViolation`     | a movement reusing an idempotency key             |
//! | `ForeignKeyViolation` | deleting a sale that still has items              |
//! | `CheckViolation`      | a stock write that would go below zero            |
//! | `Busy`                | the write lock outlived `DbConfig::busy_timeout`  |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A scoped lookup, update or delete matched no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate value for {field}")]
    UniqueViolation { field: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    #[error("Database is locked: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// Lock and pool contention, which clears up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => classify(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Sorts a SQLite error message into a variant.
fn classify(msg: &str) -> DbError {
    if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
        DbError::UniqueViolation {
            field: field.to_string(),
        }
    } else if msg.starts_with("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: msg.to_string(),
        }
    } else if msg.starts_with("CHECK constraint failed") {
        DbError::CheckViolation {
            message: msg.to_string(),
        }
    } else if msg.starts_with("database is locked") || msg.starts_with("database table is locked") {
        DbError::Busy(msg.to_string())
    } else {
        DbError::QueryFailed(msg.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Sale", 42);
        assert_eq!(err.to_string(), "Sale not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_sqlx_mapping() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());

        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_sqlite_messages() {
        assert!(matches!(
            classify("UNIQUE constraint failed: inventory_movements.idempotency_key"),
            DbError::UniqueViolation { ref field } if field == "inventory_movements.idempotency_key"
        ));
        assert!(matches!(
            classify("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            classify("CHECK constraint failed: stock_quantity >= 0"),
            DbError::CheckViolation { .. }
        ));

        let busy = classify("database is locked");
        assert!(matches!(busy, DbError::Busy(_)));
        assert!(busy.is_transient());

        assert!(matches!(classify("no such table: foo"), DbError::QueryFailed(_)));
    }
}
