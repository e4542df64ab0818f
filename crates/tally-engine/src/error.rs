//! # Engine Error Types
//!
//! Error types for reconciliation operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Lookup        │  │   State         │  │     Store               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  InvalidState   │  │  Store(DbError)         │ │
//! │  │  (missing or    │  │  (not partial,  │  │  (constraint, pool,     │ │
//! │  │   other tenant) │  │   lost update)  │  │   query failures)       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Input         │  │  Configuration  │                              │
//! │  │  Validation     │  │  Config         │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale that does not exist and a sale owned by another tenant produce the
//! same `NotFound`, so callers cannot tell whether the sale exists.

use tally_core::{CoreError, ValidationError};
use tally_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested record does not exist in the caller's scope.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Preconditions of the operation do not hold.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying store read or write failed.
    #[error("Store error: {0}")]
    Store(DbError),

    /// Input rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid or unreadable engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true if the caller may re-invoke the operation unchanged.
    ///
    /// Only store failures qualify. Reversal is idempotent, so retrying a
    /// failed delete never credits stock twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(_))
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

/// A store `NotFound` keeps its meaning; every other store failure is wrapped.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Store(other),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => EngineError::Validation(e),
            other => EngineError::InvalidState(other.to_string()),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}
