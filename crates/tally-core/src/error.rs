//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tally-engine errors                                                   │
//! │  └── EngineError      - NotFound / InvalidState / Store                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → admin tool          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
///
/// The engine surfaces these as `InvalidState`: the request was well-formed
/// but the records it touches do not allow it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Resolution was requested for a sale that is already fully paid.
    ///
    /// ## When This Occurs
    /// - The sale was resolved before (the guard against double resolution)
    /// - The sale was never partial
    #[error("Sale {sale_id} is not a partial payment")]
    NotPartialPayment { sale_id: i64 },

    /// A line item carries a negative quantity; restocking it would remove stock.
    #[error("Sale item {sale_item_id} has negative quantity {quantity}")]
    NegativeQuantity { sale_item_id: i64, quantity: i64 },

    /// Paid-today plus remaining does not fit in the money range.
    #[error("Sale {sale_id} has a partial payment whose total overflows")]
    AmountOverflow { sale_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
