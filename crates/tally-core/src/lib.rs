//! # tally-core: Pure Domain Logic for the Tally Ledger
//!
//! This crate holds the domain model of the reconciliation engine as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/tally-admin                             │   │
//! │  │    resolve ──► delete ──► audit ──► summary ──► search         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-engine                                 │   │
//! │  │    Resolution, Reversal, SummaryCache, Catalog                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  partial  │  │   stock   │  │   │
//! │  │   │   Sale    │  │   Money   │  │  decode   │  │ StockLevel│  │   │
//! │  │   │  Product  │  │  decimal  │  │  encode   │  │  Summary  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Sale, SaleItem, Product, InventoryMovement, Scope)
//! - [`money`] - Money type with integer arithmetic and decimal text parsing
//! - [`partial`] - Partial-payment annotation codec and `PaymentState`
//! - [`stock`] - Stock-level classification and summary counts
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::partial::{decode, compute_full_total};
//! use tally_core::Money;
//!
//! let notes = "PARTIAL PAYMENT\nAmount Paid Today: €30.00\nRemaining Balance: €20.00";
//! let state = decode(notes);
//!
//! let full = compute_full_total(&state, Money::from_cents(3000));
//! assert_eq!(full, Some(Money::from_cents(5000)));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod partial;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use partial::{PartialPayment, PartialState, PaymentState};
pub use stock::{StockLevel, StockSnapshot, StockSummary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reorder level given to products created without one.
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Lifetime of a derived-summary cache slot, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Upper bound for search suggestion lists.
pub const MAX_SUGGESTIONS: usize = 50;
