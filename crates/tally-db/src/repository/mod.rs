//! # Repository Module
//!
//! Database repository implementations for the Tally ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  tally-engine (LedgerStore impl)                                       │
//! │       │                                                                 │
//! │       │  db.sales().get_scoped(&scope, 42)                             │
//! │       ▼                                                                 │
//! │  SaleRepository / ProductRepository / MovementRepository               │
//! │       │                                                                 │
//! │       │  SQL, always filtered by tenant_id (+ branch_id if set)        │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scope Filter
//! Scoped statements bind the tenant and the optional branch and use
//! `(?n IS NULL OR branch_id = ?n)`, so a tenant-wide scope sees all branches.
//!
//! ## Available Repositories
//!
//! - [`SaleRepository`](sale::SaleRepository) - Sales and line items
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD, index, stock levels
//! - [`MovementRepository`](movement::MovementRepository) - Inventory ledger and restocks

pub mod movement;
pub mod product;
pub mod sale;
