//! # Domain Types
//!
//! Core domain types used throughout the Tally ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │    SaleItem     │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (INTEGER)   │◄──│  sale_id (FK)   │──►│  id (UUID)      │       │
//! │  │  total_cents    │   │  quantity       │   │  stock_quantity │       │
//! │  │  notes (legacy) │   │  weight         │   │  reorder_level  │       │
//! │  │  partial_*      │   │  line_total     │   │  category       │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │                 │
//! │                        ┌──────────────────────────────▼──────────┐     │
//! │                        │   InventoryMovement (append-only)       │     │
//! │                        │   quantity_change, movement_type,       │     │
//! │                        │   reference_id, idempotency_key         │     │
//! │                        └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scoping
//! Every record belongs to a tenant and optionally a branch. [`Scope`] carries
//! that pair through every query so that no read or write can cross tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::partial::{PartialPayment, PaymentState};
use crate::stock::StockLevel;

// =============================================================================
// Scope
// =============================================================================

/// The (tenant, branch) selection every read and write is filtered by.
///
/// Branch filtering is additive: a scope without a branch sees every branch
/// of the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Scope {
    pub tenant_id: i64,
    pub branch_id: Option<i64>,
}

impl Scope {
    /// Tenant-wide scope.
    pub const fn tenant(tenant_id: i64) -> Self {
        Scope {
            tenant_id,
            branch_id: None,
        }
    }

    /// Scope narrowed to one branch.
    pub const fn branch(tenant_id: i64, branch_id: i64) -> Self {
        Scope {
            tenant_id,
            branch_id: Some(branch_id),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.branch_id {
            Some(branch) => write!(f, "tenant {} / branch {}", self.tenant_id, branch),
            None => write!(f, "tenant {}", self.tenant_id),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Mobile wallet transfer.
    MobileMoney,
}

impl PaymentMethod {
    /// Database/wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale transaction.
///
/// While a sale is partially paid, `total_cents` holds only the amount
/// collected so far. The full order value is reconstructed from
/// [`Sale::payment_state`].
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub tenant_id: i64,
    pub branch_id: Option<i64>,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<i64>,
    pub cashier_id: Option<i64>,
    pub discount_cents: i64,
    /// Free-text annotation. May carry a legacy partial-payment block.
    pub notes: Option<String>,
    pub partial_paid_cents: Option<i64>,
    pub partial_remaining_cents: Option<i64>,
    pub partial_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the stored total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Resolves the payment state of this sale.
    ///
    /// The structured `partial_*` columns win when either amount is set.
    /// Otherwise the legacy annotation is decoded; anything without partial
    /// markers is a full payment of the stored total.
    pub fn payment_state(&self) -> PaymentState {
        if self.partial_paid_cents.is_some() || self.partial_remaining_cents.is_some() {
            return PaymentState::Partial(PartialPayment {
                paid_today: Money::from_cents(self.partial_paid_cents.unwrap_or(0)),
                remaining: Money::from_cents(self.partial_remaining_cents.unwrap_or(0)),
                notes: self.partial_notes.clone().unwrap_or_default(),
            });
        }

        PaymentState::from_legacy(self.notes.as_deref(), self.total())
    }

    /// Conceptual full order value, even while the sale is still open.
    /// `None` when the partial amounts overflow.
    pub fn full_total(&self) -> Option<Money> {
        self.payment_state().full_total()
    }
}

/// Conditional rewrite of a partial sale to its resolved state.
///
/// The write only lands if the row still holds `expected_total_cents` and
/// `expected_notes`, so a concurrent change is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleResolution {
    pub expected_total_cents: i64,
    pub expected_notes: Option<String>,
    pub total_cents: i64,
    pub notes: String,
}

/// Input for recording a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<i64>,
    pub cashier_id: Option<i64>,
    pub discount_cents: i64,
    pub notes: Option<String>,
    /// Structured partial state. `None` records a full payment.
    pub partial: Option<PartialPayment>,
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: String,
    /// Units sold. Reversal restocks this many.
    pub quantity: i64,
    /// Weight for weighed goods. Informational only.
    pub weight: Option<f64>,
    pub unit_price_cents: i64,
    /// unit_price × quantity at time of sale.
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Input for adding a line item to a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    pub weight: Option<f64>,
    pub unit_price_cents: i64,
}

impl NewSaleItem {
    /// unit_price × quantity.
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// A line item joined with its product's current stock.
///
/// `current_stock` is `None` when the product row no longer exists.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemWithStock {
    pub sale_item_id: i64,
    pub sale_id: i64,
    pub product_id: String,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub current_stock: Option<i64>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub tenant_id: i64,
    pub branch_id: Option<i64>,
    pub name: String,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub price_cents: i64,
    /// Never negative; enforced by a CHECK constraint.
    pub stock_quantity: i64,
    /// At or below this level the product counts as low stock.
    pub reorder_level: i64,
    pub is_weighted: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Classifies the current stock against the reorder level.
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::classify(self.stock_quantity, self.reorder_level)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub is_weighted: bool,
}

impl NewProduct {
    /// Product with default reorder level and no stock.
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        NewProduct {
            name: name.into(),
            category: None,
            sku: None,
            price_cents,
            stock_quantity: 0,
            reorder_level: crate::DEFAULT_REORDER_LEVEL,
            is_weighted: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_stock(mut self, stock_quantity: i64) -> Self {
        self.stock_quantity = stock_quantity;
        self
    }

    pub fn with_reorder_level(mut self, reorder_level: i64) -> Self {
        self.reorder_level = reorder_level;
        self
    }
}

/// Partial update of a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub price_cents: Option<i64>,
    pub stock_quantity: Option<i64>,
    pub reorder_level: Option<i64>,
}

/// Lightweight catalog row backing search and category views.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
}

// =============================================================================
// Inventory Movement
// =============================================================================

/// Why a stock level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock returned, e.g. from a deleted sale.
    Restock,
    /// Stock received from a purchase order.
    Purchase,
    /// Stock sold.
    Sale,
    /// Manual correction.
    Adjustment,
}

/// Append-only ledger entry for a stock mutation.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryMovement {
    pub id: i64,
    pub tenant_id: i64,
    pub product_id: String,
    /// Signed change applied to `products.stock_quantity`.
    pub quantity_change: i64,
    pub movement_type: MovementType,
    /// Sale or purchase order that caused the movement.
    pub reference_id: Option<i64>,
    /// Deterministic key for steps that must apply at most once.
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for appending a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: String,
    pub quantity_change: i64,
    pub movement_type: MovementType,
    pub reference_id: Option<i64>,
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
}

/// One restock step of a sale reversal: a stock delta plus its ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockEntry {
    pub product_id: String,
    pub quantity: i64,
    pub reference_id: i64,
    pub idempotency_key: String,
    pub notes: String,
}

/// Result of applying a [`RestockEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestockOutcome {
    /// Stock and ledger were written now.
    Applied { old_stock: i64, new_stock: i64 },
    /// A movement with the same idempotency key already exists.
    AlreadyApplied,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(total_cents: i64, notes: Option<&str>) -> Sale {
        Sale {
            id: 1,
            tenant_id: 1,
            branch_id: None,
            total_cents,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            cashier_id: None,
            discount_cents: 0,
            notes: notes.map(str::to_string),
            partial_paid_cents: None,
            partial_remaining_cents: None,
            partial_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::tenant(3).to_string(), "tenant 3");
        assert_eq!(Scope::branch(1, 7).to_string(), "tenant 1 / branch 7");
        assert_ne!(Scope::branch(1, 7), Scope::branch(1, 8));
        assert_ne!(Scope::branch(1, 7), Scope::tenant(1));
    }

    #[test]
    fn test_payment_method_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::MobileMoney).unwrap();
        assert_eq!(json, "\"mobile_money\"");
        assert_eq!(PaymentMethod::MobileMoney.as_str(), "mobile_money");
    }

    #[test]
    fn test_sale_without_notes_is_full() {
        let s = sale(5000, None);
        assert_eq!(
            s.payment_state(),
            PaymentState::Full {
                amount: Money::from_cents(5000)
            }
        );
        assert_eq!(s.full_total(), Some(Money::from_cents(5000)));
    }

    #[test]
    fn test_sale_legacy_annotation_is_partial() {
        let s = sale(
            3000,
            Some("PARTIAL PAYMENT\nAmount Paid Today: €30.00\nRemaining Balance: €20.00"),
        );
        assert!(s.payment_state().is_partial());
        assert_eq!(s.full_total(), Some(Money::from_cents(5000)));
    }

    #[test]
    fn test_structured_columns_win_over_annotation() {
        let mut s = sale(1000, Some("Amount Paid Today: 1.00\nRemaining Balance: 1.00"));
        s.partial_paid_cents = Some(1000);
        s.partial_remaining_cents = Some(2500);
        s.partial_notes = Some("pay friday".to_string());

        match s.payment_state() {
            PaymentState::Partial(p) => {
                assert_eq!(p.paid_today.cents(), 1000);
                assert_eq!(p.remaining.cents(), 2500);
                assert_eq!(p.notes, "pay friday");
            }
            other => panic!("expected partial, got {other:?}"),
        }
        assert_eq!(s.full_total(), Some(Money::from_cents(3500)));
    }

    #[test]
    fn test_new_sale_item_line_total() {
        let item = NewSaleItem {
            product_id: "p".to_string(),
            quantity: 3,
            weight: None,
            unit_price_cents: 250,
        };
        assert_eq!(item.line_total().cents(), 750);
    }

    #[test]
    fn test_new_product_builder() {
        let p = NewProduct::new("Rice 1kg", 299)
            .with_category("Grains")
            .with_stock(12)
            .with_reorder_level(5);
        assert_eq!(p.category.as_deref(), Some("Grains"));
        assert_eq!(p.stock_quantity, 12);
        assert_eq!(p.reorder_level, 5);
        assert!(!p.is_weighted);
    }
}
