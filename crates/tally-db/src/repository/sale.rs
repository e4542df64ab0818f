//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. RECORD                                                             │
//! │     └── insert_sale() → Sale (full, or partial via partial_* / notes)  │
//! │     └── add_item()    → SaleItem                                       │
//! │                                                                         │
//! │  2. (OPTIONAL) RESOLVE                                                 │
//! │     └── resolve() → single conditional UPDATE, partial_* cleared       │
//! │                                                                         │
//! │  3. (OPTIONAL) DELETE                                                  │
//! │     └── get_items_with_stock() → restock plan (tally-engine)           │
//! │     └── delete_items()         → line items first                      │
//! │     └── delete()               → then the sale row                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{NewSale, NewSaleItem, Sale, SaleItem, SaleItemWithStock, SaleResolution, Scope};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID within a scope.
    ///
    /// ## Returns
    /// * `Ok(Some(Sale))` - Sale found in this tenant (and branch, if set)
    /// * `Ok(None)` - Missing, or owned by another tenant/branch
    pub async fn get_scoped(&self, scope: &Scope, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, tenant_id, branch_id, total_cents, payment_method,
                customer_id, cashier_id, discount_cents, notes,
                partial_paid_cents, partial_remaining_cents, partial_notes,
                created_at, updated_at
            FROM sales
            WHERE id = ?1 AND tenant_id = ?2 AND (?3 IS NULL OR branch_id = ?3)
            "#,
        )
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lists sales newest first.
    pub async fn list(&self, scope: &Scope, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, tenant_id, branch_id, total_cents, payment_method,
                customer_id, cashier_id, discount_cents, notes,
                partial_paid_cents, partial_remaining_cents, partial_notes,
                created_at, updated_at
            FROM sales
            WHERE tenant_id = ?1 AND (?2 IS NULL OR branch_id = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Records a sale in the given scope.
    ///
    /// ## Returns
    /// The stored sale with its generated ID.
    pub async fn insert_sale(&self, scope: &Scope, sale: &NewSale) -> DbResult<Sale> {
        let now = Utc::now();

        let (paid, remaining, partial_notes) = match &sale.partial {
            Some(p) => (
                Some(p.paid_today.cents()),
                Some(p.remaining.cents()),
                Some(p.notes.trim().to_string()).filter(|n| !n.is_empty()),
            ),
            None => (None, None, None),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO sales (
                tenant_id, branch_id, total_cents, payment_method,
                customer_id, cashier_id, discount_cents, notes,
                partial_paid_cents, partial_remaining_cents, partial_notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.customer_id)
        .bind(sale.cashier_id)
        .bind(sale.discount_cents)
        .bind(&sale.notes)
        .bind(paid)
        .bind(remaining)
        .bind(partial_notes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(sale_id = id, tenant_id = scope.tenant_id, total = sale.total_cents, "Inserted sale");

        self.get_scoped(scope, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Adds a line item to a sale.
    ///
    /// Fails with `ForeignKeyViolation` if the sale does not exist.
    pub async fn add_item(&self, sale_id: i64, item: &NewSaleItem) -> DbResult<SaleItem> {
        debug!(sale_id, product_id = %item.product_id, quantity = item.quantity, "Adding sale item");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, product_id, quantity, weight,
                unit_price_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.weight)
        .bind(item.unit_price_cents)
        .bind(item.line_total().cents())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(SaleItem {
            id: result.last_insert_rowid(),
            sale_id,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            weight: item.weight,
            unit_price_cents: item.unit_price_cents,
            line_total_cents: item.line_total().cents(),
            created_at: now,
        })
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT
                id, sale_id, product_id, quantity, weight,
                unit_price_cents, line_total_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets a sale's items joined with each product's current stock.
    ///
    /// Products are matched within the sale's tenant. An item whose product
    /// is gone comes back with `current_stock = None`. Items of a sale outside
    /// the scope are never returned.
    pub async fn get_items_with_stock(
        &self,
        scope: &Scope,
        sale_id: i64,
    ) -> DbResult<Vec<SaleItemWithStock>> {
        let items = sqlx::query_as::<_, SaleItemWithStock>(
            r#"
            SELECT
                si.id AS sale_item_id,
                si.sale_id AS sale_id,
                si.product_id AS product_id,
                p.name AS product_name,
                si.quantity AS quantity,
                p.stock_quantity AS current_stock
            FROM sale_items si
            INNER JOIN sales s ON s.id = si.sale_id
            LEFT JOIN products p ON p.id = si.product_id AND p.tenant_id = s.tenant_id
            WHERE si.sale_id = ?1
              AND s.tenant_id = ?2
              AND (?3 IS NULL OR s.branch_id = ?3)
            ORDER BY si.id
            "#,
        )
        .bind(sale_id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(sale_id, count = items.len(), "Loaded sale items with stock");
        Ok(items)
    }

    /// Rewrites a partial sale to its resolved state in one statement.
    ///
    /// The update is filtered by id, scope, and the expected total and notes,
    /// and clears the structured partial columns.
    ///
    /// ## Returns
    /// * `Ok(true)` - The row was rewritten
    /// * `Ok(false)` - No row matched (gone, out of scope, or changed since read)
    pub async fn resolve(
        &self,
        scope: &Scope,
        id: i64,
        resolution: &SaleResolution,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                total_cents = ?1,
                notes = ?2,
                partial_paid_cents = NULL,
                partial_remaining_cents = NULL,
                partial_notes = NULL,
                updated_at = ?3
            WHERE id = ?4
              AND tenant_id = ?5
              AND (?6 IS NULL OR branch_id = ?6)
              AND total_cents = ?7
              AND notes IS ?8
            "#,
        )
        .bind(resolution.total_cents)
        .bind(&resolution.notes)
        .bind(now)
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .bind(resolution.expected_total_cents)
        .bind(&resolution.expected_notes)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        debug!(sale_id = id, updated, total = resolution.total_cents, "Resolve write");
        Ok(updated)
    }

    /// Deletes every line item of a sale in scope.
    ///
    /// ## Returns
    /// Number of items removed (zero is not an error).
    pub async fn delete_items(&self, scope: &Scope, sale_id: i64) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sale_items
            WHERE sale_id = ?1
              AND sale_id IN (
                  SELECT id FROM sales
                  WHERE tenant_id = ?2 AND (?3 IS NULL OR branch_id = ?3)
              )
            "#,
        )
        .bind(sale_id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .execute(&self.pool)
        .await?;

        debug!(sale_id, removed = result.rows_affected(), "Deleted sale items");
        Ok(result.rows_affected())
    }

    /// Deletes a sale row.
    ///
    /// Fails with `ForeignKeyViolation` while items remain, and with
    /// `NotFound` if nothing matched.
    pub async fn delete(&self, scope: &Scope, id: i64) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM sales
            WHERE id = ?1 AND tenant_id = ?2 AND (?3 IS NULL OR branch_id = ?3)
            "#,
        )
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        debug!(sale_id = id, "Deleted sale");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
