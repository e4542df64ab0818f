//! # Inventory Movement Repository
//!
//! Append-only stock ledger plus the transactional restock step used when a
//! sale is reversed.
//!
//! ## Restock Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_restock(entry)                                                  │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    key already in ledger? ──── yes ──► ROLLBACK, AlreadyApplied        │
//! │       │ no                                                              │
//! │    read stock_quantity ─────── missing ──► ROLLBACK, NotFound          │
//! │       │                                                                 │
//! │    stock_quantity += quantity                                           │
//! │    INSERT movement (restock, reference, key)                            │
//! │  COMMIT ──► Applied { old_stock, new_stock }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock delta and ledger row commit together or not at all. The unique
//! index on `idempotency_key` backs up the in-transaction check.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tally_core::{InventoryMovement, MovementType, NewMovement, RestockEntry, RestockOutcome, Scope};

/// Repository for the inventory movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a movement row without touching stock.
    pub async fn record(&self, scope: &Scope, movement: &NewMovement) -> DbResult<InventoryMovement> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                tenant_id, product_id, quantity_change, movement_type,
                reference_id, idempotency_key, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(scope.tenant_id)
        .bind(&movement.product_id)
        .bind(movement.quantity_change)
        .bind(movement.movement_type)
        .bind(movement.reference_id)
        .bind(&movement.idempotency_key)
        .bind(&movement.notes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id = id, product_id = %movement.product_id, "Recorded movement");

        sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT id, tenant_id, product_id, quantity_change, movement_type,
                   reference_id, idempotency_key, notes, created_at
            FROM inventory_movements
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("InventoryMovement", id))
    }

    /// Movements caused by one sale or purchase order, oldest first.
    pub async fn list_for_reference(
        &self,
        scope: &Scope,
        reference_id: i64,
    ) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT id, tenant_id, product_id, quantity_change, movement_type,
                   reference_id, idempotency_key, notes, created_at
            FROM inventory_movements
            WHERE tenant_id = ?1 AND reference_id = ?2
            ORDER BY id
            "#,
        )
        .bind(scope.tenant_id)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Looks up a movement by its idempotency key.
    pub async fn find_by_key(&self, scope: &Scope, key: &str) -> DbResult<Option<InventoryMovement>> {
        let movement = sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT id, tenant_id, product_id, quantity_change, movement_type,
                   reference_id, idempotency_key, notes, created_at
            FROM inventory_movements
            WHERE tenant_id = ?1 AND idempotency_key = ?2
            "#,
        )
        .bind(scope.tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movement)
    }

    /// Credits stock back to a product and records the restock movement in
    /// one transaction. Applying the same key twice is a no-op.
    ///
    /// The product is matched by id and tenant only, so a restock reaches
    /// the product even when the sale was taken at another branch.
    pub async fn apply_restock(&self, scope: &Scope, entry: &RestockEntry) -> DbResult<RestockOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM inventory_movements WHERE idempotency_key = ?1")
                .bind(&entry.idempotency_key)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            tx.rollback().await?;
            debug!(key = %entry.idempotency_key, "Restock already applied");
            return Ok(RestockOutcome::AlreadyApplied);
        }

        let old_stock: i64 = sqlx::query_scalar(
            "SELECT stock_quantity FROM products WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(&entry.product_id)
        .bind(scope.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", &entry.product_id))?;

        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?1, updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4
            "#,
        )
        .bind(entry.quantity)
        .bind(now)
        .bind(&entry.product_id)
        .bind(scope.tenant_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                tenant_id, product_id, quantity_change, movement_type,
                reference_id, idempotency_key, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(scope.tenant_id)
        .bind(&entry.product_id)
        .bind(entry.quantity)
        .bind(MovementType::Restock)
        .bind(entry.reference_id)
        .bind(&entry.idempotency_key)
        .bind(&entry.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let new_stock = old_stock + entry.quantity;
        info!(
            product_id = %entry.product_id,
            old_stock = old_stock,
            new_stock = new_stock,
            reference_id = entry.reference_id,
            "Restocked product"
        );

        Ok(RestockOutcome::Applied { old_stock, new_stock })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use tally_core::NewProduct;

    async fn db_with_product(stock: i64) -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&Scope::branch(1, 3), &NewProduct::new("Rice", 250).with_stock(stock))
            .await
            .unwrap();
        (db, product.id)
    }

    fn entry(product_id: &str, quantity: i64, key: &str) -> RestockEntry {
        RestockEntry {
            product_id: product_id.to_string(),
            quantity,
            reference_id: 42,
            idempotency_key: key.to_string(),
            notes: "Stock restored from deleted transaction #42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_restock_updates_stock_and_ledger() {
        let (db, product_id) = db_with_product(10).await;
        let scope = Scope::tenant(1);

        let outcome = db
            .movements()
            .apply_restock(&scope, &entry(&product_id, 3, "restock:sale:42:item:1"))
            .await
            .unwrap();
        assert_eq!(outcome, RestockOutcome::Applied { old_stock: 10, new_stock: 13 });

        let product = db.products().get_scoped(&scope, &product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 13);

        let movements = db.movements().list_for_reference(&scope, 42).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity_change, 3);
        assert_eq!(movements[0].movement_type, MovementType::Restock);
        assert_eq!(
            movements[0].notes.as_deref(),
            Some("Stock restored from deleted transaction #42")
        );
    }

    #[tokio::test]
    async fn test_apply_restock_is_idempotent() {
        let (db, product_id) = db_with_product(0).await;
        let scope = Scope::tenant(1);
        let restock = entry(&product_id, 1, "restock:sale:42:item:7");

        db.movements().apply_restock(&scope, &restock).await.unwrap();
        let second = db.movements().apply_restock(&scope, &restock).await.unwrap();
        assert_eq!(second, RestockOutcome::AlreadyApplied);

        let product = db.products().get_scoped(&scope, &product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 1);
        assert_eq!(db.movements().list_for_reference(&scope, 42).await.unwrap().len(), 1);
        assert!(db
            .movements()
            .find_by_key(&scope, "restock:sale:42:item:7")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_apply_restock_missing_product_writes_nothing() {
        let (db, _) = db_with_product(0).await;
        let scope = Scope::tenant(1);

        let err = db
            .movements()
            .apply_restock(&scope, &entry("no-such-product", 2, "restock:sale:42:item:9"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(db.movements().list_for_reference(&scope, 42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_restock_other_tenant_not_found() {
        let (db, product_id) = db_with_product(5).await;

        let err = db
            .movements()
            .apply_restock(&Scope::tenant(2), &entry(&product_id, 2, "restock:sale:42:item:1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_record_and_duplicate_key() {
        let (db, product_id) = db_with_product(5).await;
        let scope = Scope::tenant(1);
        let movement = NewMovement {
            product_id: product_id.clone(),
            quantity_change: -2,
            movement_type: MovementType::Adjustment,
            reference_id: None,
            idempotency_key: Some("adjust:1".to_string()),
            notes: Some("Broken bag".to_string()),
        };

        let recorded = db.movements().record(&scope, &movement).await.unwrap();
        assert_eq!(recorded.quantity_change, -2);
        assert_eq!(recorded.tenant_id, 1);

        let err = db.movements().record(&scope, &movement).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
