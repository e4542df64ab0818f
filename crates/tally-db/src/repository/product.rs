//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Scoped CRUD
//! - Lightweight projections for the derived-summary cache
//! - Prefix search by name or SKU
//!
//! ## Projections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products (full rows)                                                  │
//! │       │                                                                 │
//! │       ├── catalog_index() → [id, name, category]      (search index)   │
//! │       │                                                                 │
//! │       └── stock_levels()  → [stock_quantity, reorder_level]            │
//! │                              (stock-bucket summary)                     │
//! │                                                                         │
//! │  Both are fetched whole. The engine caches them; nothing here caches.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{CatalogEntry, NewProduct, Product, ProductUpdate, Scope, StockSnapshot};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID within a scope.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found in this scope
    pub async fn get_scoped(&self, scope: &Scope, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, tenant_id, branch_id, name, category, sku, price_cents,
                stock_quantity, reorder_level, is_weighted, created_at, updated_at
            FROM products
            WHERE id = ?1 AND tenant_id = ?2 AND (?3 IS NULL OR branch_id = ?3)
            "#,
        )
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product with a generated UUID.
    pub async fn insert(&self, scope: &Scope, product: &NewProduct) -> DbResult<Product> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, name = %product.name, tenant_id = scope.tenant_id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, branch_id, name, category, sku, price_cents,
                stock_quantity, reorder_level, is_weighted, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(&id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .bind(product.name.trim())
        .bind(product.category.as_deref().map(str::trim))
        .bind(product.sku.as_deref().map(str::trim))
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.is_weighted)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_scoped(scope, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Applies a partial update. `None` fields keep their stored value.
    ///
    /// ## Returns
    /// The updated product, or `NotFound` if nothing matched the scope.
    pub async fn update(
        &self,
        scope: &Scope,
        id: &str,
        update: &ProductUpdate,
    ) -> DbResult<Product> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?1, name),
                category = COALESCE(?2, category),
                sku = COALESCE(?3, sku),
                price_cents = COALESCE(?4, price_cents),
                stock_quantity = COALESCE(?5, stock_quantity),
                reorder_level = COALESCE(?6, reorder_level),
                updated_at = ?7
            WHERE id = ?8 AND tenant_id = ?9 AND (?10 IS NULL OR branch_id = ?10)
            "#,
        )
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.category.as_deref().map(str::trim))
        .bind(update.sku.as_deref().map(str::trim))
        .bind(update.price_cents)
        .bind(update.stock_quantity)
        .bind(update.reorder_level)
        .bind(now)
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Updated product");
        self.get_scoped(scope, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product. Sale history and movements keep their references.
    pub async fn delete(&self, scope: &Scope, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE id = ?1 AND tenant_id = ?2 AND (?3 IS NULL OR branch_id = ?3)
            "#,
        )
        .bind(id)
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Deleted product");
        Ok(())
    }

    /// Full catalog as `id / name / category`, ordered by name.
    pub async fn catalog_index(&self, scope: &Scope) -> DbResult<Vec<CatalogEntry>> {
        let entries = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT id, name, category
            FROM products
            WHERE tenant_id = ?1 AND (?2 IS NULL OR branch_id = ?2)
            ORDER BY name COLLATE NOCASE, id
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = entries.len(), tenant_id = scope.tenant_id, "Fetched catalog index");
        Ok(entries)
    }

    /// Stock and reorder level of every product in scope.
    pub async fn stock_levels(&self, scope: &Scope) -> DbResult<Vec<StockSnapshot>> {
        let levels = sqlx::query_as::<_, StockSnapshot>(
            r#"
            SELECT stock_quantity, reorder_level
            FROM products
            WHERE tenant_id = ?1 AND (?2 IS NULL OR branch_id = ?2)
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = levels.len(), tenant_id = scope.tenant_id, "Fetched stock levels");
        Ok(levels)
    }

    /// Prefix search on name or SKU, case-insensitive for ASCII.
    ///
    /// ## Arguments
    /// * `query` - Prefix; empty returns the first `limit` products by name
    /// * `limit` - Maximum results to return
    pub async fn search(&self, scope: &Scope, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = format!("{}%", escape_like(query.trim()));

        debug!(query = %query, limit = %limit, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, tenant_id, branch_id, name, category, sku, price_cents,
                stock_quantity, reorder_level, is_weighted, created_at, updated_at
            FROM products
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR branch_id = ?2)
              AND (name LIKE ?3 ESCAPE '\' OR sku LIKE ?3 ESCAPE '\')
            ORDER BY name COLLATE NOCASE
            LIMIT ?4
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Counts products in scope.
    pub async fn count(&self, scope: &Scope) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND (?2 IS NULL OR branch_id = ?2)",
        )
        .bind(scope.tenant_id)
        .bind(scope.branch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let scope = Scope::tenant(1);
        let product = db
            .products()
            .insert(&scope, &NewProduct::new("  Milk 1L ", 120).with_category("Dairy").with_stock(4))
            .await
            .unwrap();

        assert_eq!(product.name, "Milk 1L");
        assert_eq!(product.reorder_level, tally_core::DEFAULT_REORDER_LEVEL);
        assert_eq!(product.stock_quantity, 4);

        assert!(db.products().get_scoped(&scope, &product.id).await.unwrap().is_some());
        assert!(db
            .products()
            .get_scoped(&Scope::tenant(2), &product.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_negative_stock_rejected_by_schema() {
        let db = db().await;
        let err = db
            .products()
            .insert(&Scope::tenant(1), &NewProduct::new("Bad", 1).with_stock(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let db = db().await;
        let scope = Scope::tenant(1);
        let product = db
            .products()
            .insert(&scope, &NewProduct::new("Tea", 300).with_category("Drinks"))
            .await
            .unwrap();

        let update = ProductUpdate {
            price_cents: Some(350),
            ..Default::default()
        };
        let updated = db.products().update(&scope, &product.id, &update).await.unwrap();
        assert_eq!(updated.price_cents, 350);
        assert_eq!(updated.name, "Tea");
        assert_eq!(updated.category.as_deref(), Some("Drinks"));

        let err = db
            .products()
            .update(&Scope::tenant(9), &product.id, &update)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = db().await;
        let scope = Scope::tenant(1);
        let product = db.products().insert(&scope, &NewProduct::new("Tea", 300)).await.unwrap();

        db.products().delete(&scope, &product.id).await.unwrap();
        assert!(db.products().delete(&scope, &product.id).await.unwrap_err().is_not_found());
        assert_eq!(db.products().count(&scope).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_projections_respect_branch() {
        let db = db().await;
        db.products()
            .insert(&Scope::branch(1, 7), &NewProduct::new("Bread", 200).with_stock(0))
            .await
            .unwrap();
        db.products()
            .insert(&Scope::branch(1, 8), &NewProduct::new("Apples", 90).with_stock(50))
            .await
            .unwrap();

        let branch_index = db.products().catalog_index(&Scope::branch(1, 7)).await.unwrap();
        assert_eq!(branch_index.len(), 1);
        assert_eq!(branch_index[0].name, "Bread");

        let tenant_index = db.products().catalog_index(&Scope::tenant(1)).await.unwrap();
        let names: Vec<&str> = tenant_index.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Apples", "Bread"]);

        let levels = db.products().stock_levels(&Scope::branch(1, 8)).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].stock_quantity, 50);
    }

    #[tokio::test]
    async fn test_search_prefix() {
        let db = db().await;
        let scope = Scope::tenant(1);
        for name in ["Coca-Cola 330ml", "coconut water", "Pepsi"] {
            db.products().insert(&scope, &NewProduct::new(name, 100)).await.unwrap();
        }

        let found = db.products().search(&scope, "CoC", 10).await.unwrap();
        assert_eq!(found.len(), 2);

        let all = db.products().search(&scope, "", 2).await.unwrap();
        assert_eq!(all.len(), 2);

        let none = db.products().search(&scope, "%", 10).await.unwrap();
        assert!(none.is_empty());
    }
}
