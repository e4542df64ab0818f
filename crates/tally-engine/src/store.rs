//! # Ledger Store Seam
//!
//! The typed contract the engine drives. Services depend on
//! `Arc<dyn LedgerStore>`, never on SQL.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ResolutionService / ReversalService / CatalogService / SummaryCache   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  dyn LedgerStore                                                        │
//! │       │                                                                 │
//! │       ├── tally_db::Database  (production: SQLite repositories)        │
//! │       └── wrappers in tests   (failure injection)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation takes the caller's [`Scope`]. Single-row writes are
//! atomic; `apply_restock` is atomic for its stock delta and ledger row.
//! Nothing wider than that is promised, so multi-step operations are
//! sequenced by the services.

use async_trait::async_trait;
use tally_core::{
    CatalogEntry, InventoryMovement, NewProduct, Product, ProductUpdate, RestockEntry,
    RestockOutcome, Sale, SaleItemWithStock, SaleResolution, Scope, StockSnapshot,
};
use tally_db::{Database, DbResult};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Sale by id, or `None` if missing or outside the scope.
    async fn fetch_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<Option<Sale>>;

    /// Line items of a sale joined with each product's current stock.
    async fn fetch_items_with_stock(
        &self,
        scope: &Scope,
        sale_id: i64,
    ) -> DbResult<Vec<SaleItemWithStock>>;

    /// Conditional single-row rewrite. `false` when the row no longer
    /// matches the expected state.
    async fn resolve_sale(
        &self,
        scope: &Scope,
        sale_id: i64,
        resolution: &SaleResolution,
    ) -> DbResult<bool>;

    /// Removes all line items of a sale. Returns the number removed.
    async fn delete_items(&self, scope: &Scope, sale_id: i64) -> DbResult<u64>;

    /// Removes the sale row itself.
    async fn delete_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Inventory ledger
    // -------------------------------------------------------------------------

    /// Stock delta plus restock movement, skipped if the key was applied.
    async fn apply_restock(&self, scope: &Scope, entry: &RestockEntry) -> DbResult<RestockOutcome>;

    /// Movements whose `reference_id` is the given sale or order.
    async fn movements_for_reference(
        &self,
        scope: &Scope,
        reference_id: i64,
    ) -> DbResult<Vec<InventoryMovement>>;

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    async fn catalog_index(&self, scope: &Scope) -> DbResult<Vec<CatalogEntry>>;

    async fn stock_levels(&self, scope: &Scope) -> DbResult<Vec<StockSnapshot>>;

    async fn search_products(&self, scope: &Scope, query: &str, limit: u32) -> DbResult<Vec<Product>>;

    async fn create_product(&self, scope: &Scope, product: &NewProduct) -> DbResult<Product>;

    async fn update_product(
        &self,
        scope: &Scope,
        product_id: &str,
        update: &ProductUpdate,
    ) -> DbResult<Product>;

    async fn delete_product(&self, scope: &Scope, product_id: &str) -> DbResult<()>;
}

// =============================================================================
// SQLite implementation
// =============================================================================

#[async_trait]
impl LedgerStore for Database {
    async fn fetch_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<Option<Sale>> {
        self.sales().get_scoped(scope, sale_id).await
    }

    async fn fetch_items_with_stock(
        &self,
        scope: &Scope,
        sale_id: i64,
    ) -> DbResult<Vec<SaleItemWithStock>> {
        self.sales().get_items_with_stock(scope, sale_id).await
    }

    async fn resolve_sale(
        &self,
        scope: &Scope,
        sale_id: i64,
        resolution: &SaleResolution,
    ) -> DbResult<bool> {
        self.sales().resolve(scope, sale_id, resolution).await
    }

    async fn delete_items(&self, scope: &Scope, sale_id: i64) -> DbResult<u64> {
        self.sales().delete_items(scope, sale_id).await
    }

    async fn delete_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<()> {
        self.sales().delete(scope, sale_id).await
    }

    async fn apply_restock(&self, scope: &Scope, entry: &RestockEntry) -> DbResult<RestockOutcome> {
        self.movements().apply_restock(scope, entry).await
    }

    async fn movements_for_reference(
        &self,
        scope: &Scope,
        reference_id: i64,
    ) -> DbResult<Vec<InventoryMovement>> {
        self.movements().list_for_reference(scope, reference_id).await
    }

    async fn catalog_index(&self, scope: &Scope) -> DbResult<Vec<CatalogEntry>> {
        self.products().catalog_index(scope).await
    }

    async fn stock_levels(&self, scope: &Scope) -> DbResult<Vec<StockSnapshot>> {
        self.products().stock_levels(scope).await
    }

    async fn search_products(&self, scope: &Scope, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        self.products().search(scope, query, limit).await
    }

    async fn create_product(&self, scope: &Scope, product: &NewProduct) -> DbResult<Product> {
        self.products().insert(scope, product).await
    }

    async fn update_product(
        &self,
        scope: &Scope,
        product_id: &str,
        update: &ProductUpdate,
    ) -> DbResult<Product> {
        self.products().update(scope, product_id, update).await
    }

    async fn delete_product(&self, scope: &Scope, product_id: &str) -> DbResult<()> {
        self.products().delete(scope, product_id).await
    }
}
