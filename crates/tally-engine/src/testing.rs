//! Test fixtures shared by the service tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{
    CatalogEntry, InventoryMovement, NewProduct, NewSale, NewSaleItem, PaymentMethod, Product,
    ProductUpdate, RestockEntry, RestockOutcome, Sale, SaleItemWithStock, SaleResolution, Scope,
    StockSnapshot,
};
use tally_db::{Database, DbConfig, DbError, DbResult};

use crate::store::LedgerStore;

/// Real SQLite store that can be told to fail specific steps.
///
/// Counts every write that reaches the database.
pub struct FlakyStore {
    pub db: Database,
    /// Fail the Nth `apply_restock` call (1-based) while armed.
    fail_restock_at: AtomicUsize,
    fail_delete_sale: AtomicBool,
    /// Let a competing writer resolve the sale just before our write.
    race_resolve: AtomicBool,
    restock_calls: AtomicUsize,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub async fn new() -> Arc<Self> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Arc::new(FlakyStore {
            db,
            fail_restock_at: AtomicUsize::new(0),
            fail_delete_sale: AtomicBool::new(false),
            race_resolve: AtomicBool::new(false),
            restock_calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn fail_restock_at(&self, call: usize) {
        self.restock_calls.store(0, Ordering::SeqCst);
        self.fail_restock_at.store(call, Ordering::SeqCst);
    }

    pub fn fail_delete_sale(&self) {
        self.fail_delete_sale.store(true, Ordering::SeqCst);
    }

    pub fn race_resolve(&self) {
        self.race_resolve.store(true, Ordering::SeqCst);
    }

    /// Disarms every injected failure.
    pub fn heal(&self) {
        self.fail_restock_at.store(0, Ordering::SeqCst);
        self.fail_delete_sale.store(false, Ordering::SeqCst);
        self.race_resolve.store(false, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn product(&self, scope: &Scope, name: &str, stock: i64) -> Product {
        self.db
            .products()
            .insert(scope, &NewProduct::new(name, 100).with_stock(stock))
            .await
            .unwrap()
    }

    /// Current stock of a tenant-1 product, or -1 if it is gone.
    pub async fn stock_of(&self, product_id: &str) -> i64 {
        self.db
            .products()
            .get_scoped(&Scope::tenant(1), product_id)
            .await
            .unwrap()
            .map(|p| p.stock_quantity)
            .unwrap_or(-1)
    }

    /// Inserts a sale with one item per `(product, quantity)` pair.
    pub async fn sale_with_items(
        &self,
        scope: &Scope,
        notes: Option<String>,
        total_cents: i64,
        lines: &[(&Product, i64)],
    ) -> Sale {
        let sale = self
            .db
            .sales()
            .insert_sale(
                scope,
                &NewSale {
                    total_cents,
                    payment_method: PaymentMethod::Cash,
                    customer_id: None,
                    cashier_id: Some(1),
                    discount_cents: 0,
                    notes,
                    partial: None,
                },
            )
            .await
            .unwrap();

        for (product, quantity) in lines {
            self.db
                .sales()
                .add_item(
                    sale.id,
                    &NewSaleItem {
                        product_id: product.id.clone(),
                        quantity: *quantity,
                        weight: None,
                        unit_price_cents: product.price_cents,
                    },
                )
                .await
                .unwrap();
        }

        sale
    }
}

fn injected(step: &str) -> DbError {
    DbError::QueryFailed(format!("injected failure: {step}"))
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn fetch_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<Option<Sale>> {
        self.db.fetch_sale(scope, sale_id).await
    }

    async fn fetch_items_with_stock(
        &self,
        scope: &Scope,
        sale_id: i64,
    ) -> DbResult<Vec<SaleItemWithStock>> {
        self.db.fetch_items_with_stock(scope, sale_id).await
    }

    async fn resolve_sale(
        &self,
        scope: &Scope,
        sale_id: i64,
        resolution: &SaleResolution,
    ) -> DbResult<bool> {
        if self.race_resolve.swap(false, Ordering::SeqCst) {
            let competing = SaleResolution {
                notes: "Resolved at another till".to_string(),
                ..resolution.clone()
            };
            self.db.resolve_sale(scope, sale_id, &competing).await?;
        }
        self.write();
        self.db.resolve_sale(scope, sale_id, resolution).await
    }

    async fn delete_items(&self, scope: &Scope, sale_id: i64) -> DbResult<u64> {
        self.write();
        self.db.delete_items(scope, sale_id).await
    }

    async fn delete_sale(&self, scope: &Scope, sale_id: i64) -> DbResult<()> {
        if self.fail_delete_sale.load(Ordering::SeqCst) {
            return Err(injected("delete_sale"));
        }
        self.write();
        self.db.delete_sale(scope, sale_id).await
    }

    async fn apply_restock(&self, scope: &Scope, entry: &RestockEntry) -> DbResult<RestockOutcome> {
        let call = self.restock_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_restock_at.load(Ordering::SeqCst) == call {
            return Err(injected("apply_restock"));
        }
        self.write();
        self.db.apply_restock(scope, entry).await
    }

    async fn movements_for_reference(
        &self,
        scope: &Scope,
        reference_id: i64,
    ) -> DbResult<Vec<InventoryMovement>> {
        self.db.movements_for_reference(scope, reference_id).await
    }

    async fn catalog_index(&self, scope: &Scope) -> DbResult<Vec<CatalogEntry>> {
        self.db.catalog_index(scope).await
    }

    async fn stock_levels(&self, scope: &Scope) -> DbResult<Vec<StockSnapshot>> {
        self.db.stock_levels(scope).await
    }

    async fn search_products(&self, scope: &Scope, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        self.db.search_products(scope, query, limit).await
    }

    async fn create_product(&self, scope: &Scope, product: &NewProduct) -> DbResult<Product> {
        self.write();
        self.db.create_product(scope, product).await
    }

    async fn update_product(
        &self,
        scope: &Scope,
        product_id: &str,
        update: &ProductUpdate,
    ) -> DbResult<Product> {
        self.write();
        self.db.update_product(scope, product_id, update).await
    }

    async fn delete_product(&self, scope: &Scope, product_id: &str) -> DbResult<()> {
        self.write();
        self.db.delete_product(scope, product_id).await
    }
}
