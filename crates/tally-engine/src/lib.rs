//! # tally-engine: Transaction & Inventory Reconciliation
//!
//! Orchestrates the multi-step ledger writes that can corrupt money or stock
//! when done wrong, and keeps the derived catalog summaries in step with them.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Engine (facade)                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Resolution    │  │   Reversal     │  │  Catalog mutations     │    │
//! │  │  partial ──►   │  │  restock saga  │  │  create/update/delete  │    │
//! │  │  paid in full  │  │  + audit       │  │  + live search         │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          │                   │ bump                  │ bump + refresh  │
//! │          │                   ▼                       ▼                 │
//! │          │           ┌──────────────────────────────────────────┐      │
//! │          │           │  Generations ◄── SummaryCache            │      │
//! │          │           │                 catalog_index slot       │      │
//! │          │           │                 stock_summary slot       │      │
//! │          │           └──────────────────────┬───────────────────┘      │
//! │          │                                  │                          │
//! │          ▼                                  ▼                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Arc<dyn LedgerStore>  (tally_db::Database)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  EventBus ──► SaleResolved / SaleDeleted / CatalogChanged              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`resolution`] - Partial payment resolution
//! - [`reversal`] - Sale deletion with idempotent inventory reversal
//! - [`summary`] - TTL cache for derived catalog summaries
//! - [`catalog`] - Product mutations that keep the summaries fresh
//! - [`store`] - The `LedgerStore` seam
//! - [`events`] - Ledger event broadcast
//! - [`config`] - Engine configuration
//! - [`error`] - Engine error taxonomy

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod resolution;
pub mod reversal;
pub mod store;
pub mod summary;

#[cfg(test)]
mod testing;

pub use catalog::CatalogService;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, LedgerEvent};
pub use resolution::{ResolutionReport, ResolutionService};
pub use reversal::{restock_key, ReversalReport, ReversalService, ReversalStatus};
pub use store::LedgerStore;
pub use summary::{CacheSlot, Generations, SummaryCache};

use std::sync::Arc;

use tally_core::{
    CatalogEntry, NewProduct, PartialPayment, Product, ProductUpdate, Scope, StockSummary,
};
use tally_db::Database;
use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// Engine
// =============================================================================

/// All services wired over one store, scoped to the configured tenant.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    cache: Arc<SummaryCache>,
    resolution: ResolutionService,
    reversal: ReversalService,
    catalog: CatalogService,
}

impl Engine {
    /// Opens the configured database (running migrations) and wires the
    /// services over it.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        info!(path = ?config.store.database_path, scope = %config.scope(), "Ledger opened");
        Ok(Self::with_store(Arc::new(db), config))
    }

    /// Wires the services over an existing store.
    pub fn with_store(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        let events = EventBus::new();
        let generations = Arc::new(Generations::new());
        let cache = Arc::new(SummaryCache::new(
            Arc::clone(&store),
            Arc::clone(&generations),
            config.cache_ttl(),
        ));

        Engine {
            resolution: ResolutionService::new(Arc::clone(&store), events.clone()),
            reversal: ReversalService::new(
                Arc::clone(&store),
                events.clone(),
                Arc::clone(&generations),
            ),
            catalog: CatalogService::new(
                Arc::clone(&store),
                generations,
                Arc::clone(&cache),
                events.clone(),
            ),
            config,
            store,
            events,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The scope every facade call runs in.
    pub fn scope(&self) -> Scope {
        self.config.scope()
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Legacy annotation text for a partial payment, in the configured currency.
    pub fn partial_annotation(&self, payment: &PartialPayment) -> String {
        payment.encode_with_symbol(&self.config.reversal.currency_symbol)
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    pub async fn resolve_partial_payment(&self, sale_id: i64) -> EngineResult<ResolutionReport> {
        self.resolution
            .resolve_partial_payment(self.scope(), sale_id)
            .await
    }

    pub async fn delete_transaction(&self, sale_id: i64) -> EngineResult<ReversalReport> {
        self.reversal.delete_transaction(self.scope(), sale_id).await
    }

    pub async fn inspect_reversal(&self, sale_id: i64) -> EngineResult<ReversalStatus> {
        self.reversal.inspect_reversal(self.scope(), sale_id).await
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    pub async fn stock_summary(&self, force_refresh: bool) -> EngineResult<StockSummary> {
        self.cache.stock_summary(self.scope(), force_refresh).await
    }

    pub async fn catalog_index(&self, force_refresh: bool) -> EngineResult<Arc<Vec<CatalogEntry>>> {
        self.cache.catalog_index(self.scope(), force_refresh).await
    }

    pub async fn categories(&self) -> EngineResult<Vec<String>> {
        self.cache.categories(self.scope()).await
    }

    pub async fn suggestions(&self, prefix: &str, limit: usize) -> EngineResult<Vec<CatalogEntry>> {
        self.cache.suggestions(self.scope(), prefix, limit).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn search(&self, query: &str, limit: usize) -> EngineResult<Vec<Product>> {
        self.catalog.search(self.scope(), query, limit).await
    }

    pub async fn create_product(&self, product: &NewProduct) -> EngineResult<Product> {
        self.catalog.create_product(self.scope(), product).await
    }

    pub async fn update_product(
        &self,
        product_id: &str,
        update: &ProductUpdate,
    ) -> EngineResult<Product> {
        self.catalog
            .update_product(self.scope(), product_id, update)
            .await
    }

    pub async fn delete_product(&self, product_id: &str) -> EngineResult<()> {
        self.catalog.delete_product(self.scope(), product_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use std::path::PathBuf;
    use tally_core::Money;

    fn memory_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.store.database_path = PathBuf::from(":memory:");
        config
    }

    async fn engine() -> (Engine, Arc<FlakyStore>) {
        let store = FlakyStore::new().await;
        let dyn_store: Arc<dyn LedgerStore> = store.clone();
        (Engine::with_store(dyn_store, memory_config()), store)
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let engine = Engine::open(memory_config()).await.unwrap();
        assert_eq!(engine.scope(), Scope::tenant(1));
        assert_eq!(engine.stock_summary(false).await.unwrap(), StockSummary::default());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut config = memory_config();
        config.cache.ttl_secs = 0;
        assert!(matches!(
            Engine::open(config).await,
            Err(EngineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_reversal_invalidates_summaries() {
        let (engine, store) = engine().await;
        let scope = engine.scope();
        let product = store.product(&scope, "Milk", 0).await;
        let sale = store.sale_with_items(&scope, None, 100, &[(&product, 2)]).await;

        let before = engine.stock_summary(false).await.unwrap();
        assert_eq!(before.out_of_stock, 1);

        let report = engine.delete_transaction(sale.id).await.unwrap();
        assert_eq!(report.applied(), 1);

        // cached under the old generation, so this read refetches
        let after = engine.stock_summary(false).await.unwrap();
        assert_eq!(after.out_of_stock, 0);
        assert_eq!(after.low_stock, 1);

        assert!(matches!(
            engine.inspect_reversal(sale.id).await.unwrap(),
            ReversalStatus::Orphaned { applied: 1 }
        ));
    }

    #[tokio::test]
    async fn test_resolve_through_facade() {
        let (engine, store) = engine().await;
        let notes = engine.partial_annotation(&PartialPayment::new(
            Money::from_cents(1000),
            Money::from_cents(250),
        ));
        let sale = store
            .sale_with_items(&engine.scope(), Some(notes), 1000, &[])
            .await;
        let mut rx = engine.subscribe();

        let report = engine.resolve_partial_payment(sale.id).await.unwrap();
        assert_eq!(report.total, Money::from_cents(1250));
        assert!(matches!(rx.recv().await.unwrap(), LedgerEvent::SaleResolved { .. }));
    }

    #[tokio::test]
    async fn test_catalog_round_trip_through_facade() {
        let (engine, _store) = engine().await;
        engine
            .create_product(&NewProduct::new("Coffee", 450).with_category("Drinks"))
            .await
            .unwrap();
        engine
            .create_product(&NewProduct::new("Croissant", 250).with_category("Bakery"))
            .await
            .unwrap();

        assert_eq!(engine.categories().await.unwrap(), vec!["Bakery", "Drinks"]);
        assert_eq!(engine.suggestions("cr", 5).await.unwrap().len(), 1);
        assert_eq!(engine.search("co", 5).await.unwrap()[0].name, "Coffee");
        assert_eq!(engine.catalog_index(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_annotation_uses_configured_symbol() {
        let store: Arc<dyn LedgerStore> = FlakyStore::new().await;
        let mut config = memory_config();
        config.reversal.currency_symbol = "$".into();
        let engine = Engine::with_store(store, config);

        let text = engine.partial_annotation(&PartialPayment::new(
            Money::from_cents(3000),
            Money::from_cents(2000),
        ));
        assert!(text.contains("Amount Paid Today: $30.00"));
        assert!(text.contains("Remaining Balance: $20.00"));
    }
}
