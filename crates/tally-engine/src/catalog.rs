//! # Catalog Mutations
//!
//! Product create / update / delete, each followed by cache invalidation.
//!
//! ```text
//! validate ──► store write ──► bump tenant generation ──► refresh both
//!                                                          summary slots
//!                                                              │
//!                                                              ▼
//!                                                      publish CatalogChanged
//! ```
//!
//! The write is the operation. A refresh that fails afterwards is logged and
//! does not turn a committed write into an error; the bumped generation
//! already makes the old summaries unreachable.

use std::sync::Arc;

use tally_core::validation::{
    validate_new_product, validate_product_update, validate_search_query,
    validate_suggestion_limit, validate_uuid,
};
use tally_core::{NewProduct, Product, ProductUpdate, Scope};
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::events::{EventBus, LedgerEvent};
use crate::store::LedgerStore;
use crate::summary::{Generations, SummaryCache};

/// Product mutations and live product search.
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
    generations: Arc<Generations>,
    cache: Arc<SummaryCache>,
    events: EventBus,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        generations: Arc<Generations>,
        cache: Arc<SummaryCache>,
        events: EventBus,
    ) -> Self {
        CatalogService {
            store,
            generations,
            cache,
            events,
        }
    }

    pub async fn create_product(&self, scope: Scope, product: &NewProduct) -> EngineResult<Product> {
        validate_new_product(product)?;

        let created = self.store.create_product(&scope, product).await?;
        info!(product_id = %created.id, name = %created.name, scope = %scope, "Product created");

        self.after_mutation(scope, &created.id).await;
        Ok(created)
    }

    pub async fn update_product(
        &self,
        scope: Scope,
        product_id: &str,
        update: &ProductUpdate,
    ) -> EngineResult<Product> {
        validate_uuid(product_id)?;
        validate_product_update(update)?;

        let updated = self.store.update_product(&scope, product_id, update).await?;
        info!(product_id = %updated.id, scope = %scope, "Product updated");

        self.after_mutation(scope, product_id).await;
        Ok(updated)
    }

    /// Deletes a product. Past sales and movements keep referencing its id.
    pub async fn delete_product(&self, scope: Scope, product_id: &str) -> EngineResult<()> {
        validate_uuid(product_id)?;

        self.store.delete_product(&scope, product_id).await?;
        info!(product_id, scope = %scope, "Product deleted");

        self.after_mutation(scope, product_id).await;
        Ok(())
    }

    /// Uncached prefix search over name and SKU, with full product rows.
    pub async fn search(&self, scope: Scope, query: &str, limit: usize) -> EngineResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        validate_suggestion_limit(limit)?;

        // validated above: limit <= MAX_SUGGESTIONS
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        Ok(self.store.search_products(&scope, &query, limit).await?)
    }

    async fn after_mutation(&self, scope: Scope, product_id: &str) {
        self.generations.bump(scope.tenant_id);

        if let Err(e) = self.cache.refresh_all(scope).await {
            warn!(scope = %scope, error = %e, "Summary refresh after catalog change failed");
        }

        self.events.publish(LedgerEvent::CatalogChanged {
            scope,
            product_id: product_id.to_string(),
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
