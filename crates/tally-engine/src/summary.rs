//! # Derived-Summary Cache
//!
//! Memoizes two views over the product catalog so search-as-you-type and
//! dashboards do not refetch the whole catalog on every keystroke.
//!
//! ## Slot Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_or_refresh(scope, force, fetch)                                   │
//! │                                                                         │
//! │  force? ───────────────────────────── yes ──► fetch, overwrite slot    │
//! │    │ no                                                                 │
//! │  slot empty? ──────────────────────── yes ──► fetch, overwrite slot    │
//! │    │ no                                                                 │
//! │  captured for another scope? ──────── yes ──► fetch, overwrite slot    │
//! │    │ no                                                                 │
//! │  age >= TTL? ──────────────────────── yes ──► fetch, overwrite slot    │
//! │    │ no                                                                 │
//! │  tenant generation moved on? ──────── yes ──► fetch, overwrite slot    │
//! │    │ no                                                                 │
//! │  return cached data                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invalidation
//! Every catalog mutation and every sale reversal bumps a per-tenant
//! generation counter. A slot remembers the generation it was captured
//! under, so a mutation makes every slot of that tenant stale without the
//! mutating code knowing which slots exist.
//!
//! A fetch holds the slot's lock, so concurrent readers of one slot wait for
//! a single fetch instead of issuing their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tally_core::validation::{validate_search_query, validate_suggestion_limit};
use tally_core::{CatalogEntry, Scope, StockSummary};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::EngineResult;
use crate::store::LedgerStore;

// =============================================================================
// Generations
// =============================================================================

/// Per-tenant mutation counters.
#[derive(Debug, Default)]
pub struct Generations {
    counters: RwLock<HashMap<i64, u64>>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation of a tenant. Untouched tenants are at 0.
    pub fn current(&self, tenant_id: i64) -> u64 {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters.get(&tenant_id).copied().unwrap_or(0)
    }

    /// Marks every cached view of the tenant stale. Returns the new generation.
    pub fn bump(&self, tenant_id: i64) -> u64 {
        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        let generation = counters.entry(tenant_id).or_insert(0);
        *generation += 1;
        debug!(tenant_id, generation = *generation, "Bumped cache generation");
        *generation
    }
}

// =============================================================================
// Cache Slot
// =============================================================================

#[derive(Debug)]
struct Captured<T> {
    data: Arc<T>,
    captured_at: Instant,
    scope: Scope,
    generation: u64,
}

/// One memoized value with TTL, scope identity and generation checks.
#[derive(Debug)]
pub struct CacheSlot<T> {
    name: &'static str,
    ttl: Duration,
    state: Mutex<Option<Captured<T>>>,
}

impl<T> CacheSlot<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        CacheSlot {
            name,
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Returns the cached value or calls `fetch` and stores its result.
    ///
    /// `generation` is the tenant's current generation, read by the caller
    /// before the call. A failed fetch leaves the slot as it was.
    pub async fn get_or_refresh<F, Fut, E>(
        &self,
        scope: Scope,
        generation: u64,
        force_refresh: bool,
        fetch: F,
    ) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = self.state.lock().await;

        if !force_refresh {
            if let Some(captured) = state.as_ref() {
                if captured.scope != scope {
                    warn!(
                        slot = self.name,
                        cached = %captured.scope,
                        requested = %scope,
                        "Cache identity mismatch, refetching"
                    );
                } else if captured.captured_at.elapsed() >= self.ttl {
                    debug!(slot = self.name, scope = %scope, "Cache entry expired");
                } else if captured.generation != generation {
                    debug!(
                        slot = self.name,
                        cached = captured.generation,
                        current = generation,
                        "Cache entry from older generation"
                    );
                } else {
                    debug!(slot = self.name, scope = %scope, "Cache hit");
                    return Ok(Arc::clone(&captured.data));
                }
            }
        }

        let data = Arc::new(fetch().await?);
        *state = Some(Captured {
            data: Arc::clone(&data),
            captured_at: Instant::now(),
            scope,
            generation,
        });

        info!(slot = self.name, scope = %scope, forced = force_refresh, "Cache refreshed");
        Ok(data)
    }

    /// Drops the cached value.
    pub async fn clear(&self) {
        *self.state.lock().await = None;
    }

    /// Whether a read for `scope` at `generation` would be served from cache.
    pub async fn is_fresh(&self, scope: Scope, generation: u64) -> bool {
        self.state.lock().await.as_ref().is_some_and(|captured| {
            captured.scope == scope
                && captured.generation == generation
                && captured.captured_at.elapsed() < self.ttl
        })
    }
}

// =============================================================================
// Summary Cache
// =============================================================================

/// The two catalog views plus the read helpers built on them.
pub struct SummaryCache {
    store: Arc<dyn LedgerStore>,
    generations: Arc<Generations>,
    catalog: CacheSlot<Vec<CatalogEntry>>,
    stock: CacheSlot<StockSummary>,
}

impl SummaryCache {
    pub fn new(store: Arc<dyn LedgerStore>, generations: Arc<Generations>, ttl: Duration) -> Self {
        SummaryCache {
            store,
            generations,
            catalog: CacheSlot::new("catalog_index", ttl),
            stock: CacheSlot::new("stock_summary", ttl),
        }
    }

    /// Lightweight `id / name / category` index of the catalog.
    pub async fn catalog_index(
        &self,
        scope: Scope,
        force_refresh: bool,
    ) -> EngineResult<Arc<Vec<CatalogEntry>>> {
        let generation = self.generations.current(scope.tenant_id);
        let store = &self.store;
        let index = self
            .catalog
            .get_or_refresh(scope, generation, force_refresh, || async move {
                store.catalog_index(&scope).await
            })
            .await?;
        Ok(index)
    }

    /// Counts of total / in-stock / low-stock / out-of-stock products.
    pub async fn stock_summary(&self, scope: Scope, force_refresh: bool) -> EngineResult<StockSummary> {
        let generation = self.generations.current(scope.tenant_id);
        let store = &self.store;
        let summary = self
            .stock
            .get_or_refresh(scope, generation, force_refresh, || async move {
                let levels = store.stock_levels(&scope).await?;
                Ok::<_, tally_db::DbError>(StockSummary::from_snapshots(&levels))
            })
            .await?;
        Ok(*summary)
    }

    /// Refetches both views.
    pub async fn refresh_all(&self, scope: Scope) -> EngineResult<()> {
        self.catalog_index(scope, true).await?;
        self.stock_summary(scope, true).await?;
        Ok(())
    }

    /// Distinct non-empty categories, sorted case-insensitively.
    pub async fn categories(&self, scope: Scope) -> EngineResult<Vec<String>> {
        let index = self.catalog_index(scope, false).await?;

        Ok(distinct_categories(
            index.iter().filter_map(|entry| entry.category.as_deref()),
        ))
    }

    /// Products whose name starts with `prefix`, ignoring case.
    ///
    /// An empty prefix returns the first `limit` entries of the index.
    pub async fn suggestions(
        &self,
        scope: Scope,
        prefix: &str,
        limit: usize,
    ) -> EngineResult<Vec<CatalogEntry>> {
        let prefix = validate_search_query(prefix)?.to_lowercase();
        validate_suggestion_limit(limit)?;

        let index = self.catalog_index(scope, false).await?;
        Ok(index
            .iter()
            .filter(|entry| entry.name.to_lowercase().starts_with(&prefix))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Trims, drops blanks, then sorts and dedups under one Unicode case folding.
/// The first spelling seen wins.
fn distinct_categories<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut keyed: Vec<(String, String)> = raw
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| (c.to_lowercase(), c.to_string()))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, category)| category).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_core::NewProduct;
    use tally_db::{Database, DbConfig};

    const TTL: Duration = Duration::from_secs(300);

    async fn read(slot: &CacheSlot<u32>, scope: Scope, generation: u64, force: bool, calls: &AtomicUsize) -> u32 {
        let value = slot
            .get_or_refresh(scope, generation, force, || async {
                Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst) as u32 + 1)
            })
            .await
            .unwrap();
        *value
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let slot = CacheSlot::new("test", TTL);
        let calls = AtomicUsize::new(0);
        let scope = Scope::branch(1, 7);

        assert_eq!(read(&slot, scope, 0, false, &calls).await, 1);

        tokio::time::advance(Duration::from_secs(4 * 60 + 59)).await;
        assert_eq!(read(&slot, scope, 0, false, &calls).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(read(&slot, scope, 0, false, &calls).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_branch_never_served() {
        let slot = CacheSlot::new("test", TTL);
        let calls = AtomicUsize::new(0);

        read(&slot, Scope::branch(1, 7), 0, false, &calls).await;
        let value = read(&slot, Scope::branch(1, 8), 0, false, &calls).await;
        assert_eq!(value, 2);

        // Branch 7's entry was overwritten, so going back refetches too.
        read(&slot, Scope::branch(1, 7), 0, false, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Tenant-wide scope is a different identity from any branch.
        read(&slot, Scope::tenant(1), 0, false, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_bypasses_fresh_entry() {
        let slot = CacheSlot::new("test", TTL);
        let calls = AtomicUsize::new(0);
        let scope = Scope::tenant(1);

        read(&slot, scope, 0, false, &calls).await;
        assert_eq!(read(&slot, scope, 0, true, &calls).await, 2);
        assert_eq!(read(&slot, scope, 0, false, &calls).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_bump_makes_entry_stale() {
        let generations = Generations::new();
        let slot = CacheSlot::new("test", TTL);
        let calls = AtomicUsize::new(0);
        let scope = Scope::tenant(3);

        read(&slot, scope, generations.current(3), false, &calls).await;
        assert!(slot.is_fresh(scope, generations.current(3)).await);

        generations.bump(3);
        assert!(!slot.is_fresh(scope, generations.current(3)).await);
        assert_eq!(read(&slot, scope, generations.current(3), false, &calls).await, 2);

        // Another tenant's bump does not touch this entry.
        generations.bump(4);
        assert_eq!(read(&slot, scope, generations.current(3), false, &calls).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_entry() {
        let slot: CacheSlot<u32> = CacheSlot::new("test", TTL);
        let scope = Scope::tenant(1);

        slot.get_or_refresh(scope, 0, false, || async { Ok::<_, String>(7) })
            .await
            .unwrap();
        let err = slot
            .get_or_refresh(scope, 0, true, || async { Err::<u32, _>("down".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "down");

        let value = slot
            .get_or_refresh(scope, 0, false, || async { Ok::<_, String>(99) })
            .await
            .unwrap();
        assert_eq!(*value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let slot = CacheSlot::new("test", TTL);
        let calls = AtomicUsize::new(0);
        let scope = Scope::tenant(1);

        read(&slot, scope, 0, false, &calls).await;
        slot.clear().await;
        assert_eq!(read(&slot, scope, 0, false, &calls).await, 2);
    }

    async fn seeded_cache() -> (SummaryCache, Arc<Generations>, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::tenant(1);
        for (name, category, stock) in [
            ("Coca-Cola", "Beverages", 50),
            ("coconut water", "beverages", 5),
            ("Bread", "Bakery", 0),
            ("Batteries", "", 20),
        ] {
            let mut product = NewProduct::new(name, 100).with_stock(stock);
            if !category.is_empty() {
                product = product.with_category(category);
            }
            db.products().insert(&scope, &product).await.unwrap();
        }

        let generations = Arc::new(Generations::new());
        let store: Arc<dyn LedgerStore> = Arc::new(db.clone());
        let cache = SummaryCache::new(store, Arc::clone(&generations), TTL);
        (cache, generations, db)
    }

    #[tokio::test]
    async fn test_stock_summary_buckets() {
        let (cache, _, _) = seeded_cache().await;
        let summary = cache.stock_summary(Scope::tenant(1), false).await.unwrap();
        assert_eq!(
            summary,
            StockSummary {
                total: 4,
                in_stock: 2,
                low_stock: 1,
                out_of_stock: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_categories_distinct_sorted() {
        let (cache, _, _) = seeded_cache().await;
        let categories = cache.categories(Scope::tenant(1)).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0], "Bakery");
        assert!(categories[1].eq_ignore_ascii_case("beverages"));
    }

    #[test]
    fn test_distinct_categories_folds_non_ascii_case() {
        let raw = ["épicerie", " Bakery", "ÉPICERIE", "Épicerie", "", "bakery", "   "];
        let categories = distinct_categories(raw.into_iter());
        assert_eq!(categories, vec!["Bakery".to_string(), "épicerie".to_string()]);
    }

    #[tokio::test]
    async fn test_suggestions_prefix_and_limit() {
        let (cache, _, _) = seeded_cache().await;
        let scope = Scope::tenant(1);

        let found = cache.suggestions(scope, "  CoC", 10).await.unwrap();
        assert_eq!(found.len(), 2);

        let limited = cache.suggestions(scope, "", 3).await.unwrap();
        assert_eq!(limited.len(), 3);

        assert!(cache.suggestions(scope, "b", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_generation_bump_sees_new_product() {
        let (cache, generations, db) = seeded_cache().await;
        let scope = Scope::tenant(1);

        assert_eq!(cache.catalog_index(scope, false).await.unwrap().len(), 4);

        db.products().insert(&scope, &NewProduct::new("Butter", 300)).await.unwrap();
        assert_eq!(cache.catalog_index(scope, false).await.unwrap().len(), 4);

        generations.bump(1);
        assert_eq!(cache.catalog_index(scope, false).await.unwrap().len(), 5);
    }
}
