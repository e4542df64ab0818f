//! # Sale Deletion and Inventory Reversal
//!
//! Deletes a sale and puts every unit it sold back on the shelf, leaving one
//! restock movement per line item in the inventory ledger.
//!
//! ## Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delete_transaction(scope, sale_id)                                    │
//! │                                                                         │
//! │  1. fetch sale (scope) ──────────────────── none ──► NotFound          │
//! │  2. fetch items joined with current stock                               │
//! │  3. validate every item ───────── negative qty ──► InvalidState        │
//! │     (nothing written yet); zero qty or product gone ──► skipped         │
//! │  4. for each item, one at a time:                                       │
//! │       apply_restock(key = restock:sale:{sale}:item:{item})             │
//! │         stock += qty and ledger row, in one store transaction          │
//! │         key seen before ──► skipped (AlreadyApplied)                   │
//! │       error ──► stop, sale and items stay visible, Store error         │
//! │  5. delete items                                                        │
//! │  6. delete sale row                                                     │
//! │  7. bump tenant generation, publish SaleDeleted                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure anywhere leaves the sale in place (or only the sale row, if
//! step 6 failed), so the caller can simply call `delete_transaction` again.
//! Restocks already applied are recognised by their key and not repeated.
//!
//! Callers must not resolve and delete the same sale concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_core::validation::validate_restock_item;
use tally_core::{MovementType, RestockEntry, RestockOutcome, Scope};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, LedgerEvent};
use crate::store::LedgerStore;
use crate::summary::Generations;

/// Idempotency key of one line item's restock.
///
/// Keyed by line item, not product, so two lines of the same product each
/// get their own movement.
pub fn restock_key(sale_id: i64, sale_item_id: i64) -> String {
    format!("restock:sale:{sale_id}:item:{sale_item_id}")
}

fn restock_prefix(sale_id: i64) -> String {
    format!("restock:sale:{sale_id}:")
}

// =============================================================================
// Reports
// =============================================================================

/// Restock result of one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RestockLine {
    pub sale_item_id: i64,
    pub product_id: String,
    pub quantity: i64,
    pub outcome: RestockOutcome,
}

/// Result of a completed deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReversalReport {
    pub sale_id: i64,
    pub lines: Vec<RestockLine>,
    /// Zero-quantity items, which change no stock.
    pub skipped_items: usize,
    /// Products of items that were not restocked because the product row is
    /// gone. The items are still removed.
    pub missing_products: Vec<String>,
    pub items_removed: u64,
}

impl ReversalReport {
    /// Lines restocked by this call.
    pub fn applied(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.outcome, RestockOutcome::Applied { .. }))
            .count()
    }

    /// Lines a previous, interrupted call had already restocked.
    pub fn already_applied(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.outcome == RestockOutcome::AlreadyApplied)
            .count()
    }
}

/// How far a sale's reversal has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReversalStatus {
    /// The sale exists and none of its items were restocked.
    Clean,
    /// Every item was restocked; removing the items or the sale row is
    /// still outstanding.
    Pending { applied: usize },
    /// Some items were restocked, the rest were not. Re-invoking the delete
    /// finishes the job.
    PartiallyReversed { applied: usize, remaining: usize },
    /// Restock entries reference a sale that no longer exists. This is the
    /// normal end state of a completed deletion.
    Orphaned { applied: usize },
}

// =============================================================================
// Service
// =============================================================================

/// Deletes sales and reverses their inventory effect.
pub struct ReversalService {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    generations: Arc<Generations>,
}

impl ReversalService {
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus, generations: Arc<Generations>) -> Self {
        ReversalService {
            store,
            events,
            generations,
        }
    }

    /// Deletes a sale after restocking every item it sold.
    ///
    /// ## Errors
    /// * `NotFound` - no such sale in this scope
    /// * `InvalidState` - an item has a negative quantity; nothing was written
    /// * `Store` - a write failed; already-restocked items are skipped when
    ///   the call is repeated
    pub async fn delete_transaction(&self, scope: Scope, sale_id: i64) -> EngineResult<ReversalReport> {
        if self.store.fetch_sale(&scope, sale_id).await?.is_none() {
            return Err(EngineError::not_found("Sale", sale_id));
        }

        let items = self.store.fetch_items_with_stock(&scope, sale_id).await?;
        for item in &items {
            validate_restock_item(item)?;
        }

        let mut restockable = Vec::with_capacity(items.len());
        let mut skipped_items = 0;
        let mut missing_products = Vec::new();
        for item in &items {
            if item.quantity == 0 {
                skipped_items += 1;
            } else if item.current_stock.is_none() {
                warn!(
                    sale_id,
                    sale_item_id = item.sale_item_id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "Product gone, item not restocked"
                );
                missing_products.push(item.product_id.clone());
            } else {
                restockable.push(item);
            }
        }
        debug!(
            sale_id,
            items = items.len(),
            skipped = skipped_items,
            missing = missing_products.len(),
            "Reversing sale inventory"
        );

        let mut lines = Vec::with_capacity(restockable.len());
        for item in &restockable {
            let entry = RestockEntry {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                reference_id: sale_id,
                idempotency_key: restock_key(sale_id, item.sale_item_id),
                notes: format!("Stock restored from deleted transaction #{sale_id}"),
            };

            let outcome = match self.store.apply_restock(&scope, &entry).await {
                Ok(outcome) => outcome,
                // Deleted since the items were read.
                Err(e) if e.is_not_found() => {
                    warn!(
                        sale_id,
                        sale_item_id = item.sale_item_id,
                        product_id = %item.product_id,
                        "Product gone, item not restocked"
                    );
                    missing_products.push(item.product_id.clone());
                    continue;
                }
                Err(e) => {
                    warn!(
                        sale_id,
                        sale_item_id = item.sale_item_id,
                        applied = lines.len(),
                        error = %e,
                        "Reversal aborted, sale kept for retry"
                    );
                    return Err(EngineError::Store(e));
                }
            };

            debug!(
                sale_id,
                product_id = %item.product_id,
                delta = item.quantity,
                ?outcome,
                "Restock step"
            );

            lines.push(RestockLine {
                sale_item_id: item.sale_item_id,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                outcome,
            });
        }

        let items_removed = self.store.delete_items(&scope, sale_id).await.map_err(|e| {
            warn!(sale_id, error = %e, "Restocked but could not remove sale items");
            EngineError::Store(e)
        })?;

        self.store.delete_sale(&scope, sale_id).await.map_err(|e| {
            warn!(sale_id, error = %e, "Restocked but could not remove sale");
            EngineError::Store(e)
        })?;

        self.generations.bump(scope.tenant_id);

        let report = ReversalReport {
            sale_id,
            lines,
            skipped_items,
            missing_products,
            items_removed,
        };

        info!(
            sale_id,
            scope = %scope,
            restocked = report.applied(),
            already_restocked = report.already_applied(),
            missing_products = report.missing_products.len(),
            "Sale deleted"
        );

        self.events.publish(LedgerEvent::SaleDeleted {
            scope,
            sale_id,
            restocked_items: report.lines.len(),
        });

        Ok(report)
    }

    /// Compares remaining line items against the restock ledger of a sale.
    ///
    /// Items whose product is gone are never restocked, so they do not count
    /// as outstanding.
    pub async fn inspect_reversal(&self, scope: Scope, sale_id: i64) -> EngineResult<ReversalStatus> {
        let prefix = restock_prefix(sale_id);
        let applied_keys: HashSet<String> = self
            .store
            .movements_for_reference(&scope, sale_id)
            .await?
            .into_iter()
            .filter(|m| m.movement_type == MovementType::Restock)
            .filter_map(|m| m.idempotency_key)
            .filter(|key| key.starts_with(&prefix))
            .collect();
        let applied = applied_keys.len();

        if self.store.fetch_sale(&scope, sale_id).await?.is_none() {
            if applied == 0 {
                return Err(EngineError::not_found("Sale", sale_id));
            }
            return Ok(ReversalStatus::Orphaned { applied });
        }

        if applied == 0 {
            return Ok(ReversalStatus::Clean);
        }

        let remaining = self
            .store
            .fetch_items_with_stock(&scope, sale_id)
            .await?
            .iter()
            .filter(|item| item.quantity > 0 && item.current_stock.is_some())
            .filter(|item| !applied_keys.contains(&restock_key(sale_id, item.sale_item_id)))
            .count();

        if remaining == 0 {
            Ok(ReversalStatus::Pending { applied })
        } else {
            Ok(ReversalStatus::PartiallyReversed { applied, remaining })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
