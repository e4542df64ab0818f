//! # Partial Payment Resolution
//!
//! Moves one sale from "partially paid" to "paid in full", exactly once.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_partial_payment(scope, sale_id)                               │
//! │                                                                         │
//! │  1. fetch sale by id AND scope ─────── none ──► NotFound               │
//! │  2. payment state                                                       │
//! │       structured partial_* columns, else legacy annotation decode      │
//! │       not partial ──────────────────────────► InvalidState (no write)  │
//! │  3. full total = paid today + remaining                                 │
//! │  4. single conditional UPDATE                                           │
//! │       total = full total, notes = resolved marker, partial_* = NULL    │
//! │       only if total and notes are still what step 1 read               │
//! │       no row matched ───────────────────────► InvalidState             │
//! │  5. publish SaleResolved                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 4 is one row write, so a failure leaves the sale untouched. Nothing
//! is retried automatically.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_core::partial::mark_resolved;
use tally_core::{CoreError, Money, SaleResolution, Scope};
use tracing::{debug, info};
use ts_rs::TS;

use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, LedgerEvent};
use crate::store::LedgerStore;

/// What a successful resolution changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolutionReport {
    pub sale_id: i64,
    pub paid_today: Money,
    pub remaining: Money,
    pub previous_total: Money,
    pub total: Money,
    pub notes: String,
}

/// Resolves partial payments.
pub struct ResolutionService {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
}

impl ResolutionService {
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus) -> Self {
        ResolutionService { store, events }
    }

    /// Marks a partially paid sale as paid in full.
    ///
    /// ## Errors
    /// * `NotFound` - no such sale in this scope (including other tenants)
    /// * `InvalidState` - the sale is not partial, or changed concurrently
    /// * `Store` - the read or the write failed; the sale is unchanged
    pub async fn resolve_partial_payment(
        &self,
        scope: Scope,
        sale_id: i64,
    ) -> EngineResult<ResolutionReport> {
        let sale = self
            .store
            .fetch_sale(&scope, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))?;

        let state = sale.payment_state();
        let partial = state
            .as_partial()
            .ok_or(CoreError::NotPartialPayment { sale_id })?;

        let total = state
            .full_total()
            .ok_or(CoreError::AmountOverflow { sale_id })?;
        let notes = mark_resolved(sale.notes.as_deref().unwrap_or_default());

        debug!(
            sale_id,
            paid_today = %partial.paid_today,
            remaining = %partial.remaining,
            total = %total,
            "Resolving partial payment"
        );

        let resolution = SaleResolution {
            expected_total_cents: sale.total_cents,
            expected_notes: sale.notes.clone(),
            total_cents: total.cents(),
            notes: notes.clone(),
        };

        if !self.store.resolve_sale(&scope, sale_id, &resolution).await? {
            return Err(EngineError::InvalidState(format!(
                "Sale {sale_id} changed while it was being resolved"
            )));
        }

        info!(sale_id, scope = %scope, total = %total, "Partial payment resolved");

        self.events.publish(LedgerEvent::SaleResolved {
            scope,
            sale_id,
            total_cents: total.cents(),
        });

        Ok(ResolutionReport {
            sale_id,
            paid_today: partial.paid_today,
            remaining: partial.remaining,
            previous_total: sale.total(),
            total,
            notes,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use tally_core::partial::{is_partial, RESOLVED_MARKER};
    use tally_core::{NewSale, PartialPayment, PaymentMethod};

    fn service(store: &Arc<FlakyStore>) -> (ResolutionService, EventBus) {
        let events = EventBus::new();
        let dyn_store: Arc<dyn LedgerStore> = store.clone();
        (ResolutionService::new(dyn_store, events.clone()), events)
    }

    fn legacy_partial() -> String {
        PartialPayment::new(Money::from_cents(3000), Money::from_cents(2000))
            .with_notes("pay friday")
            .encode()
    }

    #[tokio::test]
    async fn test_resolves_legacy_annotation() {
        let store = FlakyStore::new().await;
        let scope = Scope::tenant(1);
        let notes = format!("Table 4\n\n{}", legacy_partial());
        let sale = store.sale_with_items(&scope, Some(notes), 3000, &[]).await;
        let (service, events) = service(&store);
        let mut rx = events.subscribe();

        let report = service.resolve_partial_payment(scope, sale.id).await.unwrap();
        assert_eq!(report.total, Money::from_cents(5000));
        assert_eq!(report.previous_total, Money::from_cents(3000));

        let stored = store.db.sales().get_scoped(&scope, sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 5000);
        let stored_notes = stored.notes.clone().unwrap();
        assert!(!is_partial(&stored_notes));
        assert_eq!(stored_notes, format!("Table 4\n\n{RESOLVED_MARKER}"));
        assert!(!stored.payment_state().is_partial());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            LedgerEvent::SaleResolved {
                scope,
                sale_id: sale.id,
                total_cents: 5000,
            }
        );
    }

    #[tokio::test]
    async fn test_resolves_structured_partial() {
        let store = FlakyStore::new().await;
        let scope = Scope::branch(1, 2);
        let new_sale = NewSale {
            total_cents: 1500,
            payment_method: PaymentMethod::MobileMoney,
            customer_id: None,
            cashier_id: None,
            discount_cents: 0,
            notes: None,
            partial: Some(PartialPayment::new(
                Money::from_cents(1500),
                Money::from_cents(500),
            )),
        };
        let sale = store.db.sales().insert_sale(&scope, &new_sale).await.unwrap();
        let (service, _) = service(&store);

        let report = service.resolve_partial_payment(scope, sale.id).await.unwrap();
        assert_eq!(report.total.cents(), 2000);

        let stored = store.db.sales().get_scoped(&scope, sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 2000);
        assert!(stored.partial_paid_cents.is_none());
        assert_eq!(stored.notes.as_deref(), Some(RESOLVED_MARKER));
    }

    #[tokio::test]
    async fn test_second_resolution_is_rejected_without_writes() {
        let store = FlakyStore::new().await;
        let scope = Scope::tenant(1);
        let sale = store
            .sale_with_items(&scope, Some(legacy_partial()), 3000, &[])
            .await;
        let (service, _) = service(&store);

        service.resolve_partial_payment(scope, sale.id).await.unwrap();
        let writes = store.writes();

        let err = service.resolve_partial_payment(scope, sale.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(store.writes(), writes);

        let stored = store.db.sales().get_scoped(&scope, sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 5000);
    }

    #[tokio::test]
    async fn test_full_sale_is_invalid_state() {
        let store = FlakyStore::new().await;
        let scope = Scope::tenant(1);
        let sale = store
            .sale_with_items(&scope, Some("Counter sale".into()), 4200, &[])
            .await;
        let (service, _) = service(&store);

        let err = service.resolve_partial_payment(scope, sale.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_other_tenant_is_not_found() {
        let store = FlakyStore::new().await;
        let sale = store
            .sale_with_items(&Scope::tenant(1), Some(legacy_partial()), 3000, &[])
            .await;
        let (service, _) = service(&store);

        let err = service
            .resolve_partial_payment(Scope::tenant(2), sale.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let missing = service
            .resolve_partial_payment(Scope::tenant(1), 9999)
            .await
            .unwrap_err();
        assert!(matches!(missing, EngineError::NotFound { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_rejected_without_writes() {
        let store = FlakyStore::new().await;
        let scope = Scope::tenant(1);
        let notes = "PARTIAL PAYMENT\nAmount Paid Today: €90000000000000000\nRemaining Balance: €90000000000000000";
        let sale = store
            .sale_with_items(&scope, Some(notes.to_string()), 3000, &[])
            .await;
        let (service, _) = service(&store);

        let err = service.resolve_partial_payment(scope, sale.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(ref msg) if msg.contains("overflows")));
        assert_eq!(store.writes(), 0);

        let stored = store.db.sales().get_scoped(&scope, sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 3000);
        assert_eq!(stored.notes.as_deref(), Some(notes));
    }

    #[tokio::test]
    async fn test_concurrent_change_is_not_overwritten() {
        let store = FlakyStore::new().await;
        let scope = Scope::tenant(1);
        let sale = store
            .sale_with_items(&scope, Some(legacy_partial()), 3000, &[])
            .await;
        let (service, events) = service(&store);
        let mut rx = events.subscribe();

        store.race_resolve();
        let err = service.resolve_partial_payment(scope, sale.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(ref msg) if msg.contains("changed")));

        let stored = store.db.sales().get_scoped(&scope, sale.id).await.unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("Resolved at another till"));
        assert!(rx.try_recv().is_err());
    }
}
