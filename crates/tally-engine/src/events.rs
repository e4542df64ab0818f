//! # Ledger Events
//!
//! Notifications published after a state transition has been committed.
//! Front-ends subscribe to refetch their visible collections.
//!
//! ```text
//! ResolutionService ──┐
//! ReversalService   ──┼──► EventBus (broadcast) ──► subscribers
//! CatalogService    ──┘
//! ```
//!
//! Publishing never fails the operation that triggered it. Having no
//! subscribers is normal.

use serde::{Deserialize, Serialize};
use tally_core::Scope;
use tokio::sync::broadcast;
use tracing::trace;
use ts_rs::TS;

/// Capacity of the event channel. Slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A committed change to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A partial payment was marked fully paid.
    SaleResolved {
        scope: Scope,
        sale_id: i64,
        total_cents: i64,
    },

    /// A sale was deleted and its stock restored.
    SaleDeleted {
        scope: Scope,
        sale_id: i64,
        restocked_items: usize,
    },

    /// A product was created, updated or deleted.
    CatalogChanged { scope: Scope, product_id: String },
}

/// Cloneable publisher for [`LedgerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventBus { tx }
    }

    /// Publishes an event to current subscribers.
    pub fn publish(&self, event: LedgerEvent) {
        // Err only means nobody is listening.
        if self.tx.send(event).is_err() {
            trace!("Ledger event dropped, no subscribers");
        }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
