//! # Table Change Notification
//!
//! Publish/subscribe channel keyed by table. Repositories publish after a
//! write commits; live queries subscribe and re-run on every event.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Change Notification                                  │
//! │                                                                         │
//! │  CartRepository::insert                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ─── failed? ──► nothing published                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ChangeNotifier::publish(Table::CartItems)                             │
//! │       │                                                                 │
//! │       ├──► TableSubscription (LiveQuery A) ──► re-run SELECT           │
//! │       └──► TableSubscription (LiveQuery B) ──► re-run SELECT           │
//! │                                                                         │
//! │  Events carry no row data: subscribers always re-read the full set.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One `tokio::sync::broadcast` channel exists per table for the lifetime
//! of the [`ChangeNotifier`]. A subscriber that falls behind skips the
//! events it missed; since every event means "re-read", nothing is lost.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// Default buffered events per table before slow subscribers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Table
// =============================================================================

/// Tables owned by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    CartItems,
    Orders,
    OrderItems,
}

impl Table {
    /// Every table, in schema order.
    pub const ALL: [Table; 3] = [Table::CartItems, Table::Orders, Table::OrderItems];

    /// SQL name of the table.
    pub const fn name(self) -> &'static str {
        match self {
            Table::CartItems => "cart_items",
            Table::Orders => "orders",
            Table::OrderItems => "order_items",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Change Event
// =============================================================================

/// A committed write touched `table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    /// Per-table counter, incremented on every publish.
    pub version: u64,
}

#[derive(Debug)]
struct TableChannel {
    tx: broadcast::Sender<ChangeEvent>,
    version: AtomicU64,
}

// =============================================================================
// Notifier
// =============================================================================

/// Shared hub for table change events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    channels: Arc<HashMap<Table, TableChannel>>,
}

impl ChangeNotifier {
    /// Creates a notifier with one channel per table.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let channels = Table::ALL
            .into_iter()
            .map(|table| {
                let (tx, _) = broadcast::channel(capacity);
                (
                    table,
                    TableChannel {
                        tx,
                        version: AtomicU64::new(0),
                    },
                )
            })
            .collect();

        ChangeNotifier {
            channels: Arc::new(channels),
        }
    }

    fn channel(&self, table: Table) -> &TableChannel {
        // Populated for every Table variant in new()
        &self.channels[&table]
    }

    /// Announces that a committed write touched `table`.
    ///
    /// Having no subscribers is normal and not an error.
    pub fn publish(&self, table: Table) -> ChangeEvent {
        let channel = self.channel(table);
        let version = channel.version.fetch_add(1, Ordering::AcqRel) + 1;
        let event = ChangeEvent { table, version };

        let delivered = channel.tx.send(event).unwrap_or(0);
        debug!(table = %table, version, delivered, "Published table change");

        event
    }

    /// Subscribes to changes of one table.
    ///
    /// Only events published after this call are observed.
    pub fn subscribe(&self, table: Table) -> TableSubscription {
        TableSubscription {
            table,
            rx: self.channel(table).tx.subscribe(),
        }
    }

    /// Number of live subscriptions on `table`.
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.channel(table).tx.receiver_count()
    }

    /// Latest version published for `table` (0 if never written).
    pub fn version(&self, table: Table) -> u64 {
        self.channel(table).version.load(Ordering::Acquire)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        ChangeNotifier::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Receiving end for one table. Dropping it detaches the subscriber.
#[derive(Debug)]
pub struct TableSubscription {
    table: Table,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl TableSubscription {
    /// The table this subscription follows.
    pub fn table(&self) -> Table {
        self.table
    }

    /// Waits for the next change.
    ///
    /// ## Returns
    /// * `Some(event)` - a write committed
    /// * `None` - the notifier is gone, no further events will arrive
    pub async fn changed(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(table = %self.table, skipped, "Change subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Discards already-queued events, returning how many were dropped.
    ///
    /// Used to coalesce a burst of writes into a single re-read.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => drained += 1,
                Err(TryRecvError::Lagged(skipped)) => drained += skipped as usize,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return drained,
            }
        }
    }
}
