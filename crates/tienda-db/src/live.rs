//! # Live Queries
//!
//! A query that yields its full result set now, and again after every
//! committed write to its table.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LiveQuery::next()                                │
//! │                                                                         │
//! │  first call ──────────────────────────────┐                            │
//! │                                           ▼                             │
//! │  later calls                         SELECT ... ──► Some(Ok(rows))     │
//! │       │                                   ▲                             │
//! │       ▼                                   │                             │
//! │  wait for ChangeEvent ──► drain burst ────┘                            │
//! │       │                                                                 │
//! │       ├── cancel signal fired ──► None (and None forever after)        │
//! │       └── pool closed         ──► None                                 │
//! │                                                                         │
//! │  Drop the LiveQuery to unsubscribe. Nothing else is released.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Emissions are full snapshots, not diffs. Several writes landing before
//! the consumer calls `next()` again collapse into one snapshot.

use std::fmt;
use std::marker::PhantomData;

use futures_util::stream::{self, Stream};
use tracing::{debug, trace};

use crate::cancel::{cancellable, CancelSignal};
use crate::error::{DbError, DbResult};
use crate::notify::{Table, TableSubscription};
use crate::schema::Record;
use crate::store::Store;

/// Re-running query over one table.
pub struct LiveQuery<T> {
    store: Store,
    subscription: TableSubscription,
    sql: String,
    primed: bool,
    finished: bool,
    cancel: Option<CancelSignal>,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("table", &self.subscription.table())
            .field("sql", &self.sql)
            .field("primed", &self.primed)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<T: Record> LiveQuery<T> {
    /// Subscribes before the first read so no write can slip between the
    /// initial snapshot and the subscription.
    pub(crate) fn new(store: Store, sql: String) -> Self {
        let subscription = store.notifier().subscribe(T::TABLE);
        debug!(table = %T::TABLE, "Live query opened");

        LiveQuery {
            store,
            subscription,
            sql,
            primed: false,
            finished: false,
            cancel: None,
            _record: PhantomData,
        }
    }

    /// Ends the query when `signal` fires, including mid-read.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Table this query follows.
    pub fn table(&self) -> Table {
        T::TABLE
    }

    /// Next snapshot.
    ///
    /// ## Returns
    /// * `Some(Ok(rows))` - current rows in query order
    /// * `Some(Err(e))` - this read failed; later calls may succeed
    /// * `None` - cancelled, or the database was closed
    pub async fn next(&mut self) -> Option<DbResult<Vec<T>>> {
        if self.finished || self.is_cancelled() {
            return self.finish();
        }

        if self.primed {
            let event = match self.cancel.as_mut() {
                Some(signal) => tokio::select! {
                    biased;

                    _ = signal.cancelled() => None,
                    event = self.subscription.changed() => event,
                },
                None => self.subscription.changed().await,
            };

            let Some(event) = event else {
                return self.finish();
            };

            let coalesced = self.subscription.drain();
            trace!(table = %T::TABLE, version = event.version, coalesced, "Re-running live query");
        }

        if self.store.pool().is_closed() {
            return self.finish();
        }

        let result = match self.cancel.clone() {
            Some(signal) => cancellable(signal, self.fetch()).await,
            None => self.fetch().await,
        };
        self.primed = true;

        match result {
            Err(DbError::Cancelled) => self.finish(),
            Err(e) if self.store.pool().is_closed() => {
                debug!(error = %e, "Live query read failed on closed pool");
                self.finish()
            }
            other => Some(other),
        }
    }

    /// Adapts the query into a `Stream` of snapshots.
    pub fn into_stream(self) -> impl Stream<Item = DbResult<Vec<T>>> {
        stream::unfold(self, |mut query| async move {
            query.next().await.map(|rows| (rows, query))
        })
    }

    async fn fetch(&self) -> DbResult<Vec<T>> {
        let mut conn = self.store.acquire().await?;
        let rows = sqlx::query_as::<_, T>(&self.sql)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    fn finish(&mut self) -> Option<DbResult<Vec<T>>> {
        if !self.finished {
            self.finished = true;
            debug!(table = %T::TABLE, "Live query finished");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tienda_core::CartItem;
    use tokio::time::timeout;

    use crate::cancel::cancel_pair;
    use crate::pool::{Database, DbConfig};

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_first_emission_is_immediate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut live = db.cart().get_all();

        let rows = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_burst_collapses_into_one_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cart = db.cart();
        let mut live = cart.get_all();
        live.next().await.unwrap().unwrap();

        cart.insert(&CartItem::new(1, None, 1.0, 1)).await.unwrap();
        cart.insert(&CartItem::new(2, None, 2.0, 1)).await.unwrap();

        let rows = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_ends_waiting_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (handle, signal) = cancel_pair();
        let mut live = db.cart().get_all().with_cancel(signal);
        live.next().await.unwrap().unwrap();

        let waiter = tokio::spawn(async move {
            let ended = live.next().await.is_none();
            (ended, live)
        });
        handle.cancel();

        let (ended, mut live) = timeout(WAIT, waiter).await.unwrap().unwrap();
        assert!(ended);
        assert!(live.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_ends_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut live = db.cart().get_all();
        live.next().await.unwrap().unwrap();

        db.close().await;

        assert!(timeout(WAIT, live.next()).await.unwrap().is_none());
    }
}
