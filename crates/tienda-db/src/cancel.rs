//! # Cancellation
//!
//! Every repository future can be cancelled by dropping it. This module
//! adds an explicit signal for callers that hand the cancel decision to
//! another task (e.g. a screen being closed).
//!
//! ```rust,ignore
//! let (handle, signal) = cancel_pair();
//! let orders = cancellable(signal, db.orders().get_orders_by_user(7));
//!
//! // elsewhere
//! handle.cancel();
//!
//! assert!(matches!(orders.await, Err(DbError::Cancelled)));
//! ```
//!
//! Dropping the inner future releases its connection guard and rolls back
//! any open transaction, so a cancelled write commits nothing.

use std::future::Future;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Creates a connected handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Fires the cancellation. Dropping the handle without calling
/// [`CancelHandle::cancel`] never cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every signal derived from this handle.
    pub fn cancel(&self) {
        // send_replace succeeds even with no receivers left
        self.tx.send_replace(true);
    }

    /// Another signal bound to this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// True once the handle has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the handle fires; pends forever if the handle is
    /// dropped without firing.
    pub async fn cancelled(&mut self) {
        let fired = self.rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs `fut` unless `signal` fires first.
///
/// ## Returns
/// * the future's own result if it finishes first
/// * `Err(DbError::Cancelled)` if the signal fires first (checked before
///   the future is polled, so an already-cancelled signal never starts it)
pub async fn cancellable<T, F>(mut signal: CancelSignal, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    tokio::select! {
        biased;

        _ = signal.cancelled() => {
            debug!("Operation cancelled by caller");
            Err(DbError::Cancelled)
        }

        result = fut => result,
    }
}
