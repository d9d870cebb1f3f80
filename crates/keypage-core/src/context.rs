//! Cancellation context passed into every fetch.

use tokio::sync::watch;

/// Caller-side cancellation signal.
///
/// Cloning a context shares the same signal.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: watch::Receiver<bool>,
}

/// Handle that fires a [`Context`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { cancelled: rx }
    }

    /// A context paired with a handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { cancelled: rx }, CancelHandle { tx })
    }

    /// Check if the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the signal fires. Never resolves for a background context.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without firing.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl CancelHandle {
    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Check if the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}
