use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cloneable cancellation handle.
///
/// A task checks [`AbortHandle::is_requested`] before it starts and awaits
/// [`AbortHandle::notified`] inside its `select!` loop while transport is in
/// flight. Requests are idempotent and sticky until the owning task observes
/// them.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread, any number of times.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a waiter that parks later still wakes
        self.inner.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request so the owning task can be restarted.
    pub fn reset(&self) {
        self.inner.requested.store(false, Ordering::SeqCst);
    }

    /// Resolves once cancellation has been requested.
    pub async fn notified(&self) {
        // re-check after every wakeup: a stale permit from an already
        // consumed request must not look like a fresh one
        while !self.is_requested() {
            self.inner.notify.notified().await;
        }
    }
}
