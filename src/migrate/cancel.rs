//! Cooperative cancellation shared by pipeline stages.
//!
//! A token is a channel nobody ever sends on. Cancelling drops the sender,
//! which makes every receiver ready at once, so a blocked `select!` wakes up
//! without polling.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use super::MigrateError;

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Token cancelled whenever `self` is, and cancellable on its own.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
        drop(children);
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.inner.signal.try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }

    /// Receiver that becomes ready once the token is cancelled.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Blocking send that gives up when the token is cancelled or the
    /// receiving stage has gone away.
    pub fn send<T>(&self, tx: &Sender<T>, msg: T) -> Result<(), MigrateError> {
        crossbeam::select! {
            send(tx, msg) -> res => res.map_err(|_| MigrateError::Cancelled),
            recv(self.inner.signal) -> _ => Err(MigrateError::Cancelled),
        }
    }

    /// Blocking receive. `Ok(None)` means the sending stage finished.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Result<Option<T>, MigrateError> {
        crossbeam::select! {
            recv(rx) -> msg => Ok(msg.ok()),
            recv(self.inner.signal) -> _ => Err(MigrateError::Cancelled),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn cancel(&self) {
        let trigger = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(trigger);
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
