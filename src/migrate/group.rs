//! Error-group over scoped threads.
//!
//! Tasks share one cancel token. The first failure is kept and cancels the
//! rest; a later causal failure replaces an earlier `Cancelled`, so callers
//! see why the group stopped rather than that it stopped.

use std::panic;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Scope, ScopedJoinHandle};

use super::{CancelToken, MigrateError};
use crate::Error;

pub struct TaskGroup<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    token: CancelToken,
    failure: Arc<Mutex<Option<Error>>>,
}

/// Handle to one spawned task; redeem it with [`TaskGroup::join`].
pub struct Task<'scope, T> {
    handle: ScopedJoinHandle<'scope, Option<T>>,
}

impl<'scope, 'env: 'scope> TaskGroup<'scope, 'env> {
    /// New group whose token is a child of `parent`.
    pub fn new(scope: &'scope Scope<'scope, 'env>, parent: &CancelToken) -> Self {
        Self {
            scope,
            token: parent.child(),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Runs `f` on a named thread. `f` receives the group token and should
    /// stop promptly once it is cancelled.
    pub fn spawn<T, F>(&self, name: &str, f: F) -> Result<Task<'scope, T>, Error>
    where
        T: Send + 'scope,
        F: FnOnce(&CancelToken) -> Result<T, Error> + Send + 'scope,
    {
        let token = self.token.clone();
        let failure = Arc::clone(&self.failure);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn_scoped(self.scope, move || match f(&token) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(error = %err, "task failed, cancelling group");
                    record(&failure, err);
                    token.cancel();
                    None
                }
            });
        match spawned {
            Ok(handle) => Ok(Task { handle }),
            Err(source) => {
                self.token.cancel();
                Err(MigrateError::Spawn {
                    name: name.to_string(),
                    source,
                }
                .into())
            }
        }
    }

    /// Waits for `task`. Panics in the task are re-raised here.
    pub fn join<T>(&self, task: Task<'scope, T>) -> Result<T, Error> {
        match task.handle.join() {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(MigrateError::Cancelled.into()),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// The group's first causal failure, if any task failed.
    pub fn finish(self) -> Result<(), Error> {
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record(slot: &Mutex<Option<Error>>, err: Error) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let replace = match slot.as_ref() {
        None => true,
        Some(existing) => existing.is_cancelled() && !err.is_cancelled(),
    };
    if replace {
        *slot = Some(err);
    }
}
