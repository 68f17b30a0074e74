// src/future/promise.rs

//! Single-shot promise/future pair whose future is guaranteed to resolve.
//!
//! A [`ScopedPromise`] that is dropped before being fulfilled resolves its
//! paired [`CancellableFuture`] with [`Cancelled`]. That guarantee is what
//! keeps dependents from deadlocking: every observer eventually sees
//! *something*, even when the producing side is torn down mid-flight.
//!
//! Continuations run synchronously on whichever thread resolves the
//! promise (or on the subscribing thread when the resolution is already
//! available).

use std::fmt;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};

/// Marker resolution for a promise that was dropped unfulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// What a [`CancellableFuture`] resolves to.
pub type Resolution<T> = Result<T, Cancelled>;

enum Slot<T> {
    /// No resolution yet, nobody listening.
    Pending,
    /// No resolution yet; a continuation waits for it.
    Waiting(Box<dyn FnOnce(Resolution<T>) + Send>),
    /// Resolved; the resolution has not been consumed yet.
    Resolved(Resolution<T>),
    /// Resolved and delivered.
    Spent,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Creates a connected promise/future pair.
pub fn pair<T: Send + 'static>() -> (ScopedPromise<T>, CancellableFuture<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    let future = CancellableFuture {
        shared: Arc::clone(&shared),
    };
    (ScopedPromise { shared: Some(shared) }, future)
}

/// Single-shot sender half. Fulfilment consumes the promise; dropping an
/// unfulfilled promise resolves the paired future with [`Cancelled`].
///
/// Moving the promise transfers fulfilment responsibility: a moved-from
/// promise runs no destructor, so the cancellation marker is never written
/// twice.
pub struct ScopedPromise<T: Send + 'static> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Send + 'static> ScopedPromise<T> {
    /// Resolves the paired future with `value`.
    pub fn fulfill(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, Ok(value));
        }
    }
}

impl<T: Send + 'static> Drop for ScopedPromise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, Err(Cancelled));
        }
    }
}

fn resolve<T>(shared: &Shared<T>, resolution: Resolution<T>) {
    let mut slot = shared.slot.lock().unwrap();
    match mem::replace(&mut *slot, Slot::Spent) {
        Slot::Pending => {
            *slot = Slot::Resolved(resolution);
            shared.ready.notify_all();
        }
        Slot::Waiting(continuation) => {
            // Run the continuation on this thread, outside the slot lock so
            // it may itself resolve or subscribe to futures.
            drop(slot);
            continuation(resolution);
        }
        // A promise resolves at most once (fulfilment consumes it and the
        // drop path checks the handle), so the slot can never already hold
        // a resolution here.
        state @ (Slot::Resolved(_) | Slot::Spent) => *slot = state,
    }
}

/// Receiver half: resolves exactly once, with a value or with [`Cancelled`].
pub struct CancellableFuture<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> fmt::Debug for CancellableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableFuture").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> CancellableFuture<T> {
    /// Whether a resolution is already available.
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.slot.lock().unwrap(), Slot::Resolved(_))
    }

    /// Registers `continuation` to run exactly once with the resolution.
    ///
    /// If the future is already resolved the continuation runs inline on
    /// the calling thread; otherwise it runs later on the thread that
    /// resolves the promise.
    pub fn on_resolved(self, continuation: impl FnOnce(Resolution<T>) + Send + 'static) {
        let resolution = {
            let mut slot = self.shared.slot.lock().unwrap();
            match mem::replace(&mut *slot, Slot::Spent) {
                Slot::Pending => {
                    *slot = Slot::Waiting(Box::new(continuation));
                    return;
                }
                Slot::Resolved(resolution) => resolution,
                Slot::Waiting(_) | Slot::Spent => unreachable!("future observed twice"),
            }
        };
        continuation(resolution);
    }

    /// Blocks until the resolution arrives and consumes it.
    ///
    /// The scheduler itself never blocks; this exists for callers bridging
    /// into blocking code (and for tests).
    pub fn wait(self) -> Resolution<T> {
        let mut slot = self.shared.slot.lock().unwrap();
        loop {
            match mem::replace(&mut *slot, Slot::Spent) {
                Slot::Resolved(resolution) => return resolution,
                state @ (Slot::Pending | Slot::Waiting(_)) => {
                    *slot = state;
                    slot = self.shared.ready.wait(slot).unwrap();
                }
                Slot::Spent => unreachable!("future consumed twice"),
            }
        }
    }
}
