// src/future/combinators.rs

//! Continuation composition over cancellable futures.

use super::promise::{pair, CancellableFuture, Resolution, ScopedPromise};
use crate::result::collapse_nested;

impl<T: Send + 'static> CancellableFuture<T> {
    /// Runs `continuation` with the resolved value; a cancelled resolution
    /// is discarded.
    pub fn if_not_cancelled(self, continuation: impl FnOnce(T) + Send + 'static) {
        self.on_resolved(move |resolution| {
            if let Ok(value) = resolution {
                continuation(value);
            }
        });
    }

    /// Chains `continuation` over the resolution, yielding a future for its
    /// return value.
    ///
    /// The returned future always resolves to a value: cancellation of the
    /// input is handed to `continuation` inside the [`Resolution`] rather
    /// than short-circuiting the chain.
    pub fn next<U: Send + 'static>(
        self,
        continuation: impl FnOnce(Resolution<T>) -> U + Send + 'static,
    ) -> CancellableFuture<U> {
        let (chain_promise, chain_future) = pair();
        self.on_resolved(move |resolution| {
            chain_promise.fulfill(continuation(resolution));
        });
        chain_future
    }

}

impl<T: Send + 'static, E: Send + 'static> CancellableFuture<Result<T, E>> {
    /// Folds promise cancellation into the carried error arm, producing a
    /// future whose cancellation case is unreachable.
    pub fn collapse_cancelled_to_error(self, error_if_cancelled: E) -> CancellableFuture<Result<T, E>> {
        self.next(move |resolution| collapse_nested(resolution, |_| error_if_cancelled))
    }
}

/// Folds the resolutions of `futures` into a single future.
///
/// The aggregate resolves once every input has resolved, carrying
/// `fold(.. fold(fold(initial, r0), r1) .., rN)`; fold order follows input
/// order regardless of the order in which the inputs resolve. `fold` sees
/// every resolution, cancelled or not.
pub fn aggregate_futures<T, A, F>(
    futures: Vec<CancellableFuture<T>>,
    initial: A,
    fold: F,
) -> CancellableFuture<A>
where
    T: Send + 'static,
    A: Send + 'static,
    F: FnMut(A, Resolution<T>) -> A + Send + 'static,
{
    let (aggregate_promise, aggregate_future) = pair();
    fold_next(futures.into_iter(), initial, fold, aggregate_promise);
    aggregate_future
}

/// Chains onto the head future; the tail stays alive inside the
/// continuation until the whole set has resolved.
fn fold_next<T, A, F>(
    mut rest: std::vec::IntoIter<CancellableFuture<T>>,
    accumulator: A,
    mut fold: F,
    aggregate_promise: ScopedPromise<A>,
) where
    T: Send + 'static,
    A: Send + 'static,
    F: FnMut(A, Resolution<T>) -> A + Send + 'static,
{
    match rest.next() {
        None => aggregate_promise.fulfill(accumulator),
        Some(head) => head.on_resolved(move |resolution| {
            let accumulator = fold(accumulator, resolution);
            fold_next(rest, accumulator, fold, aggregate_promise);
        }),
    }
}
