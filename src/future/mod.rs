// src/future/mod.rs

//! Single-shot cancellable promise/future plumbing: a promise that always
//! resolves its future ([`Cancelled`] when dropped unfulfilled), and
//! continuation combinators over the resulting futures.

mod combinators;
mod promise;

pub use combinators::aggregate_futures;
pub use promise::{pair, CancellableFuture, Cancelled, Resolution, ScopedPromise};
