// src/lib.rs

//! Staged execution scheduling.
//!
//! A [`Scheduler`] coordinates work organised into named stages. Stages
//! declare prerequisite stages, hold zero or more tasks, and notify their
//! dependents on completion. The plumbing between those events is a
//! single-shot [`ScopedPromise`]/[`CancellableFuture`] pair whose future is
//! guaranteed to resolve (with a value, or with [`Cancelled`] when the
//! promise is dropped unfulfilled), so dependents can never deadlock on a
//! torn-down producer.
//!
//! Registration is order-free: tasks may be added to and dependencies
//! declared on stages that have not been defined yet.
//!
//! The `inspection` cargo feature (default-on) adds dependency-cycle
//! detection at [`Scheduler::add_stage`] time plus per-stage
//! waiting/execution timing. Without it, those structures vanish and a
//! cyclic dependency simply never clears its prerequisites.

pub mod errors;
pub mod future;
pub mod id;
pub mod result;
pub mod scheduler;
pub mod stage;

mod inspect;

pub use errors::{
    AddStageError, AllTasksCollectedError, StageAlreadyAddedError, StageCircularDependencyError,
};
pub use future::{aggregate_futures, pair, CancellableFuture, Cancelled, Resolution, ScopedPromise};
pub use id::StageId;
pub use inspect::INSPECTION_ENABLED;
pub use scheduler::Scheduler;
pub use stage::{
    FutureStageCompletion, FutureTaskCompletion, FutureTaskExecution, StageCompletionPromise,
    StageStateId, TaskCompletionPromise, TaskExecutionPromise,
};
