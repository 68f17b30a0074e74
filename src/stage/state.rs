// src/stage/state.rs

//! Per-stage state data.
//!
//! Stage lifecycle:
//! 1. `Undefined`: the id has been mentioned (as a prerequisite or a task
//!    host) but `add_stage` has not been called for it yet.
//! 2. `Defined`: prerequisites are declared, waiting for them to complete.
//! 3. `Executing`: prerequisites cleared, tasks released.
//! 4. `Completed`: every task finished and the task set was closed.
//!
//! Tasks are accepted in states 1 to 3 until the task set is closed.

use crate::future::{CancellableFuture, ScopedPromise};

/// Promise a stage fulfils towards one dependent when it completes.
pub type StageCompletionPromise = ScopedPromise<()>;
/// Resolves when the prerequisite stage completes.
pub type FutureStageCompletion = CancellableFuture<()>;

/// Promise the task's owner fulfils when the task's work is done.
pub type TaskCompletionPromise = ScopedPromise<()>;
/// Resolves when a released task finishes its work.
pub type FutureTaskCompletion = CancellableFuture<()>;

/// Promise the scheduler fulfils with a fresh [`TaskCompletionPromise`] to
/// release a task for execution.
pub type TaskExecutionPromise = ScopedPromise<TaskCompletionPromise>;
/// Handed out at task registration; resolves once the task's stage starts
/// executing.
pub type FutureTaskExecution = CancellableFuture<TaskCompletionPromise>;

/// Read-only view of where a stage is in its lifecycle.
///
/// Ordered: a stage only ever moves forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageStateId {
    Undefined,
    Defined,
    Executing,
    Completed,
}

/// A task registered before its stage reached `Executing`.
pub(crate) struct PendingTask<Id> {
    pub task_id: Id,
    pub execution_promise: TaskExecutionPromise,
}

/// A released task the stage still waits on.
pub(crate) struct ExecutingTask<Id> {
    pub task_id: Id,
    pub future_completion: FutureTaskCompletion,
}

/// Payload shared by the `Undefined` and `Defined` states.
pub(crate) struct PendingStage<Id> {
    pub stage_id: Id,
    pub all_tasks_added: bool,
    pub tasks: Vec<PendingTask<Id>>,
    pub completion_promises: Vec<StageCompletionPromise>,
}

impl<Id> PendingStage<Id> {
    pub fn new(stage_id: Id) -> Self {
        Self {
            stage_id,
            all_tasks_added: false,
            tasks: Vec::new(),
            completion_promises: Vec::new(),
        }
    }
}

pub(crate) struct DefinedStage<Id> {
    pub pending: PendingStage<Id>,
    /// One completion future per declared prerequisite, drained back to
    /// front while waiting.
    pub future_prerequisites: Vec<FutureStageCompletion>,
}

pub(crate) struct ExecutingStage<Id> {
    pub stage_id: Id,
    pub all_tasks_added: bool,
    /// Released tasks not yet handed to the drain loop.
    pub tasks: Vec<ExecutingTask<Id>>,
    /// Completions the drain loop has subscribed to but which have not
    /// resolved yet. The stage must not complete while any are outstanding.
    pub in_flight: usize,
    pub completion_promises: Vec<StageCompletionPromise>,
}

pub(crate) enum StageState<Id> {
    Undefined(PendingStage<Id>),
    Defined(DefinedStage<Id>),
    Executing(ExecutingStage<Id>),
    Completed { stage_id: Id },
}

impl<Id> StageState<Id> {
    pub fn state_id(&self) -> StageStateId {
        match self {
            StageState::Undefined(_) => StageStateId::Undefined,
            StageState::Defined(_) => StageStateId::Defined,
            StageState::Executing(_) => StageStateId::Executing,
            StageState::Completed { .. } => StageStateId::Completed,
        }
    }

    /// The dependent-notification list, absent once the stage completed.
    pub fn completion_promises_mut(&mut self) -> Option<&mut Vec<StageCompletionPromise>> {
        match self {
            StageState::Undefined(pending) => Some(&mut pending.completion_promises),
            StageState::Defined(defined) => Some(&mut defined.pending.completion_promises),
            StageState::Executing(executing) => Some(&mut executing.completion_promises),
            StageState::Completed { .. } => None,
        }
    }
}
