// src/stage/mod.rs

//! Stage lifecycle: the four-state machine and its transition functions.

mod state;
mod transitions;

pub use state::{
    FutureStageCompletion, FutureTaskCompletion, FutureTaskExecution, StageCompletionPromise,
    StageStateId, TaskCompletionPromise, TaskExecutionPromise,
};

pub(crate) use state::StageState;
pub(crate) use transitions::{Effect, StageOps};
