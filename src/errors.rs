// src/errors.rs

//! Typed errors with stable, user-facing `Display` renderings.
//!
//! The rendered strings are part of the public contract (they surface in
//! host-application logs), so tests pin them character for character.

use std::fmt;

use thiserror::Error;

use crate::id::StageId;

/// A second `add_stage` arrived for an id that is already defined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stage \"{stage_id}\" has already been added. Aborting operation.")]
pub struct StageAlreadyAddedError<Id: StageId> {
    pub stage_id: Id,
}

/// Accepting the stage would close a dependency cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Adding stage \"{stage_id}\" with prerequisite(s) {} would introduce cycle {}. Aborting operation.",
    braced_id_list(.prerequisite_ids),
    cycle_path(.cycle)
)]
pub struct StageCircularDependencyError<Id: StageId> {
    pub stage_id: Id,
    /// Prerequisites in declared order.
    pub prerequisite_ids: Vec<Id>,
    /// Ids in discovery order, starting and ending at the repeated id.
    pub cycle: Vec<Id>,
}

/// A task arrived after `set_all_tasks_added` closed the stage's task set,
/// or after the stage already completed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Stage \"{stage_id}\" is no longer collecting tasks, task \"{task_id}\" rejected. Aborting operation.")]
pub struct AllTasksCollectedError<Id: StageId> {
    pub stage_id: Id,
    pub task_id: Id,
}

/// Everything `add_stage` can reject.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddStageError<Id: StageId> {
    #[error(transparent)]
    AlreadyAdded(#[from] StageAlreadyAddedError<Id>),
    #[error(transparent)]
    CircularDependency(#[from] StageCircularDependencyError<Id>),
}

/// Renders `{"a", "b", "c"}`.
fn braced_id_list<Id: fmt::Display>(ids: &[Id]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
    format!("{{{}}}", quoted.join(", "))
}

/// Renders `"a" -> "b" -> "a"`.
fn cycle_path<Id: fmt::Display>(ids: &[Id]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
    quoted.join(" -> ")
}
