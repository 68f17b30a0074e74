// src/stage/transitions.rs

//! Stage lifecycle transitions.
//!
//! [`StageOps`] borrows the registry for the duration of one locked
//! scheduler operation and applies state changes. Anything that would run
//! user code (fulfilling a promise, attaching a continuation to a future)
//! is not performed here; it is queued as an [`Effect`] for the scheduler
//! to flush once the registry lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{AllTasksCollectedError, StageAlreadyAddedError};
use crate::future::pair;
use crate::id::StageId;
use crate::inspect::{Edge, Inspection, Phase};
use crate::stage::state::{
    DefinedStage, ExecutingStage, ExecutingTask, FutureStageCompletion, FutureTaskCompletion,
    FutureTaskExecution, PendingStage, PendingTask, StageCompletionPromise, StageState,
    TaskCompletionPromise, TaskExecutionPromise,
};

/// Deferred work queued under the registry lock and performed after it is
/// released.
pub(crate) enum Effect<Id> {
    /// Hand a completion promise to whichever continuation the caller
    /// attached to the task's execution future.
    ReleaseTask {
        execution_promise: TaskExecutionPromise,
        completion_promise: TaskCompletionPromise,
    },
    /// Resolve one dependent's stage-completion future.
    NotifyDependent { promise: StageCompletionPromise },
    /// Subscribe the prerequisite-wait loop to the next outstanding
    /// prerequisite of `stage_id`.
    WatchPrerequisite {
        stage_id: Id,
        future: FutureStageCompletion,
    },
    /// Subscribe the drain loop to a released task's completion.
    WatchTask {
        stage_id: Id,
        future: FutureTaskCompletion,
    },
}

/// Transition functions over the stage registry.
pub(crate) struct StageOps<'a, Id: StageId> {
    stages: &'a mut HashMap<Id, StageState<Id>>,
    inspection: &'a Arc<Inspection<Id>>,
    effects: &'a mut Vec<Effect<Id>>,
}

impl<'a, Id: StageId> StageOps<'a, Id> {
    pub fn new(
        stages: &'a mut HashMap<Id, StageState<Id>>,
        inspection: &'a Arc<Inspection<Id>>,
        effects: &'a mut Vec<Effect<Id>>,
    ) -> Self {
        Self {
            stages,
            inspection,
            effects,
        }
    }

    /// Looks the stage up, registering it as `Undefined` on first mention.
    fn entry<'m>(
        stages: &'m mut HashMap<Id, StageState<Id>>,
        stage_id: &Id,
    ) -> &'m mut StageState<Id> {
        stages
            .entry(stage_id.clone())
            .or_insert_with(|| StageState::Undefined(PendingStage::new(stage_id.clone())))
    }

    /// Registers `dependent_id` as a follow-up of `stage_id` and returns
    /// the future that resolves once `stage_id` completes. On an already
    /// completed stage the future is ready before this returns.
    pub fn add_follow_up(&mut self, stage_id: &Id, dependent_id: &Id) -> FutureStageCompletion {
        let (promise, future) = pair();
        match Self::entry(self.stages, stage_id).completion_promises_mut() {
            Some(promises) => {
                promises.push(promise);
                debug!(stage = %stage_id, dependent = %dependent_id, "added dependent stage");
            }
            None => {
                // Nothing can be subscribed to the future yet, so resolving
                // in place under the lock runs no callbacks.
                promise.fulfill(());
                debug!(
                    stage = %stage_id,
                    dependent = %dependent_id,
                    "added dependent stage, stage complete, notifying immediately"
                );
            }
        }
        future
    }

    /// Registers a task with `stage_id`, returning the future execution
    /// that resolves when the stage releases its tasks (immediately if it
    /// is already executing).
    pub fn add_task(
        &mut self,
        stage_id: &Id,
        task_id: Id,
    ) -> Result<FutureTaskExecution, AllTasksCollectedError<Id>> {
        match Self::entry(self.stages, stage_id) {
            StageState::Undefined(pending) | StageState::Defined(DefinedStage { pending, .. }) => {
                if pending.all_tasks_added {
                    return Err(AllTasksCollectedError {
                        stage_id: stage_id.clone(),
                        task_id,
                    });
                }

                let (execution_promise, future_execution) = pair();
                debug!(stage = %stage_id, task = %task_id, "added task, waiting for prerequisites");
                pending.tasks.push(PendingTask {
                    task_id,
                    execution_promise,
                });
                Ok(future_execution)
            }
            StageState::Executing(executing) => {
                if executing.all_tasks_added {
                    return Err(AllTasksCollectedError {
                        stage_id: stage_id.clone(),
                        task_id,
                    });
                }

                let (execution_promise, future_execution) = pair();
                let (completion_promise, future_completion) = pair();
                // The execution future has no subscriber until this call
                // returns it, so fulfilling under the lock only parks the
                // completion promise in the slot.
                execution_promise.fulfill(completion_promise);
                debug!(stage = %stage_id, task = %task_id, "added task, started execution");
                executing.tasks.push(ExecutingTask {
                    task_id,
                    future_completion,
                });
                Ok(future_execution)
            }
            StageState::Completed { .. } => {
                warn!(
                    stage = %stage_id,
                    task = %task_id,
                    "attempted to add task to a completed stage, ignored"
                );
                Err(AllTasksCollectedError {
                    stage_id: stage_id.clone(),
                    task_id,
                })
            }
        }
    }

    /// Closes the stage's task set. On an executing stage this may finish
    /// the drain; on a completed stage it is a no-op.
    pub fn set_all_tasks_added(&mut self, stage_id: &Id) {
        let mut drain_needed = false;
        match Self::entry(self.stages, stage_id) {
            StageState::Undefined(pending) | StageState::Defined(DefinedStage { pending, .. }) => {
                pending.all_tasks_added = true;
                debug!(stage = %stage_id, "all tasks added, waiting for prerequisites");
            }
            StageState::Executing(executing) => {
                executing.all_tasks_added = true;
                debug!(stage = %stage_id, "all tasks added, waiting for task completion");
                drain_needed = true;
            }
            StageState::Completed { .. } => {}
        }
        if drain_needed {
            self.drain(stage_id);
        }
    }

    /// Dispatches `add_stage` on the current variant: `Undefined` becomes
    /// `Defined` and starts waiting on its prerequisites; anything else is
    /// rejected without a state change.
    pub fn define_stage(
        &mut self,
        stage_id: &Id,
        future_prerequisites: Vec<FutureStageCompletion>,
    ) -> Result<(), StageAlreadyAddedError<Id>> {
        match Self::entry(self.stages, stage_id) {
            StageState::Undefined(_) => {}
            _ => {
                warn!(stage = %stage_id, "attempted to re-add an already added stage. Ignoring.");
                return Err(StageAlreadyAddedError {
                    stage_id: stage_id.clone(),
                });
            }
        }

        let Some(StageState::Undefined(pending)) = self.stages.remove(stage_id) else {
            unreachable!("variant checked above");
        };
        self.inspection
            .notify_change(stage_id, Phase::Waiting, Edge::Started);
        self.stages.insert(
            stage_id.clone(),
            StageState::Defined(DefinedStage {
                pending,
                future_prerequisites,
            }),
        );
        self.await_prerequisites(stage_id);
        Ok(())
    }

    /// One step of the prerequisite wait loop: watch the next outstanding
    /// prerequisite, or start executing when none remain.
    ///
    /// A cancelled prerequisite stops the loop, leaving the stage in
    /// `Defined`; prerequisite cancellation means the scheduler is being
    /// torn down.
    pub fn await_prerequisites(&mut self, stage_id: &Id) {
        let Some(StageState::Defined(defined)) = self.stages.get_mut(stage_id) else {
            return;
        };
        match defined.future_prerequisites.pop() {
            Some(future) => self.effects.push(Effect::WatchPrerequisite {
                stage_id: stage_id.clone(),
                future,
            }),
            None => self.start_executing(stage_id),
        }
    }

    /// Transition `Defined` → `Executing`: release every pending task by
    /// pairing it with a fresh completion promise, then start draining.
    /// Task order is preserved.
    fn start_executing(&mut self, stage_id: &Id) {
        let Some(StageState::Defined(defined)) = self.stages.remove(stage_id) else {
            unreachable!("start_executing is only reached from the prerequisite wait loop");
        };
        debug_assert!(defined.future_prerequisites.is_empty());
        let DefinedStage { pending, .. } = defined;
        let PendingStage {
            stage_id: owned_id,
            all_tasks_added,
            tasks,
            completion_promises,
        } = pending;

        self.inspection
            .notify_change(stage_id, Phase::Waiting, Edge::Finished);
        self.inspection
            .notify_change(stage_id, Phase::Execution, Edge::Started);

        let mut executing_tasks = Vec::with_capacity(tasks.len());
        for PendingTask {
            task_id,
            execution_promise,
        } in tasks
        {
            let (completion_promise, future_completion) = pair();
            executing_tasks.push(ExecutingTask {
                task_id,
                future_completion,
            });
            self.effects.push(Effect::ReleaseTask {
                execution_promise,
                completion_promise,
            });
        }

        self.stages.insert(
            stage_id.clone(),
            StageState::Executing(ExecutingStage {
                stage_id: owned_id,
                all_tasks_added,
                tasks: executing_tasks,
                in_flight: 0,
                completion_promises,
            }),
        );
        self.drain(stage_id);
    }

    /// One step of the completion loop: watch the next released task, or
    /// complete the stage once no task is left, none is in flight, and the
    /// task set is closed.
    ///
    /// Tasks are popped from the end of the list, so dependent completion
    /// order tracks task completion times, not insertion order.
    pub fn drain(&mut self, stage_id: &Id) {
        let Some(StageState::Executing(executing)) = self.stages.get_mut(stage_id) else {
            return;
        };

        if let Some(task) = executing.tasks.pop() {
            executing.in_flight += 1;
            let remaining = executing.tasks.len() + executing.in_flight;
            debug!(stage = %stage_id, task = %task.task_id, "{remaining} task(s) remaining");
            self.effects.push(Effect::WatchTask {
                stage_id: stage_id.clone(),
                future: task.future_completion,
            });
        } else if executing.in_flight > 0 {
            // Outstanding completions re-enter the drain as they resolve.
        } else if executing.all_tasks_added {
            self.complete(stage_id);
        } else {
            debug!(stage = %stage_id, "no more tasks, waiting for all tasks collected");
        }
    }

    /// A watched task completion resolved.
    pub fn task_completed(&mut self, stage_id: &Id) {
        let Some(StageState::Executing(executing)) = self.stages.get_mut(stage_id) else {
            return;
        };
        executing.in_flight -= 1;
        self.drain(stage_id);
    }

    /// Transition `Executing` → `Completed`: queue notification of every
    /// dependent.
    ///
    /// This is the one place the execution-finished moment is stamped;
    /// stamping per task would freeze the reported execution time while
    /// later tasks are still running.
    fn complete(&mut self, stage_id: &Id) {
        let Some(StageState::Executing(executing)) = self.stages.remove(stage_id) else {
            unreachable!("complete is only reached from the drain loop");
        };
        let ExecutingStage {
            stage_id: owned_id,
            completion_promises,
            ..
        } = executing;

        self.inspection
            .notify_change(stage_id, Phase::Execution, Edge::Finished);
        info!(
            stage = %stage_id,
            "completed, notifying {} dependent stage(s)",
            completion_promises.len()
        );

        for promise in completion_promises {
            self.effects.push(Effect::NotifyDependent { promise });
        }
        self.stages
            .insert(stage_id.clone(), StageState::Completed { stage_id: owned_id });
    }
}
