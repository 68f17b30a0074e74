// src/scheduler.rs

//! The scheduler: a registry of stages keyed by id, with the public entry
//! points for defining stages, registering tasks and closing task sets.
//!
//! # Locking discipline
//!
//! A single mutex guards the registry. Nothing that runs user code happens
//! under it: transitions queue promise fulfilments and continuation
//! subscriptions as effects, and the scheduler flushes them after
//! unlocking. Callbacks therefore always observe an unlocked scheduler and
//! may re-enter any of its methods, at the price of the flush re-entering
//! continuation chains inline (depth is bounded by the dependency graph).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::warn;

use crate::errors::{AddStageError, AllTasksCollectedError, StageAlreadyAddedError};
use crate::id::StageId;
use crate::inspect::Inspection;
use crate::stage::{Effect, FutureTaskExecution, StageOps, StageState, StageStateId};

struct Inner<Id: StageId> {
    stages: Mutex<HashMap<Id, StageState<Id>>>,
    inspection: Arc<Inspection<Id>>,
}

/// Thread-safe staged execution scheduler.
///
/// Work is organised into named *stages*; each stage holds zero or more
/// *tasks* and declares prerequisite stages that must complete first.
/// Registration order is free: tasks may be added and prerequisites
/// declared before the stage they refer to is itself defined.
///
/// A task is a nested promise pair. [`Scheduler::add_task_to_stage`]
/// returns a future that yields a [`TaskCompletionPromise`] once the
/// stage's prerequisites have cleared; fulfilling that promise tells the
/// scheduler the task's work is done:
///
/// ```
/// use stagecue::Scheduler;
///
/// let scheduler = Scheduler::new();
///
/// let execution = scheduler
///     .add_task_to_stage("spawn actors", "policeman")
///     .unwrap();
/// scheduler.set_all_tasks_added("spawn actors");
///
/// execution.if_not_cancelled(|completion| {
///     // perform the task's work, then:
///     completion.fulfill(());
/// });
///
/// // tasks run once the stage is defined and its prerequisites are done
/// scheduler.add_stage("spawn actors", &[]).unwrap();
/// ```
///
/// [`TaskCompletionPromise`]: crate::stage::TaskCompletionPromise
pub struct Scheduler<Id: StageId> {
    inner: Arc<Inner<Id>>,
}

impl<Id: StageId> Scheduler<Id> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stages: Mutex::new(HashMap::new()),
                inspection: Arc::new(Inspection::new()),
            }),
        }
    }

    /// Defines an execution stage with its prerequisite stages.
    ///
    /// Tasks are attached with [`Scheduler::add_task_to_stage`] and the
    /// task set closed with [`Scheduler::set_all_tasks_added`]; both may
    /// happen before or after this call. Once every prerequisite has
    /// completed, the stage releases its tasks; once those finish and the
    /// task set is closed, the stage completes and its dependents are
    /// notified.
    pub fn add_stage(&self, stage_id: Id, prerequisites: &[Id]) -> Result<(), AddStageError<Id>> {
        let mut effects = Vec::new();
        let result = {
            let mut stages = self.inner.stages.lock().unwrap();
            let mut ops = StageOps::new(&mut stages, &self.inner.inspection, &mut effects);
            self.add_stage_locked(&mut ops, &stage_id, prerequisites)
        };
        flush_effects(&self.inner, effects);
        result
    }

    /// The locked portion of [`Scheduler::add_stage`], shared with
    /// [`Scheduler::add_task`].
    fn add_stage_locked(
        &self,
        ops: &mut StageOps<'_, Id>,
        stage_id: &Id,
        prerequisites: &[Id],
    ) -> Result<(), AddStageError<Id>> {
        // Follow-up futures are collected before the cycle check; on
        // rejection their promises stay queued in the prerequisite stages
        // and resolve into nothing.
        let mut future_prerequisites = Vec::with_capacity(prerequisites.len());
        for prerequisite_id in prerequisites {
            future_prerequisites.push(ops.add_follow_up(prerequisite_id, stage_id));
        }

        match self
            .inner
            .inspection
            .record_stage(stage_id.clone(), prerequisites)
        {
            Err(error) => {
                if matches!(error, AddStageError::AlreadyAdded(_)) {
                    warn!(stage = %stage_id, "attempted to re-add an already added stage. Ignoring.");
                }
                Err(error)
            }
            Ok(()) => ops
                .define_stage(stage_id, future_prerequisites)
                .map_err(AddStageError::from),
        }
    }

    /// Registers a task with a stage.
    ///
    /// The stage does not have to be defined yet; the only requirement is
    /// that its task set has not been closed. The returned future resolves
    /// with the task's completion promise when the stage starts executing
    /// (immediately if it already is).
    pub fn add_task_to_stage(
        &self,
        stage_id: Id,
        task_id: Id,
    ) -> Result<FutureTaskExecution, AllTasksCollectedError<Id>> {
        let mut effects = Vec::new();
        let result = {
            let mut stages = self.inner.stages.lock().unwrap();
            let mut ops = StageOps::new(&mut stages, &self.inner.inspection, &mut effects);
            ops.add_task(&stage_id, task_id)
        };
        flush_effects(&self.inner, effects);
        result
    }

    /// Closes the stage's task set. The stage completes once every released
    /// task has finished; without this call it parks forever with its tasks
    /// done. Idempotent on completed stages.
    pub fn set_all_tasks_added(&self, stage_id: Id) {
        let mut effects = Vec::new();
        {
            let mut stages = self.inner.stages.lock().unwrap();
            let mut ops = StageOps::new(&mut stages, &self.inner.inspection, &mut effects);
            ops.set_all_tasks_added(&stage_id);
        }
        flush_effects(&self.inner, effects);
    }

    /// Adds a single task with prerequisites.
    ///
    /// Under the hood this creates a single-task stage carrying the task's
    /// id: `add_stage`, `add_task_to_stage`, `set_all_tasks_added`. The
    /// three steps run under one registry lock acquisition, so no
    /// concurrent caller can close the freshly defined stage's task set in
    /// between.
    pub fn add_task(
        &self,
        task_id: Id,
        prerequisites: &[Id],
    ) -> Result<FutureTaskExecution, AddStageError<Id>> {
        let mut effects = Vec::new();
        let result = {
            let mut stages = self.inner.stages.lock().unwrap();
            let mut ops = StageOps::new(&mut stages, &self.inner.inspection, &mut effects);
            self.add_stage_locked(&mut ops, &task_id, prerequisites)
                .and_then(|()| match ops.add_task(&task_id, task_id.clone()) {
                    Ok(future_execution) => {
                        ops.set_all_tasks_added(&task_id);
                        Ok(future_execution)
                    }
                    // Only reachable when the task set for this id was
                    // closed before any stage existed: the id is taken, so
                    // report it as such instead of panicking.
                    Err(_) => Err(StageAlreadyAddedError {
                        stage_id: task_id.clone(),
                    }
                    .into()),
                })
        };
        flush_effects(&self.inner, effects);
        result
    }

    /// Where the stage currently is in its lifecycle; `None` for ids the
    /// scheduler has never seen.
    pub fn stage_state(&self, stage_id: &Id) -> Option<StageStateId> {
        self.inner
            .stages
            .lock()
            .unwrap()
            .get(stage_id)
            .map(StageState::state_id)
    }

    /// The stage's declared prerequisites, in declared order. `None` for
    /// unknown stages and in builds without the `inspection` feature.
    pub fn debug_prerequisite_ids(&self, stage_id: &Id) -> Option<Vec<Id>> {
        self.inner.inspection.prerequisite_ids(stage_id)
    }

    /// Elapsed (waiting, execution) time for a stage. A phase still in
    /// progress reports its elapsed time so far; a phase never entered
    /// (and every phase in builds without the `inspection` feature) reports
    /// `None`.
    pub fn debug_waiting_and_execution_time(
        &self,
        stage_id: &Id,
    ) -> (Option<Duration>, Option<Duration>) {
        self.inner.inspection.waiting_and_execution_time(stage_id)
    }
}

impl<Id: StageId> Default for Scheduler<Id> {
    fn default() -> Self {
        Self::new()
    }
}

/// Performs the work queued while the registry was locked. Fulfilments run
/// attached continuations synchronously, and subscriptions to an already
/// resolved future run the continuation inline; either way the
/// continuation locks the registry afresh and flushes its own effects.
fn flush_effects<Id: StageId>(inner: &Arc<Inner<Id>>, effects: Vec<Effect<Id>>) {
    for effect in effects {
        match effect {
            Effect::ReleaseTask {
                execution_promise,
                completion_promise,
            } => execution_promise.fulfill(completion_promise),
            Effect::NotifyDependent { promise } => promise.fulfill(()),
            Effect::WatchPrerequisite { stage_id, future } => {
                let handle = Arc::downgrade(inner);
                future.if_not_cancelled(move |()| {
                    resume(&handle, |ops| ops.await_prerequisites(&stage_id));
                });
            }
            Effect::WatchTask { stage_id, future } => {
                let handle = Arc::downgrade(inner);
                future.if_not_cancelled(move |()| {
                    resume(&handle, |ops| ops.task_completed(&stage_id));
                });
            }
        }
    }
}

/// Re-enters the state machine from a watch continuation. A dead handle
/// means the scheduler was dropped; the chain just stops.
fn resume<Id: StageId>(handle: &Weak<Inner<Id>>, step: impl FnOnce(&mut StageOps<'_, Id>)) {
    let Some(inner) = handle.upgrade() else {
        return;
    };
    let mut effects = Vec::new();
    {
        let mut stages = inner.stages.lock().unwrap();
        let mut ops = StageOps::new(&mut stages, &inner.inspection, &mut effects);
        step(&mut ops);
    }
    flush_effects(&inner, effects);
}
