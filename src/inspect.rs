// src/inspect.rs

//! Optional diagnostic instrumentation: dependency-cycle detection at stage
//! registration, and per-stage waiting/execution timing.
//!
//! Everything here is compile-time togglable through the `inspection` cargo
//! feature. With the feature disabled the data structures vanish, every
//! method is a no-op, and cycle checking is skipped entirely: a cyclic
//! dependency then simply never clears its prerequisites. The stage machine
//! does not branch on the flag; it calls into this module unconditionally.

use std::time::Duration;

use crate::errors::AddStageError;
use crate::id::StageId;

/// Whether this build carries the inspection substructure.
pub const INSPECTION_ENABLED: bool = cfg!(feature = "inspection");

/// Which per-stage phase a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Between definition and prerequisites clearing.
    Waiting,
    /// Between release of the stage's tasks and their completion.
    Execution,
}

/// Which edge of the phase is being stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Started,
    Finished,
}

#[cfg(feature = "inspection")]
mod enabled {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::{AddStageError, Duration, Edge, Phase, StageId};
    use crate::errors::{StageAlreadyAddedError, StageCircularDependencyError};

    #[derive(Debug, Default, Clone, Copy)]
    struct Timestamps {
        waiting_start: Option<Instant>,
        waiting_end: Option<Instant>,
        execution_start: Option<Instant>,
        execution_end: Option<Instant>,
    }

    #[derive(Debug)]
    struct Data<Id> {
        prerequisites_by_stage: HashMap<Id, Vec<Id>>,
        timestamps_by_stage: HashMap<Id, Timestamps>,
    }

    /// Stateful inspection substructure.
    #[derive(Debug)]
    pub(crate) struct Inspection<Id: StageId> {
        data: Mutex<Data<Id>>,
    }

    impl<Id: StageId> Inspection<Id> {
        pub fn new() -> Self {
            Self {
                data: Mutex::new(Data {
                    prerequisites_by_stage: HashMap::new(),
                    timestamps_by_stage: HashMap::new(),
                }),
            }
        }

        /// Records the declared prerequisites of `stage_id`, rejecting
        /// re-registration and additions that would close a dependency
        /// cycle. Only a successful call mutates the prerequisite map.
        pub fn record_stage(
            &self,
            stage_id: Id,
            prerequisites: &[Id],
        ) -> Result<(), AddStageError<Id>> {
            let mut data = self.data.lock().unwrap();

            if data.prerequisites_by_stage.contains_key(&stage_id) {
                return Err(StageAlreadyAddedError { stage_id }.into());
            }

            let mut path = vec![stage_id.clone()];
            for prerequisite_id in prerequisites {
                path.push(prerequisite_id.clone());

                if find_cycle(&mut path, &data.prerequisites_by_stage) {
                    return Err(StageCircularDependencyError {
                        stage_id,
                        prerequisite_ids: prerequisites.to_vec(),
                        cycle: path,
                    }
                    .into());
                }

                path.pop();
            }

            data.prerequisites_by_stage
                .insert(stage_id, prerequisites.to_vec());

            Ok(())
        }

        pub fn prerequisite_ids(&self, stage_id: &Id) -> Option<Vec<Id>> {
            self.data
                .lock()
                .unwrap()
                .prerequisites_by_stage
                .get(stage_id)
                .cloned()
        }

        /// Elapsed waiting and execution time for a stage.
        ///
        /// A phase whose end has not been stamped yet reports the elapsed
        /// time up to now; a phase that never started reports `None`.
        pub fn waiting_and_execution_time(
            &self,
            stage_id: &Id,
        ) -> (Option<Duration>, Option<Duration>) {
            let data = self.data.lock().unwrap();
            let Some(timestamps) = data.timestamps_by_stage.get(stage_id) else {
                return (None, None);
            };

            let elapsed = |start: Option<Instant>, end: Option<Instant>| {
                start.map(|start| end.unwrap_or_else(Instant::now) - start)
            };

            (
                elapsed(timestamps.waiting_start, timestamps.waiting_end),
                elapsed(timestamps.execution_start, timestamps.execution_end),
            )
        }

        /// Stamps "now" into the slot named by `phase`/`edge`. Finishing a
        /// phase whose start was never stamped backfills the start, so a
        /// finished phase always reports a (possibly zero) duration.
        pub fn notify_change(&self, stage_id: &Id, phase: Phase, edge: Edge) {
            let now = Instant::now();
            let mut data = self.data.lock().unwrap();
            let timestamps = data
                .timestamps_by_stage
                .entry(stage_id.clone())
                .or_default();

            match (phase, edge) {
                (Phase::Waiting, Edge::Started) => timestamps.waiting_start = Some(now),
                (Phase::Waiting, Edge::Finished) => {
                    timestamps.waiting_end = Some(now);
                    if timestamps.waiting_start.is_none() {
                        timestamps.waiting_start = timestamps.waiting_end;
                    }
                }
                (Phase::Execution, Edge::Started) => timestamps.execution_start = Some(now),
                (Phase::Execution, Edge::Finished) => {
                    timestamps.execution_end = Some(now);
                    if timestamps.execution_start.is_none() {
                        timestamps.execution_start = timestamps.execution_end;
                    }
                }
            }
        }
    }

    /// Depth-first walk along declared prerequisites.
    ///
    /// `path` holds the ids from the candidate stage down to the node being
    /// expanded; reaching any id already on the path closes a cycle, which
    /// is recorded by pushing the repeated id so the path reads
    /// `candidate -> .. -> repeated`. Stages without a recorded entry are
    /// dead ends. The prerequisite map is acyclic on entry, so the walk
    /// terminates.
    fn find_cycle<Id: StageId>(
        path: &mut Vec<Id>,
        prerequisites_by_stage: &HashMap<Id, Vec<Id>>,
    ) -> bool {
        let Some(current) = path.last().cloned() else {
            return false;
        };
        let Some(prerequisite_ids) = prerequisites_by_stage.get(&current) else {
            return false;
        };

        for prerequisite_id in prerequisite_ids {
            if path.contains(prerequisite_id) {
                path.push(prerequisite_id.clone());
                return true;
            }

            path.push(prerequisite_id.clone());
            if find_cycle(path, prerequisites_by_stage) {
                return true;
            }
            path.pop();
        }

        false
    }
}

#[cfg(not(feature = "inspection"))]
mod disabled {
    use std::marker::PhantomData;

    use super::{AddStageError, Duration, Edge, Phase, StageId};

    /// Empty twin of the stateful substructure; every method is a no-op.
    #[derive(Debug)]
    pub(crate) struct Inspection<Id: StageId> {
        _id: PhantomData<fn(Id)>,
    }

    impl<Id: StageId> Inspection<Id> {
        pub fn new() -> Self {
            Self { _id: PhantomData }
        }

        pub fn record_stage(
            &self,
            _stage_id: Id,
            _prerequisites: &[Id],
        ) -> Result<(), AddStageError<Id>> {
            Ok(())
        }

        pub fn prerequisite_ids(&self, _stage_id: &Id) -> Option<Vec<Id>> {
            None
        }

        pub fn waiting_and_execution_time(
            &self,
            _stage_id: &Id,
        ) -> (Option<Duration>, Option<Duration>) {
            (None, None)
        }

        pub fn notify_change(&self, _stage_id: &Id, _phase: Phase, _edge: Edge) {}
    }
}

#[cfg(feature = "inspection")]
pub(crate) use enabled::Inspection;

#[cfg(not(feature = "inspection"))]
pub(crate) use disabled::Inspection;
