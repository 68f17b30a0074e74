// crates/test-utils/src/task.rs

//! A recording task for scheduler tests.

use std::sync::{Arc, Mutex};

use stagecue::{Scheduler, StageId, TaskCompletionPromise};

#[derive(Default)]
struct TestTaskState {
    executed: bool,
    completion: Option<TaskCompletionPromise>,
}

/// Records whether the scheduler has released the task, and holds the
/// completion promise until the test decides the task's work is "done".
///
/// ```
/// use stagecue::Scheduler;
/// use stagecue_test_utils::TestTask;
///
/// let scheduler = Scheduler::new();
/// let task = TestTask::new();
/// task.enqueue(&scheduler, "stage", "task");
/// scheduler.set_all_tasks_added("stage");
///
/// assert!(!task.has_executed());
/// scheduler.add_stage("stage", &[]).unwrap();
/// assert!(task.has_executed());
/// task.finish();
/// ```
#[derive(Default)]
pub struct TestTask {
    state: Arc<Mutex<TestTaskState>>,
}

impl TestTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the task with the scheduler and wires up the
    /// released-for-execution continuation.
    ///
    /// # Panics
    ///
    /// Panics if the registration is rejected.
    pub fn enqueue<Id: StageId>(&self, scheduler: &Scheduler<Id>, stage_id: Id, task_id: Id) {
        let future_execution = scheduler
            .add_task_to_stage(stage_id, task_id)
            .expect("task registration rejected");

        let state = Arc::clone(&self.state);
        future_execution.if_not_cancelled(move |completion_promise| {
            let mut state = state.lock().unwrap();
            state.executed = true;
            state.completion = Some(completion_promise);
        });
    }

    /// Whether the scheduler has released the task for execution.
    pub fn has_executed(&self) -> bool {
        self.state.lock().unwrap().executed
    }

    /// Fulfils the completion promise, telling the scheduler the task's
    /// work is done.
    ///
    /// # Panics
    ///
    /// Panics if the task has not been released (or was already finished).
    pub fn finish(&self) {
        let completion = self
            .state
            .lock()
            .unwrap()
            .completion
            .take()
            .expect("task was never released");
        // Fulfil outside the state lock: completion may cascade into other
        // tasks' continuations synchronously.
        completion.fulfill(());
    }
}
