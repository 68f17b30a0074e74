// tests/property.rs

//! Property tests: random layered DAGs must always drive to completion in
//! dependency order, and the cycle check must agree with an independent
//! toposort oracle.

use std::collections::HashSet;

use proptest::prelude::*;

use stagecue::{Scheduler, StageStateId};

/// Dependency lists for `n` tasks where task `i` may only depend on tasks
/// `0..i`, so it is acyclic by construction.
fn layered_deps(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        prop::collection::vec(
            prop::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(index, potential)| {
                    let mut deps = Vec::new();
                    for value in potential {
                        if index > 0 {
                            let dep = value % index;
                            if !deps.contains(&dep) {
                                deps.push(dep);
                            }
                        }
                    }
                    deps
                })
                .collect()
        })
    })
}

proptest! {
    /// Register every task with `add_task`, then finish whatever is ready
    /// until nothing is left. Every task must become ready only after all
    /// of its dependencies finished, and the whole DAG must drain.
    #[test]
    fn random_dags_complete_in_dependency_order(deps in layered_deps(10)) {
        let task_count = deps.len();
        let names: Vec<String> = (0..task_count).map(|index| format!("task_{index}")).collect();

        let scheduler = Scheduler::new();
        let mut executions = Vec::with_capacity(task_count);
        for (index, task_deps) in deps.iter().enumerate() {
            let dep_names: Vec<String> =
                task_deps.iter().map(|&dep| names[dep].clone()).collect();
            let execution = scheduler
                .add_task(names[index].clone(), &dep_names)
                .expect("registration rejected");
            executions.push(Some(execution));
        }

        let mut finished: HashSet<usize> = HashSet::new();
        while finished.len() < task_count {
            let ready = (0..task_count).find(|&index| {
                executions[index]
                    .as_ref()
                    .is_some_and(|execution| execution.is_ready())
            });
            prop_assert!(
                ready.is_some(),
                "no task is ready but only {}/{} finished",
                finished.len(),
                task_count
            );
            let index = ready.unwrap();

            // Readiness implies every dependency has already finished.
            for dep in &deps[index] {
                prop_assert!(
                    finished.contains(dep),
                    "task_{} became ready before its dependency task_{}",
                    index,
                    dep
                );
            }

            let execution = executions[index].take().unwrap();
            let completion = execution.wait().expect("execution cancelled");
            completion.fulfill(());
            finished.insert(index);

            prop_assert_eq!(
                scheduler.stage_state(&names[index]),
                Some(StageStateId::Completed)
            );
        }
    }
}

#[cfg(feature = "inspection")]
mod cycle_oracle {
    use super::*;

    use petgraph::algo::is_cyclic_directed;
    use petgraph::graphmap::DiGraphMap;
    use stagecue::AddStageError;

    proptest! {
        /// Feed arbitrary (possibly cyclic) dependency declarations to the
        /// scheduler and mirror the accepted ones in a petgraph graph: an
        /// addition must be rejected exactly when the mirrored graph plus
        /// the candidate edges turns cyclic.
        #[test]
        fn cycle_check_agrees_with_toposort_oracle(
            raw_deps in prop::collection::vec(prop::collection::vec(0..8usize, 0..4), 2..8)
        ) {
            let stage_count = raw_deps.len();
            let names: Vec<String> =
                (0..stage_count).map(|index| format!("stage_{index}")).collect();

            let scheduler = Scheduler::new();
            let mut accepted_edges: Vec<(usize, usize)> = Vec::new();

            for (index, potential) in raw_deps.iter().enumerate() {
                // Sanitise: in range, no self-dependency, no duplicates.
                let mut deps: Vec<usize> = Vec::new();
                for &value in potential {
                    let dep = value % stage_count;
                    if dep != index && !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
                let dep_names: Vec<String> =
                    deps.iter().map(|&dep| names[dep].clone()).collect();

                let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
                for node in 0..stage_count {
                    graph.add_node(node);
                }
                for &(from, to) in &accepted_edges {
                    graph.add_edge(from, to, ());
                }
                for &dep in &deps {
                    graph.add_edge(dep, index, ());
                }
                let would_cycle = is_cyclic_directed(&graph);

                match scheduler.add_stage(names[index].clone(), &dep_names) {
                    Ok(()) => {
                        prop_assert!(
                            !would_cycle,
                            "accepted a cyclic addition: stage_{} with deps {:?}",
                            index,
                            deps
                        );
                        accepted_edges.extend(deps.iter().map(|&dep| (dep, index)));
                    }
                    Err(error) => {
                        prop_assert!(would_cycle, "rejected an acyclic addition: {}", error);
                        prop_assert!(matches!(error, AddStageError::CircularDependency(_)));
                    }
                }
            }
        }
    }
}
