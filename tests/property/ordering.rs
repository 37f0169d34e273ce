//! Property-based tests for the order-assignment engine.
//!
//! The central invariant: after any sequence of create/move/delete
//! operations, every column's `order` values are exactly `0..n` —
//! dense, zero-based, no duplicates.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_possible_truncation)]

use std::collections::HashMap;

use proptest::prelude::*;

use boardsync_proto::order;
use boardsync_proto::task::{Task, TaskId, TaskStatus};

/// A randomly generated board operation. Task references are indices
/// into the list of currently-live tasks (modulo its length).
#[derive(Debug, Clone)]
enum Op {
    Create,
    Move {
        pick: usize,
        status: TaskStatus,
        index: u32,
    },
    Remove {
        pick: usize,
    },
}

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Create),
        3 => (any::<usize>(), arb_status(), 0u32..16).prop_map(|(pick, status, index)| Op::Move {
            pick,
            status,
            index,
        }),
        1 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
    ]
}

fn new_task(n: usize) -> Task {
    Task {
        id: TaskId::new(),
        title: format!("task {n}"),
        status: TaskStatus::Todo,
        order: 0,
        owner: "alice".to_string(),
        revision: 1,
        created_at: 0,
        updated_at: 0,
    }
}

/// Applies an op sequence through the engine, returning the final map.
fn run_ops(ops: &[Op]) -> HashMap<TaskId, Task> {
    let mut tasks: HashMap<TaskId, Task> = HashMap::new();
    let mut live: Vec<TaskId> = Vec::new();
    for (n, op) in ops.iter().enumerate() {
        match op {
            Op::Create => {
                let task = new_task(n);
                live.push(task.id.clone());
                order::insert_task(&mut tasks, task);
            }
            Op::Move {
                pick,
                status,
                index,
            } => {
                if !live.is_empty() {
                    let id = live[pick % live.len()].clone();
                    order::apply_move(&mut tasks, &id, *status, *index)
                        .expect("live task must be movable");
                }
            }
            Op::Remove { pick } => {
                if !live.is_empty() {
                    let id = live.remove(pick % live.len());
                    let _ = order::remove_task(&mut tasks, &id);
                }
            }
        }
    }
    tasks
}

/// Asserts the contiguity invariant over every column.
fn assert_contiguous(tasks: &HashMap<TaskId, Task>) -> Result<(), TestCaseError> {
    for status in TaskStatus::ALL {
        let mut orders: Vec<u32> = tasks
            .values()
            .filter(|t| t.status == status)
            .map(|t| t.order)
            .collect();
        orders.sort_unstable();
        let expected: Vec<u32> = (0..orders.len() as u32).collect();
        prop_assert_eq!(
            orders,
            expected,
            "column {} violates contiguity",
            status
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn contiguity_holds_under_arbitrary_operation_sequences(ops in prop::collection::vec(arb_op(), 0..40)) {
        let tasks = run_ops(&ops);
        assert_contiguous(&tasks)?;
    }

    #[test]
    fn operations_never_lose_or_duplicate_tasks(ops in prop::collection::vec(arb_op(), 0..40)) {
        let creates = ops.iter().filter(|op| matches!(op, Op::Create)).count();
        let tasks = run_ops(&ops);
        // Every surviving task was created exactly once; removals only
        // ever shrink the population.
        prop_assert!(tasks.len() <= creates);
    }

    #[test]
    fn repeating_a_move_is_a_noop(
        seed_ops in prop::collection::vec(Just(Op::Create), 1..8),
        pick in any::<usize>(),
        status in arb_status(),
        index in 0u32..16,
    ) {
        let mut tasks = run_ops(&seed_ops);
        let ids: Vec<TaskId> = tasks.keys().cloned().collect();
        let id = ids[pick % ids.len()].clone();

        order::apply_move(&mut tasks, &id, status, index).expect("move");
        let after_first = tasks.clone();
        // The task now sits where the move put it; moving it to the
        // same destination again must change nothing.
        let moved = tasks[&id].clone();
        let outcome = order::apply_move(&mut tasks, &id, moved.status, moved.order)
            .expect("repeat move");
        prop_assert!(outcome.is_noop());
        prop_assert_eq!(after_first, tasks);
    }

    #[test]
    fn move_outcome_statuses_cover_all_changed_tasks(
        seed_ops in prop::collection::vec(arb_op(), 1..20),
        pick in any::<usize>(),
        status in arb_status(),
        index in 0u32..16,
    ) {
        let mut tasks = run_ops(&seed_ops);
        if tasks.is_empty() {
            return Ok(());
        }
        let ids: Vec<TaskId> = tasks.keys().cloned().collect();
        let id = ids[pick % ids.len()].clone();
        let outcome = order::apply_move(&mut tasks, &id, status, index).expect("move");
        for changed in &outcome.changed {
            let task = &tasks[changed];
            prop_assert!(
                outcome.statuses.contains(&task.status),
                "changed task {} not covered by reported statuses",
                changed
            );
        }
        assert_contiguous(&tasks)?;
    }
}
