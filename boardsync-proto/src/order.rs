//! Order-assignment engine for board columns.
//!
//! Pure functions over the shared state shape `HashMap<TaskId, Task>`.
//! The server's authoritative recompute and every client's optimistic
//! guess run exactly this code, so both sides produce the same column
//! ordering whenever they start from the same tasks.
//!
//! Invariant maintained by every function here: within each status, the
//! `order` values of the tasks holding that status are exactly
//! `0..n` — dense, zero-based, no duplicates.

use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::task::{Task, TaskId, TaskStatus};

/// Error returned when a move references a task that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The task id is not present in the map.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
}

/// Result of a successful [`apply_move`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// Ids of every task whose `status` or `order` changed, the moved
    /// task included. Empty for a no-op move.
    pub changed: Vec<TaskId>,
    /// The column(s) touched by the move: the source status, plus the
    /// destination status for a cross-column move. Empty for a no-op.
    pub statuses: Vec<TaskStatus>,
}

impl MoveOutcome {
    /// Whether the move changed anything at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Returns the ids of the tasks in `status`, sorted by `order`.
///
/// Ties (which only occur on corrupt input) break by id so the result
/// is deterministic regardless of map iteration order.
#[must_use]
pub fn column<S: BuildHasher>(tasks: &HashMap<TaskId, Task, S>, status: TaskStatus) -> Vec<TaskId> {
    let mut ranked: Vec<(u32, TaskId)> = tasks
        .values()
        .filter(|t| t.status == status)
        .map(|t| (t.order, t.id.clone()))
        .collect();
    ranked.sort();
    ranked.into_iter().map(|(_, id)| id).collect()
}

/// Returns the rank a task appended to `status` would receive: the
/// current number of tasks in that column.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn append_index<S: BuildHasher>(tasks: &HashMap<TaskId, Task, S>, status: TaskStatus) -> u32 {
    // Column sizes are far below u32::MAX.
    tasks.values().filter(|t| t.status == status).count() as u32
}

/// Moves a task to `destination` at `destination_index`, re-densifying
/// every affected column.
///
/// The destination index addresses the *post-removal* sequence for a
/// same-column move and the pre-insertion sequence for a cross-column
/// move, clamped into range in both cases. A move whose source and
/// destination position coincide leaves the map untouched and reports
/// an empty [`MoveOutcome`].
///
/// # Errors
///
/// Returns [`MoveError::UnknownTask`] if `task_id` is not in the map.
pub fn apply_move<S: BuildHasher>(
    tasks: &mut HashMap<TaskId, Task, S>,
    task_id: &TaskId,
    destination: TaskStatus,
    destination_index: u32,
) -> Result<MoveOutcome, MoveError> {
    let Some(task) = tasks.get(task_id) else {
        return Err(MoveError::UnknownTask(task_id.clone()));
    };
    let source = task.status;
    let source_index = task.order;

    if source == destination && destination_index == source_index {
        return Ok(MoveOutcome::default());
    }

    // Remove the task from its source sequence; what remains is the
    // shrunk sequence the destination index is interpreted against.
    let mut source_seq = column(tasks, source);
    source_seq.retain(|id| id != task_id);

    let mut changed = Vec::new();
    let statuses = if source == destination {
        let index = (destination_index as usize).min(source_seq.len());
        source_seq.insert(index, task_id.clone());
        densify(tasks, &source_seq, &mut changed);
        vec![source]
    } else {
        let mut dest_seq = column(tasks, destination);
        let index = (destination_index as usize).min(dest_seq.len());
        dest_seq.insert(index, task_id.clone());
        if let Some(moved) = tasks.get_mut(task_id) {
            moved.status = destination;
            changed.push(task_id.clone());
        }
        densify(tasks, &source_seq, &mut changed);
        densify(tasks, &dest_seq, &mut changed);
        vec![source, destination]
    };

    if changed.is_empty() {
        // Clamping collapsed the move back onto its source position.
        return Ok(MoveOutcome::default());
    }
    Ok(MoveOutcome { changed, statuses })
}

/// Removes a task and re-densifies its vacated column.
///
/// Returns the removed task and the ids of the tasks whose `order`
/// shifted down, or `None` if the id is unknown.
pub fn remove_task<S: BuildHasher>(
    tasks: &mut HashMap<TaskId, Task, S>,
    task_id: &TaskId,
) -> Option<(Task, Vec<TaskId>)> {
    let removed = tasks.remove(task_id)?;
    let seq = column(tasks, removed.status);
    let mut shifted = Vec::new();
    densify(tasks, &seq, &mut shifted);
    Some((removed, shifted))
}

/// Inserts a task at the end of its column, returning the assigned rank.
pub fn insert_task<S: BuildHasher>(tasks: &mut HashMap<TaskId, Task, S>, mut task: Task) -> u32 {
    let order = append_index(tasks, task.status);
    task.order = order;
    tasks.insert(task.id.clone(), task);
    order
}

/// Rewrites `order` to match the position in `seq`, recording the ids
/// that actually changed.
#[allow(clippy::cast_possible_truncation)]
fn densify<S: BuildHasher>(
    tasks: &mut HashMap<TaskId, Task, S>,
    seq: &[TaskId],
    changed: &mut Vec<TaskId>,
) {
    for (index, id) in seq.iter().enumerate() {
        // Column sizes are far below u32::MAX.
        let order = index as u32;
        if let Some(task) = tasks.get_mut(id)
            && task.order != order
        {
            task.order = order;
            if !changed.contains(id) {
                changed.push(id.clone());
            }
        }
    }
}
