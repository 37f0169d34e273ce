//! Authorization policy for board mutations.
//!
//! Pure decision functions, evaluated twice for every move: once on the
//! client as an advisory pre-flight check (immediate feedback, no
//! network round-trip for an obviously-invalid drag) and once on the
//! server as the sole authoritative gate. The client result is never
//! trusted for correctness.

use crate::actor::Actor;
use crate::task::{Task, TaskStatus};

/// Outcome of a move permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveDecision {
    /// Whether the move may proceed.
    pub allow: bool,
    /// Whether the move would change the task's column.
    pub cross_column: bool,
}

/// Decides whether `actor` may move `task` to `destination`.
///
/// Rules, in order:
/// 1. The owner may move their task anywhere.
/// 2. An administrator may reorder another user's task within its
///    current column.
/// 3. An administrator may *not* relocate another user's task across
///    columns.
/// 4. Everyone else is denied.
#[must_use]
pub fn can_move(task: &Task, actor: &Actor, destination: TaskStatus) -> MoveDecision {
    let cross_column = task.status != destination;
    let allow = if actor.is_owner(task) {
        true
    } else if actor.is_admin {
        !cross_column
    } else {
        false
    };
    MoveDecision { allow, cross_column }
}

/// Decides whether `actor` may delete `task`: owner or administrator.
#[must_use]
pub fn can_delete(task: &Task, actor: &Actor) -> bool {
    actor.is_owner(task) || actor.is_admin
}

/// Decides whether `actor` may edit the title of `task`: owner only.
#[must_use]
pub fn can_edit_title(task: &Task, actor: &Actor) -> bool {
    actor.is_owner(task)
}
