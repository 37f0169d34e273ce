//! Authoritative task store and order assigner.
//!
//! [`Board`] owns the single source of truth for every task. All
//! mutation goes through its methods, which take the write lock for
//! the entire recompute, so no two reorders can interleave on a
//! column and the order-contiguity invariant holds after every
//! commit. Each committed mutation advances a monotonic revision
//! counter and stamps it onto every task it touched; clients use the
//! stamp to reject stale upserts deterministically.

use std::collections::HashMap;

use tokio::sync::RwLock;

use boardsync_proto::actor::Actor;
use boardsync_proto::order;
use boardsync_proto::policy;
use boardsync_proto::task::{self, Task, TaskId, TaskStatus, ValidationError};
use boardsync_proto::wire::ErrorCode;

/// Errors produced by board mutations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The referenced task does not exist (already deleted elsewhere).
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The authorization policy denied the mutation.
    #[error("{reason}")]
    Denied {
        /// Human-readable denial reason.
        reason: String,
    },
    /// The submitted title failed validation.
    #[error(transparent)]
    InvalidTitle(#[from] ValidationError),
    /// A create reused an existing task id.
    #[error("task id already exists: {0}")]
    DuplicateId(TaskId),
    /// A create targeted a column other than `todo`.
    #[error("new tasks must start in the todo column, not {0}")]
    CreateOutsideTodo(TaskStatus),
}

impl BoardError {
    /// The wire error category for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::StaleReference,
            Self::Denied { .. } => ErrorCode::AuthorizationDenied,
            Self::InvalidTitle(_) => ErrorCode::InvalidTitle,
            Self::DuplicateId(_) | Self::CreateOutsideTodo(_) => ErrorCode::InvalidRequest,
        }
    }
}

/// Result of a committed deletion.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Id of the deleted task.
    pub task_id: TaskId,
    /// Commit revision of the deletion.
    pub revision: u64,
    /// The vacated column, re-densified, in rank order.
    pub column: Vec<Task>,
}

/// A consistent snapshot of one or more columns (or the whole board).
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    /// The tasks, grouped by column in board order, ranked within.
    pub tasks: Vec<Task>,
    /// Revision of the commit (or of the board at snapshot time).
    pub revision: u64,
}

struct BoardState {
    tasks: HashMap<TaskId, Task>,
    revision: u64,
}

impl BoardState {
    /// Tasks of the given columns, column by column in board order,
    /// ranked within each column.
    fn collect(&self, statuses: &[TaskStatus]) -> Vec<Task> {
        let mut tasks = Vec::new();
        for status in TaskStatus::ALL {
            if statuses.contains(&status) {
                for id in order::column(&self.tasks, status) {
                    if let Some(task) = self.tasks.get(&id) {
                        tasks.push(task.clone());
                    }
                }
            }
        }
        tasks
    }

    /// Stamps the revision and update time onto the given tasks.
    fn stamp(&mut self, ids: &[TaskId], revision: u64, now: u64) {
        for id in ids {
            if let Some(task) = self.tasks.get_mut(id) {
                task.revision = revision;
                task.updated_at = now;
            }
        }
    }
}

/// The authoritative, mutation-serializing task store.
pub struct Board {
    inner: RwLock<BoardState>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BoardState {
                tasks: HashMap::new(),
                revision: 0,
            }),
        }
    }

    /// Full-board snapshot, suitable for the connect-time bulk event.
    pub async fn snapshot(&self) -> BulkOutcome {
        let state = self.inner.read().await;
        BulkOutcome {
            tasks: state.collect(&TaskStatus::ALL),
            revision: state.revision,
        }
    }

    /// Snapshot of the given columns only (corrective bulk events).
    pub async fn columns(&self, statuses: &[TaskStatus]) -> BulkOutcome {
        let state = self.inner.read().await;
        BulkOutcome {
            tasks: state.collect(statuses),
            revision: state.revision,
        }
    }

    /// The column a task currently belongs to, if it exists.
    pub async fn status_of(&self, task_id: &TaskId) -> Option<TaskStatus> {
        let state = self.inner.read().await;
        state.tasks.get(task_id).map(|t| t.status)
    }

    /// Creates a task at the end of the `todo` column.
    ///
    /// The id comes from the client (so its optimistic insert
    /// reconciles by id); ownership comes from the authenticated
    /// actor, never from the request.
    ///
    /// # Errors
    ///
    /// [`BoardError::InvalidTitle`] for a bad title,
    /// [`BoardError::DuplicateId`] if the id is taken, or
    /// [`BoardError::CreateOutsideTodo`] if the initial column is not
    /// `todo`.
    pub async fn create(
        &self,
        id: TaskId,
        title: &str,
        status: TaskStatus,
        actor: &Actor,
    ) -> Result<Task, BoardError> {
        task::validate_title(title)?;
        if status != TaskStatus::Todo {
            return Err(BoardError::CreateOutsideTodo(status));
        }
        let mut state = self.inner.write().await;
        if state.tasks.contains_key(&id) {
            return Err(BoardError::DuplicateId(id));
        }
        state.revision += 1;
        let now = task::now_ms();
        let new_task = Task {
            id: id.clone(),
            title: title.to_string(),
            status: TaskStatus::Todo,
            order: order::append_index(&state.tasks, TaskStatus::Todo),
            owner: actor.username.clone(),
            revision: state.revision,
            created_at: now,
            updated_at: now,
        };
        let created = new_task.clone();
        order::insert_task(&mut state.tasks, new_task);
        tracing::info!(task_id = %id, owner = %actor.username, "task created");
        Ok(created)
    }

    /// Replaces the title of a task owned by `actor`.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotFound`], [`BoardError::Denied`] if the actor
    /// is not the owner, or [`BoardError::InvalidTitle`].
    pub async fn edit_title(
        &self,
        task_id: &TaskId,
        title: &str,
        actor: &Actor,
    ) -> Result<Task, BoardError> {
        task::validate_title(title)?;
        let mut state = self.inner.write().await;
        let Some(existing) = state.tasks.get(task_id) else {
            return Err(BoardError::NotFound(task_id.clone()));
        };
        if !policy::can_edit_title(existing, actor) {
            return Err(BoardError::Denied {
                reason: "only the owner may edit this task".to_string(),
            });
        }
        state.revision += 1;
        let revision = state.revision;
        let now = task::now_ms();
        // Checked above; the entry cannot have vanished under the lock.
        let Some(existing) = state.tasks.get_mut(task_id) else {
            return Err(BoardError::NotFound(task_id.clone()));
        };
        existing.title = title.to_string();
        existing.revision = revision;
        existing.updated_at = now;
        Ok(existing.clone())
    }

    /// Deletes a task and re-densifies its vacated column.
    ///
    /// # Errors
    ///
    /// [`BoardError::NotFound`] or [`BoardError::Denied`] if the actor
    /// is neither the owner nor an administrator.
    pub async fn delete(&self, task_id: &TaskId, actor: &Actor) -> Result<DeleteOutcome, BoardError> {
        let mut state = self.inner.write().await;
        let Some(existing) = state.tasks.get(task_id) else {
            return Err(BoardError::NotFound(task_id.clone()));
        };
        if !policy::can_delete(existing, actor) {
            return Err(BoardError::Denied {
                reason: "only the owner or an administrator may delete this task".to_string(),
            });
        }
        let Some((removed, shifted)) = order::remove_task(&mut state.tasks, task_id) else {
            return Err(BoardError::NotFound(task_id.clone()));
        };
        state.revision += 1;
        let revision = state.revision;
        state.stamp(&shifted, revision, task::now_ms());
        let column = state.collect(&[removed.status]);
        tracing::info!(task_id = %task_id, actor = %actor.username, "task deleted");
        Ok(DeleteOutcome {
            task_id: removed.id,
            revision,
            column,
        })
    }

    /// Moves a task to `destination` at `index`, recomputing the
    /// affected column(s) atomically.
    ///
    /// Returns `Ok(None)` when the move is a no-op (nothing changed,
    /// nothing to broadcast).
    ///
    /// # Errors
    ///
    /// [`BoardError::NotFound`] or [`BoardError::Denied`] per the
    /// move policy.
    pub async fn reorder(
        &self,
        task_id: &TaskId,
        destination: TaskStatus,
        index: u32,
        actor: &Actor,
    ) -> Result<Option<BulkOutcome>, BoardError> {
        let mut state = self.inner.write().await;
        let Some(existing) = state.tasks.get(task_id) else {
            return Err(BoardError::NotFound(task_id.clone()));
        };
        let decision = policy::can_move(existing, actor, destination);
        if !decision.allow {
            let reason = if decision.cross_column && actor.is_admin {
                "administrators may not move another user's task to a different column"
            } else {
                "you may not move this task"
            };
            return Err(BoardError::Denied {
                reason: reason.to_string(),
            });
        }
        let outcome = match order::apply_move(&mut state.tasks, task_id, destination, index) {
            Ok(outcome) => outcome,
            Err(order::MoveError::UnknownTask(id)) => return Err(BoardError::NotFound(id)),
        };
        if outcome.is_noop() {
            return Ok(None);
        }
        state.revision += 1;
        let revision = state.revision;
        state.stamp(&outcome.changed, revision, task::now_ms());
        let tasks = state.collect(&outcome.statuses);
        tracing::debug!(
            task_id = %task_id,
            destination = %destination,
            index,
            revision,
            "reorder committed"
        );
        Ok(Some(BulkOutcome { tasks, revision }))
    }
}
