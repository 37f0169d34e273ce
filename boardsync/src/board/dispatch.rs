//! Optimistic mutation dispatcher.
//!
//! Each user intent is applied to the [`LocalCache`] immediately — the
//! optimistic guess — and turned into the [`ClientRequest`] to send.
//! Requests are fire-and-forget: confirmation (or correction) arrives
//! later through the sync channel, never through a response.
//!
//! The advisory policy check runs here with the same functions the
//! server uses, so an obviously-invalid drag fails locally with
//! immediate feedback instead of a network round-trip. The server
//! remains the sole authoritative gate.

use boardsync_proto::actor::Actor;
use boardsync_proto::order;
use boardsync_proto::policy;
use boardsync_proto::task::{self, Task, TaskId, TaskStatus};
use boardsync_proto::wire::ClientRequest;

use super::DispatchError;
use super::cache::LocalCache;

/// Applies user intents optimistically and produces wire requests.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    actor: Actor,
}

impl Dispatcher {
    /// Creates a dispatcher acting as the given identity (as echoed
    /// back by the server's greeting).
    #[must_use]
    pub const fn new(actor: Actor) -> Self {
        Self { actor }
    }

    /// The identity this dispatcher acts as.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Creates a task: mints the id, appends it to the end of the
    /// local `todo` column, and returns the create request.
    ///
    /// The optimistic entry carries revision 0, so the authoritative
    /// upsert for the same id always supersedes it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidTitle`] if the title fails validation.
    pub fn create_task(
        &self,
        cache: &mut LocalCache,
        title: &str,
    ) -> Result<ClientRequest, DispatchError> {
        task::validate_title(title)?;
        let now = task::now_ms();
        let new_task = Task {
            id: TaskId::new(),
            title: title.to_string(),
            status: TaskStatus::Todo,
            order: 0,
            owner: self.actor.username.clone(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        let id = new_task.id.clone();
        let order = order::insert_task(cache.tasks_mut(), new_task);
        Ok(ClientRequest::TaskCreate {
            id,
            title: title.to_string(),
            status: TaskStatus::Todo,
            order,
        })
    }

    /// Replaces the title of an owned task locally and returns the
    /// edit request.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownTask`], [`DispatchError::NotPermitted`]
    /// if the actor is not the owner, or
    /// [`DispatchError::InvalidTitle`].
    pub fn edit_title(
        &self,
        cache: &mut LocalCache,
        task_id: &TaskId,
        title: &str,
    ) -> Result<ClientRequest, DispatchError> {
        task::validate_title(title)?;
        let Some(existing) = cache.get(task_id) else {
            return Err(DispatchError::UnknownTask(task_id.clone()));
        };
        if !policy::can_edit_title(existing, &self.actor) {
            return Err(DispatchError::NotPermitted(
                "only the owner may edit this task".to_string(),
            ));
        }
        if let Some(existing) = cache.tasks_mut().get_mut(task_id) {
            existing.title = title.to_string();
            existing.updated_at = task::now_ms();
        }
        Ok(ClientRequest::TaskEdit {
            task_id: task_id.clone(),
            title: title.to_string(),
        })
    }

    /// Removes a task locally (re-densifying its column) and returns
    /// the delete request.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownTask`] or [`DispatchError::NotPermitted`]
    /// if the actor is neither owner nor administrator.
    pub fn delete_task(
        &self,
        cache: &mut LocalCache,
        task_id: &TaskId,
    ) -> Result<ClientRequest, DispatchError> {
        let Some(existing) = cache.get(task_id) else {
            return Err(DispatchError::UnknownTask(task_id.clone()));
        };
        if !policy::can_delete(existing, &self.actor) {
            return Err(DispatchError::NotPermitted(
                "only the owner or an administrator may delete this task".to_string(),
            ));
        }
        let _ = order::remove_task(cache.tasks_mut(), task_id);
        Ok(ClientRequest::TaskDelete {
            task_id: task_id.clone(),
        })
    }

    /// Moves a task locally with the same densify/insert algorithm the
    /// server runs, and returns the reorder request.
    ///
    /// The guess is provisional: the next authoritative bulk event
    /// silently overwrites any divergence, and there is no local
    /// rollback — a denied request is corrected by the server's
    /// corrective snapshot instead.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownTask`] or [`DispatchError::NotPermitted`]
    /// per the move policy.
    pub fn move_task(
        &self,
        cache: &mut LocalCache,
        task_id: &TaskId,
        destination: TaskStatus,
        index: u32,
    ) -> Result<ClientRequest, DispatchError> {
        let Some(existing) = cache.get(task_id) else {
            return Err(DispatchError::UnknownTask(task_id.clone()));
        };
        let decision = policy::can_move(existing, &self.actor, destination);
        if !decision.allow {
            let reason = if decision.cross_column && self.actor.is_admin {
                "administrators may not move another user's task to a different column"
            } else {
                "you may not move this task"
            };
            return Err(DispatchError::NotPermitted(reason.to_string()));
        }
        match order::apply_move(cache.tasks_mut(), task_id, destination, index) {
            Ok(_) => {}
            Err(order::MoveError::UnknownTask(id)) => {
                return Err(DispatchError::UnknownTask(id));
            }
        }
        Ok(ClientRequest::TaskReorder {
            task_id: task_id.clone(),
            status: destination,
            order: index,
        })
    }
}
