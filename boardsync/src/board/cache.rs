//! The client-local task cache.

use std::collections::HashMap;

use boardsync_proto::order;
use boardsync_proto::task::{Task, TaskId, TaskStatus};

/// Client-held mapping from task id to task; the single source of
/// truth for rendering.
///
/// Entries may be transiently optimistic (locally mutated, not yet
/// confirmed); there is no state flag — staleness is implicit and
/// resolved by replace-on-arrival when authoritative events come in.
#[derive(Debug, Default)]
pub struct LocalCache {
    tasks: HashMap<TaskId, Task>,
    /// Revision of the newest bulk event applied; older bulks are
    /// dropped as stale.
    bulk_revision: u64,
}

impl LocalCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the cache holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// The tasks of one column, sorted by rank.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        order::column(&self.tasks, status)
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .collect()
    }

    /// Tasks whose id starts with `prefix` (hyphens included), for
    /// human-friendly task references on the command line.
    #[must_use]
    pub fn find_by_id_prefix(&self, prefix: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.id.to_string().starts_with(prefix))
            .collect()
    }

    /// Drops all cached state, e.g. before applying a fresh snapshot
    /// after a reconnect.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.bulk_revision = 0;
    }

    /// Shared access to the underlying map for the reconciler and
    /// dispatcher.
    pub(crate) fn tasks(&self) -> &HashMap<TaskId, Task> {
        &self.tasks
    }

    /// Mutable access to the underlying map for the reconciler and
    /// dispatcher.
    pub(crate) fn tasks_mut(&mut self) -> &mut HashMap<TaskId, Task> {
        &mut self.tasks
    }

    pub(crate) const fn bulk_revision(&self) -> u64 {
        self.bulk_revision
    }

    pub(crate) const fn set_bulk_revision(&mut self, revision: u64) {
        self.bulk_revision = revision;
    }
}
