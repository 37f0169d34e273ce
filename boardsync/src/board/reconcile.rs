//! Merge engine for authoritative server events.
//!
//! Pure transition function over the [`LocalCache`]: `(cache, event)
//! -> cache'`. Events are keyed by task id and gated by revision, so
//! replays and stale deliveries collapse to no-ops and any optimistic
//! guess is overwritten the moment authoritative state arrives.

use std::collections::HashSet;

use boardsync_proto::task::{Task, TaskStatus};
use boardsync_proto::wire::BoardEvent;

use super::cache::LocalCache;

/// Whether applying an event changed the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The cache was mutated.
    Changed,
    /// The event was a no-op (replay, stale, or not cache-relevant).
    Unchanged,
}

/// Merges one server event into the cache.
///
/// - `task_update`: upsert by id, unless the incoming revision is
///   older than what the cache already holds.
/// - `task_delete`: remove by id; deleting an absent id is a benign
///   no-op, not an error.
/// - `task_bulk_update`: authoritative full state of the column(s)
///   represented in the event — upsert every listed task and evict
///   cached tasks that claim one of those columns but are missing
///   from the list. Columns not represented are left untouched. Bulks
///   older than the newest one applied are dropped entirely.
///
/// Applying the same event twice yields the same cache as applying it
/// once.
pub fn apply_event(cache: &mut LocalCache, event: &BoardEvent) -> Applied {
    match event {
        BoardEvent::Connected { .. } | BoardEvent::Error { .. } => Applied::Unchanged,
        BoardEvent::TaskUpdate { task } => upsert(cache, task),
        BoardEvent::TaskDelete { task_id, .. } => {
            if cache.tasks_mut().remove(task_id).is_some() {
                Applied::Changed
            } else {
                Applied::Unchanged
            }
        }
        BoardEvent::TaskBulkUpdate { tasks, revision } => bulk_replace(cache, tasks, *revision),
    }
}

/// Inserts or replaces a single task, gated by revision.
fn upsert(cache: &mut LocalCache, task: &Task) -> Applied {
    if let Some(existing) = cache.get(&task.id) {
        if task.revision < existing.revision || existing == task {
            return Applied::Unchanged;
        }
    }
    cache.tasks_mut().insert(task.id.clone(), task.clone());
    Applied::Changed
}

/// Applies a bulk column replace.
fn bulk_replace(cache: &mut LocalCache, tasks: &[Task], revision: u64) -> Applied {
    if revision < cache.bulk_revision() {
        tracing::debug!(
            revision,
            newest = cache.bulk_revision(),
            "dropping stale bulk event"
        );
        return Applied::Unchanged;
    }
    cache.set_bulk_revision(revision);

    let statuses: HashSet<TaskStatus> = tasks.iter().map(|t| t.status).collect();
    let incoming: HashSet<_> = tasks.iter().map(|t| t.id.clone()).collect();

    // A bulk event is the full truth for the columns it covers: a
    // cached task last known in one of those columns but absent from
    // the event has been moved out or deleted.
    let stale: Vec<_> = cache
        .tasks()
        .values()
        .filter(|t| statuses.contains(&t.status) && !incoming.contains(&t.id))
        .map(|t| t.id.clone())
        .collect();

    let mut applied = Applied::Unchanged;
    for id in stale {
        cache.tasks_mut().remove(&id);
        applied = Applied::Changed;
    }
    for task in tasks {
        if upsert(cache, task) == Applied::Changed {
            applied = Applied::Changed;
        }
    }
    applied
}
