//! Local board state: cache, reconciliation, and optimistic dispatch.
//!
//! The [`LocalCache`] is the client's single source of truth for
//! rendering. The [`Dispatcher`] applies user intents to it
//! optimistically and produces the wire requests to send; the
//! reconciler merges authoritative server events back in, superseding
//! any optimistic guess.

pub mod cache;
pub mod dispatch;
pub mod reconcile;

pub use cache::LocalCache;
pub use dispatch::Dispatcher;
pub use reconcile::{Applied, apply_event};

use thiserror::Error;

use boardsync_proto::task::{TaskId, ValidationError};

/// Errors surfaced by the optimistic dispatcher before any network
/// traffic happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The referenced task is not in the local cache.
    #[error("task not found: {0}")]
    UnknownTask(TaskId),
    /// The advisory policy check denied the mutation.
    #[error("{0}")]
    NotPermitted(String),
    /// The title failed validation.
    #[error(transparent)]
    InvalidTitle(#[from] ValidationError),
}
