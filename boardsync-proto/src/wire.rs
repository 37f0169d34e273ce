//! JSON wire schema for the sync channel.
//!
//! Every frame on the channel is a JSON text message. The server pushes
//! [`BoardEvent`]s; the client sends [`ClientRequest`]s. Both enums are
//! externally tagged on a `"type"` field, so the receiver can dispatch
//! on the message kind before touching the payload.
//!
//! The three change-event shapes are the board's external contract:
//!
//! ```json
//! {"type":"task_update","task":{...}}
//! {"type":"task_delete","task_id":"...","revision":7}
//! {"type":"task_bulk_update","tasks":[{...}],"revision":8}
//! ```

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::task::{Task, TaskId, TaskStatus};

/// Error type for wire encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Machine-readable error category, surfaced to the requesting actor
/// only — errors are never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The hello token was not recognized by the identity provider.
    AuthenticationFailed,
    /// The actor lacks permission for the attempted mutation.
    AuthorizationDenied,
    /// The referenced task no longer exists (already deleted elsewhere).
    StaleReference,
    /// The submitted title failed validation.
    InvalidTitle,
    /// The request is malformed or violates a lifecycle rule.
    InvalidRequest,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::AuthorizationDenied => write!(f, "authorization denied"),
            Self::StaleReference => write!(f, "stale reference"),
            Self::InvalidTitle => write!(f, "invalid title"),
            Self::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

/// Server-to-client messages on the sync channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    /// Greeting after a successful hello. Always followed immediately
    /// by a full-board `task_bulk_update` snapshot.
    Connected {
        /// The authenticated identity, echoed back so the client can
        /// run advisory policy checks with the same context the server
        /// uses.
        actor: Actor,
    },
    /// A single task was created or updated; authoritative upsert.
    TaskUpdate {
        /// Full task state after the mutation.
        task: Task,
    },
    /// A task was deleted.
    TaskDelete {
        /// Id of the deleted task.
        task_id: TaskId,
        /// Commit revision of the deletion.
        revision: u64,
    },
    /// Authoritative full state of the affected column(s).
    ///
    /// Receivers must treat cached tasks that belong to one of the
    /// listed columns but are absent from `tasks` as removed from that
    /// column; columns not represented here are untouched.
    TaskBulkUpdate {
        /// All tasks of every affected column, post-mutation.
        tasks: Vec<Task>,
        /// Commit revision of the snapshot.
        revision: u64,
    },
    /// A request from this client was rejected.
    Error {
        /// Machine-readable category.
        code: ErrorCode,
        /// Human-readable description.
        reason: String,
    },
}

/// Client-to-server messages on the sync channel.
///
/// `hello` must be the first frame; every other request is rejected
/// until the channel is authenticated. Mutation requests carry no
/// reply — success is confirmed by the subsequent broadcast, failure
/// by an [`BoardEvent::Error`] on the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Authenticate the channel with an identity-provider token.
    Hello {
        /// Opaque token resolved by the server's identity collaborator.
        token: String,
    },
    /// Create a task. The id is minted by the client so the optimistic
    /// local insert and the authoritative upsert reconcile by id.
    TaskCreate {
        /// Client-minted task id.
        id: TaskId,
        /// Task title.
        title: String,
        /// Initial column; must be `todo`.
        status: TaskStatus,
        /// Client's append index; recomputed authoritatively.
        order: u32,
    },
    /// Replace the title of an owned task.
    TaskEdit {
        /// Target task.
        task_id: TaskId,
        /// New title.
        title: String,
    },
    /// Delete a task.
    TaskDelete {
        /// Target task.
        task_id: TaskId,
    },
    /// Move a task to a column position.
    TaskReorder {
        /// Target task.
        task_id: TaskId,
        /// Destination column.
        status: TaskStatus,
        /// Destination index within the column.
        order: u32,
    },
}

/// Encodes a [`BoardEvent`] as a JSON string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_event(event: &BoardEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`BoardEvent`] from a JSON string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the input is not a valid
/// event.
pub fn decode_event(json: &str) -> Result<BoardEvent, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ClientRequest`] as a JSON string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_request(request: &ClientRequest) -> Result<String, CodecError> {
    serde_json::to_string(request).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientRequest`] from a JSON string.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the input is not a valid
/// request.
pub fn decode_request(json: &str) -> Result<ClientRequest, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Serialization(e.to_string()))
}
