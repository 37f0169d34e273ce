//! Task data model for the `BoardSync` protocol.
//!
//! Defines the task record shared by the authoritative store, the wire
//! format, and every client's local cache, plus title validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
///
/// Ids are minted by the *client* when a task is created, so an
/// optimistic local insert and the later authoritative upsert refer to
/// the same task and reconcile by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of a task; determines which column it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses, in board column order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Error returned when parsing a [`TaskStatus`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status {0:?} (expected todo, in_progress, or done)")]
pub struct ParseStatusError(String);

impl std::str::FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A task on the shared board.
///
/// `order` is the dense, zero-based rank within the column given by
/// `status`; the authoritative store maintains the contiguity invariant
/// (orders in a column are exactly `0..n`). `revision` is the server
/// commit counter value of the last mutation that touched this task;
/// optimistic local mutations never advance it, which is what lets any
/// authoritative event supersede a local guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7, time-ordered).
    pub id: TaskId,
    /// Task title, set at creation and editable by the owner.
    pub title: String,
    /// Column the task currently belongs to.
    pub status: TaskStatus,
    /// Dense zero-based rank within the current column.
    pub order: u32,
    /// Username of the creating user; immutable, server-enforced.
    pub owner: String,
    /// Server commit revision of the last mutation touching this task.
    pub revision: u64,
    /// When the task was created (milliseconds since epoch).
    pub created_at: u64,
    /// When the task was last mutated (milliseconds since epoch).
    pub updated_at: u64,
}

/// Error returned when a task title fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is empty.
    #[error("task title cannot be empty")]
    EmptyTitle,
    /// Title exceeds the maximum allowed length.
    #[error("task title too long ({len} characters, max {max})")]
    TitleTooLong {
        /// Actual length in characters.
        len: usize,
        /// Maximum allowed length in characters.
        max: usize,
    },
}

/// Validates a task title for create/edit.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTitle`] for an empty title, or
/// [`ValidationError::TitleTooLong`] if it exceeds
/// [`MAX_TASK_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > MAX_TASK_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TASK_TITLE_LENGTH,
        });
    }
    Ok(())
}

/// Returns the current time in milliseconds since the UNIX epoch.
#[must_use]
pub fn now_ms() -> u64 {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
