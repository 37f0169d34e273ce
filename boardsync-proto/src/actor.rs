//! Acting-user identity context.
//!
//! An [`Actor`] is supplied by the external identity collaborator and
//! passed explicitly into every policy and dispatcher call; the core
//! never reads ambient session state and never manages credentials.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// The identity on whose behalf a mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Username as reported by the identity collaborator.
    pub username: String,
    /// Whether the identity collaborator flags this user as an
    /// application administrator.
    pub is_admin: bool,
}

impl Actor {
    /// Creates an actor context.
    #[must_use]
    pub fn new(username: impl Into<String>, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            is_admin,
        }
    }

    /// Whether this actor created the given task.
    #[must_use]
    pub fn is_owner(&self, task: &Task) -> bool {
        self.username == task.owner
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_admin {
            write!(f, "{} (admin)", self.username)
        } else {
            write!(f, "{}", self.username)
        }
    }
}
