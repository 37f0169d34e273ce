//! Identity seam for the board server.
//!
//! Credential issuance and login flows live in an external service;
//! the server only needs to resolve an opaque channel token to an
//! [`Actor`]. [`AuthProvider`] is that boundary, and
//! [`StaticTokenAuth`] is the built-in implementation backed by the
//! token table in the server configuration.

use std::collections::HashMap;

use boardsync_proto::actor::Actor;

/// Resolves an opaque token to an acting identity.
pub trait AuthProvider: Send + Sync {
    /// Returns the actor for `token`, or `None` if the token is not
    /// recognized.
    fn authenticate(&self, token: &str) -> Option<Actor>;
}

/// Token table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Actor>,
}

impl StaticTokenAuth {
    /// Creates an auth provider from a token table.
    #[must_use]
    pub fn new(tokens: HashMap<String, Actor>) -> Self {
        Self { tokens }
    }

    /// Adds the demo identities: two regular users and one
    /// application administrator.
    pub fn add_demo_users(&mut self) {
        self.tokens
            .insert("alice-token".to_string(), Actor::new("alice", false));
        self.tokens
            .insert("bob-token".to_string(), Actor::new("bob", false));
        self.tokens
            .insert("admin-token".to_string(), Actor::new("admin", true));
    }

    /// Creates an auth provider holding only the demo identities.
    #[must_use]
    pub fn demo() -> Self {
        let mut auth = Self::default();
        auth.add_demo_users();
        auth
    }

    /// Registers a token for an actor, replacing any previous binding.
    pub fn insert(&mut self, token: impl Into<String>, actor: Actor) {
        self.tokens.insert(token.into(), actor);
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AuthProvider for StaticTokenAuth {
    fn authenticate(&self, token: &str) -> Option<Actor> {
        self.tokens.get(token).cloned()
    }
}
