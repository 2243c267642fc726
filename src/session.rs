//! Identity/session seam
//!
//! The core never authenticates anyone. It consumes a host-supplied session
//! provider and partitions all state by the user it reports.

use serde::{Deserialize, Serialize};

/// The partition of all persisted and in-memory state belonging to one
/// identified user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScope {
    pub id: String,
}

impl UserScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Host-supplied identity provider.
pub trait SessionProvider {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserScope>;

    fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Fixed session for tests and native tooling.
#[derive(Debug, Clone, Default)]
pub struct FixedSession {
    user: Option<UserScope>,
}

impl FixedSession {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            user: Some(UserScope::new(id)),
        }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl SessionProvider for FixedSession {
    fn current_user(&self) -> Option<UserScope> {
        self.user.clone()
    }
}
