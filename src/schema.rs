//! Persisted state shapes — State, UserRecord, SessionRecord
//!
//! One aggregate holds everything the store reads and writes wholesale:
//! users (with credentials and the optional live session), roles with
//! their permission sets, and the permission table itself.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role given to users registered without an explicit role
pub const DEFAULT_ROLE: &str = "user";

/// The full persisted aggregate — read at startup, written after each mutation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    pub users: BTreeMap<String, UserRecord>,
    /// role name → granted permission names
    pub roles: BTreeMap<String, BTreeSet<String>>,
    pub permissions: BTreeSet<String>,
}

impl State {
    /// Fresh state with the default role seeded, so registration with the
    /// default role never creates a dangling reference
    pub fn bootstrap() -> Self {
        let mut state = Self::default();
        state.roles.insert(DEFAULT_ROLE.to_string(), BTreeSet::new());
        state
    }
}

/// User record as persisted — includes the password digest, never exposed
/// to callers directly (see [`UserView`])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// PHC-format digest produced by the configured hasher
    pub password_hash: String,
    pub role: String,
    #[serde(default)]
    pub direct_grants: BTreeSet<String>,
    #[serde(default)]
    pub session: Option<SessionRecord>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Caller-facing projection without the password digest
    pub fn view(&self) -> UserView {
        UserView {
            username: self.username.clone(),
            role: self.role.clone(),
            direct_grants: self.direct_grants.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
            has_session: self.session.is_some(),
        }
    }
}

/// A user's single live session — only the token digest is retained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Log-safe identifier; never doubles as the token
    pub session_id: Uuid,
    /// Hex SHA-256 of the opaque token handed to the caller
    pub token_digest: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Public projection of a user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub username: String,
    pub role: String,
    pub direct_grants: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub has_session: bool,
}
