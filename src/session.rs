//! SessionManager — token issuance, validation, and lifecycle
//!
//! Per-user state machine: NoSession → Active → (Expired | LoggedOut) →
//! NoSession. Expiry is lazy: nothing sweeps sessions in the background,
//! validity is recomputed from the stored absolute expiry on every check.
//! Only the SHA-256 digest of a token is ever stored; the clear token
//! exists once, in the [`IssuedSession`] returned to the caller.

use chrono::{DateTime, Duration, Utc};
use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::credential::CredentialStore;
use crate::error::{AccessError, Result};
use crate::schema::{SessionRecord, State};

/// A freshly issued session — the only place the clear token appears
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Hex SHA-256 digest of a token, the at-rest and comparison form
pub(crate) fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token(length: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), length)
}

/// Owns session records inside the state aggregate
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    token_length: usize,
}

impl SessionManager {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            ttl: config.session_ttl(),
            token_length: config.token_length.max(crate::config::MIN_TOKEN_LENGTH),
        }
    }

    /// Authenticate and issue a fresh session, replacing any prior one
    ///
    /// The old token becomes invalid the moment this returns: a user holds
    /// at most one live session.
    pub fn login(
        &self,
        state: &mut State,
        credentials: &CredentialStore,
        username: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession> {
        if !state.users.contains_key(username) {
            return Err(AccessError::UserNotFound(username.to_string()));
        }
        if !credentials.verify(state, username, secret) {
            return Err(AccessError::InvalidCredentials);
        }

        // Re-roll on the vanishingly unlikely collision with a live token
        let (token, digest) = loop {
            let candidate = generate_token(self.token_length);
            let digest = token_digest(&candidate);
            let collides = state
                .users
                .values()
                .filter_map(|u| u.session.as_ref())
                .any(|s| s.token_digest == digest);
            if !collides {
                break (candidate, digest);
            }
        };

        let session = SessionRecord {
            session_id: Uuid::new_v4(),
            token_digest: digest,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let issued = IssuedSession {
            token,
            session_id: session.session_id,
            expires_at: session.expires_at,
        };

        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        user.session = Some(session);
        user.last_login = Some(now);

        info!(username, session_id = %issued.session_id, ttl_secs = self.ttl.num_seconds(), "Login successful");
        Ok(issued)
    }

    /// True iff the user exists, the token digest matches, and the session
    /// has not expired. Never mutates state.
    pub fn validate(&self, state: &State, username: &str, token: &str, now: DateTime<Utc>) -> bool {
        let Some(session) = state.users.get(username).and_then(|u| u.session.as_ref()) else {
            debug!(username, "Validation miss: no session");
            return false;
        };
        if session.token_digest != token_digest(token) {
            debug!(username, session_id = %session.session_id, "Validation miss: token mismatch");
            return false;
        }
        if session.is_expired(now) {
            debug!(username, session_id = %session.session_id, "Validation miss: expired");
            return false;
        }
        true
    }

    /// Clear the user's session; succeeds whether or not one was live
    pub fn logout(&self, state: &mut State, username: &str) -> Result<()> {
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        if let Some(session) = user.session.take() {
            info!(username, session_id = %session.session_id, "Session revoked");
        }
        Ok(())
    }

    /// Drop expired session records, returning how many were removed.
    /// Explicit maintenance only — validation never needs it.
    pub fn purge_expired(&self, state: &mut State, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for user in state.users.values_mut() {
            if user.session.as_ref().is_some_and(|s| s.is_expired(now)) {
                user.session = None;
                purged += 1;
            }
        }
        if purged > 0 {
            info!(purged, "Expired sessions purged");
        }
        purged
    }
}
