//! CredentialStore — user records and password verification
//!
//! Leaf component: owns registration, credential checks, and account
//! management. Password digests go through the [`SecretHasher`] seam so the
//! slow-hash primitive stays swappable; the production implementation is
//! Argon2id with a per-digest random salt.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{AccessError, Result};
use crate::schema::{State, UserRecord, UserView};

const MIN_USERNAME_LEN: usize = 3;
const MIN_SECRET_LEN: usize = 8;

/// One-way digest of a login secret
///
/// `digest` must produce a self-describing string (PHC format) that
/// `verify` can check without further context. Implementations must be
/// salted and deliberately slow.
pub trait SecretHasher: Send + Sync {
    fn digest(&self, secret: &str) -> Result<String>;
    fn verify(&self, digest: &str, secret: &str) -> bool;
}

/// Argon2id hasher — the production `SecretHasher`
#[derive(Default)]
pub struct Argon2Hasher;

impl SecretHasher for Argon2Hasher {
    fn digest(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccessError::PasswordHash(e.to_string()))
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Owns user records inside the state aggregate
#[derive(Clone)]
pub struct CredentialStore {
    hasher: Arc<dyn SecretHasher>,
}

impl CredentialStore {
    pub fn new(hasher: Arc<dyn SecretHasher>) -> Self {
        Self { hasher }
    }

    /// Create a user with the given role
    ///
    /// The role must already exist in the role table — registration never
    /// creates a dangling user→role reference.
    pub fn register(
        &self,
        state: &mut State,
        username: &str,
        secret: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<UserView> {
        if username.len() < MIN_USERNAME_LEN {
            return Err(AccessError::InvalidUsername(format!(
                "must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(AccessError::PasswordTooWeak(format!(
                "must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if state.users.contains_key(username) {
            return Err(AccessError::UserAlreadyExists(username.to_string()));
        }
        if !state.roles.contains_key(role) {
            return Err(AccessError::RoleNotFound(role.to_string()));
        }

        let user = UserRecord {
            username: username.to_string(),
            password_hash: self.hasher.digest(secret)?,
            role: role.to_string(),
            direct_grants: Default::default(),
            session: None,
            created_at: now,
            last_login: None,
        };
        let view = user.view();
        state.users.insert(username.to_string(), user);
        info!(username, role, "User registered");
        Ok(view)
    }

    /// True iff the user exists and the secret matches the stored digest.
    /// The boolean never distinguishes the two failure causes.
    pub fn verify(&self, state: &State, username: &str, secret: &str) -> bool {
        state
            .users
            .get(username)
            .map(|u| self.hasher.verify(&u.password_hash, secret))
            .unwrap_or(false)
    }

    pub fn get(&self, state: &State, username: &str) -> Option<UserView> {
        state.users.get(username).map(UserRecord::view)
    }

    pub fn list(&self, state: &State) -> Vec<UserView> {
        state.users.values().map(UserRecord::view).collect()
    }

    /// Raw role write — existence of the role is the graph's concern
    pub fn set_role(&self, state: &mut State, username: &str, role: &str) -> Result<()> {
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        user.role = role.to_string();
        Ok(())
    }

    /// Verify the old secret, then replace the digest
    pub fn change_password(
        &self,
        state: &mut State,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<()> {
        if new_secret.len() < MIN_SECRET_LEN {
            return Err(AccessError::PasswordTooWeak(format!(
                "must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        if !self.hasher.verify(&user.password_hash, old_secret) {
            return Err(AccessError::InvalidCredentials);
        }
        user.password_hash = self.hasher.digest(new_secret)?;
        info!(username, "Password changed");
        Ok(())
    }

    /// Delete the user record, its session, and its direct grants with it
    pub fn remove(&self, state: &mut State, username: &str) -> Result<()> {
        if state.users.remove(username).is_none() {
            return Err(AccessError::UserNotFound(username.to_string()));
        }
        info!(username, "User removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(Argon2Hasher))
    }

    fn fresh() -> State {
        State::bootstrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher;
        let digest = hasher.digest("my_secret_password").unwrap();
        assert!(hasher.verify(&digest, "my_secret_password"));
        assert!(!hasher.verify(&digest, "wrong_password"));
        assert!(!hasher.verify("not-a-phc-string", "my_secret_password"));
    }

    #[test]
    fn test_register_and_verify() {
        let creds = store();
        let mut state = fresh();
        creds
            .register(&mut state, "bob", "password1", "user", Utc::now())
            .unwrap();

        assert!(creds.verify(&state, "bob", "password1"));
        assert!(!creds.verify(&state, "bob", "wrong"));
        assert!(!creds.verify(&state, "nobody", "password1"));
    }

    #[test]
    fn test_duplicate_registration_keeps_first_digest() {
        let creds = store();
        let mut state = fresh();
        creds
            .register(&mut state, "alice", "password1", "user", Utc::now())
            .unwrap();

        let err = creds
            .register(&mut state, "alice", "password2", "user", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AccessError::UserAlreadyExists(_)));

        // first user's credentials unchanged
        assert!(creds.verify(&state, "alice", "password1"));
        assert!(!creds.verify(&state, "alice", "password2"));
    }

    #[test]
    fn test_register_rejects_unknown_role() {
        let creds = store();
        let mut state = fresh();
        let err = creds
            .register(&mut state, "bob", "password1", "ghost", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AccessError::RoleNotFound(_)));
    }

    #[test]
    fn test_register_input_floors() {
        let creds = store();
        let mut state = fresh();
        assert!(matches!(
            creds.register(&mut state, "ab", "password1", "user", Utc::now()),
            Err(AccessError::InvalidUsername(_))
        ));
        assert!(matches!(
            creds.register(&mut state, "bob", "short", "user", Utc::now()),
            Err(AccessError::PasswordTooWeak(_))
        ));
    }

    #[test]
    fn test_change_password() {
        let creds = store();
        let mut state = fresh();
        creds
            .register(&mut state, "grace", "old_password", "user", Utc::now())
            .unwrap();

        assert!(matches!(
            creds.change_password(&mut state, "grace", "wrong", "new_password"),
            Err(AccessError::InvalidCredentials)
        ));

        creds
            .change_password(&mut state, "grace", "old_password", "new_password")
            .unwrap();
        assert!(!creds.verify(&state, "grace", "old_password"));
        assert!(creds.verify(&state, "grace", "new_password"));
    }

    #[test]
    fn test_remove_user() {
        let creds = store();
        let mut state = fresh();
        creds
            .register(&mut state, "henry", "password1", "user", Utc::now())
            .unwrap();

        creds.remove(&mut state, "henry").unwrap();
        assert!(creds.get(&state, "henry").is_none());
        assert!(matches!(
            creds.remove(&mut state, "henry"),
            Err(AccessError::UserNotFound(_))
        ));
    }
}
