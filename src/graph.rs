//! AccessGraph — roles, permissions, and the grant edges between them
//!
//! Owns the role table, the permission table, role→permission sets,
//! user→role assignment (one role per user), and user→permission direct
//! grants. Effective permissions are the union of the direct grants and
//! the role's set; a user whose role is missing from the role table is a
//! data-integrity error, never a silent deny.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::credential::CredentialStore;
use crate::error::{AccessError, Result};
use crate::schema::{State, DEFAULT_ROLE};

/// Role/permission graph operations over the state aggregate
#[derive(Clone, Copy, Default)]
pub struct AccessGraph;

impl AccessGraph {
    // ─── Role / Permission Tables ───

    pub fn add_role(&self, state: &mut State, role: &str) -> Result<()> {
        if state.roles.contains_key(role) {
            return Err(AccessError::RoleAlreadyExists(role.to_string()));
        }
        state.roles.insert(role.to_string(), BTreeSet::new());
        info!(role, "Role added");
        Ok(())
    }

    /// Remove a role; refused while any user still references it
    pub fn remove_role(&self, state: &mut State, role: &str) -> Result<()> {
        if !state.roles.contains_key(role) {
            return Err(AccessError::RoleNotFound(role.to_string()));
        }
        let users = state.users.values().filter(|u| u.role == role).count();
        if users > 0 {
            return Err(AccessError::RoleInUse {
                role: role.to_string(),
                users,
            });
        }
        state.roles.remove(role);
        info!(role, "Role removed");
        Ok(())
    }

    pub fn add_permission(&self, state: &mut State, permission: &str) -> Result<()> {
        if !state.permissions.insert(permission.to_string()) {
            return Err(AccessError::PermissionAlreadyExists(permission.to_string()));
        }
        info!(permission, "Permission added");
        Ok(())
    }

    /// Remove a permission and cascade it out of every role's set and
    /// every user's direct grants. All-or-nothing from the caller's view:
    /// the actor persists the whole mutation or none of it.
    pub fn remove_permission(&self, state: &mut State, permission: &str) -> Result<()> {
        if !state.permissions.remove(permission) {
            return Err(AccessError::PermissionNotFound(permission.to_string()));
        }
        for granted in state.roles.values_mut() {
            granted.remove(permission);
        }
        for user in state.users.values_mut() {
            user.direct_grants.remove(permission);
        }
        info!(permission, "Permission removed (cascaded)");
        Ok(())
    }

    // ─── User ↔ Role ───

    /// Replace the user's role (single-role model). Validates the role
    /// table side; the record write is the credential store's.
    pub fn assign_role(
        &self,
        state: &mut State,
        credentials: &CredentialStore,
        username: &str,
        role: &str,
    ) -> Result<()> {
        if !state.roles.contains_key(role) {
            return Err(AccessError::RoleNotFound(role.to_string()));
        }
        credentials.set_role(state, username, role)?;
        info!(username, role, "Role assigned");
        Ok(())
    }

    /// Revoke the named role; the user falls back to the default role
    pub fn revoke_role(
        &self,
        state: &mut State,
        credentials: &CredentialStore,
        username: &str,
        role: &str,
    ) -> Result<()> {
        if !state.roles.contains_key(role) {
            return Err(AccessError::RoleNotFound(role.to_string()));
        }
        let current = state
            .users
            .get(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?
            .role
            .clone();
        if current != role {
            return Err(AccessError::RoleNotAssigned {
                user: username.to_string(),
                role: role.to_string(),
            });
        }
        if !state.roles.contains_key(DEFAULT_ROLE) {
            return Err(AccessError::RoleNotFound(DEFAULT_ROLE.to_string()));
        }
        credentials.set_role(state, username, DEFAULT_ROLE)?;
        info!(username, role, "Role revoked");
        Ok(())
    }

    // ─── Role ↔ Permission ───

    pub fn grant_to_role(&self, state: &mut State, role: &str, permission: &str) -> Result<()> {
        if !state.permissions.contains(permission) {
            return Err(AccessError::PermissionNotFound(permission.to_string()));
        }
        let granted = state
            .roles
            .get_mut(role)
            .ok_or_else(|| AccessError::RoleNotFound(role.to_string()))?;
        if !granted.insert(permission.to_string()) {
            return Err(AccessError::AlreadyGranted(permission.to_string()));
        }
        info!(role, permission, "Permission granted to role");
        Ok(())
    }

    pub fn revoke_from_role(&self, state: &mut State, role: &str, permission: &str) -> Result<()> {
        if !state.permissions.contains(permission) {
            return Err(AccessError::PermissionNotFound(permission.to_string()));
        }
        let granted = state
            .roles
            .get_mut(role)
            .ok_or_else(|| AccessError::RoleNotFound(role.to_string()))?;
        if !granted.remove(permission) {
            return Err(AccessError::NotGranted(permission.to_string()));
        }
        info!(role, permission, "Permission revoked from role");
        Ok(())
    }

    // ─── User ↔ Permission (direct grants) ───

    pub fn grant_direct(&self, state: &mut State, username: &str, permission: &str) -> Result<()> {
        if !state.permissions.contains(permission) {
            return Err(AccessError::PermissionNotFound(permission.to_string()));
        }
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        if !user.direct_grants.insert(permission.to_string()) {
            return Err(AccessError::AlreadyGranted(permission.to_string()));
        }
        info!(username, permission, "Direct grant added");
        Ok(())
    }

    pub fn revoke_direct(&self, state: &mut State, username: &str, permission: &str) -> Result<()> {
        if !state.permissions.contains(permission) {
            return Err(AccessError::PermissionNotFound(permission.to_string()));
        }
        let user = state
            .users
            .get_mut(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        if !user.direct_grants.remove(permission) {
            return Err(AccessError::NotGranted(permission.to_string()));
        }
        info!(username, permission, "Direct grant revoked");
        Ok(())
    }

    // ─── Evaluation ───

    /// Does the user hold the permission, directly or via their role?
    ///
    /// Direct grants are checked first and short-circuit. A user→role edge
    /// pointing at a missing role fails hard so operators can detect
    /// corrupted state.
    pub fn has_permission(&self, state: &State, username: &str, permission: &str) -> Result<bool> {
        let user = state
            .users
            .get(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;

        if user.direct_grants.contains(permission) {
            return Ok(true);
        }

        let Some(granted) = state.roles.get(&user.role) else {
            warn!(username, role = %user.role, "User references missing role");
            return Err(AccessError::DataIntegrity(format!(
                "user '{}' references missing role '{}'",
                username, user.role
            )));
        };
        Ok(granted.contains(permission))
    }

    /// Union of direct grants and the role's permission set
    pub fn effective_permissions(&self, state: &State, username: &str) -> Result<BTreeSet<String>> {
        let user = state
            .users
            .get(username)
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))?;
        let Some(granted) = state.roles.get(&user.role) else {
            warn!(username, role = %user.role, "User references missing role");
            return Err(AccessError::DataIntegrity(format!(
                "user '{}' references missing role '{}'",
                username, user.role
            )));
        };
        Ok(user.direct_grants.union(granted).cloned().collect())
    }

    pub fn list_roles(&self, state: &State) -> Vec<String> {
        state.roles.keys().cloned().collect()
    }

    pub fn list_permissions(&self, state: &State) -> Vec<String> {
        state.permissions.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::credential::{Argon2Hasher, CredentialStore};

    use super::*;

    fn state_with_bob() -> (CredentialStore, State) {
        let creds = CredentialStore::new(Arc::new(Argon2Hasher));
        let mut state = State::bootstrap();
        creds
            .register(&mut state, "bob", "password1", "user", Utc::now())
            .unwrap();
        (creds, state)
    }

    #[test]
    fn test_role_permission_resolution() {
        let graph = AccessGraph;
        let (creds, mut state) = state_with_bob();

        graph.add_role(&mut state, "admin").unwrap();
        graph.add_permission(&mut state, "delete").unwrap();
        graph.grant_to_role(&mut state, "admin", "delete").unwrap();
        graph.assign_role(&mut state, &creds, "bob", "admin").unwrap();

        assert!(graph.has_permission(&state, "bob", "delete").unwrap());
        assert!(!graph.has_permission(&state, "bob", "create").unwrap());
        assert!(matches!(
            graph.has_permission(&state, "nobody", "delete"),
            Err(AccessError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_direct_grant_short_circuits() {
        let graph = AccessGraph;
        let (_creds, mut state) = state_with_bob();

        graph.add_permission(&mut state, "export").unwrap();
        graph.grant_direct(&mut state, "bob", "export").unwrap();

        // granted directly, role ("user") has nothing
        assert!(graph.has_permission(&state, "bob", "export").unwrap());

        graph.revoke_direct(&mut state, "bob", "export").unwrap();
        assert!(!graph.has_permission(&state, "bob", "export").unwrap());
    }

    #[test]
    fn test_remove_permission_cascades() {
        let graph = AccessGraph;
        let (creds, mut state) = state_with_bob();

        graph.add_role(&mut state, "admin").unwrap();
        graph.add_permission(&mut state, "delete").unwrap();
        graph.grant_to_role(&mut state, "admin", "delete").unwrap();
        graph.grant_direct(&mut state, "bob", "delete").unwrap();
        graph.assign_role(&mut state, &creds, "bob", "admin").unwrap();

        graph.remove_permission(&mut state, "delete").unwrap();

        assert!(!graph.has_permission(&state, "bob", "delete").unwrap());
        assert!(!state.roles["admin"].contains("delete"));
        assert!(state.users["bob"].direct_grants.is_empty());
    }

    #[test]
    fn test_idempotent_reapplication_signals() {
        let graph = AccessGraph;
        let (_creds, mut state) = state_with_bob();

        graph.add_role(&mut state, "admin").unwrap();
        graph.add_permission(&mut state, "delete").unwrap();
        graph.grant_to_role(&mut state, "admin", "delete").unwrap();

        assert!(matches!(
            graph.add_role(&mut state, "admin"),
            Err(AccessError::RoleAlreadyExists(_))
        ));
        assert!(matches!(
            graph.add_permission(&mut state, "delete"),
            Err(AccessError::PermissionAlreadyExists(_))
        ));
        assert!(matches!(
            graph.grant_to_role(&mut state, "admin", "delete"),
            Err(AccessError::AlreadyGranted(_))
        ));
        assert!(matches!(
            graph.revoke_from_role(&mut state, "user", "delete"),
            Err(AccessError::NotGranted(_))
        ));
    }

    #[test]
    fn test_remove_role_refused_while_referenced() {
        let graph = AccessGraph;
        let (creds, mut state) = state_with_bob();

        graph.add_role(&mut state, "admin").unwrap();
        graph.assign_role(&mut state, &creds, "bob", "admin").unwrap();

        assert!(matches!(
            graph.remove_role(&mut state, "admin"),
            Err(AccessError::RoleInUse { users: 1, .. })
        ));

        graph.revoke_role(&mut state, &creds, "bob", "admin").unwrap();
        assert_eq!(state.users["bob"].role, DEFAULT_ROLE);
        graph.remove_role(&mut state, "admin").unwrap();
    }

    #[test]
    fn test_revoke_role_not_assigned() {
        let graph = AccessGraph;
        let (creds, mut state) = state_with_bob();

        graph.add_role(&mut state, "admin").unwrap();
        assert!(matches!(
            graph.revoke_role(&mut state, &creds, "bob", "admin"),
            Err(AccessError::RoleNotAssigned { .. })
        ));
    }

    #[test]
    fn test_dangling_role_is_integrity_error() {
        let graph = AccessGraph;
        let (_creds, mut state) = state_with_bob();

        // simulate a store file corrupted out-of-band
        state.roles.remove(DEFAULT_ROLE);

        assert!(matches!(
            graph.has_permission(&state, "bob", "anything"),
            Err(AccessError::DataIntegrity(_))
        ));
        assert!(matches!(
            graph.effective_permissions(&state, "bob"),
            Err(AccessError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_effective_permissions_union() {
        let graph = AccessGraph;
        let (_creds, mut state) = state_with_bob();

        graph.add_permission(&mut state, "read").unwrap();
        graph.add_permission(&mut state, "export").unwrap();
        graph.grant_to_role(&mut state, "user", "read").unwrap();
        graph.grant_direct(&mut state, "bob", "export").unwrap();

        let effective = graph.effective_permissions(&state, "bob").unwrap();
        assert_eq!(
            effective.into_iter().collect::<Vec<_>>(),
            vec!["export".to_string(), "read".to_string()]
        );
    }
}
