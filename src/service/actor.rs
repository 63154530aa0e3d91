//! AccessActor — Tokio actor serializing all access-control operations
//!
//! Every operation is a message processed sequentially from an mpsc
//! channel, so mutations never interleave and reads always observe a
//! consistent snapshot. Mutations run on a clone of the state which is
//! committed only after the store accepts it; a failed save leaves memory
//! and disk exactly as they were.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gatewarden::{AccessActor, AccessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = AccessActor::spawn(AccessConfig::new("/data/gatewarden")).await?;
//!
//!     handle.register("alice".into(), "S3cret-pass".into()).await?;
//!     let session = handle.authenticate("alice".into(), "S3cret-pass".into()).await?;
//!
//!     // Authorize on each request: session first, permission second
//!     let allowed = handle
//!         .authorize("alice".into(), session.token.clone(), "reports.read".into())
//!         .await;
//!
//!     assert!(allowed.is_err() || !allowed.unwrap());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::AccessConfig;
use crate::credential::{Argon2Hasher, CredentialStore, SecretHasher};
use crate::error::{AccessError, Result};
use crate::graph::AccessGraph;
use crate::schema::{State, UserView, DEFAULT_ROLE};
use crate::session::{IssuedSession, SessionManager};
use crate::store::{JsonFileStore, Store};

// ─── Actor Messages ───

enum AccessMsg {
    Register {
        username: String,
        secret: String,
        role: Option<String>,
        reply: oneshot::Sender<Result<UserView>>,
    },
    Authenticate {
        username: String,
        secret: String,
        reply: oneshot::Sender<Result<IssuedSession>>,
    },
    Validate {
        username: String,
        token: String,
        reply: oneshot::Sender<bool>,
    },
    Logout {
        username: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Authorize {
        username: String,
        token: String,
        permission: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    HasPermission {
        username: String,
        permission: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    EffectivePermissions {
        username: String,
        reply: oneshot::Sender<Result<BTreeSet<String>>>,
    },
    GetUser {
        username: String,
        reply: oneshot::Sender<Option<UserView>>,
    },
    ListUsers {
        reply: oneshot::Sender<Vec<UserView>>,
    },
    ChangePassword {
        username: String,
        old_secret: String,
        new_secret: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveUser {
        username: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AddRole {
        role: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveRole {
        role: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AddPermission {
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RemovePermission {
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AssignRole {
        username: String,
        role: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RevokeRole {
        username: String,
        role: String,
        reply: oneshot::Sender<Result<()>>,
    },
    GrantToRole {
        role: String,
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RevokeFromRole {
        role: String,
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    GrantDirect {
        username: String,
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RevokeDirect {
        username: String,
        permission: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ListRoles {
        reply: oneshot::Sender<Vec<String>>,
    },
    ListPermissions {
        reply: oneshot::Sender<Vec<String>>,
    },
    PurgeExpired {
        reply: oneshot::Sender<Result<usize>>,
    },
}

// ─── Actor ───

/// Authorization service actor — owns the state, the store, and the three
/// core components; processes operations sequentially
pub struct AccessActor {
    state: State,
    store: Arc<dyn Store>,
    credentials: CredentialStore,
    sessions: SessionManager,
    graph: AccessGraph,
    rx: mpsc::Receiver<AccessMsg>,
}

impl AccessActor {
    /// Spawn over a JSON file store rooted at the configured path
    pub async fn spawn(config: AccessConfig) -> Result<AccessHandle> {
        let store = Arc::new(JsonFileStore::new(config.state_path()));
        Self::spawn_with_store(store, config).await
    }

    /// Spawn over an existing store (shared or in-memory for tests)
    pub async fn spawn_with_store(
        store: Arc<dyn Store>,
        config: AccessConfig,
    ) -> Result<AccessHandle> {
        let hasher: Arc<dyn SecretHasher> = Arc::new(Argon2Hasher);
        let state = store.load().await?;

        let (tx, rx) = mpsc::channel(256);
        let actor = Self {
            state,
            store,
            credentials: CredentialStore::new(hasher),
            sessions: SessionManager::new(&config),
            graph: AccessGraph,
            rx,
        };

        tokio::spawn(actor.run());
        info!("AccessActor spawned");
        Ok(AccessHandle { tx })
    }

    /// Main event loop
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                AccessMsg::Register { username, secret, role, reply } => {
                    let _ = reply.send(self.handle_register(&username, &secret, role.as_deref()).await);
                }
                AccessMsg::Authenticate { username, secret, reply } => {
                    let _ = reply.send(self.handle_authenticate(&username, &secret).await);
                }
                AccessMsg::Validate { username, token, reply } => {
                    let _ = reply.send(self.sessions.validate(&self.state, &username, &token, Utc::now()));
                }
                AccessMsg::Logout { username, reply } => {
                    let _ = reply.send(self.handle_logout(&username).await);
                }
                AccessMsg::Authorize { username, token, permission, reply } => {
                    let _ = reply.send(self.handle_authorize(&username, &token, &permission));
                }
                AccessMsg::HasPermission { username, permission, reply } => {
                    let _ = reply.send(self.graph.has_permission(&self.state, &username, &permission));
                }
                AccessMsg::EffectivePermissions { username, reply } => {
                    let _ = reply.send(self.graph.effective_permissions(&self.state, &username));
                }
                AccessMsg::GetUser { username, reply } => {
                    let _ = reply.send(self.credentials.get(&self.state, &username));
                }
                AccessMsg::ListUsers { reply } => {
                    let _ = reply.send(self.credentials.list(&self.state));
                }
                AccessMsg::ChangePassword { username, old_secret, new_secret, reply } => {
                    let _ = reply.send(self.handle_change_password(&username, &old_secret, &new_secret).await);
                }
                AccessMsg::RemoveUser { username, reply } => {
                    let _ = reply.send(self.handle_remove_user(&username).await);
                }
                AccessMsg::AddRole { role, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.add_role(s, &role)).await);
                }
                AccessMsg::RemoveRole { role, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.remove_role(s, &role)).await);
                }
                AccessMsg::AddPermission { permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.add_permission(s, &permission)).await);
                }
                AccessMsg::RemovePermission { permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.remove_permission(s, &permission)).await);
                }
                AccessMsg::AssignRole { username, role, reply } => {
                    let creds = self.credentials.clone();
                    let _ = reply.send(self.handle_graph_edit(move |g, s| g.assign_role(s, &creds, &username, &role)).await);
                }
                AccessMsg::RevokeRole { username, role, reply } => {
                    let creds = self.credentials.clone();
                    let _ = reply.send(self.handle_graph_edit(move |g, s| g.revoke_role(s, &creds, &username, &role)).await);
                }
                AccessMsg::GrantToRole { role, permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.grant_to_role(s, &role, &permission)).await);
                }
                AccessMsg::RevokeFromRole { role, permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.revoke_from_role(s, &role, &permission)).await);
                }
                AccessMsg::GrantDirect { username, permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.grant_direct(s, &username, &permission)).await);
                }
                AccessMsg::RevokeDirect { username, permission, reply } => {
                    let _ = reply.send(self.handle_graph_edit(|g, s| g.revoke_direct(s, &username, &permission)).await);
                }
                AccessMsg::ListRoles { reply } => {
                    let _ = reply.send(self.graph.list_roles(&self.state));
                }
                AccessMsg::ListPermissions { reply } => {
                    let _ = reply.send(self.graph.list_permissions(&self.state));
                }
                AccessMsg::PurgeExpired { reply } => {
                    let _ = reply.send(self.handle_purge_expired().await);
                }
            }
        }
        info!("AccessActor stopped");
    }

    // ─── Handler Implementations ───

    /// Persist the mutated clone, then commit it to memory. Called last in
    /// every mutating handler so a failed save rolls the operation back.
    async fn persist(&mut self, next: State) -> Result<()> {
        self.store.save(&next).await?;
        self.state = next;
        Ok(())
    }

    async fn handle_register(
        &mut self,
        username: &str,
        secret: &str,
        role: Option<&str>,
    ) -> Result<UserView> {
        let role = role.unwrap_or(DEFAULT_ROLE);
        let mut next = self.state.clone();
        let view = self
            .credentials
            .register(&mut next, username, secret, role, Utc::now())?;
        self.persist(next).await?;
        Ok(view)
    }

    async fn handle_authenticate(&mut self, username: &str, secret: &str) -> Result<IssuedSession> {
        let mut next = self.state.clone();
        let issued = self
            .sessions
            .login(&mut next, &self.credentials, username, secret, Utc::now())?;
        self.persist(next).await?;
        Ok(issued)
    }

    async fn handle_logout(&mut self, username: &str) -> Result<()> {
        let mut next = self.state.clone();
        self.sessions.logout(&mut next, username)?;
        self.persist(next).await
    }

    /// Session first, permission second — authorization is never evaluated
    /// for an expired or absent session
    fn handle_authorize(&self, username: &str, token: &str, permission: &str) -> Result<bool> {
        if !self.sessions.validate(&self.state, username, token, Utc::now()) {
            return Err(AccessError::SessionInvalid);
        }
        self.graph.has_permission(&self.state, username, permission)
    }

    async fn handle_change_password(
        &mut self,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<()> {
        let mut next = self.state.clone();
        self.credentials
            .change_password(&mut next, username, old_secret, new_secret)?;
        self.persist(next).await
    }

    async fn handle_remove_user(&mut self, username: &str) -> Result<()> {
        let mut next = self.state.clone();
        self.credentials.remove(&mut next, username)?;
        self.persist(next).await
    }

    async fn handle_graph_edit<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&AccessGraph, &mut State) -> Result<()>,
    {
        let mut next = self.state.clone();
        edit(&self.graph, &mut next)?;
        self.persist(next).await
    }

    async fn handle_purge_expired(&mut self) -> Result<usize> {
        let mut next = self.state.clone();
        let purged = self.sessions.purge_expired(&mut next, Utc::now());
        if purged > 0 {
            self.persist(next).await?;
        }
        Ok(purged)
    }
}

// ─── Handle (client-facing API) ───

/// Thread-safe handle to communicate with the AccessActor
#[derive(Clone)]
pub struct AccessHandle {
    tx: mpsc::Sender<AccessMsg>,
}

impl AccessHandle {
    async fn request<T>(
        &self,
        msg: AccessMsg,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| AccessError::ActorUnavailable("AccessActor".into()))?;
        rx.await
            .map_err(|_| AccessError::ActorUnavailable("AccessActor dropped".into()))?
    }

    /// Register a user with the default role
    pub async fn register(&self, username: String, secret: String) -> Result<UserView> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::Register { username, secret, role: None, reply }, rx)
            .await
    }

    /// Register a user with an explicit role (must already exist)
    pub async fn register_as(
        &self,
        username: String,
        secret: String,
        role: String,
    ) -> Result<UserView> {
        let (reply, rx) = oneshot::channel();
        self.request(
            AccessMsg::Register { username, secret, role: Some(role), reply },
            rx,
        )
        .await
    }

    /// Verify credentials and issue a session token
    pub async fn authenticate(&self, username: String, secret: String) -> Result<IssuedSession> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::Authenticate { username, secret, reply }, rx)
            .await
    }

    /// Is this (user, token) pair a live session right now?
    pub async fn validate(&self, username: String, token: String) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(AccessMsg::Validate { username, token, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn logout(&self, username: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::Logout { username, reply }, rx).await
    }

    /// Validate the session, then evaluate the permission. Fails with
    /// [`AccessError::SessionInvalid`] before touching the graph.
    pub async fn authorize(
        &self,
        username: String,
        token: String,
        permission: String,
    ) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::Authorize { username, token, permission, reply }, rx)
            .await
    }

    /// Permission check without a session — administrative surface
    pub async fn has_permission(&self, username: String, permission: String) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::HasPermission { username, permission, reply }, rx)
            .await
    }

    pub async fn effective_permissions(&self, username: String) -> Result<BTreeSet<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::EffectivePermissions { username, reply }, rx)
            .await
    }

    pub async fn get_user(&self, username: String) -> Option<UserView> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AccessMsg::GetUser { username, reply }).await.ok()?;
        rx.await.ok()?
    }

    pub async fn list_users(&self) -> Vec<UserView> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(AccessMsg::ListUsers { reply }).await.is_err() {
            return vec![];
        }
        rx.await.unwrap_or_default()
    }

    pub async fn change_password(
        &self,
        username: String,
        old_secret: String,
        new_secret: String,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(
            AccessMsg::ChangePassword { username, old_secret, new_secret, reply },
            rx,
        )
        .await
    }

    pub async fn remove_user(&self, username: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RemoveUser { username, reply }, rx).await
    }

    pub async fn add_role(&self, role: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::AddRole { role, reply }, rx).await
    }

    pub async fn remove_role(&self, role: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RemoveRole { role, reply }, rx).await
    }

    pub async fn add_permission(&self, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::AddPermission { permission, reply }, rx).await
    }

    pub async fn remove_permission(&self, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RemovePermission { permission, reply }, rx).await
    }

    pub async fn assign_role(&self, username: String, role: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::AssignRole { username, role, reply }, rx).await
    }

    pub async fn revoke_role(&self, username: String, role: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RevokeRole { username, role, reply }, rx).await
    }

    pub async fn grant_to_role(&self, role: String, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::GrantToRole { role, permission, reply }, rx).await
    }

    pub async fn revoke_from_role(&self, role: String, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RevokeFromRole { role, permission, reply }, rx)
            .await
    }

    pub async fn grant_direct(&self, username: String, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::GrantDirect { username, permission, reply }, rx)
            .await
    }

    pub async fn revoke_direct(&self, username: String, permission: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::RevokeDirect { username, permission, reply }, rx)
            .await
    }

    pub async fn list_roles(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(AccessMsg::ListRoles { reply }).await.is_err() {
            return vec![];
        }
        rx.await.unwrap_or_default()
    }

    pub async fn list_permissions(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(AccessMsg::ListPermissions { reply }).await.is_err() {
            return vec![];
        }
        rx.await.unwrap_or_default()
    }

    /// Drop expired session records; returns how many were removed
    pub async fn purge_expired(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.request(AccessMsg::PurgeExpired { reply }, rx).await
    }
}
