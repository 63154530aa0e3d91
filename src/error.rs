//! Error types for gatewarden — Railway Programming
//!
//! All operations return `Result<T, AccessError>`.
//! No panics, no unwraps in production code paths.

use thiserror::Error;

/// Unified error type for all access-control operations
#[derive(Error, Debug)]
pub enum AccessError {
    // ─── Credential Errors ───

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password too weak: {0}")]
    PasswordTooWeak(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    // ─── Session Errors ───

    #[error("Session invalid")]
    SessionInvalid,

    // ─── Graph Errors ───

    #[error("Role already exists: {0}")]
    RoleAlreadyExists(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Role still referenced: role={role}, users={users}")]
    RoleInUse { role: String, users: usize },

    #[error("Role not assigned: user={user}, role={role}")]
    RoleNotAssigned { user: String, role: String },

    #[error("Permission already exists: {0}")]
    PermissionAlreadyExists(String),

    #[error("Permission not found: {0}")]
    PermissionNotFound(String),

    #[error("Permission already granted: {0}")]
    AlreadyGranted(String),

    #[error("Permission not granted: {0}")]
    NotGranted(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    // ─── Infrastructure Errors ───

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::Serialization(err.to_string())
    }
}

/// Result type alias for access-control operations
pub type Result<T> = std::result::Result<T, AccessError>;
