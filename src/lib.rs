//! # Gatewarden
//!
//! Access-control core — credential storage, time-bounded sessions, and a
//! role/permission graph behind one actor-serialized façade.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │             AccessHandle                  │
//! │   (clone-anywhere client, mpsc sender)    │
//! ├───────────────────────────────────────────┤
//! │             AccessActor                   │
//! │   (sequential event loop, owns State)     │
//! ├──────────────┬──────────────┬─────────────┤
//! │ Credential   │   Session    │   Access    │
//! │   Store      │   Manager    │   Graph     │
//! │ (users,      │ (tokens,     │ (roles,     │
//! │  digests)    │  expiry)     │  grants)    │
//! ├──────────────┴──────────────┴─────────────┤
//! │                  Store                    │
//! │   (wholesale State load/save, atomic      │
//! │    JSON file or in-memory)                │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatewarden::{AccessActor, AccessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = AccessActor::spawn(AccessConfig::new("/data/gatewarden")).await?;
//!
//!     handle.add_permission("reports.read".into()).await?;
//!     handle.add_role("analyst".into()).await?;
//!     handle.grant_to_role("analyst".into(), "reports.read".into()).await?;
//!
//!     handle.register("alice".into(), "S3cret-pass".into()).await?;
//!     handle.assign_role("alice".into(), "analyst".into()).await?;
//!
//!     let session = handle.authenticate("alice".into(), "S3cret-pass".into()).await?;
//!     let allowed = handle
//!         .authorize("alice".into(), session.token, "reports.read".into())
//!         .await?;
//!     assert!(allowed);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Serialized mutations**: every operation flows through one actor, so
//!   concurrent logins or grant edits never interleave a read-modify-write
//! - **Crash-safe persistence**: state is written to a temp file and
//!   renamed into place; a failed save rolls the operation back
//! - **Single active session**: a new login invalidates the prior token
//! - **Lazy expiry**: validity is recomputed from the stored absolute
//!   expiry on every check, no background sweeper
//! - **Hard integrity failures**: a user referencing a missing role is a
//!   surfaced error, never a silent deny
//! - **Railway programming**: all operations return `Result<T, AccessError>`

pub mod config;
pub mod credential;
pub mod error;
pub mod graph;
pub mod schema;
pub mod service;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use config::AccessConfig;
pub use credential::{Argon2Hasher, CredentialStore, SecretHasher};
pub use error::{AccessError, Result};
pub use graph::AccessGraph;
pub use schema::{SessionRecord, State, UserRecord, UserView, DEFAULT_ROLE};
pub use service::{AccessActor, AccessHandle};
pub use session::{IssuedSession, SessionManager};
pub use store::{JsonFileStore, MemoryStore, Store};
