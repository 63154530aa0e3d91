//! Configuration for the access-control core

use std::path::{Path, PathBuf};

use chrono::Duration;

/// Default session lifetime after login
pub const DEFAULT_SESSION_TTL_SECS: u64 = 300;

/// Default length of issued session tokens
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Hard floor on token length — shorter tokens are guessable
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Access-control core configuration
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Root directory for persisted state
    pub base_path: PathBuf,

    /// Session lifetime in seconds (absolute expiry, stamped at login)
    pub session_ttl_secs: u64,

    /// Length of issued session tokens, clamped to `MIN_TOKEN_LENGTH`
    pub token_length: usize,
}

impl AccessConfig {
    /// Create config with sensible defaults
    ///
    /// # Arguments
    /// * `base_path` - Root directory for the persisted state file:
    ///   ```text
    ///   base_path/
    ///   └── access.json     (users, roles, permissions)
    ///   ```
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }

    /// Override session lifetime
    pub fn with_session_ttl_secs(mut self, secs: u64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    /// Override token length (clamped to the minimum)
    pub fn with_token_length(mut self, length: usize) -> Self {
        self.token_length = length.max(MIN_TOKEN_LENGTH);
        self
    }

    /// Path of the persisted state file
    pub fn state_path(&self) -> PathBuf {
        self.base_path.join("access.json")
    }

    /// Session lifetime as a chrono duration
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AccessConfig::new("/tmp/test_access");
        assert_eq!(cfg.session_ttl_secs, 300);
        assert_eq!(cfg.token_length, 32);
        assert_eq!(cfg.state_path(), PathBuf::from("/tmp/test_access/access.json"));
    }

    #[test]
    fn test_builder_pattern() {
        let cfg = AccessConfig::new("/data")
            .with_session_ttl_secs(60)
            .with_token_length(48);

        assert_eq!(cfg.session_ttl_secs, 60);
        assert_eq!(cfg.token_length, 48);
        assert_eq!(cfg.session_ttl(), Duration::seconds(60));
    }

    #[test]
    fn test_token_length_floor() {
        let cfg = AccessConfig::new("/data").with_token_length(4);
        assert_eq!(cfg.token_length, MIN_TOKEN_LENGTH);
    }
}
