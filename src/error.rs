/// Unified error types for vault credential resolution
use thiserror::Error;

/// Main error type for credential resolution
///
/// Cloneable so a single failed in-flight fetch can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Persistent credential store unreachable or corrupted
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Authorization handshake could not produce a token
    #[error("Authorization failure: {0}")]
    Authorization(String),

    /// Local service identity could not be resolved
    #[error("Identity resolution error: {0}")]
    IdentityResolution(String),

    /// Target node explicitly refused the request
    #[error("Authorization rejected by target (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Whether this error belongs to the authorization failure family
    ///
    /// Identity resolution errors and explicit rejections are reported to
    /// `get_token` callers as authorization failures.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            VaultError::Authorization(_)
                | VaultError::IdentityResolution(_)
                | VaultError::Rejected { .. }
        )
    }

    /// Whether this error came from a credential store
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, VaultError::Storage(_))
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Storage(format!("Database error: {}", e))
    }
}

impl From<sqlx::migrate::MigrateError> for VaultError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        VaultError::Storage(format!("Migration failed: {}", e))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        VaultError::Storage(format!("IO error: {}", e))
    }
}

impl From<redis::RedisError> for VaultError {
    fn from(e: redis::RedisError) -> Self {
        VaultError::Storage(format!("Redis error: {}", e))
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::Authorization(format!("HTTP error: {}", e))
    }
}

/// Result type alias for vault credential operations
pub type VaultResult<T> = Result<T, VaultError>;
