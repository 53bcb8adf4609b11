//! Unified error type for warden.
//!
//! All public APIs return `Result<T, WardenError>`. The error type provides
//! specific variants for the reconciliation and validation failures the
//! account/asset rules produce, plus the infrastructure failures underneath
//! them.

use thiserror::Error;

use crate::accounts::BulkResult;

/// The unified error type for all warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    // ── I/O & filesystem ───────────────────────────────────────────────
    /// Filesystem or I/O operation failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    // ── Database ───────────────────────────────────────────────────────
    /// SQLite / database operation failed.
    #[error("database error: {0}")]
    Db(rusqlite::Error),

    /// A uniqueness constraint rejected a write. Kept apart from `Db` so
    /// callers can retry with a different name.
    #[error("uniqueness violation: {0}")]
    UniqueViolation(String),

    // ── Serialization ──────────────────────────────────────────────────
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// KDL config file parsing error.
    #[error("config error: {0}")]
    Config(String),

    // ── Lookup errors ──────────────────────────────────────────────────
    /// A referenced template, asset, platform or account was not found.
    #[error("{0}")]
    NotFound(String),

    // ── Reconciliation ─────────────────────────────────────────────────
    /// The candidate collides with an existing record under the error policy.
    #[error("{0}")]
    Conflict(String),

    /// A strict bulk creation produced errors. Carries every error entry;
    /// targets that succeeded before the failure stay committed.
    #[error("bulk creation failed for {} asset(s)", .0.len())]
    BulkFailed(Vec<BulkResult>),

    // ── Validation ─────────────────────────────────────────────────────
    /// A value is outside its allowed bounds (e.g. a port).
    #[error("{0}")]
    Range(String),

    /// Protocols required by the platform are absent.
    #[error("Protocol is required: {}", .0.join(", "))]
    MissingProtocol(Vec<String>),

    /// Field-level input validation failed.
    #[error("{0}")]
    Validation(String),

    // ── Catch-all ──────────────────────────────────────────────────────
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

// ── From implementations for common error types ────────────────────────

impl From<rusqlite::Error> for WardenError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        code.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                WardenError::UniqueViolation(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => WardenError::Db(e),
        }
    }
}

impl From<String> for WardenError {
    fn from(s: String) -> Self {
        WardenError::Other(s)
    }
}

impl From<&str> for WardenError {
    fn from(s: &str) -> Self {
        WardenError::Other(s.to_string())
    }
}

impl From<Box<dyn std::error::Error>> for WardenError {
    fn from(e: Box<dyn std::error::Error>) -> Self {
        WardenError::Other(e.to_string())
    }
}

// ── Convenience constructors ───────────────────────────────────────────

impl WardenError {
    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        WardenError::NotFound(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        WardenError::Conflict(message.into())
    }

    /// Create a range error.
    pub fn range(message: impl Into<String>) -> Self {
        WardenError::Range(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        WardenError::Validation(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        WardenError::Config(message.into())
    }

    /// True when the error came from a uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, WardenError::UniqueViolation(_))
    }
}

/// Convenience type alias for Results using WardenError.
pub type Result<T> = std::result::Result<T, WardenError>;
