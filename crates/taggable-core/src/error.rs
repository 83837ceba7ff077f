//! Error types for taggable.

use thiserror::Error;

/// Result type alias using taggable's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tagging operations.
///
/// Tagging paths never fail on absence: lookups return `Option` and removing an
/// unattached tag is a no-op. Only administrative operations that address a
/// tag by id return [`Error::TagNotFound`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Tag not found (administrative lookups by id)
    #[error("Tag not found: {0}")]
    TagNotFound(i64),

    /// Invalid input (blank tag names, unregistered taggable types, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was caused by caller input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Whether PostgreSQL aborted the transaction as a deadlock victim (40P01).
    pub fn is_deadlock(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("40P01"),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_tag_not_found() {
        let err = Error::TagNotFound(42);
        assert_eq!(err.to_string(), "Tag not found: 42");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("tag name cannot be blank".to_string());
        assert_eq!(err.to_string(), "Invalid input: tag name cannot be blank");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("delimiters cannot be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: delimiters cannot be empty"
        );
    }

    #[test]
    fn test_is_deadlock_only_for_database_errors() {
        assert!(!Error::Database(sqlx::Error::PoolTimedOut).is_deadlock());
        assert!(!Error::Internal("deadlock detected".to_string()).is_deadlock());
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::InvalidInput("x".to_string()).is_validation());
        assert!(!Error::Internal("x".to_string()).is_validation());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_validation());
    }

    #[test]
    fn test_database_error_passes_through() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        match err {
            Error::Database(sqlx::Error::PoolTimedOut) => {}
            other => panic!("Expected Database(PoolTimedOut), got {:?}", other),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
