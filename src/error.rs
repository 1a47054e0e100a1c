use rusqlite::ErrorCode;
use thiserror::Error;

use crate::database::DatabaseError;

/// Kinds of resources that can be reported missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Project,
    Task,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Task => write!(f, "task"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Absent, or owned by someone else. The two are indistinguishable.
    #[error("{resource} not found with id: {id}")]
    NotFound { resource: Resource, id: i64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Unauthenticated(&'static str),

    #[error("Store temporarily unavailable: {0}")]
    TransientStore(#[source] rusqlite::Error),

    #[error("Internal error: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn not_found(resource: Resource, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        if is_transient(&err) {
            tracing::warn!(error = %err, "transient store failure");
            Self::TransientStore(err)
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::SqliteError(e) => e.into(),
            other => Self::Fatal(other.to_string()),
        }
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => matches!(
            code.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                && message
                    .as_deref()
                    .is_some_and(|value| value.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}
