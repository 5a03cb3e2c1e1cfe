//! Typed error types for the anifeed-core service layer.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the anifeed-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An activity, user, item, comment or relation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor is not the owner of the target.
    #[error("User {actor} is not allowed to modify {entity} {id}")]
    NotAuthorized {
        actor: i64,
        entity: &'static str,
        id: String,
    },

    /// The request is malformed (bad rating, empty content, unknown status...).
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A reply was addressed to a comment that is itself a reply.
    #[error("INVALID_DEPTH: comment {parent_comment_id} is a reply and cannot be replied to")]
    InvalidDepth { parent_comment_id: i64 },

    /// A duplicate like, follow or unique key.
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// The referenced catalog entry is absent, so the write cannot be projected.
    #[error("Catalog entry missing: {kind} {id}")]
    CatalogMissing { kind: &'static str, id: i64 },

    /// Retryable storage error (busy or locked database).
    #[error("Transient storage error: {0:#}")]
    Transient(anyhow::Error),

    /// An internal storage or database error.
    #[error(transparent)]
    Internal(anyhow::Error),
}

/// Coarse error classification exposed to transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAuthorized,
    InvalidInput,
    Conflict,
    CatalogMissing,
    Transient,
    Internal,
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::InvalidInput { .. } | Self::InvalidDepth { .. } => ErrorKind::InvalidInput,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::CatalogMissing { .. } => ErrorKind::CatalogMissing,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a transport should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::CatalogMissing => 404,
            ErrorKind::NotAuthorized => 403,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Transient | ErrorKind::Internal => 500,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        match sqlite_code(&err) {
            Some((ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked, _)) => Self::Transient(err),
            Some((ErrorCode::ConstraintViolation, extended))
                if extended == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || extended == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Self::Conflict {
                    reason: format!("{err:#}"),
                }
            }
            _ => Self::Internal(err),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::from(anyhow::Error::from(err))
    }
}

/// Find the SQLite primary and extended result codes anywhere in the chain.
fn sqlite_code(err: &anyhow::Error) -> Option<(ErrorCode, i32)> {
    err.chain().find_map(|cause| match cause.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(failure, _)) => {
            Some((failure.code, failure.extended_code))
        }
        _ => None,
    })
}
