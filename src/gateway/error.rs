use rusqlite::ErrorCode;
use thiserror::Error;

use std::io;
use std::sync::PoisonError;

/// Every failure the backend can report, tagged by kind.
///
/// Policy rejections and missing rows share `NotFoundOrForbidden` so callers
/// can never learn whether a row they may not see exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not signed in")]
    Unauthenticated,
    #[error("not found or no permission")]
    NotFoundOrForbidden,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Text shown to the user next to the record or form that failed.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Network(_) => {
                "Could not reach the server. Your change was not saved.".to_string()
            }
            GatewayError::Unauthenticated => "Please sign in to continue.".to_string(),
            GatewayError::NotFoundOrForbidden => {
                "Not found or you do not have permission.".to_string()
            }
            GatewayError::Conflict(what) => format!("Already taken: {}", what),
            GatewayError::Validation(what) => what.clone(),
            GatewayError::Storage(_) => "Something went wrong while saving.".to_string(),
        }
    }

    pub fn requires_sign_in(&self) -> bool {
        matches!(self, GatewayError::Unauthenticated)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(e: rusqlite::Error) -> GatewayError {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                GatewayError::Conflict("duplicate value violates a unique constraint".to_string())
            }
            _ => GatewayError::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> GatewayError {
        GatewayError::Storage(e.to_string())
    }
}

impl From<io::Error> for GatewayError {
    fn from(e: io::Error) -> GatewayError {
        GatewayError::Storage(e.to_string())
    }
}

impl<T> From<PoisonError<T>> for GatewayError {
    fn from(e: PoisonError<T>) -> GatewayError {
        GatewayError::Storage(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
