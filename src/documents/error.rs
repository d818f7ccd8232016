use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Message returned whenever a caller presents an expired token
pub const TOKEN_EXPIRED_MESSAGE: &str = "Your token has run out of time, please log in again";

/// Errors raised by the document core and the identity checks in front of it
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{}", TOKEN_EXPIRED_MESSAGE)]
    TokenExpired,

    #[error("A document named '{0}' already exists")]
    DuplicateName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid document name: {0}")]
    InvalidName(String),

    #[error("Access denied: {0}")]
    Access(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("This account has been deleted")]
    AccountExcluded,

    #[error("Employee '{0}' is not linked to any client")]
    LinkNotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl DocumentError {
    pub fn not_found(message: impl Into<String>) -> Self {
        DocumentError::NotFound(message.into())
    }

    pub fn access(message: impl Into<String>) -> Self {
        DocumentError::Access(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        DocumentError::Storage(message.into())
    }
}
