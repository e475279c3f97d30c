use thiserror::Error;

use warden_core::ErrorKind;

use crate::{PasswordError, StoreError, TokenError};

/// Failures of account lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("invalid password")]
    InvalidPassword,

    #[error("account is locked")]
    AccountLocked,

    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("credential error: {0}")]
    Credential(String),

    #[error(transparent)]
    Store(StoreError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UserNotFound | AuthError::InvalidPassword | AuthError::InvalidOrExpiredToken => {
                ErrorKind::AuthenticationFailure
            }
            AuthError::AccountLocked => ErrorKind::AccountLocked,
            AuthError::TenantNotFound | AuthError::NotFound => ErrorKind::NotFound,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::Token(e) => e.kind(),
            AuthError::Credential(_) => ErrorKind::Internal,
            AuthError::Store(e) => e.kind(),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(value: PasswordError) -> Self {
        match value {
            PasswordError::TooShort { .. } => AuthError::Validation(value.to_string()),
            PasswordError::Hash(msg) => AuthError::Credential(msg),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateEmail(email) => {
                AuthError::Conflict(format!("email already in use: {email}"))
            }
            StoreError::Missing => AuthError::NotFound,
            other => AuthError::Store(other),
        }
    }
}
