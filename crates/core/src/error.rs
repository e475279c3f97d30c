//! Error taxonomy shared by the access-control crates.

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failure, used by the boundary layer to pick a
/// transport status code.
///
/// Library crates keep their own detailed error enums and expose a `kind()`
/// accessor returning one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad credentials, or a bad/expired/malformed token.
    AuthenticationFailure,
    /// Credentials were correct but the account is latched inactive.
    AccountLocked,
    /// Authenticated, but not permitted to perform the operation.
    Forbidden,
    /// No such user/tenant/resource in the caller's scope.
    NotFound,
    /// Duplicate resource.
    Conflict,
    /// Malformed input.
    Validation,
    /// Persistence or codec failure unrelated to caller input.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailure => "authentication_failure",
            ErrorKind::AccountLocked => "account_locked",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identifier could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {reason}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub reason: String,
}

impl IdParseError {
    pub fn new(kind: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
