use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::{AuthError, AuthzError};
use warden_core::ErrorKind;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::AuthenticationFailure => StatusCode::UNAUTHORIZED,
        ErrorKind::AccountLocked => StatusCode::LOCKED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an account lifecycle failure.
///
/// Unknown email and wrong password share one body. Internal failures are
/// logged here and never leak their detail to the client.
pub fn auth_error_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::UserNotFound | AuthError::InvalidPassword => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
        AuthError::InvalidOrExpiredToken => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_token",
            "invalid or expired token",
        ),
        err if err.kind() == ErrorKind::Internal => {
            tracing::error!(error = %err, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Internal.as_str(),
                "internal error",
            )
        }
        err => {
            let kind = err.kind();
            json_error(status_for(kind), kind.as_str(), err.to_string())
        }
    }
}

pub fn authz_error_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthorized => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "authentication required",
        ),
        AuthzError::Forbidden(reason) => json_error(StatusCode::FORBIDDEN, "forbidden", reason),
        AuthzError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, ErrorKind::Validation.as_str(), message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
