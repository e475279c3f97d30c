use axum::{
    Router,
    routing::{delete, get, post},
};

pub mod auth;
pub mod maintenance;
pub mod system;

/// Routes reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route(
            "/user-maintenance/reset-password-request",
            post(maintenance::request_password_reset),
        )
        .route("/user-maintenance/reset-password", post(maintenance::reset_password))
        .route("/user-maintenance/verify-email", post(maintenance::verify_email))
}

/// Routes that require a verified caller (wrapped by the bearer middleware).
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route(
            "/user-maintenance/user",
            delete(maintenance::delete_user).put(maintenance::update_user),
        )
        .route("/user-maintenance/users/get-all", get(maintenance::list_users))
        .route("/user-maintenance/users/get-roles", get(maintenance::list_roles))
        .route(
            "/user-maintenance/users/:id/verification-token",
            post(maintenance::issue_verification_token),
        )
}
