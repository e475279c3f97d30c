//! `/user-maintenance` endpoints: password reset, email verification and
//! tenant-scoped user administration.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use warden_auth::{AuthError, Target, policies};
use warden_core::UserId;

use crate::app::delivery::OutboundSecret;
use crate::app::dto::{
    DeleteUserQuery, MessageResponse, ResetPasswordBody, ResetPasswordRequest, RoleEntry,
    UpdateUserRequest, VerificationTokenIssued, VerifyEmailRequest, json_body,
};
use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::AuthContext;

fn accepted(message: &'static str) -> axum::response::Response {
    (StatusCode::ACCEPTED, Json(MessageResponse { message })).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Public
// ─────────────────────────────────────────────────────────────────────────────

/// POST /user-maintenance/reset-password-request
///
/// Answers 202 whether or not the email is registered.
pub async fn request_password_reset(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match services
        .accounts
        .request_password_reset(&req.email, Utc::now())
        .await
    {
        Ok(token) => services.delivery.deliver(OutboundSecret::PasswordReset {
            email: req.email.trim().to_string(),
            token,
        }),
        Err(AuthError::UserNotFound) => {
            tracing::debug!("password reset requested for unknown email");
        }
        Err(e) => return errors::auth_error_response(e),
    }

    accepted("if the account exists, a reset token has been sent")
}

/// POST /user-maintenance/reset-password
pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ResetPasswordBody>, JsonRejection>,
) -> axum::response::Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match services
        .accounts
        .reset_password(&req.reset_token, &req.new_password, Utc::now())
        .await
    {
        Ok(()) => accepted("password has been reset"),
        Err(e) => errors::auth_error_response(e),
    }
}

/// POST /user-maintenance/verify-email
pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match services
        .accounts
        .verify_email(req.tenant_id, req.user_id, &req.token, Utc::now())
        .await
    {
        Ok(()) => accepted("email verified"),
        Err(e) => errors::auth_error_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protected
// ─────────────────────────────────────────────────────────────────────────────

/// DELETE /user-maintenance/user?userId=
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: AuthContext,
    query: Result<Query<DeleteUserQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    let target = Target::user(ctx.tenant_id(), query.user_id);
    if let Err(resp) = authz::guard(&ctx, &policies::DELETE_USER, target) {
        return resp;
    }

    match services
        .accounts
        .delete_user(ctx.tenant_id(), query.user_id)
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "user deleted",
        })
        .into_response(),
        Err(e) => errors::auth_error_response(e),
    }
}

/// PUT /user-maintenance/user
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: AuthContext,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let (user_id, update) = match json_body(payload) {
        Ok(req) => req.into_parts(),
        Err(resp) => return resp,
    };
    let target = Target::user(ctx.tenant_id(), user_id);
    if let Err(resp) = authz::guard(&ctx, &policies::UPDATE_USER, target) {
        return resp;
    }

    match services
        .accounts
        .update_user(ctx.tenant_id(), user_id, update, Utc::now())
        .await
    {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::auth_error_response(e),
    }
}

/// GET /user-maintenance/users/get-all
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: AuthContext,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(&ctx, &policies::LIST_USERS, Target::tenant(ctx.tenant_id())) {
        return resp;
    }

    match services.accounts.list_users(ctx.tenant_id()).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => errors::auth_error_response(e),
    }
}

/// GET /user-maintenance/users/get-roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: AuthContext,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(&ctx, &policies::LIST_ROLES, Target::tenant(ctx.tenant_id())) {
        return resp;
    }

    let roles: Vec<RoleEntry> = services
        .accounts
        .user_roles()
        .iter()
        .copied()
        .map(RoleEntry::from)
        .collect();
    Json(roles).into_response()
}

/// POST /user-maintenance/users/:id/verification-token
pub async fn issue_verification_token(
    Extension(services): Extension<Arc<AppServices>>,
    ctx: AuthContext,
    user_id: Result<Path<UserId>, PathRejection>,
) -> axum::response::Response {
    let Path(user_id) = match user_id {
        Ok(p) => p,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    let target = Target::user(ctx.tenant_id(), user_id);
    if let Err(resp) = authz::guard(&ctx, &policies::ISSUE_EMAIL_VERIFICATION, target) {
        return resp;
    }

    match services
        .accounts
        .issue_email_verification(ctx.tenant_id(), user_id, Utc::now())
        .await
    {
        Ok(token) => {
            services.delivery.deliver(OutboundSecret::EmailVerification {
                tenant_id: ctx.tenant_id(),
                user_id,
                token,
            });
            (
                StatusCode::ACCEPTED,
                Json(VerificationTokenIssued {
                    user_id,
                    message: "verification token sent",
                }),
            )
                .into_response()
        }
        Err(e) => errors::auth_error_response(e),
    }
}
