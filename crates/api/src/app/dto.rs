use axum::{Json, extract::rejection::JsonRejection, response::Response};
use serde::{Deserialize, Serialize};

use warden_auth::{Role, UserUpdate};
use warden_core::{TenantId, UserId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordBody {
    pub reset_token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub is_email_verified: bool,
}

impl UpdateUserRequest {
    pub fn into_parts(self) -> (UserId, UserUpdate) {
        (
            self.user_id,
            UserUpdate {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                role: self.role,
                is_active: self.is_active,
                is_email_verified: self.is_email_verified,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserQuery {
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationTokenIssued {
    pub user_id: UserId,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RoleEntry {
    pub role: Role,
    pub name: &'static str,
}

impl From<Role> for RoleEntry {
    fn from(role: Role) -> Self {
        Self {
            role,
            name: role.as_str(),
        }
    }
}

/// Unwrap a JSON body, rendering rejections in the common error envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| errors::bad_request(rejection.body_text()))
}
