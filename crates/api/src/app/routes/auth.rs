use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::Utc;

use crate::app::dto::{LoginRequest, json_body};
use crate::app::{errors, services::AppServices};
use crate::middleware::ClientAddr;

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    client: Option<Extension<ClientAddr>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match json_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let source_ip = client
        .map(|Extension(ClientAddr(addr))| addr)
        .unwrap_or_else(|| "unknown".to_string());

    match services
        .accounts
        .login(&req.email, &req.password, &source_ip, Utc::now())
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::auth_error_response(e),
    }
}
