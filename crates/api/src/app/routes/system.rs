use axum::{Json, http::StatusCode, response::IntoResponse};

use warden_auth::{Target, policies};

use crate::authz;
use crate::context::AuthContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(ctx: AuthContext) -> axum::response::Response {
    if let Err(resp) = authz::guard(&ctx, &policies::WHOAMI, Target::tenant(ctx.tenant_id())) {
        return resp;
    }

    let claims = ctx.claims();
    Json(serde_json::json!({
        "user_id": claims.sub,
        "tenant_id": claims.tenant_id,
        "email": claims.email,
        "first_name": claims.first_name,
        "last_name": claims.last_name,
        "role": claims.role,
        "expires_at": claims.expires_at.to_rfc3339(),
    }))
    .into_response()
}
