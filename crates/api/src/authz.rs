//! API-side authorization guard.
//!
//! Handlers call [`guard`] before touching the account service; the decision
//! itself lives in `warden_auth::authorize` and depends only on the verified
//! claims, the operation policy and the target.

use axum::response::Response;

use warden_auth::{Policy, Target, authorize};

use crate::app::errors;
use crate::context::AuthContext;

pub fn guard(ctx: &AuthContext, policy: &Policy, target: Target) -> Result<(), Response> {
    authorize(Some(ctx.claims()), policy, &target)
        .map(|_| ())
        .map_err(|e| {
            tracing::debug!(
                operation = policy.operation,
                user_id = %ctx.user_id(),
                tenant_id = %ctx.tenant_id(),
                error = %e,
                "authorization denied"
            );
            errors::authz_error_response(e)
        })
}
