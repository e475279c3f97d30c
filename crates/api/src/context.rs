use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::Response,
};

use warden_auth::{AuthzError, Claims, Role};
use warden_core::{TenantId, UserId};

use crate::app::errors;

/// Verified identity of the caller.
///
/// Inserted once by the bearer middleware after the token has been
/// validated; immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    claims: Claims,
}

impl AuthContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn tenant_id(&self) -> TenantId {
        self.claims.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| errors::authz_error_response(AuthzError::Unauthorized))
    }
}
