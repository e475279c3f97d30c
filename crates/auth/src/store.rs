//! Persistence seams for users and tenants.
//!
//! Absence is `Ok(None)`; `Err` is reserved for the store itself failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_core::{ErrorKind, TenantId, UserId};

use crate::{Tenant, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("email already in use: {0}")]
    DuplicateEmail(String),

    #[error("record not found")]
    Missing,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateEmail(_) => ErrorKind::Conflict,
            StoreError::Missing => ErrorKind::NotFound,
            StoreError::Backend(_) => ErrorKind::Internal,
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Lookup scoped to a tenant: a user of another tenant is `None`.
    async fn get_by_id(&self, tenant_id: TenantId, user_id: UserId)
    -> Result<Option<User>, StoreError>;

    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Atomically install `password_hash` and clear the reset token, but only
    /// while `token` is still pending and unexpired at `now`.
    ///
    /// Returns `false` when the token is unknown, expired or was consumed by a
    /// concurrent redemption; the record is then left untouched.
    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get_all(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError>;

    /// Persist the full record (keyed by tenant + id).
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    async fn delete(&self, tenant_id: TenantId, user_id: UserId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get_tenant_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>, StoreError>;
}
