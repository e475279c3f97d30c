//! Account lifecycle: login with lockout, password reset, email verification
//! and tenant-scoped user maintenance.
//!
//! Every operation is one read-modify-write against the repositories. There
//! is no cross-request locking; concurrent logins for the same account may
//! lose a counter increment, which the lockout tolerates. Password reset is
//! the exception: the token is consumed by a conditional repository write,
//! so it redeems at most once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use warden_core::{TenantId, UserId};

use crate::{
    AuthError, Claims, CredentialHasher, Role, TenantRepository, TokenIssuer, UserRepository,
    UserSummary, UserUpdate,
    password::{generate_secret_token, validate_new_password},
    user::is_valid_email,
};

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Tunables of the account lifecycle, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPolicy {
    /// Failed password checks after which an account is latched inactive.
    pub max_failed_attempts: u32,
    /// Lifetime of issued bearer tokens.
    pub token_ttl: Duration,
    /// Lifetime of password reset tokens.
    pub reset_token_ttl: Duration,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            token_ttl: Duration::hours(24),
            reset_token_ttl: Duration::hours(1),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
    issuer: Arc<dyn TokenIssuer>,
    hasher: CredentialHasher,
    policy: AccountPolicy,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
        issuer: Arc<dyn TokenIssuer>,
        hasher: CredentialHasher,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            users,
            tenants,
            issuer,
            hasher,
            policy,
        }
    }

    pub fn policy(&self) -> &AccountPolicy {
        &self.policy
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    /// Authenticate by email and password and mint a bearer token.
    ///
    /// The password is always checked before the lock state, so a locked
    /// account answers `AccountLocked` only to someone who knows the password.
    /// Unknown emails still pay for one hash comparison.
    #[instrument(skip_all, fields(email = %email, source_ip = %source_ip), err)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(mut user) = self.users.get_by_email(email.trim()).await? else {
            self.hasher.verify_dummy_blocking(password).await;
            return Err(AuthError::UserNotFound);
        };

        if !self.hasher.verify_blocking(password, &user.password_hash).await? {
            if user.record_failed_login(self.policy.max_failed_attempts, now) {
                warn!(
                    user_id = %user.id,
                    tenant_id = %user.tenant_id,
                    attempts = user.failed_login_attempts,
                    "account locked after repeated failed logins"
                );
            }
            if let Err(e) = self.users.update(&user).await {
                warn!(user_id = %user.id, error = %e, "failed to persist failed login attempt");
            }
            return Err(AuthError::InvalidPassword);
        }

        if user.is_locked() {
            return Err(AuthError::AccountLocked);
        }

        if self.tenants.get_tenant_by_id(user.tenant_id).await?.is_none() {
            return Err(AuthError::TenantNotFound);
        }

        user.record_successful_login(source_ip, now);
        self.users.update(&user).await?;

        let claims = Claims::for_user(&user, now, now + self.policy.token_ttl);
        let token = self.issuer.issue(&claims)?;

        info!(user_id = %user.id, tenant_id = %user.tenant_id, "login succeeded");
        Ok(LoginOutcome { token, claims })
    }

    /// Start a password reset. The returned token is meant for out-of-band
    /// delivery and supersedes any pending one.
    #[instrument(skip_all, fields(email = %email), err)]
    pub async fn request_password_reset(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let mut user = self
            .users
            .get_by_email(email.trim())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_secret_token();
        user.set_reset_token(token.clone(), now + self.policy.reset_token_ttl, now);
        self.users.update(&user).await?;

        info!(user_id = %user.id, "password reset requested");
        Ok(token)
    }

    #[instrument(skip_all, err)]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let user = self
            .users
            .get_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        if !user.reset_token_live(now) {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        validate_new_password(new_password)?;
        let hash = self.hasher.hash_blocking(new_password).await?;
        // The lookup above only filters obvious misses; the token is consumed here.
        if !self.users.redeem_reset_token(token, &hash, now).await? {
            warn!(user_id = %user.id, "password reset token already redeemed");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    /// Store a fresh email verification token on the user and return it.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn issue_email_verification(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let mut user = self
            .users
            .get_by_id(tenant_id, user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let token = generate_secret_token();
        user.set_verification_token(token.clone(), now);
        self.users.update(&user).await?;
        Ok(token)
    }

    /// Idempotent: an already verified address succeeds without a write.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn verify_email(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut user = self
            .users
            .get_by_id(tenant_id, user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.is_email_verified {
            return Ok(());
        }
        if !user.verify_email(token, now) {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        self.users.update(&user).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn update_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        update: UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<UserSummary, AuthError> {
        if !is_valid_email(&update.email) {
            return Err(AuthError::Validation(format!(
                "invalid email address '{}'",
                update.email
            )));
        }

        let mut user = self
            .users
            .get_by_id(tenant_id, user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let email = update.email.trim();
        if let Some(existing) = self.users.get_by_email(email).await? {
            if existing.id != user.id {
                return Err(AuthError::Conflict(format!("email already in use: {email}")));
            }
        }

        user.apply_update(&update, now);
        self.users.update(&user).await?;
        Ok(UserSummary::from(&user))
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn delete_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<(), AuthError> {
        if self.users.get_by_id(tenant_id, user_id).await?.is_none() {
            return Err(AuthError::NotFound);
        }
        self.users.delete(tenant_id, user_id).await?;
        info!(tenant_id = %tenant_id, user_id = %user_id, "user deleted");
        Ok(())
    }

    pub async fn list_users(&self, tenant_id: TenantId) -> Result<Vec<UserSummary>, AuthError> {
        let users = self.users.get_all(tenant_id).await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    /// Role catalogue.
    pub fn user_roles(&self) -> &'static [Role] {
        &Role::ALL
    }
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
