//! User and tenant records plus the state transitions of the account lifecycle.
//!
//! Transitions are plain methods taking an explicit `now`; persisting the
//! result is the caller's job (see [`crate::account::AccountService`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{TenantId, UserId};

use crate::{Role, password::constant_time_eq};

// ─────────────────────────────────────────────────────────────────────────────
// Tenant
// ─────────────────────────────────────────────────────────────────────────────

/// Tenant metadata. Read-only from the point of view of this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user account within exactly one tenant.
///
/// # Invariants
/// - `failed_login_attempts` is reset to zero by every successful login and
///   grows by exactly one per failed password check.
/// - `is_active` latches to `false` once the counter reaches the lockout
///   threshold; only an administrative update turns it back on.
/// - At most one reset token is pending; setting a new one supersedes the old,
///   and completing a reset clears it together with the password change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub failed_login_attempts: u32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires_at: Option<DateTime<Utc>>,
    pub email_verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh, active, unverified account.
    pub fn new(
        id: UserId,
        tenant_id: TenantId,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: password_hash.into(),
            role,
            is_active: true,
            is_email_verified: false,
            failed_login_attempts: 0,
            last_login_at: None,
            last_login_ip: None,
            reset_password_token: None,
            reset_password_expires_at: None,
            email_verification_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn is_locked(&self) -> bool {
        !self.is_active
    }

    /// Count a failed password check. Returns `true` if this failure latched
    /// the account inactive.
    pub fn record_failed_login(&mut self, max_attempts: u32, now: DateTime<Utc>) -> bool {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        self.updated_at = now;

        if self.is_active && self.failed_login_attempts >= max_attempts {
            self.is_active = false;
            return true;
        }
        false
    }

    pub fn record_successful_login(&mut self, source_ip: impl Into<String>, now: DateTime<Utc>) {
        self.failed_login_attempts = 0;
        self.last_login_at = Some(now);
        self.last_login_ip = Some(source_ip.into());
        self.updated_at = now;
    }

    pub fn set_reset_token(
        &mut self,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.reset_password_token = Some(token.into());
        self.reset_password_expires_at = Some(expires_at);
        self.updated_at = now;
    }

    /// Whether a pending reset token exists and has not yet expired.
    pub fn reset_token_live(&self, now: DateTime<Utc>) -> bool {
        match (&self.reset_password_token, self.reset_password_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }

    /// Install a new password hash and consume the reset token in one step.
    pub fn complete_password_reset(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.reset_password_token = None;
        self.reset_password_expires_at = None;
        self.updated_at = now;
    }

    pub fn set_verification_token(&mut self, token: impl Into<String>, now: DateTime<Utc>) {
        self.email_verification_token = Some(token.into());
        self.updated_at = now;
    }

    /// Mark the email verified if `token` matches the stored one.
    ///
    /// Already-verified accounts accept any call. Returns `false` when the
    /// token does not match (or none was issued); the record is unchanged then.
    pub fn verify_email(&mut self, token: &str, now: DateTime<Utc>) -> bool {
        if self.is_email_verified {
            return true;
        }

        let matches = self
            .email_verification_token
            .as_deref()
            .is_some_and(|stored| constant_time_eq(stored, token));
        if !matches {
            return false;
        }

        self.is_email_verified = true;
        self.email_verification_token = None;
        self.updated_at = now;
        true
    }

    /// Overwrite the administratively editable fields.
    pub fn apply_update(&mut self, update: &UserUpdate, now: DateTime<Utc>) {
        self.first_name = update.first_name.clone();
        self.last_name = update.last_name.clone();
        self.email = update.email.trim().to_string();
        self.role = update.role;
        if update.is_active && !self.is_active {
            self.failed_login_attempts = 0;
        }
        self.is_active = update.is_active;
        self.is_email_verified = update.is_email_verified;
        if self.is_email_verified {
            self.email_verification_token = None;
        }
        self.updated_at = now;
    }
}

/// Administrative overwrite of a user's editable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
}

/// Listing view of a user; never carries credentials or pending tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Minimal structural email check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .split_once('.')
        .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}
