//! Out-of-band delivery of one-time secrets.
//!
//! Reset and verification tokens never appear in HTTP responses; they are
//! handed to a [`SecretDelivery`] instead. The default implementation only
//! records that a secret was issued.

use std::sync::Mutex;

use warden_core::{TenantId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundSecret {
    PasswordReset {
        email: String,
        token: String,
    },
    EmailVerification {
        tenant_id: TenantId,
        user_id: UserId,
        token: String,
    },
}

impl OutboundSecret {
    pub fn token(&self) -> &str {
        match self {
            OutboundSecret::PasswordReset { token, .. }
            | OutboundSecret::EmailVerification { token, .. } => token,
        }
    }
}

pub trait SecretDelivery: Send + Sync {
    fn deliver(&self, secret: OutboundSecret);
}

/// Logs issuance without the secret itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

impl SecretDelivery for LogDelivery {
    fn deliver(&self, secret: OutboundSecret) {
        match &secret {
            OutboundSecret::PasswordReset { email, .. } => {
                tracing::info!(email = %email, "password reset token issued; no mailer configured");
            }
            OutboundSecret::EmailVerification {
                tenant_id, user_id, ..
            } => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    "email verification token issued; no mailer configured"
                );
            }
        }
    }
}

/// Keeps every delivered secret in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct CapturingDelivery {
    sent: Mutex<Vec<OutboundSecret>>,
}

impl CapturingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundSecret> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Most recent password reset token sent to `email`.
    pub fn last_reset_token(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|s| match s {
            OutboundSecret::PasswordReset { email: to, token } if to == email => Some(token),
            _ => None,
        })
    }

    /// Most recent verification token for `user_id`.
    pub fn last_verification_token(&self, user_id: UserId) -> Option<String> {
        self.sent().into_iter().rev().find_map(|s| match s {
            OutboundSecret::EmailVerification {
                user_id: to, token, ..
            } if to == user_id => Some(token),
            _ => None,
        })
    }
}

impl SecretDelivery for CapturingDelivery {
    fn deliver(&self, secret: OutboundSecret) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(secret);
        }
    }
}
