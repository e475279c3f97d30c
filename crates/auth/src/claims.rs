use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{TenantId, UserId};

use crate::{Role, TokenError, User};

/// Claims embedded in an issued bearer token.
///
/// Once a token has been verified these claims are the only identity the
/// request carries; storage is not consulted again to re-validate them.
/// Timestamps have whole-second precision (the wire format is Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, carried as a decimal string.
    #[serde(with = "subject")]
    pub sub: UserId,

    /// Tenant the user belongs to.
    pub tenant_id: TenantId,

    pub email: String,
    pub first_name: String,
    pub last_name: String,

    pub role: Role,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Claims describing `user`, valid from `issued_at` until `expires_at`.
    pub fn for_user(user: &User, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            issued_at: issued_at.trunc_subsecs(0),
            expires_at: expires_at.trunc_subsecs(0),
        }
    }
}

/// Check the time window of already signature-verified claims.
///
/// Expiry is checked first so that an expired token always reports
/// [`TokenError::Expired`], whatever else is wrong with it.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if now >= claims.expires_at {
        return Err(TokenError::Expired);
    }
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed(
            "expiry is not after issued-at".to_string(),
        ));
    }
    Ok(())
}

mod subject {
    use serde::{Deserialize, Deserializer, Serializer};
    use warden_core::UserId;

    pub fn serialize<S: Serializer>(id: &UserId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
