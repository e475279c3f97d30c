//! Signed claims tokens (JWT, HS256).
//!
//! The codec is stateless beyond its secret: `issue` encodes and signs a
//! [`Claims`] set, `validate` checks the signature (HMAC, compared in constant
//! time by the underlying implementation) before looking at any claim, then
//! checks expiry against the caller-supplied clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind};
use thiserror::Error;

use warden_core::ErrorKind;

use crate::claims::{Claims, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InvalidSignature | TokenError::Expired | TokenError::Malformed(_) => {
                ErrorKind::AuthenticationFailure
            }
            TokenError::EmptySecret | TokenError::Signing(_) => ErrorKind::Internal,
        }
    }
}

/// Mints tokens for freshly authenticated users.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, claims: &Claims) -> Result<String, TokenError>;
}

/// Verifies bearer tokens presented on inbound requests.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;
}

/// HMAC-SHA256 JWT codec keyed by a symmetric secret.
#[derive(Clone)]
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Only HS256 is accepted; a token announcing any other algorithm (or
        // none) fails before its signature is even looked at.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Verify `token` against the wall clock.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, Utc::now())
    }
}

impl core::fmt::Debug for Hs256TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenCodec").finish_non_exhaustive()
    }
}

impl TokenIssuer for Hs256TokenCodec {
    fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl TokenValidator for Hs256TokenCodec {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(map_decode_error)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
        JwtErrorKind::ExpiredSignature => TokenError::Expired,
        JwtErrorKind::InvalidAlgorithm => {
            TokenError::Malformed("unexpected signature algorithm".to_string())
        }
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Duration;
    use proptest::prelude::*;
    use warden_core::{TenantId, UserId};

    use crate::Role;

    const SECRET: &[u8] = b"unit-test-secret";

    fn codec() -> Hs256TokenCodec {
        Hs256TokenCodec::new(SECRET).unwrap()
    }

    fn claims_valid_for(ttl: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: UserId::new(7),
            tenant_id: TenantId::new(2),
            email: "grace@example.com".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            role: Role::TenantAdmin,
            issued_at: DateTime::from_timestamp(now.timestamp(), 0).unwrap(),
            expires_at: DateTime::from_timestamp((now + ttl).timestamp(), 0).unwrap(),
        }
    }

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn round_trip_preserves_claims() {
        let codec = codec();
        let claims = claims_valid_for(Duration::hours(1));
        let token = codec.issue(&claims).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), claims);
    }

    #[test]
    fn different_secret_is_invalid_signature() {
        let claims = claims_valid_for(Duration::hours(1));
        let token = codec().issue(&claims).unwrap();
        let other = Hs256TokenCodec::new(b"another-secret").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn past_expiry_is_expired_even_when_signed_correctly() {
        let codec = codec();
        let mut claims = claims_valid_for(Duration::hours(1));
        claims.issued_at = claims.issued_at - Duration::hours(3);
        claims.expires_at = claims.issued_at + Duration::hours(1);
        let token = codec.issue(&claims).unwrap();
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn validate_honours_supplied_clock() {
        let codec = codec();
        let claims = claims_valid_for(Duration::minutes(10));
        let token = codec.issue(&claims).unwrap();
        assert!(codec.validate(&token, claims.expires_at - Duration::seconds(1)).is_ok());
        assert_eq!(
            codec.validate(&token, claims.expires_at),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = codec();
        let token = codec.issue(&claims_valid_for(Duration::hours(1))).unwrap();
        let parts = segments(&token);

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        payload["role"] = serde_json::json!("tenant_admin");
        payload["tenant_id"] = serde_json::json!(999);
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());

        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_expiry_fails_signature() {
        let codec = codec();
        let mut claims = claims_valid_for(Duration::hours(1));
        claims.issued_at = claims.issued_at - Duration::hours(3);
        claims.expires_at = claims.issued_at + Duration::hours(1);
        let parts = segments(&codec.issue(&claims).unwrap());

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        payload["exp"] = serde_json::json!((Utc::now() + Duration::days(30)).timestamp());
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());

        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn other_algorithm_marker_is_malformed() {
        let claims = claims_valid_for(Duration::hours(1));
        let hs512 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(codec().verify(&hs512), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn unsigned_token_is_malformed() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&claims_valid_for(Duration::hours(1))).unwrap());
        let token = format!("{header}.{payload}.");
        assert!(matches!(codec().verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        for token in ["", "abc", "a.b", "a.b.c.d", "....."] {
            assert!(
                matches!(codec.verify(token), Err(TokenError::Malformed(_))),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn wrong_claim_structure_is_malformed() {
        #[derive(serde::Serialize)]
        struct Foreign {
            sub: String,
            exp: i64,
            scope: String,
        }

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Foreign {
                sub: "7".to_string(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                scope: "all".to_string(),
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(codec().verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(Hs256TokenCodec::new(b"").unwrap_err(), TokenError::EmptySecret);
    }

    proptest! {
        #[test]
        fn any_claims_round_trip(
            sub in 1u64..u64::MAX,
            tenant in 1u64..u64::MAX,
            email in "[a-z]{1,12}@[a-z]{1,8}\\.com",
            first in "\\PC{0,16}",
            last in "\\PC{0,16}",
            admin in any::<bool>(),
            ttl_secs in 1i64..(60 * 60 * 24 * 365),
        ) {
            let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
            let claims = Claims {
                sub: UserId::new(sub),
                tenant_id: TenantId::new(tenant),
                email,
                first_name: first,
                last_name: last,
                role: if admin { Role::TenantAdmin } else { Role::TenantUser },
                issued_at: now,
                expires_at: now + Duration::seconds(ttl_secs),
            };
            let codec = codec();
            let token = codec.issue(&claims).unwrap();
            prop_assert_eq!(codec.validate(&token, now).unwrap(), claims);
        }
    }
}
