//! Credential hashing (Argon2id) and single-use secret generation.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::{Rng, distributions::Alphanumeric};
use thiserror::Error;

use warden_core::ErrorKind;

pub use argon2::Params as HashParams;

/// Minimum accepted length of a new password, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Length of generated reset / verification tokens.
pub const SECRET_TOKEN_LEN: usize = 32;

const DUMMY_PASSWORD: &str = "warden-dummy-password";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl PasswordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PasswordError::TooShort { .. } => ErrorKind::Validation,
            PasswordError::Hash(_) => ErrorKind::Internal,
        }
    }
}

/// Argon2id hasher with fixed cost parameters.
///
/// Hashes are stored in PHC string format, so verification always uses the
/// parameters embedded in the stored hash, not the ones configured here.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Production cost parameters.
    pub fn with_default_params() -> Result<Self, PasswordError> {
        Self::new(Params::DEFAULT)
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|e| PasswordError::Hash(e.to_string()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    }

    /// Burn the same work as a real verification when there is no user to
    /// check against, so response timing does not reveal whether an email
    /// is registered.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

// Async entry points run Argon2 on tokio's blocking pool.
impl CredentialHasher {
    pub async fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let (hasher, password) = (self.clone(), password.to_owned());
        run_blocking(move || hasher.hash(&password)).await?
    }

    pub async fn verify_blocking(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<bool, PasswordError> {
        let (hasher, password, stored) = (self.clone(), password.to_owned(), stored_hash.to_owned());
        run_blocking(move || hasher.verify(&password, &stored)).await?
    }

    pub async fn verify_dummy_blocking(&self, password: &str) {
        let (hasher, password) = (self.clone(), password.to_owned());
        let _ = run_blocking(move || hasher.verify_dummy(&password)).await;
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PasswordError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PasswordError::Hash(format!("hashing task failed: {e}")))
}

impl core::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", self.argon2.params())
            .finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

pub fn validate_new_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Cryptographically random alphanumeric token (OS entropy).
pub fn generate_secret_token() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> CredentialHasher {
    // Minimal Argon2 cost keeps unit tests fast.
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    CredentialHasher::new(params).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("wrong horse", &hash).unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_pool_variants_agree_with_sync() {
        let hasher = cheap_hasher();
        let hash = hasher.hash_blocking("correct horse").await.unwrap();
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(hasher.verify_blocking("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify_blocking("wrong horse", &hash).await.unwrap());
        assert!(matches!(
            hasher.verify_blocking("x", "not-a-phc-string").await,
            Err(PasswordError::Hash(_))
        ));
        hasher.verify_dummy_blocking("anything").await;
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = cheap_hasher();
        assert_ne!(hasher.hash("pa55word!").unwrap(), hasher.hash("pa55word!").unwrap());
    }

    #[test]
    fn unparseable_hash_is_an_error_not_a_mismatch() {
        let hasher = cheap_hasher();
        assert!(matches!(
            hasher.verify("whatever", "plaintext-in-db"),
            Err(PasswordError::Hash(_))
        ));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(
            validate_new_password("1234567"),
            Err(PasswordError::TooShort { min: 8 })
        );
        assert!(validate_new_password("12345678").is_ok());
        assert_eq!(
            validate_new_password("1234567").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn secret_tokens_are_random_alphanumerics() {
        let a = generate_secret_token();
        let b = generate_secret_token();
        assert_eq!(a.len(), SECRET_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
