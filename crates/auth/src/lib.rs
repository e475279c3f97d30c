//! `warden-auth`: identity and access control core.
//!
//! Token codec, account lifecycle and authorization guard. This crate knows
//! nothing about HTTP; storage is reached only through the repository traits
//! in [`store`].

pub mod account;
pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod roles;
pub mod store;
pub mod token;
pub mod user;

pub use account::{AccountPolicy, AccountService, LoginOutcome};
pub use authorize::{AuthzError, Policy, SubjectRule, Target, authorize, policies};
pub use claims::{Claims, validate_claims};
pub use error::AuthError;
pub use password::{CredentialHasher, HashParams, PasswordError};
pub use roles::{Role, UnknownRole};
pub use store::{StoreError, TenantRepository, UserRepository};
pub use token::{Hs256TokenCodec, TokenError, TokenIssuer, TokenValidator};
pub use user::{Tenant, User, UserSummary, UserUpdate};
