//! Infrastructure layer: persistence adapters for the identity core.
//!
//! In-memory repositories are always available (tests/dev); the Postgres
//! adapters are compiled with the `postgres` feature.

pub mod repository;

pub use repository::{InMemoryTenantRepository, InMemoryUserRepository};
#[cfg(feature = "postgres")]
pub use repository::{PostgresTenantRepository, PostgresUserRepository, postgres::ensure_schema};
