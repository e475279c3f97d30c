//! Repository adapters for users and tenants.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryTenantRepository, InMemoryUserRepository};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresTenantRepository, PostgresUserRepository};
