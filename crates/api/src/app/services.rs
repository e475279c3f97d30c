//! Service wiring: repositories, token codec, hasher and secret delivery.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use warden_auth::{
    AccountService, CredentialHasher, Hs256TokenCodec, Role, Tenant, TenantRepository,
    TokenValidator, User, UserRepository,
};
use warden_core::TenantId;
use warden_infra::{InMemoryTenantRepository, InMemoryUserRepository};

#[cfg(feature = "postgres")]
use warden_infra::{PostgresTenantRepository, PostgresUserRepository, ensure_schema};

use crate::app::delivery::{LogDelivery, SecretDelivery};
use crate::config::ApiConfig;

pub const DEMO_TENANT_ID: TenantId = TenantId::new(1);
pub const DEMO_ADMIN_EMAIL: &str = "admin@demo.local";
pub const DEMO_USER_EMAIL: &str = "user@demo.local";
const DEMO_PASSWORD: &str = "warden-demo-password";

/// Everything handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub accounts: AccountService,
    pub tokens: Arc<dyn TokenValidator>,
    pub delivery: Arc<dyn SecretDelivery>,
}

/// Handles to the in-memory stores, for seeding.
#[derive(Debug, Clone)]
pub struct InMemoryStores {
    pub users: Arc<InMemoryUserRepository>,
    pub tenants: Arc<InMemoryTenantRepository>,
}

fn token_codec(config: &ApiConfig) -> Result<Arc<Hs256TokenCodec>> {
    let codec = Hs256TokenCodec::new(config.jwt_secret.as_bytes()).context("invalid JWT secret")?;
    Ok(Arc::new(codec))
}

fn assemble(
    config: &ApiConfig,
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
    hasher: CredentialHasher,
    delivery: Arc<dyn SecretDelivery>,
) -> Result<AppServices> {
    let codec = token_codec(config)?;
    let accounts = AccountService::new(users, tenants, codec.clone(), hasher, config.account);
    Ok(AppServices {
        accounts,
        tokens: codec,
        delivery,
    })
}

pub fn build_in_memory_services(
    config: &ApiConfig,
    hasher: CredentialHasher,
    delivery: Arc<dyn SecretDelivery>,
) -> Result<(AppServices, InMemoryStores)> {
    let stores = InMemoryStores {
        users: Arc::new(InMemoryUserRepository::new()),
        tenants: Arc::new(InMemoryTenantRepository::new()),
    };
    let services = assemble(
        config,
        stores.users.clone(),
        stores.tenants.clone(),
        hasher,
        delivery,
    )?;
    Ok((services, stores))
}

#[cfg(feature = "postgres")]
pub async fn build_persistent_services(
    config: &ApiConfig,
    hasher: CredentialHasher,
    delivery: Arc<dyn SecretDelivery>,
) -> Result<AppServices> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    ensure_schema(&pool)
        .await
        .context("failed to apply identity schema")?;

    tracing::info!("using Postgres user and tenant stores");
    assemble(
        config,
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(PostgresTenantRepository::new(pool)),
        hasher,
        delivery,
    )
}

/// Production wiring: Postgres when configured and compiled in, in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices> {
    let hasher = CredentialHasher::with_default_params().context("failed to configure Argon2")?;
    let delivery: Arc<dyn SecretDelivery> = Arc::new(LogDelivery);

    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services(config, hasher, delivery).await;
        }
        #[cfg(not(feature = "postgres"))]
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
        );
    }

    let (services, stores) = build_in_memory_services(config, hasher, delivery)?;
    if config.seed_demo_data {
        seed_demo_data(&stores, services.accounts.hasher(), Utc::now())?;
    }
    Ok(services)
}

/// Demo tenant with one admin and one regular user (dev only).
pub fn seed_demo_data(
    stores: &InMemoryStores,
    hasher: &CredentialHasher,
    now: DateTime<Utc>,
) -> Result<()> {
    stores
        .tenants
        .insert(Tenant {
            id: DEMO_TENANT_ID,
            name: "Demo".to_string(),
            created_at: now,
        })
        .context("failed to seed demo tenant")?;

    let hash = hasher.hash(DEMO_PASSWORD).context("failed to hash demo password")?;
    for (email, role, first, last) in [
        (DEMO_ADMIN_EMAIL, Role::TenantAdmin, "Demo", "Admin"),
        (DEMO_USER_EMAIL, Role::TenantUser, "Demo", "User"),
    ] {
        let id = stores.users.next_id().context("failed to allocate user id")?;
        let user = User::new(id, DEMO_TENANT_ID, email, hash.clone(), role, now).with_name(first, last);
        stores
            .users
            .insert(user)
            .with_context(|| format!("failed to seed {email}"))?;
    }

    tracing::warn!(
        admin = DEMO_ADMIN_EMAIL,
        user = DEMO_USER_EMAIL,
        "seeded demo accounts with the built-in dev password"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::HashParams;

    fn cheap_hasher() -> CredentialHasher {
        CredentialHasher::new(HashParams::new(HashParams::MIN_M_COST, 1, 1, None).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn demo_seed_allows_admin_login() {
        let config = ApiConfig::new("test-secret");
        let (services, stores) =
            build_in_memory_services(&config, cheap_hasher(), Arc::new(LogDelivery)).unwrap();
        seed_demo_data(&stores, services.accounts.hasher(), Utc::now()).unwrap();

        let outcome = services
            .accounts
            .login(DEMO_ADMIN_EMAIL, DEMO_PASSWORD, "127.0.0.1", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.claims.role, Role::TenantAdmin);
        assert_eq!(outcome.claims.tenant_id, DEMO_TENANT_ID);

        let claims = services.tokens.validate(&outcome.token, Utc::now()).unwrap();
        assert_eq!(claims, outcome.claims);
    }

    #[test]
    fn empty_secret_is_rejected() {
        let config = ApiConfig::new("");
        assert!(build_in_memory_services(&config, cheap_hasher(), Arc::new(LogDelivery)).is_err());
    }
}
