//! Process configuration read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `APP_ENV` | `prod` |
//! | `JWT_SECRET` | required unless `APP_ENV=dev` |
//! | `TOKEN_TTL_SECS` | `86400` |
//! | `MAX_FAILED_LOGIN_ATTEMPTS` | `5` |
//! | `RESET_TOKEN_TTL_SECS` | `3600` |
//! | `RATE_LIMIT_RPS` / `RATE_LIMIT_BURST` | `10` / `20` |
//! | `RATE_LIMIT_MAX_CLIENTS` / `RATE_LIMIT_IDLE_SECS` | `10000` / `600` |
//! | `CORS_ALLOWED_ORIGINS` / `CORS_ALLOWED_METHODS` / `CORS_ALLOWED_HEADERS` | comma lists |
//! | `USE_PERSISTENT_STORES` / `DATABASE_URL` | `false` / unset |
//! | `TRUSTED_PROXIES` | empty; comma list of proxy IPs allowed to set `X-Forwarded-For` |

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};

use warden_auth::AccountPolicy;

use crate::cors::CorsConfig;
use crate::rate_limit::RateLimitConfig;

const DEV_JWT_SECRET: &str = "warden-dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub account: AccountPolicy,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    /// Peers whose `X-Forwarded-For` header names the real client.
    pub trusted_proxies: Vec<IpAddr>,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Seed a demo tenant and admin into the in-memory stores.
    pub seed_demo_data: bool,
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            account: AccountPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            trusted_proxies: Vec::new(),
            use_persistent_stores: false,
            database_url: None,
            seed_demo_data: false,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dev = lookup("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("dev"));

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if dev => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(anyhow!("JWT_SECRET must be set outside APP_ENV=dev")),
        };

        let token_ttl_secs: i64 = parse_or(&lookup, "TOKEN_TTL_SECS", 86_400)?;
        let reset_ttl_secs: i64 = parse_or(&lookup, "RESET_TOKEN_TTL_SECS", 3_600)?;
        let max_failed: u32 = parse_or(&lookup, "MAX_FAILED_LOGIN_ATTEMPTS", 5)?;
        ensure!(token_ttl_secs > 0, "TOKEN_TTL_SECS must be positive");
        ensure!(reset_ttl_secs > 0, "RESET_TOKEN_TTL_SECS must be positive");
        ensure!(max_failed > 0, "MAX_FAILED_LOGIN_ATTEMPTS must be positive");

        let rate_limit = RateLimitConfig {
            requests_per_second: parse_or(&lookup, "RATE_LIMIT_RPS", 10)?,
            burst: parse_or(&lookup, "RATE_LIMIT_BURST", 20)?,
            max_clients: parse_or(&lookup, "RATE_LIMIT_MAX_CLIENTS", 10_000)?,
            idle_ttl: Duration::from_secs(parse_or(&lookup, "RATE_LIMIT_IDLE_SECS", 600)?),
        };
        ensure!(
            rate_limit.requests_per_second > 0 && rate_limit.burst > 0,
            "RATE_LIMIT_RPS and RATE_LIMIT_BURST must be positive"
        );

        let defaults = CorsConfig::default();
        let cors = CorsConfig {
            allowed_origins: list_or(&lookup, "CORS_ALLOWED_ORIGINS", defaults.allowed_origins),
            allowed_methods: list_or(&lookup, "CORS_ALLOWED_METHODS", defaults.allowed_methods),
            allowed_headers: list_or(&lookup, "CORS_ALLOWED_HEADERS", defaults.allowed_headers),
        };

        let trusted_proxies = list_or(&lookup, "TRUSTED_PROXIES", Vec::new())
            .iter()
            .map(|raw| {
                raw.parse::<IpAddr>()
                    .with_context(|| format!("Invalid TRUSTED_PROXIES entry '{raw}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let use_persistent_stores: bool = parse_or(&lookup, "USE_PERSISTENT_STORES", false)?;
        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        ensure!(
            !use_persistent_stores || database_url.is_some(),
            "DATABASE_URL must be set when USE_PERSISTENT_STORES=true"
        );

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid BIND_ADDR '{raw}'"))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            account: AccountPolicy {
                max_failed_attempts: max_failed,
                token_ttl: chrono::Duration::seconds(token_ttl_secs),
                reset_token_ttl: chrono::Duration::seconds(reset_ttl_secs),
            },
            rate_limit,
            cors,
            trusted_proxies,
            use_persistent_stores,
            database_url,
            seed_demo_data: dev,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} '{raw}'")),
        None => Ok(default),
    }
}

fn list_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Vec<String>,
) -> Vec<String> {
    match lookup(key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => default,
    }
}
