//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: repositories, token codec and hasher
//! - `delivery.rs`: out-of-band delivery of reset/verification secrets
//! - `routes/`: HTTP handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Extension, Router, middleware::from_fn_with_state};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::cors::cors_middleware;
use crate::middleware::{AuthState, RateLimitState, auth_middleware, rate_limit_middleware};
use crate::rate_limit::RateLimiter;

pub mod delivery;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router.
///
/// Requests pass the rate limiter, then origin handling, then (for protected
/// routes) bearer verification.
pub fn build_app(config: &ApiConfig, services: Arc<AppServices>) -> Result<Router> {
    let rate_limit = RateLimitState {
        limiter: RateLimiter::new(&config.rate_limit).context("invalid rate limit settings")?,
        trusted_proxies: config.trusted_proxies.clone().into(),
    };
    let auth_state = AuthState {
        tokens: services.tokens.clone(),
    };

    let protected = routes::protected_router()
        .layer(from_fn_with_state(auth_state, auth_middleware));

    // ServiceBuilder applies layers top to bottom: the limiter sees every
    // request first, including CORS preflights.
    Ok(routes::public_router().merge(protected).layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(rate_limit, rate_limit_middleware))
            .layer(from_fn_with_state(Arc::new(config.cors.clone()), cors_middleware))
            .layer(Extension(services)),
    ))
}
