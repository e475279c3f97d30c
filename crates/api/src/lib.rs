//! HTTP boundary of the identity core: configuration, rate limiting, CORS,
//! bearer authentication and the user-maintenance routes.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod cors;
pub mod middleware;
pub mod rate_limit;

pub use app::build_app;
pub use config::ApiConfig;
