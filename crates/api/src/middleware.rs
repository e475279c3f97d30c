use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use warden_auth::TokenValidator;

use crate::app::errors::json_error;
use crate::context::AuthContext;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenValidator>,
}

/// Require a valid bearer token and attach the caller's [`AuthContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or malformed bearer token",
        )
    })?;

    let claims = state.tokens.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "bearer token rejected");
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or expired token")
    })?;

    req.extensions_mut().insert(AuthContext::new(claims));
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Rate limiter plus the reverse proxies whose `X-Forwarded-For` is honoured.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub trusted_proxies: Arc<[IpAddr]>,
}

/// Caller address resolved by [`rate_limit_middleware`], available to handlers
/// as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

/// Reject clients that have exhausted their bucket with `429`.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let key = client_key(&req, &state.trusted_proxies);
    if !state.limiter.allow(&key) {
        tracing::debug!(client = %key, "rate limit exceeded");
        return json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded",
        );
    }
    req.extensions_mut().insert(ClientAddr(key));
    next.run(req).await
}

pub fn client_key<B>(req: &axum::http::Request<B>, trusted_proxies: &[IpAddr]) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key_from(req.headers(), peer, trusted_proxies)
}

/// The socket peer, unless the peer is a trusted proxy. Then the right-most
/// `X-Forwarded-For` hop that is not itself a trusted proxy.
///
/// Hops left of the first untrusted one are client-controlled and ignored.
pub fn client_key_from(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> String {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_string();
    };
    if !trusted_proxies.contains(&peer) {
        return peer.to_string();
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    for hop in hops.into_iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) if trusted_proxies.contains(&ip) => continue,
            Ok(ip) => return ip.to_string(),
            Err(_) => break,
        }
    }
    peer.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request, header::AUTHORIZATION};

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("Bearer   ")), None);
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer(&headers("abc.def.ghi")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    fn forwarded(peer: [u8; 4], xff: &[&str]) -> Request<()> {
        let mut builder = Request::builder();
        for value in xff {
            builder = builder.header("x-forwarded-for", *value);
        }
        let mut req = builder.body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 5555))));
        req
    }

    #[test]
    fn forwarded_for_ignored_from_untrusted_peer() {
        let req = forwarded([192, 0, 2, 1], &["203.0.113.7"]);
        assert_eq!(client_key(&req, &[]), "192.0.2.1");

        let proxy: IpAddr = [10, 0, 0, 1].into();
        assert_eq!(client_key(&req, &[proxy]), "192.0.2.1");

        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert_eq!(client_key(&req, &[proxy]), "unknown");
    }

    #[test]
    fn trusted_proxy_yields_rightmost_untrusted_hop() {
        let edge: IpAddr = [10, 0, 0, 1].into();
        let inner: IpAddr = [10, 0, 0, 2].into();
        let trusted = [edge, inner];

        // The left-most hop is whatever the client claimed.
        let req = forwarded([10, 0, 0, 1], &["6.6.6.6, 198.51.100.4"]);
        assert_eq!(client_key(&req, &trusted), "198.51.100.4");

        let req = forwarded([10, 0, 0, 1], &["6.6.6.6, 198.51.100.4", "10.0.0.2"]);
        assert_eq!(client_key(&req, &trusted), "198.51.100.4");

        let req = forwarded([10, 0, 0, 1], &["10.0.0.2"]);
        assert_eq!(client_key(&req, &trusted), "10.0.0.1");

        let req = forwarded([10, 0, 0, 1], &["6.6.6.6, not-an-ip"]);
        assert_eq!(client_key(&req, &trusted), "10.0.0.1");

        let req = forwarded([10, 0, 0, 1], &[]);
        assert_eq!(client_key(&req, &trusted), "10.0.0.1");
    }
}
