//! Origin allow-list matching and the CORS middleware built on it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Literal origins, `*`, or `*.domain` patterns.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: ["Authorization", "Content-Type"].map(String::from).to_vec(),
        }
    }
}

/// Whether `origin` is admitted by `allow_list`.
///
/// Entries match literally, `*` admits everything, and `*.example.com`
/// admits any origin ending in `.example.com` (so `https://a.example.com`
/// but not `https://evilexample.com` nor `https://example.com`).
pub fn is_origin_allowed(origin: &str, allow_list: &[String]) -> bool {
    allow_list.iter().any(|pattern| {
        if pattern == "*" || pattern == origin {
            return true;
        }
        match pattern.strip_prefix("*.") {
            Some(domain) if !domain.is_empty() => origin
                .strip_suffix(domain)
                .is_some_and(|head| head.ends_with('.')),
            _ => false,
        }
    })
}

/// Value for `Access-Control-Allow-Origin`, if the origin is admitted.
///
/// Specific matches are reflected; an origin admitted only through `*`
/// gets the wildcard itself.
fn allow_origin_value<'a>(origin: &'a str, config: &CorsConfig) -> Option<&'a str> {
    let specific = config
        .allowed_origins
        .iter()
        .filter(|p| p.as_str() != "*")
        .any(|p| is_origin_allowed(origin, std::slice::from_ref(p)));

    if specific {
        Some(origin)
    } else if config.allowed_origins.iter().any(|p| p == "*") {
        Some("*")
    } else {
        None
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, allow_origin: &str, config: &CorsConfig) {
    let allow_headers = if config.allowed_headers.iter().any(|h| h == "*") {
        "*".to_string()
    } else {
        config.allowed_headers.join(", ")
    };

    let pairs = [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin.to_string()),
        (header::ACCESS_CONTROL_ALLOW_METHODS, config.allowed_methods.join(", ")),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers),
        (header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE_SECS.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    // Browsers reject credentialed responses that carry the wildcard origin.
    if allow_origin != "*" {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}

pub async fn cors_middleware(
    State(config): State<Arc<CorsConfig>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allow_origin = origin
        .as_deref()
        .and_then(|o| allow_origin_value(o, &config))
        .map(str::to_string);

    if req.method() == Method::OPTIONS && origin.is_some() {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Some(allow) = &allow_origin {
            apply_cors_headers(response.headers_mut(), allow, &config);
        }
        return response;
    }

    let mut response = next.run(req).await;
    if let Some(allow) = &allow_origin {
        apply_cors_headers(response.headers_mut(), allow, &config);
    }
    response
}
