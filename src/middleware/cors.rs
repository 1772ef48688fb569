use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Restricts browsers to the configured frontend origin; falls back to any
/// origin when it cannot be parsed as a header value.
pub fn frontend_cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => layer.allow_origin(Any),
    }
}
