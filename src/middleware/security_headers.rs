//! Security headers applied to every response.

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERRER_POLICY, SERVER, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AppConfig;

/// Adds the fixed security headers to every response, error pages included.
///
/// - `Content-Security-Policy` from `security.csp`
/// - `Referrer-Policy: origin-when-cross-origin`
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: deny`
/// - `X-XSS-Protection: 0` (disables the legacy auditor; CSP replaces it)
/// - `Server` from `security.server_header`
/// - `Strict-Transport-Security` only when `security.enable_hsts` is set
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    let sec = &cfg.security;

    if !sec.csp.trim().is_empty() {
        match HeaderValue::from_str(&sec.csp) {
            Ok(val) => {
                headers.insert(CONTENT_SECURITY_POLICY, val);
            }
            Err(e) => tracing::warn!("Invalid Content-Security-Policy value: {}", e),
        }
    }

    headers.insert(REFERRER_POLICY, HeaderValue::from_static("origin-when-cross-origin"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("0"));

    if let Ok(val) = HeaderValue::from_str(&sec.server_header) {
        headers.insert(SERVER, val);
    }

    if sec.enable_hsts {
        let value = format!("max-age={}", sec.hsts_max_age);
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("max-age=31536000")),
        );
    }

    res
}
