//! Cross-Site Request Forgery (CSRF) protection middleware.
//!
//! Every session carries a random token (see [`crate::session::csrf_token`]);
//! pages embed it as a hidden `csrf_token` form field. State-changing requests
//! must echo it back, either in that field or in the `X-CSRF-Token` header,
//! otherwise they are rejected with `400 Bad Request` before any handler runs.

use axum::{
    body::Body,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, Method},
    middleware::Next,
    response::Response,
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::session::CSRF_TOKEN;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Upper bound on a buffered form body.
const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

#[derive(Deserialize)]
struct CsrfField {
    csrf_token: Option<String>,
}

/// CSRF protection for POST, PUT, PATCH and DELETE.
///
/// Must run inside the session layer. Safe methods pass straight through.
pub async fn csrf_protection_middleware(req: Request, next: Next) -> AppResult<Response> {
    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
        return Ok(next.run(req).await);
    }

    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("CSRF check needs the session layer")))?;

    let Some(expected) = session.get::<String>(CSRF_TOKEN).await? else {
        return Err(AppError::BadRequest("session has no CSRF token".into()));
    };

    let (req, submitted) = submitted_token(req).await?;
    match submitted {
        Some(token) if tokens_match(&token, &expected) => Ok(next.run(req).await),
        Some(_) => Err(AppError::BadRequest("CSRF token mismatch".into())),
        None => Err(AppError::BadRequest("CSRF token missing".into())),
    }
}

/// Pulls the token from the header or, for urlencoded forms, from the body.
/// The body is buffered and handed back so the handler can still read it.
async fn submitted_token(req: Request) -> AppResult<(Request, Option<String>)> {
    if let Some(token) = req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        let token = token.to_string();
        return Ok((req, Some(token)));
    }

    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if !is_form {
        return Ok((req, None));
    }

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("unreadable form body: {}", e)))?;

    let probe = axum::http::Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .map_err(|e| AppError::Internal(e.into()))?;
    let token = match Form::<CsrfField>::from_request(probe, &()).await {
        Ok(Form(field)) => field.csrf_token,
        Err(_) => None,
    };

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

/// Constant-time comparison; only the length leaks.
fn tokens_match(submitted: &str, expected: &str) -> bool {
    let a = submitted.as_bytes();
    let b = expected.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
