//! Middleware components for HTTP request processing.
//!
//! Applied outermost first: panic recovery, request logging, security headers,
//! the session layer, CSRF verification and authentication. The login gate is a
//! route layer on the protected routes only. See [`crate::routes::router`].

pub mod auth;
pub mod csrf;
pub mod ip;
pub mod logging;
pub mod recover;
pub mod security_headers;

pub use auth::CurrentUser;
