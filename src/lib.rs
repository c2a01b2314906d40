//! # Snippetbox
//!
//! A server-rendered web application for pasting and sharing short text
//! snippets, with user accounts and session-based authentication.
//!
//! ## Architecture
//!
//! - **Axum** routes requests through a middleware chain (panic recovery,
//!   request logging, security headers, sessions, CSRF, authentication)
//! - **SQLx** over SQLite persists snippets, users and sessions
//! - **tower-sessions** carries per-visitor state in an opaque cookie token
//! - **Tera** renders the HTML pages under `ui/html`
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (defaults, files, env, flags)
//! - [`db`]: connection pool and schema
//! - [`models`]: snippet and user stores
//! - [`session`]: SQLite session store and session helpers
//! - [`templates`]: template cache and page data
//! - [`validator`]: form validation
//! - [`middleware`]: cross-cutting request handling
//! - [`routes`]: handlers and the router
//! - [`error`]: HTTP error mapping
//! - [`metrics`]: request and domain counters
//! - [`state`]: shared application state

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod templates;
pub mod validator;

#[cfg(test)]
mod tests;
