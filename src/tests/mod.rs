//! Integration and unit tests for Snippetbox.
//!
//! ## Test Modules
//!
//! - **support**: a cookie-carrying test client over the full router
//! - **snippet_api_tests**: home, view and create pages
//! - **user_api_tests**: signup, login, logout and the login gate
//! - **account_api_tests**: account page and password change
//! - **middleware_tests**: security headers, CSRF, panic recovery
//! - **store_tests**: the SQLite snippet and user stores
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error to response mapping
//!
//! Run a single module with e.g. `cargo test user_api_tests`.

pub mod support;

pub mod account_api_tests;
pub mod config_tests;
