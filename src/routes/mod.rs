//! HTTP route handlers and the router that wires them to the middleware chain.
//!
//! - `snippets`: home page, snippet view and creation
//! - `users`: signup, login and logout
//! - `account`: account page and password change
//! - `pages`: static content pages
//! - `health`: liveness probe and the debug metrics endpoint

use std::path::Path;

use axum::{
    extract::rejection::FormRejection,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use time::OffsetDateTime;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir};
use tower_sessions::{Session, SessionManagerLayer, SessionStore};

use crate::error::{status_response, AppError, AppResult};
use crate::middleware::{auth, csrf, logging, recover, security_headers, CurrentUser};
use crate::session;
use crate::state::AppState;
use crate::templates::TemplateData;

pub mod account;
pub mod health;
pub mod pages;
pub mod snippets;
pub mod users;

/// Builds the full application: routes, static assets and the middleware
/// chain. `static_dir` is served under `/static`.
pub fn router<Store>(state: AppState, session_layer: SessionManagerLayer<Store>, static_dir: &Path) -> Router
where
    Store: SessionStore + Clone,
{
    let protected = Router::new()
        .route("/snippet/create", get(snippets::snippet_create).post(snippets::snippet_create_post))
        .route("/user/logout", post(users::user_logout_post))
        .route("/account/view", get(account::account_view))
        .route(
            "/account/password/update",
            get(account::password_update).post(account::password_update_post),
        )
        .route_layer(from_fn(auth::require_authentication));

    let mut dynamic = Router::new()
        .route("/", get(snippets::home))
        .route("/snippet/view/{id}", get(snippets::snippet_view))
        .route("/user/signup", get(users::user_signup).post(users::user_signup_post))
        .route("/user/login", get(users::user_login).post(users::user_login_post))
        .route("/about", get(pages::about))
        .merge(protected);

    if state.config.server.debug {
        dynamic = dynamic.route("/debug/metrics", get(health::debug_metrics));
    }

    let dynamic = dynamic
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(from_fn(csrf::csrf_protection_middleware))
        .layer(session_layer);

    Router::new()
        .route("/ping", get(health::ping))
        .nest_service("/static", ServeDir::new(static_dir))
        .merge(dynamic)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(state.config.clone(), security_headers::security_headers_middleware))
        .layer(from_fn_with_state(state.metrics.clone(), logging::log_request))
        .layer(CatchPanicLayer::custom(recover::panic_handler(state.metrics.clone())))
}

async fn not_found() -> Response {
    status_response(StatusCode::NOT_FOUND)
}

/// Template data every page starts from. Reading it consumes the flash message.
pub(crate) async fn template_data(session: &Session, user: CurrentUser) -> AppResult<TemplateData> {
    Ok(TemplateData {
        current_year: OffsetDateTime::now_utc().year(),
        flash: session::take_flash(session).await?,
        is_authenticated: user.is_authenticated(),
        csrf_token: session::csrf_token(session).await?,
        ..Default::default()
    })
}

/// A form that cannot be decoded at all is the client's fault.
pub(crate) fn decode_form<T>(form: Result<Form<T>, FormRejection>) -> AppResult<T> {
    form.map(|Form(inner)| inner)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
