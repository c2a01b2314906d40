use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::CACHE_CONTROL, request::Parts, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use tower_sessions::Session;

use crate::error::AppResult;
use crate::session::{self, REDIRECT_AFTER_LOGIN};
use crate::state::AppState;

/// The authenticated user's id, as established by [`authenticate`] for this
/// request. Extracting it never fails; anonymous requests get `CurrentUser(None)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CurrentUser(pub Option<i64>);

impl CurrentUser {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().copied().unwrap_or_default())
    }
}

/// Marks the request authenticated when the session names a user that still
/// exists. A stale id (user deleted) is treated as anonymous.
pub async fn authenticate(
    State(state): State<AppState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    if let Some(id) = session::user_id(&session).await? {
        if state.users.exists(id).await? {
            req.extensions_mut().insert(CurrentUser(Some(id)));
        }
    }
    Ok(next.run(req).await)
}

/// Gate for protected routes: anonymous requests are sent to the login page
/// (remembering where they were going), and authenticated pages are never cached.
pub async fn require_authentication(
    user: CurrentUser,
    session: Session,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    if !user.is_authenticated() {
        if req.method() == Method::GET {
            session.insert(REDIRECT_AFTER_LOGIN, req.uri().path()).await?;
        }
        return Ok(Redirect::to("/user/login").into_response());
    }

    let mut res = next.run(req).await;
    res.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(res)
}
