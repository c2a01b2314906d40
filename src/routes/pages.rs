use axum::{extract::State, response::Html};
use tower_sessions::Session;

use super::template_data;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub async fn about(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    let data = template_data(&session, user).await?;
    state.templates.render("pages/about.html", &data)
}
