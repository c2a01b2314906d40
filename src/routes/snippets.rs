use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::{decode_form, template_data};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::session;
use crate::state::AppState;
use crate::templates::TemplateData;
use crate::validator::{max_chars, not_blank, permitted_value, Validator};

/// Lifetimes offered by the create form, in days.
pub const EXPIRY_CHOICES: [i64; 3] = [1, 7, 365];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SnippetCreateForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Kept as submitted so an invalid choice is re-rendered verbatim.
    #[serde(default)]
    pub expires: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl SnippetCreateForm {
    /// Validates in place and returns the expiry in days when the form is valid.
    fn validate(&mut self) -> Option<i64> {
        let expires = self.expires.trim().parse::<i64>().ok();

        let v = &mut self.validator;
        v.check_field(not_blank(&self.title), "title", "This field cannot be blank");
        v.check_field(
            max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(not_blank(&self.content), "content", "This field cannot be blank");
        v.check_field(
            expires.is_some_and(|days| permitted_value(&days, &EXPIRY_CHOICES)),
            "expires",
            "This field must equal 1, 7 or 365",
        );

        if v.valid() {
            expires
        } else {
            None
        }
    }
}

pub async fn home(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    let snippets = state.snippets.latest().await?;
    let data = TemplateData { snippets, ..template_data(&session, user).await? };
    state.templates.render("pages/home.html", &data)
}

pub async fn snippet_view(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let id = match id.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => return Err(AppError::NotFound),
    };

    let snippet = state.snippets.get(id).await?;
    let data = TemplateData { snippet: Some(snippet), ..template_data(&session, user).await? };
    state.templates.render("pages/view.html", &data)
}

pub async fn snippet_create(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    let form = SnippetCreateForm { expires: "365".into(), ..Default::default() };
    let data = template_data(&session, user).await?.with_form(&form)?;
    state.templates.render("pages/create.html", &data)
}

pub async fn snippet_create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    form: Result<Form<SnippetCreateForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;

    let Some(expires_days) = form.validate() else {
        let data = template_data(&session, user).await?.with_form(&form)?;
        let page = state.templates.render("pages/create.html", &data)?;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    };

    let id = state.snippets.insert(&form.title, &form.content, expires_days).await?;
    state.metrics.inc_snippets_created();
    tracing::info!(snippet_id = id, expires_days, "snippet created");

    session::put_flash(&session, "Snippet successfully created!").await?;
    Ok(Redirect::to(&format!("/snippet/view/{}", id)).into_response())
}
