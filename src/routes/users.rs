use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::{decode_form, template_data};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::ModelError;
use crate::session::{self, AUTHENTICATED_USER_ID, REDIRECT_AFTER_LOGIN};
use crate::state::AppState;
use crate::validator::{matches, min_chars, not_blank, Validator, EMAIL_RX};

pub const MIN_PASSWORD_CHARS: usize = 8;

/// Where a fresh login lands when no protected page was requested first.
const DEFAULT_AFTER_LOGIN: &str = "/snippet/create";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserSignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserSignupForm {
    fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.name), "name", "This field cannot be blank");
        v.check_field(not_blank(&self.email), "email", "This field cannot be blank");
        v.check_field(matches(&self.email, &EMAIL_RX), "email", "This field must be a valid email address");
        v.check_field(not_blank(&self.password), "password", "This field cannot be blank");
        v.check_field(
            min_chars(&self.password, MIN_PASSWORD_CHARS),
            "password",
            "This field must be at least 8 characters long",
        );
        v.valid()
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserLoginForm {
    fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.email), "email", "This field cannot be blank");
        v.check_field(matches(&self.email, &EMAIL_RX), "email", "This field must be a valid email address");
        v.check_field(not_blank(&self.password), "password", "This field cannot be blank");
        v.valid()
    }
}

async fn render_form<F: Serialize>(
    state: &AppState,
    session: &Session,
    user: CurrentUser,
    page: &str,
    form: &F,
    status: StatusCode,
) -> AppResult<Response> {
    let data = template_data(session, user).await?.with_form(form)?;
    let html = state.templates.render(page, &data)?;
    Ok((status, html).into_response())
}

pub async fn user_signup(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    let data = template_data(&session, user).await?.with_form(&UserSignupForm::default())?;
    state.templates.render("pages/signup.html", &data)
}

pub async fn user_signup_post(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    form: Result<Form<UserSignupForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;
    if !form.validate() {
        return render_form(&state, &session, user, "pages/signup.html", &form, StatusCode::UNPROCESSABLE_ENTITY)
            .await;
    }

    match state.users.insert(&form.name, &form.email, &form.password).await {
        Ok(()) => {}
        Err(ModelError::DuplicateEmail) => {
            form.validator.add_field_error("email", "Email address is already in use");
            return render_form(&state, &session, user, "pages/signup.html", &form, StatusCode::UNPROCESSABLE_ENTITY)
                .await;
        }
        Err(e) => return Err(e.into()),
    }

    state.metrics.inc_signups();
    tracing::info!(email = %form.email, "user signed up");
    session::put_flash(&session, "Your signup was successful. Please log in.").await?;
    Ok(Redirect::to("/user/login").into_response())
}

pub async fn user_login(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    let data = template_data(&session, user).await?.with_form(&UserLoginForm::default())?;
    state.templates.render("pages/login.html", &data)
}

pub async fn user_login_post(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    form: Result<Form<UserLoginForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;
    if !form.validate() {
        return render_form(&state, &session, user, "pages/login.html", &form, StatusCode::UNPROCESSABLE_ENTITY)
            .await;
    }

    let id = match state.users.authenticate(&form.email, &form.password).await {
        Ok(id) => id,
        Err(ModelError::InvalidCredentials) => {
            state.metrics.inc_logins_failed();
            form.validator.add_non_field_error("Email or password is incorrect");
            return render_form(&state, &session, user, "pages/login.html", &form, StatusCode::UNPROCESSABLE_ENTITY)
                .await;
        }
        Err(e) => return Err(e.into()),
    };

    // New session id on privilege change.
    session.cycle_id().await?;
    session.insert(AUTHENTICATED_USER_ID, id).await?;
    state.metrics.inc_logins_succeeded();
    tracing::info!(user_id = id, "user logged in");

    let target = session
        .remove::<String>(REDIRECT_AFTER_LOGIN)
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| DEFAULT_AFTER_LOGIN.to_string());
    Ok(Redirect::to(&target).into_response())
}

pub async fn user_logout_post(session: Session) -> AppResult<Response> {
    // Drop everything, including the CSRF token; the flash lands in a fresh session.
    session.flush().await?;
    session::put_flash(&session, "You've been logged out successfully!").await?;
    Ok(Redirect::to("/").into_response())
}

/// Only same-site absolute paths are honoured as post-login targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_validation_messages() {
        let mut f = UserSignupForm {
            name: "".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            ..Default::default()
        };
        assert!(!f.validate());
        assert_eq!(f.validator.field_errors["name"], "This field cannot be blank");
        assert_eq!(f.validator.field_errors["email"], "This field must be a valid email address");
        assert_eq!(f.validator.field_errors["password"], "This field must be at least 8 characters long");
    }

    #[test]
    fn test_login_validation() {
        let mut f = UserLoginForm { email: "alice@example.com".into(), password: "x".into(), ..Default::default() };
        assert!(f.validate());

        let mut f = UserLoginForm::default();
        assert!(!f.validate());
        assert_eq!(f.validator.field_errors["email"], "This field cannot be blank");
        assert_eq!(f.validator.field_errors["password"], "This field cannot be blank");
    }

    #[test]
    fn test_passwords_never_serialized() {
        let f = UserSignupForm { password: "hunter2hunter2".into(), ..Default::default() };
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_local_path_filter() {
        assert!(is_local_path("/snippet/create"));
        assert!(!is_local_path("//evil.example.com"));
        assert!(!is_local_path("https://evil.example.com"));
        assert!(!is_local_path("/\\evil.example.com"));
    }
}
