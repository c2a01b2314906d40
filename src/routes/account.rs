//! Account page and password change. Both sit behind the login gate, so a
//! missing user id here means the session changed underneath the request.

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::users::MIN_PASSWORD_CHARS;
use super::{decode_form, template_data};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::ModelError;
use crate::session;
use crate::state::AppState;
use crate::templates::TemplateData;
use crate::validator::{min_chars, not_blank, Validator};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PasswordUpdateForm {
    #[serde(default, skip_serializing)]
    pub current_password: String,
    #[serde(default, skip_serializing)]
    pub new_password: String,
    #[serde(default, skip_serializing)]
    pub new_password_confirmation: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl PasswordUpdateForm {
    fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.current_password), "current_password", "This field cannot be blank");
        v.check_field(not_blank(&self.new_password), "new_password", "This field cannot be blank");
        v.check_field(
            min_chars(&self.new_password, MIN_PASSWORD_CHARS),
            "new_password",
            "This field must be at least 8 characters long",
        );
        v.check_field(
            not_blank(&self.new_password_confirmation),
            "new_password_confirmation",
            "This field cannot be blank",
        );
        v.check_field(
            self.new_password == self.new_password_confirmation,
            "new_password_confirmation",
            "Passwords do not match",
        );
        v.valid()
    }
}

pub async fn account_view(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Response> {
    let Some(id) = user.0 else {
        return Ok(Redirect::to("/user/login").into_response());
    };

    let account = match state.users.get(id).await {
        Ok(account) => account,
        Err(ModelError::NoRecord) => return Ok(Redirect::to("/user/login").into_response()),
        Err(e) => return Err(e.into()),
    };

    let data = TemplateData { user: Some(account), ..template_data(&session, user).await? };
    Ok(state.templates.render("pages/account.html", &data)?.into_response())
}

pub async fn password_update(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
) -> AppResult<Response> {
    let data = template_data(&session, user).await?.with_form(&PasswordUpdateForm::default())?;
    Ok(state.templates.render("pages/password.html", &data)?.into_response())
}

pub async fn password_update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    form: Result<Form<PasswordUpdateForm>, FormRejection>,
) -> AppResult<Response> {
    let Some(id) = user.0 else {
        return Ok(Redirect::to("/user/login").into_response());
    };
    let mut form = decode_form(form)?;

    if form.validate() {
        match state.users.password_update(id, &form.current_password, &form.new_password).await {
            Ok(()) => {
                tracing::info!(user_id = id, "password updated");
                session::put_flash(&session, "Your password has been updated!").await?;
                return Ok(Redirect::to("/account/view").into_response());
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator.add_field_error("current_password", "Current password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let data = template_data(&session, user).await?.with_form(&form)?;
    let html = state.templates.render("pages/password.html", &data)?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, html).into_response())
}
