use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::error::Error;
use std::fmt;

use crate::models::ModelError;

/// Errors a handler can bail out with.
///
/// The response body is only ever the canonical status text; details are
/// logged server-side and never reach the client.
#[derive(Debug)]
pub enum AppError {
    /// Anything unexpected: store failures, template errors, session backend errors.
    Internal(anyhow::Error),
    /// The request could not be understood (malformed form, bad CSRF token).
    BadRequest(String),
    /// The resource does not exist or has expired.
    NotFound,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound => write!(f, "Not found"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Plain-text response carrying only the canonical reason phrase.
pub fn status_response(status: StatusCode) -> Response {
    let text = status.canonical_reason().unwrap_or("Error");
    (status, text).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(error = ?e, %error_id, "internal server error");
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::BadRequest(msg) => {
                tracing::debug!(reason = %msg, "bad request");
                status_response(StatusCode::BAD_REQUEST)
            }
            AppError::NotFound => status_response(StatusCode::NOT_FOUND),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NoRecord => AppError::NotFound,
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::Internal(err.into())
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
