//! Data access for snippets and users.
//!
//! Handlers talk to the [`SnippetStore`] and [`UserStore`] traits; the SQLite
//! implementations live in [`snippets`] and [`users`]. Every query runs under a
//! fixed timeout and reports failures through [`ModelError`], whose variants let
//! handlers tell "no such record" apart from "the database broke".

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

pub mod password;
pub mod snippets;
pub mod users;

#[cfg(test)]
pub mod mocks;

pub use snippets::{Snippet, SqliteSnippetStore};
pub use users::{SqliteUserStore, User};

/// Maximum number of snippets returned by [`SnippetStore::latest`].
pub const LATEST_LIMIT: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no matching record found")]
    NoRecord,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Stores a snippet expiring `expires_days` days from now and returns its id.
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> ModelResult<i64>;

    /// Returns the snippet when it exists and has not expired.
    async fn get(&self, id: i64) -> ModelResult<Snippet>;

    /// Returns up to [`LATEST_LIMIT`] unexpired snippets, newest id first.
    async fn latest(&self) -> ModelResult<Vec<Snippet>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, name: &str, email: &str, password: &str) -> ModelResult<()>;

    /// Returns the user id. Unknown email and wrong password both yield
    /// [`ModelError::InvalidCredentials`].
    async fn authenticate(&self, email: &str, password: &str) -> ModelResult<i64>;

    async fn exists(&self, id: i64) -> ModelResult<bool>;

    async fn get(&self, id: i64) -> ModelResult<User>;

    async fn password_update(&self, id: i64, current_password: &str, new_password: &str) -> ModelResult<()>;
}

/// Current UTC time truncated to whole seconds, so stored RFC 3339 strings
/// have a fixed width and compare correctly as text.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

/// The instant `days` whole days after `created`, or an error when it falls
/// outside the representable date range.
pub fn expiry_after(created: OffsetDateTime, days: i64) -> ModelResult<OffsetDateTime> {
    days.checked_mul(86_400)
        .map(time::Duration::seconds)
        .and_then(|offset| created.checked_add(offset))
        .ok_or_else(|| ModelError::Timestamp(format!("expiry {} days from {} is out of range", days, created)))
}

/// Runs a query future under `limit`, mapping an elapsed deadline to [`ModelError::Timeout`].
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> ModelResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(ModelError::from),
        Err(_) => Err(ModelError::Timeout(limit)),
    }
}
