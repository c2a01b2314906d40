//! Session state on top of `tower-sessions`.
//!
//! The application keeps a handful of scalar values in the opaque session
//! record: the authenticated user id, a one-shot flash message, the
//! anti-forgery token and the path to return to after login. Records are
//! persisted by [`SqliteSessionStore`] in the `sessions` table.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;
use tower_sessions::{
    session::{Id, Record},
    session_store::{self, ExpiredDeletion, SessionStore},
    Session,
};

pub const AUTHENTICATED_USER_ID: &str = "authenticated_user_id";
pub const FLASH: &str = "flash";
pub const CSRF_TOKEN: &str = "csrf_token";
pub const REDIRECT_AFTER_LOGIN: &str = "redirect_after_login";

#[derive(Clone, Debug)]
pub struct SqliteSessionStore {
    db: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn backend(err: sqlx::Error) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

fn encode(record: &Record) -> session_store::Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // Re-roll the id on the (unlikely) collision with a live token.
        loop {
            let res = sqlx::query("INSERT OR IGNORE INTO sessions (token, data, expiry) VALUES (?1, ?2, ?3)")
                .bind(record.id.to_string())
                .bind(encode(record)?)
                .bind(record.expiry_date.unix_timestamp())
                .execute(&self.db)
                .await
                .map_err(backend)?;
            if res.rows_affected() == 1 {
                return Ok(());
            }
            record.id = Id::default();
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        sqlx::query(
            r#"INSERT INTO sessions (token, data, expiry) VALUES (?1, ?2, ?3)
               ON CONFLICT(token) DO UPDATE SET data = excluded.data, expiry = excluded.expiry"#,
        )
        .bind(record.id.to_string())
        .bind(encode(record)?)
        .bind(record.expiry_date.unix_timestamp())
        .execute(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let row = sqlx::query("SELECT data FROM sessions WHERE token = ?1 AND expiry > ?2")
            .bind(id.to_string())
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .fetch_optional(&self.db)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let data: Vec<u8> = row.try_get("data").map_err(backend)?;
                let record = serde_json::from_slice(&data)
                    .map_err(|e| session_store::Error::Decode(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(id.to_string())
            .execute(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SqliteSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let res = sqlx::query("DELETE FROM sessions WHERE expiry <= ?1")
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&self.db)
            .await
            .map_err(backend)?;
        if res.rows_affected() > 0 {
            tracing::debug!(removed = res.rows_affected(), "expired sessions deleted");
        }
        Ok(())
    }
}

/// Periodically removes expired session rows. Runs until the runtime stops.
pub fn spawn_cleanup_task(store: SqliteSessionStore, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = store.delete_expired().await {
                tracing::warn!("Failed to delete expired sessions: {}", e);
            }
        }
    })
}

/// The logged-in user's id, if any.
pub async fn user_id(session: &Session) -> Result<Option<i64>, tower_sessions::session::Error> {
    session.get::<i64>(AUTHENTICATED_USER_ID).await
}

/// Removes and returns the flash message so it is shown exactly once.
pub async fn take_flash(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.remove::<String>(FLASH).await
}

pub async fn put_flash(session: &Session, msg: &str) -> Result<(), tower_sessions::session::Error> {
    session.insert(FLASH, msg).await
}

/// Returns the session's anti-forgery token, minting one on first use.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(CSRF_TOKEN).await? {
        return Ok(token);
    }
    let token = new_csrf_token();
    session.insert(CSRF_TOKEN, &token).await?;
    Ok(token)
}

fn new_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
