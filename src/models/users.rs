use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;

use super::password::{hash_password, verify_password};
use super::snippets::{format_timestamp, parse_timestamp};
use super::{now_utc, with_timeout, ModelError, ModelResult, UserStore};

/// A user as shown to the application. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
    timeout: Duration,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn hashed_password_by_id(&self, id: i64) -> ModelResult<String> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT hashed_password FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await?;
        match row {
            Some(row) => Ok(row.try_get("hashed_password")?),
            None => Err(ModelError::NoRecord),
        }
    }
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(password: &str) -> ModelResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ModelError::Hash(e.to_string()))?
}

async fn verify_blocking(password: &str, hash: String) -> ModelResult<bool> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ModelError::Hash(e.to_string()))?
}

fn is_duplicate_email(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains("users.email")
        }
        _ => false,
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, name: &str, email: &str, password: &str) -> ModelResult<()> {
        let hashed = hash_blocking(password).await?;

        let res = with_timeout(
            self.timeout,
            sqlx::query(
                r#"INSERT INTO users (name, email, hashed_password, created)
                   VALUES (?1, ?2, ?3, ?4)"#,
            )
            .bind(name)
            .bind(email)
            .bind(hashed)
            .bind(format_timestamp(now_utc())?)
            .execute(&self.db),
        )
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(ModelError::Database(e)) if is_duplicate_email(&e) => Err(ModelError::DuplicateEmail),
            Err(e) => Err(e),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> ModelResult<i64> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT id, hashed_password FROM users WHERE email = ?1")
                .bind(email)
                .fetch_optional(&self.db),
        )
        .await?;

        let Some(row) = row else {
            return Err(ModelError::InvalidCredentials);
        };
        let id: i64 = row.try_get("id")?;
        let hashed: String = row.try_get("hashed_password")?;

        if verify_blocking(password, hashed).await? {
            Ok(id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn exists(&self, id: i64) -> ModelResult<bool> {
        let exists: i64 = with_timeout(
            self.timeout,
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)")
                .bind(id)
                .fetch_one(&self.db),
        )
        .await?;
        Ok(exists != 0)
    }

    async fn get(&self, id: i64) -> ModelResult<User> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT id, name, email, created FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await?;

        let Some(row) = row else {
            return Err(ModelError::NoRecord);
        };
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created: parse_timestamp(row.try_get("created")?)?,
        })
    }

    async fn password_update(&self, id: i64, current_password: &str, new_password: &str) -> ModelResult<()> {
        let current_hash = self.hashed_password_by_id(id).await?;
        if !verify_blocking(current_password, current_hash).await? {
            return Err(ModelError::InvalidCredentials);
        }

        let new_hash = hash_blocking(new_password).await?;
        with_timeout(
            self.timeout,
            sqlx::query("UPDATE users SET hashed_password = ?1 WHERE id = ?2")
                .bind(new_hash)
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
