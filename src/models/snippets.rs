use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{expiry_after, now_utc, with_timeout, ModelError, ModelResult, SnippetStore, LATEST_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl Snippet {
    fn from_row(row: &SqliteRow) -> ModelResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            created: parse_timestamp(row.try_get("created")?)?,
            expires: parse_timestamp(row.try_get("expires")?)?,
        })
    }
}

pub(crate) fn format_timestamp(ts: OffsetDateTime) -> ModelResult<String> {
    ts.format(&Rfc3339).map_err(|e| ModelError::Timestamp(e.to_string()))
}

pub(crate) fn parse_timestamp(raw: String) -> ModelResult<OffsetDateTime> {
    OffsetDateTime::parse(&raw, &Rfc3339).map_err(|e| ModelError::Timestamp(format!("{}: {:?}", e, raw)))
}

#[derive(Clone)]
pub struct SqliteSnippetStore {
    db: SqlitePool,
    timeout: Duration,
}

impl SqliteSnippetStore {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl SnippetStore for SqliteSnippetStore {
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> ModelResult<i64> {
        let created = now_utc();
        let expires = expiry_after(created, expires_days)?;

        let res = with_timeout(
            self.timeout,
            sqlx::query(
                r#"INSERT INTO snippets (title, content, created, expires)
                   VALUES (?1, ?2, ?3, ?4)"#,
            )
            .bind(title)
            .bind(content)
            .bind(format_timestamp(created)?)
            .bind(format_timestamp(expires)?)
            .execute(&self.db),
        )
        .await?;

        Ok(res.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> ModelResult<Snippet> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"SELECT id, title, content, created, expires
                   FROM snippets
                   WHERE expires > ?1 AND id = ?2"#,
            )
            .bind(format_timestamp(now_utc())?)
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await?;

        match row {
            Some(row) => Snippet::from_row(&row),
            None => Err(ModelError::NoRecord),
        }
    }

    async fn latest(&self) -> ModelResult<Vec<Snippet>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query(
                r#"SELECT id, title, content, created, expires
                   FROM snippets
                   WHERE expires > ?1
                   ORDER BY id DESC
                   LIMIT ?2"#,
            )
            .bind(format_timestamp(now_utc())?)
            .bind(LATEST_LIMIT)
            .fetch_all(&self.db),
        )
        .await?;

        rows.iter().map(Snippet::from_row).collect()
    }
}
