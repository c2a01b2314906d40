//! In-memory stand-ins for the SQLite stores, used by the handler tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{expiry_after, now_utc, ModelError, ModelResult, Snippet, SnippetStore, User, UserStore, LATEST_LIMIT};

#[derive(Default)]
pub struct MemorySnippetStore {
    rows: Mutex<Vec<Snippet>>,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row with explicit timestamps, bypassing the expiry arithmetic.
    pub fn insert_raw(&self, title: &str, content: &str, created: OffsetDateTime, expires: OffsetDateTime) -> i64 {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(Snippet { id, title: title.into(), content: content.into(), created, expires });
        id
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> ModelResult<i64> {
        let created = now_utc();
        let expires = expiry_after(created, expires_days)?;
        Ok(self.insert_raw(title, content, created, expires))
    }

    async fn get(&self, id: i64) -> ModelResult<Snippet> {
        let now = now_utc();
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(ModelError::NoRecord)
    }

    async fn latest(&self) -> ModelResult<Vec<Snippet>> {
        let now = now_utc();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|s| s.expires > now)
            .take(LATEST_LIMIT as usize)
            .cloned()
            .collect())
    }
}

struct StoredUser {
    user: User,
    password: String,
}

/// Keeps passwords in the clear; it only has to model the store's contract.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<StoredUser>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, name: &str, email: &str, password: &str) -> ModelResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.user.email == email) {
            return Err(ModelError::DuplicateEmail);
        }
        let id = rows.len() as i64 + 1;
        rows.push(StoredUser {
            user: User { id, name: name.into(), email: email.into(), created: now_utc() },
            password: password.into(),
        });
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> ModelResult<i64> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.email == email && u.password == password)
            .map(|u| u.user.id)
            .ok_or(ModelError::InvalidCredentials)
    }

    async fn exists(&self, id: i64) -> ModelResult<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|u| u.user.id == id))
    }

    async fn get(&self, id: i64) -> ModelResult<User> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
            .ok_or(ModelError::NoRecord)
    }

    async fn password_update(&self, id: i64, current_password: &str, new_password: &str) -> ModelResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let stored = rows.iter_mut().find(|u| u.user.id == id).ok_or(ModelError::NoRecord)?;
        if stored.password != current_password {
            return Err(ModelError::InvalidCredentials);
        }
        stored.password = new_password.into();
        Ok(())
    }
}
