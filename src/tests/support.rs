use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use regex::Regex;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::models::mocks::{MemorySnippetStore, MemoryUserStore};
use crate::models::UserStore;
use crate::routes;
use crate::state::AppState;
use crate::templates::Templates;

pub const COOKIE_NAME: &str = "session";

pub fn ui_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("ui")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }
}

/// Drives the full router with `oneshot`, carrying the session cookie between
/// requests like a browser would.
pub struct TestApp {
    pub router: Router,
    pub snippets: Arc<MemorySnippetStore>,
    pub users: Arc<MemoryUserStore>,
    pub metrics: Metrics,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let snippets = Arc::new(MemorySnippetStore::new());
        let users = Arc::new(MemoryUserStore::new());
        let templates = Templates::load(&ui_dir()).unwrap();
        let state = AppState::new(snippets.clone(), users.clone(), templates, config);
        let metrics = state.metrics.clone();

        let session_layer = SessionManagerLayer::new(MemoryStore::default())
            .with_name(COOKIE_NAME)
            .with_secure(false);
        let router = routes::router(state, session_layer, &ui_dir().join("static"));

        Self { router, snippets, users, metrics, cookie: None }
    }

    pub fn has_session_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    pub async fn request(&mut self, method: Method, path: &str, body: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", COOKIE_NAME, cookie));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        self.store_cookie(&headers);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();

        TestResponse { status, headers, body: String::from_utf8_lossy(&bytes).into_owned() }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.request(Method::POST, path, Some(encode_form(fields))).await
    }

    /// Fetches `page`, pulls the CSRF token out of it and posts `fields` with it.
    pub async fn submit(&mut self, page: &str, action: &str, fields: &[(&str, &str)]) -> TestResponse {
        let form_page = self.get(page).await;
        let token = extract_csrf_token(&form_page.body).expect("page should carry a CSRF token");
        let mut with_token = fields.to_vec();
        with_token.push(("csrf_token", token.as_str()));
        self.post_form(action, &with_token).await
    }

    pub async fn add_user(&self, name: &str, email: &str, password: &str) {
        self.users.insert(name, email, password).await.unwrap();
    }

    /// Creates a user and logs in as them.
    pub async fn login_as(&mut self, email: &str, password: &str) -> TestResponse {
        self.add_user("Alice", email, password).await;
        let res = self
            .submit("/user/login", "/user/login", &[("email", email), ("password", password)])
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER, "login should redirect");
        res
    }

    fn store_cookie(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, val)) = pair.split_once('=') else { continue };
            if name.trim() != COOKIE_NAME {
                continue;
            }
            let removed = val.is_empty() || raw.to_ascii_lowercase().contains("max-age=0");
            self.cookie = if removed { None } else { Some(val.to_string()) };
        }
    }
}

pub fn extract_csrf_token(html: &str) -> Option<String> {
    let rx = Regex::new(r#"name="csrf_token" value="([^"]+)""#).unwrap();
    rx.captures(html).map(|c| c[1].to_string())
}

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
