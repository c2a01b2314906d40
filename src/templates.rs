//! Page templates.
//!
//! Every `html/**/*.html` file under the UI directory is compiled once at
//! startup. Pages extend `base.html`; rendering always goes to a `String`
//! first so a template error becomes a clean 500 instead of a half-written page.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::response::Html;
use serde::Serialize;
use tera::{Context, Tera, Value};
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

use crate::error::AppResult;
use crate::models::{Snippet, User};

const UI_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/ui");

/// Everything a page may read. Unused fields stay at their defaults.
#[derive(Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub user: Option<User>,
    /// Submitted form values together with their validation errors.
    pub form: Value,
}

impl TemplateData {
    pub fn with_form<F: Serialize>(mut self, form: &F) -> AppResult<Self> {
        self.form = serde_json::to_value(form).map_err(anyhow::Error::from)?;
        Ok(self)
    }
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn load(ui_dir: &Path) -> anyhow::Result<Self> {
        let pattern = format!("{}/html/**/*.html", ui_dir.display());
        let mut tera = Tera::new(&pattern)
            .map_err(|e| anyhow::anyhow!("failed to compile templates in {}: {:?}", ui_dir.display(), e))?;
        if tera.get_template_names().next().is_none() {
            anyhow::bail!("no templates found under {}", ui_dir.display());
        }
        tera.register_filter("human_date", human_date);
        Ok(Self { tera })
    }

    pub fn render(&self, page: &str, data: &TemplateData) -> AppResult<Html<String>> {
        let ctx = Context::from_serialize(data)?;
        let body = self.tera.render(page, &ctx)?;
        Ok(Html(body))
    }
}

/// The UI directory: `server.ui_dir` when configured, else `<exe_dir>/ui` when
/// it exists next to the binary, else the source tree's `ui/`.
pub fn resolve_ui_dir(configured: Option<&str>) -> PathBuf {
    if let Some(dir) = configured.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    let runtime_ui = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("ui")))
        .unwrap_or_else(|| PathBuf::from("ui"));
    if runtime_ui.join("html").is_dir() {
        runtime_ui
    } else {
        PathBuf::from(UI_DIR)
    }
}

/// Formats an RFC 3339 timestamp as `02 Jan 2024 at 15:04` (UTC). Empty and
/// null values render as an empty string.
fn human_date(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) if !s.is_empty() => s,
        Value::Null => return Ok(Value::String(String::new())),
        Value::String(_) => return Ok(Value::String(String::new())),
        other => return Err(tera::Error::msg(format!("human_date expects a timestamp, got {}", other))),
    };
    let ts = OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| tera::Error::msg(format!("invalid timestamp {}: {}", raw, e)))?;
    let formatted = ts
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!("[day] [month repr:short] [year] at [hour]:[minute]"))
        .map_err(|e| tera::Error::msg(e.to_string()))?;
    Ok(Value::String(formatted))
}
