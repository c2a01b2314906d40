use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::models::{SnippetStore, UserStore};
use crate::templates::Templates;

/// The shared application state.
///
/// Cloned into every handler and stateful middleware. The stores are trait
/// objects so tests can swap the SQLite implementations for in-memory ones.
#[derive(Clone)]
pub struct AppState {
    pub snippets: Arc<dyn SnippetStore>,
    pub users: Arc<dyn UserStore>,
    /// Page templates, compiled once at startup.
    pub templates: Arc<Templates>,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        snippets: Arc<dyn SnippetStore>,
        users: Arc<dyn UserStore>,
        templates: Templates,
        config: AppConfig,
    ) -> Self {
        Self {
            snippets,
            users,
            templates: Arc::new(templates),
            config: Arc::new(config),
            metrics: Metrics::new(),
        }
    }
}
