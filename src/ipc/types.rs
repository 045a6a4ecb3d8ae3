use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::registry::SubmissionRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Everything the handlers share. The registry is owned here and reaches the
/// handlers only through `&mut AppState`.
pub struct AppState {
    pub config: AppConfig,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub registry: SubmissionRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            registry: SubmissionRegistry::new(),
        }
    }
}
