use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Sidecar settings.
///
/// Sources, lowest priority first:
/// - built-in defaults
/// - `submissionsd.toml` in the working directory (optional)
/// - `SUBMISSIONSD_*` environment variables
/// - `RUST_LOG` for the log filter
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    /// Workspace opened at startup, as if `workspace.select` had been sent.
    pub workspace: Option<PathBuf>,
    /// Write the registry snapshot to the workspace after each mutation.
    pub persist_submissions: bool,
    /// Refuse registry mutations while nobody is logged in.
    pub require_login: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            workspace: None,
            persist_submissions: true,
            require_login: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("persist_submissions", defaults.persist_submissions)?
            .set_default("require_login", defaults.require_login)?
            .add_source(File::with_name("submissionsd").required(false))
            .add_source(Environment::with_prefix("SUBMISSIONSD").try_parsing(true))
            .set_override_option("log_level", std::env::var("RUST_LOG").ok())?;

        builder.build()?.try_deserialize()
    }
}
