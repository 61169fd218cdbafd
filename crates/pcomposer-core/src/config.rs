use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the global store root.
pub const STORE_DIR_ENV: &str = "PCOMPOSER_STORE_DIR";

/// Environment variable overriding the registry base URL.
pub const REGISTRY_ENV: &str = "PCOMPOSER_REGISTRY";

/// Environment variable overriding the per-request HTTP timeout, in seconds.
pub const HTTP_TIMEOUT_ENV: &str = "PCOMPOSER_HTTP_TIMEOUT";

/// Default registry base URL.
pub const DEFAULT_REGISTRY: &str = "https://packagist.org/packages/";

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the pcomposer CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Global store root override. `None` uses `~/.pcomposer/store`.
    pub store_dir: Option<PathBuf>,

    /// Registry base URL.
    pub registry_url: String,

    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            store_dir: None,
            registry_url: DEFAULT_REGISTRY.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Create a config for `cwd`, applying `PCOMPOSER_*` environment overrides.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if `PCOMPOSER_HTTP_TIMEOUT` is not a whole number of seconds.
    pub fn from_env(cwd: PathBuf) -> Result<Self, Error> {
        let mut config = Self::new(cwd);

        if let Some(dir) = std::env::var_os(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.store_dir = Some(PathBuf::from(dir));
        }

        if let Ok(url) = std::env::var(REGISTRY_ENV) {
            if !url.trim().is_empty() {
                config.registry_url = url.trim().to_string();
            }
        }

        if let Ok(raw) = std::env::var(HTTP_TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|e| Error::ConfigInvalid {
                var: HTTP_TIMEOUT_ENV,
                message: format!("'{raw}' is not a number of seconds ({e})"),
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the global store root.
    #[must_use]
    pub fn with_store_dir(mut self, dir: PathBuf) -> Self {
        self.store_dir = Some(dir);
        self
    }

    /// Set the registry base URL.
    #[must_use]
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }
}
