//! Runtime configuration.
//!
//! Values come from environment variables with built-in defaults:
//! - `MIHARU_DB_PATH` - SQLite database file (default `./miharu.db`)
//! - `MIHARU_DASHBOARD_PORT` - dashboard listen port (default `3001`)

use std::path::PathBuf;

pub const DEFAULT_DB_FILE: &str = "miharu.db";
pub const DEFAULT_DASHBOARD_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path of the call database.
    pub db_path: PathBuf,
    /// Port the dashboard listens on.
    pub dashboard_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            db_path: cwd.join(DEFAULT_DB_FILE),
            dashboard_port: DEFAULT_DASHBOARD_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MIHARU_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("MIHARU_DASHBOARD_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => config.dashboard_port = port,
                Err(e) => tracing::warn!(
                    "Ignoring invalid MIHARU_DASHBOARD_PORT '{}': {}, using {}",
                    raw,
                    e,
                    config.dashboard_port
                ),
            }
        }

        config
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_dashboard_port(mut self, port: u16) -> Self {
        self.dashboard_port = port;
        self
    }
}
