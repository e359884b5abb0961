use crate::ingest::sessionize::DEFAULT_SESSION_GAP_MINUTES;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL of the newline-delimited JSON event feed.
    #[serde(default = "default_source_url")]
    pub source_url: String,
    /// Path to the DuckDB database file. If not set, the event store runs
    /// in memory for the lifetime of the process.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Inactivity gap in minutes before a customer's next event starts a
    /// new session.
    #[serde(default = "default_session_gap_minutes")]
    pub session_gap_minutes: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_source_url() -> String {
    "https://storage.googleapis.com/xcc-de-assessment/events.json".to_string()
}

const fn default_session_gap_minutes() -> i64 {
    DEFAULT_SESSION_GAP_MINUTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            source_url: default_source_url(),
            database: None,
            session_gap_minutes: default_session_gap_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `FUNNEL_HOST` → host
    /// - `FUNNEL_PORT` → port
    /// - `FUNNEL_SOURCE_URL` → source_url
    /// - `FUNNEL_DATABASE` → database
    /// - `FUNNEL_SESSION_GAP_MINUTES` → session_gap_minutes
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        // Environment variable overrides
        if let Ok(host) = std::env::var("FUNNEL_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("FUNNEL_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(url) = std::env::var("FUNNEL_SOURCE_URL") {
            config.source_url = url;
        }
        if let Ok(database) = std::env::var("FUNNEL_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }
        if let Ok(gap) = std::env::var("FUNNEL_SESSION_GAP_MINUTES") {
            if let Ok(g) = gap.parse() {
                config.session_gap_minutes = g;
            }
        }

        config
    }
}
