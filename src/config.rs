//! Hub configuration.
//!
//! Layered as defaults, then an optional TOML file, then environment
//! variables (a `.env` file is honoured), then CLI flags applied by `main`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hub::push::DEFAULT_BUFFER;

pub const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address to bind.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Directory of persisted scripts. When set, changes there publish
    /// `reload` to the script's topic.
    pub scripts_dir: Option<PathBuf>,

    /// Frames buffered per subscriber before it counts as stalled.
    pub subscriber_buffer: usize,

    /// Relay duplex messages back to their sender as well.
    pub echo_to_sender: bool,

    /// Debounce window for the script watcher.
    pub watch_debounce_ms: u64,

    /// Write a daily rolling log file here in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            scripts_dir: None,
            subscriber_buffer: DEFAULT_BUFFER,
            echo_to_sender: false,
            watch_debounce_ms: 50,
            log_dir: None,
        }
    }
}

impl HubConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().with_context(|| format!("invalid PORT: {port}"))?;
        }
        if let Some(host) = lookup("PROMPTER_HOST") {
            self.host = host;
        }
        if let Some(dir) = lookup("PROMPTER_SCRIPTS_DIR") {
            self.scripts_dir = Some(PathBuf::from(dir));
        }
        if let Some(buffer) = lookup("PROMPTER_SUBSCRIBER_BUFFER") {
            self.subscriber_buffer = buffer
                .parse()
                .with_context(|| format!("invalid PROMPTER_SUBSCRIBER_BUFFER: {buffer}"))?;
        }
        if let Some(echo) = lookup("PROMPTER_ECHO_TO_SENDER") {
            self.echo_to_sender = matches!(echo.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(dir) = lookup("PROMPTER_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL shown in the startup banner.
    pub fn display_url(&self) -> String {
        format!("http://{}", self.bind_addr())
    }
}
