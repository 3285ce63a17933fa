//! TOML-based configuration for the chat session.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use colloquy_common::ConfigError;

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: EndpointConfig,
    /// Upstream tool providers requested immediately after a successful open.
    pub providers: Vec<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            providers: vec![
                "github".into(),
                "mcp-server-git".into(),
                "brave-search".into(),
                "puppeteer".into(),
            ],
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ChatConfig {
    /// WebSocket URL for one connection attempt; the path embeds the
    /// per-attempt client id.
    pub(crate) fn ws_url(&self, client_id: &str) -> String {
        format!(
            "{}/ws/{client_id}",
            self.endpoint.url.trim_end_matches('/')
        )
    }
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub open_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000".into(),
            open_timeout_secs: 15,
        }
    }
}

/// Reconnect policy applied after a non-clean closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            max_attempts: 3,
        }
    }
}

/// Validate a parsed config.
pub fn validate(config: &ChatConfig) -> Result<(), ConfigError> {
    if config.endpoint.url.is_empty() {
        return Err(ConfigError::ValidationError("endpoint.url is empty".into()));
    }
    if !config.endpoint.url.starts_with("ws://") && !config.endpoint.url.starts_with("wss://") {
        return Err(ConfigError::ValidationError(format!(
            "endpoint.url must be a ws:// or wss:// URL, got {}",
            config.endpoint.url
        )));
    }
    if config.endpoint.open_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "endpoint.open_timeout_secs must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Load config from a specific TOML file path.
///
/// Missing fields fall back to serde defaults. If validation fails, a
/// warning is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<ChatConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: ChatConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(ChatConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform default path
/// (`<config dir>/colloquy/config.toml`), creating a default file if none
/// exists.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(ChatConfig::default());
    }

    load_from_path(&path)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("colloquy").join("config.toml"))
}

fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let content = toml::to_string_pretty(&ChatConfig::default())
        .map_err(|e| ConfigError::ParseError(format!("failed to serialize defaults: {e}")))?;
    std::fs::write(path, content).map_err(|e| {
        ConfigError::ParseError(format!("failed to write {}: {e}", path.display()))
    })
}
