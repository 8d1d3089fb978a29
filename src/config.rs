use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::client::DEFAULT_ENDPOINT;
use crate::render::RenderMode;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub endpoint: Option<String>,
    pub render_mode: Option<RenderMode>,
    pub request_timeout_secs: Option<u64>,
    pub theme_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Update one setting from its textual form. An empty value unsets it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "endpoint" => {
                self.endpoint = (!value.is_empty()).then(|| value.to_string());
            }
            "render_mode" | "render-mode" | "render" => {
                self.render_mode = if value.is_empty() {
                    None
                } else {
                    Some(value.parse::<RenderMode>().map_err(|e| anyhow!(e))?)
                };
            }
            "request_timeout_secs" | "timeout" => {
                self.request_timeout_secs = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().map_err(|_| anyhow!("timeout must be a whole number of seconds"))?)
                };
            }
            "theme_path" | "theme" => {
                self.theme_path = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            _ => return Err(anyhow!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode.unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("erica").join("config.json"))
    }
}
