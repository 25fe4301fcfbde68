//! Application settings and configuration
//!
//! This module provides configuration management for the application,
//! loading settings from environment variables with sensible defaults.

use crate::schemas::gemini::models;
use crate::services::backend_pool::Credential;
use crate::services::failover::FailoverPolicy;
use crate::services::gemini::GeminiConfig;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format: {}. Expected: pretty or json", s),
        }
    }
}

/// Gemini API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiSettings {
    /// Ordered key pool
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    pub text_model: String,
    pub image_model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            base_url: None,
            timeout_seconds: 120,
            text_model: models::GEMINI_2_5_FLASH.to_string(),
            image_model: models::GEMINI_2_5_FLASH_IMAGE.to_string(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub log_format: LogFormat,

    // Gemini settings
    pub gemini: GeminiSettings,

    /// Where the last-known-good key index is persisted
    pub key_cursor_path: PathBuf,

    /// Rotate to the next key when a key is rejected as invalid
    pub rotate_on_invalid_key: bool,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = GeminiSettings::default();

        let settings = Self {
            app_name: env_or_default("APP_NAME", "keytube"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: env_or_default("LOG_LEVEL", "info"),
            log_format: env_or_default("LOG_FORMAT", "pretty")
                .parse()
                .unwrap_or_default(),

            gemini: GeminiSettings {
                api_keys: parse_key_list(&env::var("GEMINI_API_KEYS").unwrap_or_default()),
                base_url: env::var("GEMINI_BASE_URL").ok().filter(|s| !s.trim().is_empty()),
                timeout_seconds: env_or_default("GEMINI_TIMEOUT_SECONDS", "120")
                    .parse()
                    .context("Invalid GEMINI_TIMEOUT_SECONDS value")?,
                text_model: env_or_default("GEMINI_TEXT_MODEL", &defaults.text_model),
                image_model: env_or_default("GEMINI_IMAGE_MODEL", &defaults.image_model),
            },

            key_cursor_path: PathBuf::from(env_or_default(
                "KEY_CURSOR_PATH",
                ".keytube/key_cursor.json",
            )),

            rotate_on_invalid_key: env_or_default("ROTATE_ON_INVALID_KEY", "false")
                .parse()
                .unwrap_or(false),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.gemini.timeout_seconds == 0 {
            anyhow::bail!("GEMINI_TIMEOUT_SECONDS must be > 0");
        }
        if self.gemini.text_model.trim().is_empty() || self.gemini.image_model.trim().is_empty() {
            anyhow::bail!("Gemini model names cannot be empty");
        }
        if self.key_cursor_path.as_os_str().is_empty() {
            anyhow::bail!("KEY_CURSOR_PATH cannot be empty");
        }

        // An empty pool is reported on first use, not at startup
        if self.gemini.api_keys.is_empty() {
            tracing::warn!("No Gemini API keys configured (set GEMINI_API_KEYS)");
        }

        Ok(())
    }

    /// Configured keys as pool credentials, in order
    pub fn credentials(&self) -> Vec<Credential> {
        self.gemini
            .api_keys
            .iter()
            .map(|key| Credential::new(key.as_str()))
            .collect()
    }

    /// HTTP client configuration
    pub fn gemini_config(&self) -> GeminiConfig {
        let config = GeminiConfig::new().with_timeout(self.gemini.timeout_seconds);
        match &self.gemini.base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    /// Rotation rules for the failover invoker
    pub fn failover_policy(&self) -> FailoverPolicy {
        FailoverPolicy::new().with_rotate_on_invalid_credential(self.rotate_on_invalid_key)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "keytube".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            gemini: GeminiSettings::default(),
            key_cursor_path: PathBuf::from(".keytube/key_cursor.json"),
            rotate_on_invalid_key: false,
        }
    }
}

/// Split a comma- or newline-separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
