use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use patentflow_core::model::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use patentflow_core::ModelConfig;

/// PatentFlow runtime configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Directory for rolling log files
    pub log_dir: String,

    // Model endpoint
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub temperature: f32,

    /// Per-character delay for paced sections, in milliseconds
    pub char_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 20,
            max_retries: 1,
            temperature: 0.7,
            char_delay_ms: 20,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Load configuration from a provided map (useful for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let text = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        Ok(Self {
            bind_address: text("PATENTFLOW_BIND").unwrap_or(defaults.bind_address),
            port: parse_var(vars, "PATENTFLOW_PORT")?.unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_dir: text("PATENTFLOW_LOG_DIR").unwrap_or(defaults.log_dir),
            base_url: text("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: text("OPENAI_API_KEY"),
            model: text("OPENAI_CHAT_MODEL").unwrap_or(defaults.model),
            timeout_secs: parse_var(vars, "PATENTFLOW_TIMEOUT_SECS")?
                .unwrap_or(defaults.timeout_secs),
            max_retries: parse_var(vars, "PATENTFLOW_MAX_RETRIES")?
                .unwrap_or(defaults.max_retries),
            temperature: parse_var(vars, "PATENTFLOW_TEMPERATURE")?
                .unwrap_or(defaults.temperature),
            char_delay_ms: parse_var(vars, "PATENTFLOW_CHAR_DELAY_MS")?
                .unwrap_or(defaults.char_delay_ms),
        })
    }

    /// The read-only model settings handed to the completion source.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            temperature: self.temperature,
        }
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// JSON snapshot with secrets masked, safe for the startup log line.
    pub fn redacted(&self) -> Value {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        crate::redact::redact(&value)
    }

    pub fn validate(&self) -> crate::validation::ValidationReport {
        crate::validation::validate(self)
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(None),
    }
}
