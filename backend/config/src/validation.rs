//! Config validation: checks with user-friendly error messages.

use thiserror::Error;

use patentflow_core::model::MAX_RETRIES;

use crate::settings::AppConfig;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &AppConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_model(config, &mut report);
    validate_server(config, &mut report);
    report
}

fn validate_model(config: &AppConfig, report: &mut ValidationReport) {
    match url::Url::parse(&config.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => report.error(
            "base_url",
            format!("unsupported scheme '{}', expected http or https", url.scheme()),
        ),
        Err(e) => report.error("base_url", format!("not a valid URL: {e}")),
    }

    if config.api_key.is_none() {
        report.warn(
            "api_key",
            "OPENAI_API_KEY is not set; completion requests will fail",
        );
    }
    if config.model.trim().is_empty() {
        report.error("model", "model name must not be empty");
    }
    if config.timeout_secs == 0 {
        report.error("timeout_secs", "timeout must be at least one second");
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        report.error("temperature", "temperature must be between 0.0 and 2.0");
    }
    if config.max_retries > MAX_RETRIES {
        report.error("max_retries", "at most one automatic retry is allowed");
    }
}

fn validate_server(config: &AppConfig, report: &mut ValidationReport) {
    if config.port == 0 {
        report.warn("port", "port 0 binds an ephemeral port");
    }
    if config.char_delay_ms > 1_000 {
        report.warn("char_delay_ms", "per-character delay above 1s makes paced sections crawl");
    }
}
