//! `patentflow-config`: process-wide configuration for the PatentFlow server and CLI.
//!
//! Provides:
//! - Typed settings loaded once from the environment with defaults
//! - Validation report with errors and warnings
//! - Redaction for safe logging

pub mod redact;
pub mod settings;
pub mod validation;

pub use redact::redact;
pub use settings::AppConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};
