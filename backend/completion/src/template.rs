use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use patentflow_core::{CompletionError, PromptRequest};

/// `{name}` placeholders. Only identifier-like names are matched, so literal
/// braces in prompt prose are left alone.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// A named system/user prompt pair with `{var}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: &'static str,
    system: &'static str,
    user: &'static str,
    required: &'static [&'static str],
    temperature: Option<f32>,
}

/// Prompt text with every placeholder substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledPrompt {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(
        name: &'static str,
        system: &'static str,
        user: &'static str,
        required: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            system,
            user,
            required,
            temperature: None,
        }
    }

    /// Override the configured sampling temperature for this template.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn required(&self) -> &'static [&'static str] {
        self.required
    }

    /// Substitute variables. Fails before rendering if a required one is missing.
    pub fn fill(&self, request: &PromptRequest) -> Result<FilledPrompt, CompletionError> {
        request.require(self.required)?;
        Ok(FilledPrompt {
            system: render(self.system, request),
            user: render(self.user, request),
        })
    }
}

// Single pass: substituted values are never re-scanned for placeholders.
fn render(template: &str, request: &PromptRequest) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match request.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
