use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CompletionError;

/// Section header that opens a technical-effect document.
pub const BENEFICIAL_EFFECTS_HEADER: &str = "## 有益效果\n\n";

/// Section header between the beneficial effects and the protection points.
pub const PROTECTION_POINTS_HEADER: &str = "\n\n## 技术关键点和欲保护点\n\n";

// ---------------------------------------------------------------------------
// Prompt request
// ---------------------------------------------------------------------------

/// Named template variables for a single model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    vars: BTreeMap<String, String>,
}

impl PromptRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Fail on the first listed variable that is absent or blank.
    pub fn require(&self, names: &[&str]) -> Result<(), CompletionError> {
        match names
            .iter()
            .find(|name| self.get(name).map_or(true, |v| v.trim().is_empty()))
        {
            Some(missing) => Err(CompletionError::MissingField((*missing).to_string())),
            None => Ok(()),
        }
    }

}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// One incremental unit of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment(String);

impl Fragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Optimization type
// ---------------------------------------------------------------------------

/// Which variant of the text-optimization prompt to fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationType {
    #[default]
    Standard,
    Detailed,
    Concise,
    Legal,
}

impl OptimizationType {
    pub const ALL: [OptimizationType; 4] = [
        Self::Standard,
        Self::Detailed,
        Self::Concise,
        Self::Legal,
    ];

    /// Unrecognized values fall back to [`OptimizationType::Standard`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "detailed" => Self::Detailed,
            "concise" => Self::Concise,
            "legal" => Self::Legal,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Detailed => "detailed",
            Self::Concise => "concise",
            Self::Legal => "legal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "标准优化",
            Self::Detailed => "详细扩展",
            Self::Concise => "精简提炼",
            Self::Legal => "法律规范",
        }
    }
}

impl From<String> for OptimizationType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// Any JSON value is accepted; only a recognized string selects a variant.
impl<'de> Deserialize<'de> for OptimizationType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Other(IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(value) => Self::parse(&value),
            Raw::Other(_) => Self::Standard,
        })
    }
}

impl FromStr for OptimizationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for OptimizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_first_missing_or_blank() {
        let request = PromptRequest::new()
            .with("technicalBackground", "背景")
            .with("technicalSolution", "   ");
        assert_eq!(request.require(&["technicalBackground"]), Ok(()));
        assert_eq!(
            request.require(&["technicalBackground", "technicalSolution"]),
            Err(CompletionError::MissingField("technicalSolution".into()))
        );
        assert_eq!(
            request.require(&["text"]),
            Err(CompletionError::MissingField("text".into()))
        );
    }

    #[test]
    fn unknown_optimization_type_falls_back_to_standard() {
        assert_eq!(OptimizationType::parse("legal"), OptimizationType::Legal);
        assert_eq!(OptimizationType::parse(" Detailed "), OptimizationType::Detailed);
        assert_eq!(OptimizationType::parse("poetic"), OptimizationType::Standard);
        assert_eq!(OptimizationType::parse(""), OptimizationType::Standard);
    }

    #[test]
    fn optimization_type_deserializes_leniently() {
        let kind: OptimizationType = serde_json::from_str("\"concise\"").unwrap();
        assert_eq!(kind, OptimizationType::Concise);
        let kind: OptimizationType = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(kind, OptimizationType::Standard);
        for raw in ["2", "true", "[\"legal\"]", "{\"kind\":\"legal\"}"] {
            let kind: OptimizationType = serde_json::from_str(raw).unwrap();
            assert_eq!(kind, OptimizationType::Standard, "{raw}");
        }
        assert_eq!(
            serde_json::to_string(&OptimizationType::Legal).unwrap(),
            "\"legal\""
        );
    }
}
