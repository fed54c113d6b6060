use serde::{Deserialize, Serialize};

/// Which stage of sanitization produced a `Detection` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStage {
    PreSanitization,
    AiValidation,
}

impl DetectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStage::PreSanitization => "pre_sanitization",
            DetectionStage::AiValidation => "ai_validation",
        }
    }
}

impl std::str::FromStr for DetectionStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_sanitization" => Ok(DetectionStage::PreSanitization),
            "ai_validation" => Ok(DetectionStage::AiValidation),
            other => Err(format!("unknown sanitization stage: {other}")),
        }
    }
}

impl std::fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single redaction, recorded without ever carrying the original value.
///
/// Shared between the fast sanitizer's pipeline output and the AI
/// validator's model-reported findings; `confidence` is always `1.0` for
/// deterministic pattern matches and the model's reported score otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: String,
    pub placeholder: String,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
    pub detector: String,
    pub detector_version: u32,
}

impl Detection {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
