use serde::{Deserialize, Serialize};

/// Closed set of job types the worker pool knows how to execute (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AiSanitizationValidation,
    ExtractLearning,
    PublishLearning,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::AiSanitizationValidation => "ai_sanitization_validation",
            JobType::ExtractLearning => "extract_learning",
            JobType::PublishLearning => "publish_learning",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_sanitization_validation" => Ok(JobType::AiSanitizationValidation),
            "extract_learning" => Ok(JobType::ExtractLearning),
            "publish_learning" => Ok(JobType::PublishLearning),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle state (spec.md §4.5). Only the transitions documented there
/// are ever applied by `mira-queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    DeadLetter,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::DeadLetter => "dead_letter",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "dead_letter" => Ok(JobStatus::DeadLetter),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ApiCall lifecycle state (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCallStatus {
    Reserved,
    Success,
    Error,
    Cancelled,
}

impl ApiCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiCallStatus::Reserved => "reserved",
            ApiCallStatus::Success => "success",
            ApiCallStatus::Error => "error",
            ApiCallStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ApiCallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ApiCallStatus::Reserved),
            "success" => Ok(ApiCallStatus::Success),
            "error" => Ok(ApiCallStatus::Error),
            "cancelled" => Ok(ApiCallStatus::Cancelled),
            other => Err(format!("unknown api_call status: {other}")),
        }
    }
}

impl std::fmt::Display for ApiCallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
