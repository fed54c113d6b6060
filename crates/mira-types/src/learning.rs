use serde::{Deserialize, Serialize};

/// Closed taxonomy a published learning must fall into (spec.md §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningCategory {
    Pattern,
    BestPractice,
    AntiPattern,
    BugFix,
    Optimization,
    ToolUsage,
    Workflow,
    Decision,
}

impl LearningCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningCategory::Pattern => "pattern",
            LearningCategory::BestPractice => "best_practice",
            LearningCategory::AntiPattern => "anti_pattern",
            LearningCategory::BugFix => "bug_fix",
            LearningCategory::Optimization => "optimization",
            LearningCategory::ToolUsage => "tool_usage",
            LearningCategory::Workflow => "workflow",
            LearningCategory::Decision => "decision",
        }
    }

    pub const ALL: [LearningCategory; 8] = [
        LearningCategory::Pattern,
        LearningCategory::BestPractice,
        LearningCategory::AntiPattern,
        LearningCategory::BugFix,
        LearningCategory::Optimization,
        LearningCategory::ToolUsage,
        LearningCategory::Workflow,
        LearningCategory::Decision,
    ];
}

impl std::str::FromStr for LearningCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern" => Ok(LearningCategory::Pattern),
            "best_practice" => Ok(LearningCategory::BestPractice),
            "anti_pattern" => Ok(LearningCategory::AntiPattern),
            "bug_fix" => Ok(LearningCategory::BugFix),
            "optimization" => Ok(LearningCategory::Optimization),
            "tool_usage" => Ok(LearningCategory::ToolUsage),
            "workflow" => Ok(LearningCategory::Workflow),
            "decision" => Ok(LearningCategory::Decision),
            other => Err(format!("unknown learning category: {other}")),
        }
    }
}

impl std::fmt::Display for LearningCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
