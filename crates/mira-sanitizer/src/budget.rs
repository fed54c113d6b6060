use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::patterns::{ordered_patterns, Category};

pub const PATTERN_SOFT_CAP: Duration = Duration::from_millis(10);
pub const PIPELINE_SOFT_CAP: Duration = Duration::from_millis(50);
pub const PIPELINE_HARD_CAP: Duration = Duration::from_millis(80);

/// One flag per pattern in priority order. A pattern that blows its soft
/// cap is retired for the remaining lifetime of the process; the hook and
/// worker binaries are short-lived, so "permanent" here means
/// "for this invocation onward", matching a pure-function sanitizer that
/// nonetheless must not let one bad input degrade every call after it.
pub struct RetirementRegistry {
    retired: Vec<AtomicBool>,
}

impl RetirementRegistry {
    pub fn new() -> Self {
        let len = ordered_patterns().len();
        Self {
            retired: (0..len).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn is_retired(&self, index: usize) -> bool {
        self.retired[index].load(Ordering::Relaxed)
    }

    pub fn retire(&self, index: usize, category: Category) {
        if !self.retired[index].swap(true, Ordering::Relaxed) {
            tracing::warn!(category = category.as_str(), "pattern exceeded soft cap, retiring");
        }
    }
}

impl Default for RetirementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
