//! Outcome of executing one step.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::output::StepOutput;

/// Status of a completed (or skipped) step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failed,
    Timeout,
    Skipped,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Skipped => "skipped",
        }
    }

    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Timeout)
    }
}

/// Outcome of one executed step, per spec §3.
///
/// Invariant: `duration == end_time - start_time`, and failed/timeout
/// results always carry `Some(error)` while success/skipped never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: Status,
    pub output: StepOutput,
    pub error: Option<String>,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl StepResult {
    /// Milliseconds between `start_time` and `end_time`; never negative
    /// because callers always derive `end_time` from a later clock read.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }

    #[must_use]
    pub fn success(step_id: impl Into<String>, start: DateTime<Utc>, output: StepOutput) -> Self {
        Self {
            step_id: step_id.into(),
            start_time: start,
            end_time: Utc::now(),
            status: Status::Success,
            output,
            error: None,
            metrics: HashMap::new(),
        }
    }

    #[must_use]
    pub fn failed(
        step_id: impl Into<String>,
        start: DateTime<Utc>,
        output: StepOutput,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            start_time: start,
            end_time: Utc::now(),
            status: Status::Failed,
            output,
            error: Some(error.into()),
            metrics: HashMap::new(),
        }
    }

    #[must_use]
    pub fn timeout(
        step_id: impl Into<String>,
        start: DateTime<Utc>,
        output: StepOutput,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            start_time: start,
            end_time: Utc::now(),
            status: Status::Timeout,
            output,
            error: Some(error.into()),
            metrics: HashMap::new(),
        }
    }

    #[must_use]
    pub fn skipped(step_id: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            step_id: step_id.into(),
            start_time: start,
            end_time: Utc::now(),
            status: Status::Skipped,
            output: StepOutput::None,
            error: None,
            metrics: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: HashMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Canonical boolean-to-float encoding used for boolean metrics, per spec §3.
#[must_use]
pub fn bool_to_float(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_to_float_encodes_canonically() {
        assert!((bool_to_float(true) - 1.0).abs() < f64::EPSILON);
        assert!((bool_to_float(false) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_result_always_carries_an_error() {
        let start = Utc::now();
        let result = StepResult::failed("s1", start, StepOutput::None, "boom");
        assert_eq!(result.status, Status::Failed);
        assert!(result.error.is_some());
    }

    #[test]
    fn success_result_never_carries_an_error() {
        let start = Utc::now();
        let result = StepResult::success("s1", start, StepOutput::None);
        assert!(result.error.is_none());
    }

    #[test]
    fn duration_matches_the_clock_difference() {
        let start = Utc::now();
        let mut result = StepResult::success("s1", start, StepOutput::None);
        result.end_time = start + chrono::Duration::milliseconds(42);
        assert_eq!(result.duration_ms(), 42);
    }
}
