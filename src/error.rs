//! Stable error taxonomy shared by every executor and the registry.
//!
//! The kinds mirror the observability tags a caller needs to distinguish a
//! "this configuration cannot be satisfied" failure from an "the action
//! itself failed" failure. Executors encode most failures inside a
//! [`crate::types::StepResult`] rather than returning `Err` here — this type
//! is reserved for the cases the control-flow executors and registry treat
//! as transport-level, per spec §7.

use thiserror::Error;

/// Stable, string-taggable error kind for telemetry grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Execution,
    ExecutorNotFound,
    Timeout,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config_error",
            Self::Execution => "execution_error",
            Self::ExecutorNotFound => "executor_not_found",
            Self::Timeout => "timeout_error",
        }
    }
}

/// Errors surfaced by executors, the registry, and the expression subsystem.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Step configuration is missing or malformed; not retriable.
    #[error("config error{}: {message}", step_context(step_id))]
    ConfigError {
        message: String,
        step_id: Option<String>,
    },

    /// The executor failed while performing its action.
    #[error("execution error{}: {message}", step_context(step_id))]
    ExecutionError {
        message: String,
        step_id: Option<String>,
    },

    /// The registry has no binding for the requested step type.
    #[error("executor not found for type: {0}")]
    ExecutorNotFound(String),

    /// The cancellation handle fired during adapter I/O.
    #[error("timeout error{}: {message}", step_context(step_id))]
    TimeoutError {
        message: String,
        step_id: Option<String>,
    },
}

fn step_context(step_id: &Option<String>) -> String {
    step_id
        .as_ref()
        .map(|id| format!(" (step {id})"))
        .unwrap_or_default()
}

impl RuntimeError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            step_id: None,
        }
    }

    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError {
            message: message.into(),
            step_id: None,
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError {
            message: message.into(),
            step_id: None,
        }
    }

    /// Attach a step ID to config/execution/timeout variants for context.
    #[must_use]
    pub fn with_step_id(self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match self {
            Self::ConfigError { message, .. } => Self::ConfigError { message, step_id: id },
            Self::ExecutionError { message, .. } => Self::ExecutionError { message, step_id: id },
            Self::TimeoutError { message, .. } => Self::TimeoutError { message, step_id: id },
            other @ Self::ExecutorNotFound(_) => other,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError { .. } => ErrorKind::Config,
            Self::ExecutionError { .. } => ErrorKind::Execution,
            Self::ExecutorNotFound(_) => ErrorKind::ExecutorNotFound,
            Self::TimeoutError { .. } => ErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_reports_its_kind() {
        let err = RuntimeError::config("missing field").with_step_id("step-1");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("step-1"));
    }

    #[test]
    fn executor_not_found_carries_the_type_name() {
        let err = RuntimeError::ExecutorNotFound("http".to_string());
        assert_eq!(err.kind(), ErrorKind::ExecutorNotFound);
        assert!(err.to_string().contains("http"));
    }
}
