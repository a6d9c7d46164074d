//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// First failure recorded by a sequential run.
///
/// `index` is the 0-based position of the failing step in the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError<E> {
    #[error("step {index} failed: {error}")]
    Step { index: usize, error: E },

    /// The step failed without an error payload
    #[error("step {index} failed without an error")]
    Unspecified { index: usize },

    #[error("step {index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

impl<E> RunError<E> {
    /// Position of the failing step
    pub fn index(&self) -> usize {
        match self {
            RunError::Step { index, .. }
            | RunError::Unspecified { index }
            | RunError::Panicked { index, .. } => *index,
        }
    }

    /// The step's own error, if it carried one
    pub fn error(&self) -> Option<&E> {
        match self {
            RunError::Step { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<E> {
        match self {
            RunError::Step { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Errors raised while loading and running plans
#[derive(Error, Debug)]
pub enum StepwiseError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Plan validation (STEP-001 to STEP-004)
    // ─────────────────────────────────────────────────────────────

    #[error("STEP-001: Invalid schema: expected '{expected}', got '{found}'")]
    InvalidSchema { expected: String, found: String },

    #[error("STEP-002: Step #{index} has an empty id")]
    EmptyStepId { index: usize },

    #[error("STEP-003: Duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    #[error("STEP-004: Step '{step_id}' has an empty exec command")]
    EmptyCommand { step_id: String },

    // ─────────────────────────────────────────────────────────────
    // Execution (STEP-010 to STEP-020)
    // ─────────────────────────────────────────────────────────────

    #[error("STEP-010: Step '{step_id}' exec failed: {reason}")]
    ExecFailed { step_id: String, reason: String },

    #[error("STEP-011: Step '{step_id}' timed out after {timeout_ms}ms")]
    ExecTimeout { step_id: String, timeout_ms: u64 },

    #[error("STEP-020: Step '{step_id}' failed: {reason}")]
    StepFailed { step_id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration (STEP-030)
    // ─────────────────────────────────────────────────────────────

    #[error("STEP-030: Config error: {reason}")]
    Config { reason: String },
}

impl StepwiseError {
    /// Id of the plan step this error belongs to, if any
    pub fn step_id(&self) -> Option<&str> {
        match self {
            StepwiseError::DuplicateStepId { step_id }
            | StepwiseError::EmptyCommand { step_id }
            | StepwiseError::ExecFailed { step_id, .. }
            | StepwiseError::ExecTimeout { step_id, .. }
            | StepwiseError::StepFailed { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

impl FixSuggestion for StepwiseError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            StepwiseError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            StepwiseError::Json(_) => None,
            StepwiseError::Io(_) => Some("Check file path and permissions"),
            StepwiseError::InvalidSchema { .. } => {
                Some("Start the plan with: schema: stepwise/plan@0.1")
            }
            StepwiseError::EmptyStepId { .. } => Some("Give every step a non-empty id"),
            StepwiseError::DuplicateStepId { .. } => Some("Use unique ids for every step"),
            StepwiseError::EmptyCommand { .. } => Some("Set exec.command to a shell command"),
            StepwiseError::ExecFailed { .. } => {
                Some("Run the command by hand, or set contain: true to keep going on failure")
            }
            StepwiseError::ExecTimeout { .. } => {
                Some("Raise the timeout with --timeout or STEPWISE_EXEC_TIMEOUT_SECS")
            }
            StepwiseError::StepFailed { .. } => None,
            StepwiseError::Config { .. } => {
                Some("Check STEPWISE_SHELL and STEPWISE_EXEC_TIMEOUT_SECS in the environment")
            }
        }
    }
}

pub type Result<T, E = StepwiseError> = std::result::Result<T, E>;
