//! Crate-wide error taxonomy

use crate::persistence::StoreError;

/// Errors surfaced to callers of [`crate::engine::StepExecutor`]
///
/// Mirrors the three error taxa described for the engine: a cancelled
/// workflow, a step that failed (optionally exhausting its retry budget),
/// and storage I/O failures, which are folded into [`DurableError::Step`]
/// since the executor does not retry storage operations itself.
#[derive(Debug, thiserror::Error)]
pub enum DurableError {
    /// The workflow was cancelled before or during this step
    #[error("workflow cancelled: {workflow_id}")]
    Cancelled {
        /// The workflow that was cancelled
        workflow_id: String,
    },

    /// The step's user closure failed, or a store/serialization error
    /// occurred while recording its outcome
    #[error("step '{step_key}' failed: {message}")]
    Step {
        /// The step key that failed
        step_key: String,
        /// The underlying cause, captured as its rendered message
        message: String,
    },

    /// The step's retry budget was exhausted
    #[error("step '{step_key}' exceeded retry limit ({attempts} attempts)")]
    RetryLimitExceeded {
        /// The step key that ran out of attempts
        step_key: String,
        /// The number of attempts made
        attempts: u32,
    },

    /// A store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DurableError {
    /// Build a [`DurableError::Cancelled`] for the given workflow
    pub fn cancelled(workflow_id: impl Into<String>) -> Self {
        Self::Cancelled {
            workflow_id: workflow_id.into(),
        }
    }

    /// Wrap a closure failure as a [`DurableError::Step`], capturing its
    /// rendered message rather than the error value itself
    pub fn step_failed(step_key: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Step {
            step_key: step_key.into(),
            message: source.to_string(),
        }
    }

    /// True if this is a [`DurableError::Cancelled`]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, DurableError>;
