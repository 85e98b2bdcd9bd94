//! StepStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No step record exists for this `(workflow_id, step_key)`
    #[error("step not found: {workflow_id}/{step_key}")]
    StepNotFound {
        /// The workflow the step belongs to
        workflow_id: String,
        /// The step key that was not found
        step_key: String,
    },

    /// No workflow record exists for this id
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Status of a step attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// The step's closure is executing (or was, and the process died)
    Running,
    /// The step completed successfully; `output` is present
    Completed,
    /// The step's closure raised; `error` is present
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// The workflow is actively running
    Running,
    /// The workflow was cancelled and rejects new step executions
    Cancelled,
    /// The workflow finished
    Completed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// One row per step attempt
///
/// Primary key is `(workflow_id, step_key)`; uniqueness of that pair is the
/// central invariant enabling memoization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Opaque caller-chosen workflow identifier
    pub workflow_id: String,
    /// `"<step_name>#<sequence_id>"`, stable across restarts
    pub step_key: String,
    /// User-provided label
    pub step_name: String,
    /// Assigned by the context's `SequenceManager`
    pub sequence_id: u64,
    /// Current status of this attempt
    pub status: StepStatus,
    /// Serialized result, present iff `status == Completed`
    pub output: Option<String>,
    /// Textual error message, present iff `status == Failed`
    pub error: Option<String>,
    /// Number of failed attempts observed so far
    pub retry_count: u32,
    /// Unix milliseconds after which another attempt is eligible
    pub next_retry_at: Option<i64>,
    /// When this record was first created
    pub created_at: DateTime<Utc>,
    /// When this record was last mutated
    pub updated_at: DateTime<Utc>,
}

/// Durable persistence of step records and workflow status
///
/// A narrow interface: find by primary key, three state-transition
/// mutations, and workflow-level bookkeeping. Implementations must commit
/// each mutating operation before returning, and must serialize concurrent
/// operations against each other (a single mutex over the backing
/// connection is sufficient given the expected per-workflow concurrency).
#[async_trait]
pub trait StepStore: Send + Sync + 'static {
    /// Look up a step record by its primary key
    async fn find(
        &self,
        workflow_id: &str,
        step_key: &str,
    ) -> Result<Option<StepRecord>, StoreError>;

    /// Transition a step to RUNNING
    ///
    /// Inserts a fresh record with `retry_count = 0`, or overwrites any
    /// existing record with this identity, resetting status/output/
    /// error/retry to their initial values. This reclaims zombie RUNNING
    /// rows from a prior crashed run without a separate cleanup path.
    async fn mark_running(
        &self,
        workflow_id: &str,
        step_key: &str,
        step_name: &str,
        sequence_id: u64,
    ) -> Result<(), StoreError>;

    /// Transition a step to COMPLETED with its serialized output
    async fn mark_completed(
        &self,
        workflow_id: &str,
        step_key: &str,
        output: String,
    ) -> Result<(), StoreError>;

    /// Transition a step to FAILED
    ///
    /// `retry` carries `(retry_count, next_retry_at)` when a retry policy
    /// governs this step; `None` means retry persistence is disabled and
    /// only the terminal FAILED transition is recorded.
    async fn mark_failed(
        &self,
        workflow_id: &str,
        step_key: &str,
        error: &str,
        retry: Option<(u32, i64)>,
    ) -> Result<(), StoreError>;

    /// Insert or replace the workflow row with the given status
    async fn upsert_workflow(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
    ) -> Result<(), StoreError>;

    /// Get the current status of a workflow, if it has one
    async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowStatus>, StoreError>;

    /// Convenience wrapper over [`StepStore::get_workflow_status`]
    async fn is_cancelled(&self, workflow_id: &str) -> Result<bool, StoreError> {
        Ok(matches!(
            self.get_workflow_status(workflow_id).await?,
            Some(WorkflowStatus::Cancelled)
        ))
    }

    /// Shorthand for `upsert_workflow(id, Cancelled)`
    async fn cancel_workflow(&self, workflow_id: &str) -> Result<(), StoreError> {
        self.upsert_workflow(workflow_id, WorkflowStatus::Cancelled)
            .await
    }

    /// All step records for a workflow, ordered by `sequence_id` ascending
    ///
    /// Used by external drivers for resume diagnostics; not consulted by
    /// the executor itself.
    async fn get_completed_steps(&self, workflow_id: &str) -> Result<Vec<StepRecord>, StoreError>;

    /// Release the backing handle
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
