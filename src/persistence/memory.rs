//! In-memory implementation of StepStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::store::*;

/// In-memory implementation of [`StepStore`]
///
/// Backs the fast, dependency-free half of the test suite. All operations
/// are serialized through a single [`parking_lot::RwLock`] per table,
/// giving the same "single connection-level mutex" semantics the store
/// contract requires without needing a database.
///
/// # Example
///
/// ```
/// use durable_steps::InMemoryStepStore;
///
/// let store = InMemoryStepStore::new();
/// ```
#[derive(Default)]
pub struct InMemoryStepStore {
    steps: RwLock<HashMap<(String, String), StepRecord>>,
    workflows: RwLock<HashMap<String, WorkflowStatus>>,
}

impl InMemoryStepStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct step records currently stored
    pub fn step_count(&self) -> usize {
        self.steps.read().len()
    }

    /// Remove all stored state. Only used in tests.
    pub fn clear(&self) {
        self.steps.write().clear();
        self.workflows.write().clear();
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn find(
        &self,
        workflow_id: &str,
        step_key: &str,
    ) -> Result<Option<StepRecord>, StoreError> {
        let key = (workflow_id.to_string(), step_key.to_string());
        Ok(self.steps.read().get(&key).cloned())
    }

    async fn mark_running(
        &self,
        workflow_id: &str,
        step_key: &str,
        step_name: &str,
        sequence_id: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let key = (workflow_id.to_string(), step_key.to_string());
        let created_at = self
            .steps
            .read()
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or(now);

        self.steps.write().insert(
            key,
            StepRecord {
                workflow_id: workflow_id.to_string(),
                step_key: step_key.to_string(),
                step_name: step_name.to_string(),
                sequence_id,
                status: StepStatus::Running,
                output: None,
                error: None,
                retry_count: 0,
                next_retry_at: None,
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn mark_completed(
        &self,
        workflow_id: &str,
        step_key: &str,
        output: String,
    ) -> Result<(), StoreError> {
        let key = (workflow_id.to_string(), step_key.to_string());
        let mut steps = self.steps.write();
        let Some(record) = steps.get_mut(&key) else {
            // No-op semantics if the row is absent: the caller's bug, not
            // a storage error worth surfacing.
            return Ok(());
        };
        record.status = StepStatus::Completed;
        record.output = Some(output);
        record.error = None;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(
        &self,
        workflow_id: &str,
        step_key: &str,
        error: &str,
        retry: Option<(u32, i64)>,
    ) -> Result<(), StoreError> {
        let key = (workflow_id.to_string(), step_key.to_string());
        let mut steps = self.steps.write();
        let Some(record) = steps.get_mut(&key) else {
            return Ok(());
        };
        record.status = StepStatus::Failed;
        record.error = Some(error.to_string());
        if let Some((retry_count, next_retry_at)) = retry {
            record.retry_count = retry_count;
            record.next_retry_at = Some(next_retry_at);
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_workflow(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
    ) -> Result<(), StoreError> {
        self.workflows
            .write()
            .insert(workflow_id.to_string(), status);
        Ok(())
    }

    async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowStatus>, StoreError> {
        Ok(self.workflows.read().get(workflow_id).copied())
    }

    async fn get_completed_steps(&self, workflow_id: &str) -> Result<Vec<StepRecord>, StoreError> {
        let mut records: Vec<StepRecord> = self
            .steps
            .read()
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.sequence_id);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_running_then_completed_round_trips() {
        let store = InMemoryStepStore::new();
        store.mark_running("w1", "s#1", "s", 1).await.unwrap();

        let record = store.find("w1", "s#1").await.unwrap().unwrap();
        assert_eq!(record.status, StepStatus::Running);

        store
            .mark_completed("w1", "s#1", "\"A\"".to_string())
            .await
            .unwrap();

        let record = store.find("w1", "s#1").await.unwrap().unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.output.as_deref(), Some("\"A\""));
    }

    #[tokio::test]
    async fn mark_running_overwrites_zombie_row() {
        let store = InMemoryStepStore::new();
        store.mark_running("w1", "s#1", "s", 1).await.unwrap();
        store
            .mark_failed("w1", "s#1", "boom", Some((1, 100)))
            .await
            .unwrap();

        // Simulated restart: markRunning again reclaims the row
        store.mark_running("w1", "s#1", "s", 1).await.unwrap();
        let record = store.find("w1", "s#1").await.unwrap().unwrap();
        assert_eq!(record.status, StepStatus::Running);
        assert_eq!(record.retry_count, 0);
        assert!(record.next_retry_at.is_none());
    }

    #[tokio::test]
    async fn distinct_step_keys_are_independent() {
        let store = InMemoryStepStore::new();
        store.mark_running("w1", "a#1", "a", 1).await.unwrap();
        store.mark_running("w1", "b#2", "b", 2).await.unwrap();
        store
            .mark_completed("w1", "a#1", "\"ra\"".into())
            .await
            .unwrap();
        store
            .mark_completed("w1", "b#2", "\"rb\"".into())
            .await
            .unwrap();

        let steps = store.get_completed_steps("w1").await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_key, "a#1");
        assert_eq!(steps[1].step_key, "b#2");
    }

    #[tokio::test]
    async fn cancel_workflow_is_observable() {
        let store = InMemoryStepStore::new();
        assert!(!store.is_cancelled("w1").await.unwrap());
        store.cancel_workflow("w1").await.unwrap();
        assert!(store.is_cancelled("w1").await.unwrap());
        assert_eq!(
            store.get_workflow_status("w1").await.unwrap(),
            Some(WorkflowStatus::Cancelled)
        );
    }
}
