//! PostgreSQL implementation of StepStore
//!
//! Persists step and workflow rows to the `steps`/`workflows` tables over a
//! connection pool. Expects a schema of the following shape to already
//! exist (migrations are left to the caller, matching the teacher's
//! caller-supplied-pool convention):
//!
//! ```sql
//! CREATE TABLE steps (
//!     workflow_id    TEXT NOT NULL,
//!     step_key       TEXT NOT NULL,
//!     step_name      TEXT NOT NULL,
//!     sequence_id    BIGINT NOT NULL,
//!     status         TEXT NOT NULL,
//!     output         TEXT,
//!     error          TEXT,
//!     retry_count    INTEGER NOT NULL DEFAULT 0,
//!     next_retry_at  BIGINT,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (workflow_id, step_key)
//! );
//!
//! CREATE TABLE workflows (
//!     workflow_id TEXT PRIMARY KEY,
//!     status      TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};

use super::store::*;

/// PostgreSQL implementation of [`StepStore`]
///
/// Uses a connection pool supplied by the caller; the library never opens
/// a connection on its own (see the configuration notes on this point).
///
/// # Example
///
/// ```ignore
/// use durable_steps::PostgresStepStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/mydb").await?;
/// let store = PostgresStepStore::new(pool);
/// ```
#[derive(Clone)]
pub struct PostgresStepStore {
    pool: PgPool,
}

impl PostgresStepStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_step_status(raw: &str) -> Result<StepStatus, StoreError> {
    match raw {
        "RUNNING" => Ok(StepStatus::Running),
        "COMPLETED" => Ok(StepStatus::Completed),
        "FAILED" => Ok(StepStatus::Failed),
        other => Err(StoreError::Database(format!(
            "unrecognized step status: {other}"
        ))),
    }
}

fn parse_workflow_status(raw: &str) -> Result<WorkflowStatus, StoreError> {
    match raw {
        "RUNNING" => Ok(WorkflowStatus::Running),
        "CANCELLED" => Ok(WorkflowStatus::Cancelled),
        "COMPLETED" => Ok(WorkflowStatus::Completed),
        other => Err(StoreError::Database(format!(
            "unrecognized workflow status: {other}"
        ))),
    }
}

#[async_trait]
impl StepStore for PostgresStepStore {
    #[instrument(skip(self))]
    async fn find(
        &self,
        workflow_id: &str,
        step_key: &str,
    ) -> Result<Option<StepRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT workflow_id, step_key, step_name, sequence_id, status,
                   output, error, retry_count, next_retry_at, created_at, updated_at
            FROM steps
            WHERE workflow_id = $1 AND step_key = $2
            "#,
        )
        .bind(workflow_id)
        .bind(step_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to look up step: {}", e);
            StoreError::Database(e.to_string())
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("status");
        Ok(Some(StepRecord {
            workflow_id: row.get("workflow_id"),
            step_key: row.get("step_key"),
            step_name: row.get("step_name"),
            sequence_id: row.get::<i64, _>("sequence_id") as u64,
            status: parse_step_status(&status)?,
            output: row.get("output"),
            error: row.get("error"),
            retry_count: row.get::<i32, _>("retry_count") as u32,
            next_retry_at: row.get("next_retry_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    #[instrument(skip(self))]
    async fn mark_running(
        &self,
        workflow_id: &str,
        step_key: &str,
        step_name: &str,
        sequence_id: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO steps (workflow_id, step_key, step_name, sequence_id,
                                status, output, error, retry_count, next_retry_at,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'RUNNING', NULL, NULL, 0, NULL, $5, $5)
            ON CONFLICT (workflow_id, step_key) DO UPDATE SET
                status = 'RUNNING',
                output = NULL,
                error = NULL,
                retry_count = 0,
                next_retry_at = NULL,
                updated_at = $5
            "#,
        )
        .bind(workflow_id)
        .bind(step_key)
        .bind(step_name)
        .bind(sequence_id as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to mark step running: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!(%workflow_id, %step_key, "step marked running");
        Ok(())
    }

    #[instrument(skip(self, output))]
    async fn mark_completed(
        &self,
        workflow_id: &str,
        step_key: &str,
        output: String,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE steps
            SET status = 'COMPLETED', output = $3, error = NULL, updated_at = $4
            WHERE workflow_id = $1 AND step_key = $2
            "#,
        )
        .bind(workflow_id)
        .bind(step_key)
        .bind(output)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to mark step completed: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!(%workflow_id, %step_key, "step marked completed");
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_failed(
        &self,
        workflow_id: &str,
        step_key: &str,
        error: &str,
        retry: Option<(u32, i64)>,
    ) -> Result<(), StoreError> {
        let (retry_count, next_retry_at) = match retry {
            Some((count, at)) => (count as i32, Some(at)),
            None => (0, None),
        };

        sqlx::query(
            r#"
            UPDATE steps
            SET status = 'FAILED', error = $3, retry_count = $4, next_retry_at = $5, updated_at = $6
            WHERE workflow_id = $1 AND step_key = $2
            "#,
        )
        .bind(workflow_id)
        .bind(step_key)
        .bind(error)
        .bind(retry_count)
        .bind(next_retry_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("failed to mark step failed: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn upsert_workflow(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO workflows (workflow_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (workflow_id) DO UPDATE SET
                status = $2,
                updated_at = $3
            "#,
        )
        .bind(workflow_id)
        .bind(status.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to upsert workflow: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!(%workflow_id, %status, "workflow status updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowStatus>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT status FROM workflows WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to get workflow status: {}", e);
            StoreError::Database(e.to_string())
        })?;

        row.map(|r| parse_workflow_status(&r.get::<String, _>("status")))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn get_completed_steps(&self, workflow_id: &str) -> Result<Vec<StepRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT workflow_id, step_key, step_name, sequence_id, status,
                   output, error, retry_count, next_retry_at, created_at, updated_at
            FROM steps
            WHERE workflow_id = $1
            ORDER BY sequence_id ASC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to list steps: {}", e);
            StoreError::Database(e.to_string())
        })?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(StepRecord {
                    workflow_id: row.get("workflow_id"),
                    step_key: row.get("step_key"),
                    step_name: row.get("step_name"),
                    sequence_id: row.get::<i64, _>("sequence_id") as u64,
                    status: parse_step_status(&status)?,
                    output: row.get("output"),
                    error: row.get("error"),
                    retry_count: row.get::<i32, _>("retry_count") as u32,
                    next_retry_at: row.get("next_retry_at"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_step_statuses() {
        assert_eq!(parse_step_status("RUNNING").unwrap(), StepStatus::Running);
        assert_eq!(
            parse_step_status("COMPLETED").unwrap(),
            StepStatus::Completed
        );
        assert_eq!(parse_step_status("FAILED").unwrap(), StepStatus::Failed);
        assert!(parse_step_status("BOGUS").is_err());
    }

    #[test]
    fn parses_known_workflow_statuses() {
        assert_eq!(
            parse_workflow_status("RUNNING").unwrap(),
            WorkflowStatus::Running
        );
        assert_eq!(
            parse_workflow_status("CANCELLED").unwrap(),
            WorkflowStatus::Cancelled
        );
        assert!(parse_workflow_status("BOGUS").is_err());
    }
}
