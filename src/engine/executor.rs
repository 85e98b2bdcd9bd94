//! Step memoization: the core `run` protocol
//!
//! `StepExecutor` consults the store keyed by `(workflow_id, step_key)`
//! before running a step's closure, and persists its outcome after, so
//! that re-executing the same workflow code path skips completed work and
//! resumes a crashed one from the first unfinished step.

use std::future::Future;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::context::DurableContext;
use crate::error::DurableError;
use crate::metrics::Metrics;
use crate::persistence::{StepStatus, StepStore};
use crate::reliability::RetryPolicy;

/// Drives the step memoization protocol for a [`DurableContext`]
///
/// Stateless beyond the metrics handle it records against; one instance
/// can be shared across every step in a process.
#[derive(Clone)]
pub struct StepExecutor {
    metrics: &'static Metrics,
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StepExecutor {
    /// Build an executor recording against the process-wide metrics singleton
    pub fn new() -> Self {
        Self {
            metrics: crate::metrics::metrics(),
        }
    }

    /// Run `step_name` to completion exactly once per workflow, memoizing
    /// its result
    ///
    /// Protocol, in order: a cancellation gate, step-key derivation, a memo
    /// lookup that short-circuits on a cached COMPLETED record, a
    /// retry-eligibility check against any prior FAILED record, a RUNNING
    /// transition that reclaims zombie rows, the closure call itself, and
    /// finally a COMPLETED or FAILED write depending on the outcome.
    #[instrument(skip(self, ctx, work), fields(workflow_id = %ctx.workflow_id(), step_name))]
    pub async fn run<T, E, F, Fut>(
        &self,
        ctx: &DurableContext,
        step_name: &str,
        retry: Option<RetryPolicy>,
        work: F,
    ) -> Result<T, DurableError>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // 1. Cancellation gate
        ctx.check_cancelled().await?;

        // 2. Key derivation
        let seq = ctx.sequence().next();
        let step_key = format!("{step_name}#{seq}");
        let store = ctx.store();
        let workflow_id = ctx.workflow_id();

        // 3. Memo lookup
        let existing = store.find(workflow_id, &step_key).await?;

        // 4. Cache hit
        if let Some(record) = &existing {
            if record.status == StepStatus::Completed {
                let output = record.output.as_deref().unwrap_or("null");
                debug!(%step_key, "memo hit, skipping closure");
                let value: T = serde_json::from_str(output)
                    .map_err(|e| DurableError::step_failed(step_key.clone(), e))?;
                return Ok(value);
            }
        }

        // 5. Retry-eligible prior failure
        let mut attempt: u32 = 1;
        if let Some(record) = &existing {
            if record.status == StepStatus::Failed {
                if let Some(policy) = retry {
                    let now = Utc::now().timestamp_millis();
                    let eligible = record.next_retry_at.map(|at| at <= now).unwrap_or(true);
                    if eligible {
                        attempt = record.retry_count + 1;
                        if attempt > policy.max_attempts {
                            return Err(DurableError::RetryLimitExceeded {
                                step_key: step_key.clone(),
                                attempts: record.retry_count,
                            });
                        }
                    }
                }
            }
        }

        // 6. Transition to RUNNING
        store
            .mark_running(workflow_id, &step_key, step_name, seq)
            .await?;

        // 7. Execute closure
        match work().await {
            // 8. On success
            Ok(value) => {
                let serialized = serde_json::to_string(&value)
                    .map_err(|e| DurableError::step_failed(step_key.clone(), e))?;
                store
                    .mark_completed(workflow_id, &step_key, serialized)
                    .await?;
                self.metrics.record_step();
                info!(%step_key, "step completed");
                Ok(value)
            }
            // 9. On failure
            Err(e) => {
                self.metrics.record_failure();
                let cause = e.to_string();

                let exhausted = matches!(retry, Some(policy) if attempt >= policy.max_attempts);
                let retry_accounting = match retry {
                    Some(policy) if !exhausted => {
                        let next_retry_at =
                            Utc::now().timestamp_millis() + policy.backoff_for_attempt(attempt) as i64;
                        Some((attempt, next_retry_at))
                    }
                    _ => None,
                };

                store
                    .mark_failed(workflow_id, &step_key, &cause, retry_accounting)
                    .await?;

                warn!(%step_key, error = %cause, "step failed");

                if exhausted {
                    Err(DurableError::RetryLimitExceeded {
                        step_key,
                        attempts: attempt - 1,
                    })
                } else {
                    Err(DurableError::step_failed(step_key, cause))
                }
            }
        }
    }
}
