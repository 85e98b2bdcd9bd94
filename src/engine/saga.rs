//! The saga compensation driver
//!
//! `SagaStep` wraps [`StepExecutor::run`] and threads compensation
//! registration through a [`DurableContext`]: on success it pushes the
//! caller's rollback action onto the context's compensation stack; on
//! failure it runs every previously-registered compensation, LIFO, before
//! re-propagating the original error.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::context::DurableContext;
use crate::error::DurableError;
use crate::metrics::Metrics;
use crate::reliability::RetryPolicy;

use super::executor::StepExecutor;

/// Drives saga-style steps: memoized execution plus LIFO compensation
#[derive(Clone)]
pub struct SagaStep {
    executor: StepExecutor,
    metrics: &'static Metrics,
}

impl Default for SagaStep {
    fn default() -> Self {
        Self::new()
    }
}

impl SagaStep {
    /// Build a saga driver over a fresh [`StepExecutor`]
    pub fn new() -> Self {
        Self {
            executor: StepExecutor::new(),
            metrics: crate::metrics::metrics(),
        }
    }

    /// Run `step_name`, registering `compensation` for rollback on success
    ///
    /// Compensations are not themselves persisted as steps: they are
    /// best-effort, in-memory rollback actions. A crash and resume does
    /// not replay them; the workflow simply resumes forward. Callers that
    /// need durable rollback should make the compensation itself a step.
    #[instrument(skip(self, ctx, work, compensation), fields(workflow_id = %ctx.workflow_id(), step_name))]
    pub async fn run<T, E, F, Fut, C>(
        &self,
        ctx: &DurableContext,
        step_name: &str,
        retry: Option<RetryPolicy>,
        work: F,
        compensation: C,
    ) -> Result<T, DurableError>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce() -> Result<(), anyhow::Error> + Send + 'static,
    {
        match self.executor.run(ctx, step_name, retry, work).await {
            Ok(value) => {
                ctx.add_compensation(compensation);
                Ok(value)
            }
            Err(e) => {
                let pending = ctx.compensation_count();
                if pending > 0 {
                    self.metrics.record_compensation();
                    ctx.execute_compensations();
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStepStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ctx(workflow_id: &str) -> DurableContext {
        DurableContext::new(workflow_id, Arc::new(InMemoryStepStore::new()))
    }

    #[tokio::test]
    async fn success_registers_compensation_without_running_it() {
        let ctx = ctx("w1");
        let saga = SagaStep::new();
        let rolled_back = Arc::new(AtomicU32::new(0));

        let value: String = saga
            .run(
                &ctx,
                "book-flight",
                None,
                || async { Ok::<_, anyhow::Error>("ticket-1".to_string()) },
                {
                    let rolled_back = rolled_back.clone();
                    move || {
                        rolled_back.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(value, "ticket-1");
        assert_eq!(ctx.compensation_count(), 1);
        assert_eq!(rolled_back.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_after_prior_success_rolls_back_lifo() {
        let ctx = ctx("w1");
        let saga = SagaStep::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let _: String = saga
            .run(
                &ctx,
                "provision-laptop",
                None,
                || async { Ok::<_, anyhow::Error>("laptop".to_string()) },
                {
                    let order = order.clone();
                    move || {
                        order.lock().unwrap().push("deprovision-laptop");
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        let _: String = saga
            .run(
                &ctx,
                "grant-access",
                None,
                || async { Ok::<_, anyhow::Error>("access".to_string()) },
                {
                    let order = order.clone();
                    move || {
                        order.lock().unwrap().push("revoke-access");
                        Ok(())
                    }
                },
            )
            .await
            .unwrap();

        let result: Result<String, DurableError> = saga
            .run(
                &ctx,
                "charge-card",
                None,
                || async { Err::<String, _>(anyhow::anyhow!("card declined")) },
                || Ok(()),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(ctx.compensation_count(), 0);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["revoke-access", "deprovision-laptop"]
        );
    }
}
