//! # Durable Steps
//!
//! A step memoization library for durable workflow execution: run a step
//! once per workflow, persist its result, and replay that result on every
//! subsequent execution of the same workflow code path — including after a
//! crash and restart.
//!
//! ## Features
//!
//! - **Step memoization**: `(workflow_id, step_key)` keyed persistence so a
//!   restarted workflow resumes instead of re-running completed work
//! - **Automatic retries**: per-step [`RetryPolicy`] with pure exponential
//!   backoff
//! - **Saga compensation**: LIFO rollback actions for partially-completed
//!   workflows
//! - **Cooperative cancellation**: a durable, store-backed cancel flag
//!   checked at the start of every step
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        StepExecutor                          │
//! │   run(ctx, name, retry, work) -> memoized, retried result    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DurableContext                        │
//! │  workflow_id · SequenceManager · compensation stack          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          StepStore                            │
//! │        (InMemoryStepStore for tests, PostgresStepStore)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use durable_steps::{DurableContext, InMemoryStepStore, StepExecutor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStepStore::new());
//! let ctx = DurableContext::new("order-42", store);
//! let executor = StepExecutor::new();
//!
//! let total: u64 = executor
//!     .run(&ctx, "compute-total", None, || async {
//!         Ok::<_, anyhow::Error>(42)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod reliability;
pub mod sequence;

/// Prelude for common imports
pub mod prelude {
    pub use crate::context::DurableContext;
    pub use crate::engine::{SagaStep, StepExecutor};
    pub use crate::error::{DurableError, Result};
    pub use crate::metrics::{metrics, Metrics};
    pub use crate::persistence::{
        InMemoryStepStore, PostgresStepStore, StepRecord, StepStatus, StepStore, StoreError,
        WorkflowStatus,
    };
    pub use crate::reliability::RetryPolicy;
    pub use crate::sequence::SequenceManager;
}

// Re-export key types at crate root
pub use context::DurableContext;
pub use engine::{SagaStep, StepExecutor};
pub use error::{DurableError, Result};
pub use metrics::{metrics, Metrics};
pub use persistence::{
    InMemoryStepStore, PostgresStepStore, StepRecord, StepStatus, StepStore, StoreError,
    WorkflowStatus,
};
pub use reliability::RetryPolicy;
pub use sequence::SequenceManager;
