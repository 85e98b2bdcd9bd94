//! Step execution engine
//!
//! This module provides:
//! - [`StepExecutor`] — the memoization protocol all steps go through
//! - [`SagaStep`] — a compensation-tracking wrapper over `StepExecutor`

mod executor;
mod saga;

pub use executor::StepExecutor;
pub use saga::SagaStep;
