//! Per-workflow runtime state

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::DurableError;
use crate::persistence::StepStore;
use crate::sequence::SequenceManager;

type Compensation = Box<dyn FnOnce() -> Result<(), anyhow::Error> + Send>;

/// Per-workflow runtime state: identity, store handle, step sequencing,
/// and the in-memory compensation stack that backs saga rollback.
///
/// A single `DurableContext` is shared by every thread executing one
/// workflow run. Its [`SequenceManager`] is atomic and safe to call
/// concurrently; its compensation stack is not (see [`DurableContext::add_compensation`]).
pub struct DurableContext {
    workflow_id: String,
    store: Arc<dyn StepStore>,
    sequence: SequenceManager,
    compensations: std::sync::Mutex<Vec<Compensation>>,
}

impl DurableContext {
    /// Create a new context for the given workflow id over the given store
    pub fn new(workflow_id: impl Into<String>, store: Arc<dyn StepStore>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            store,
            sequence: SequenceManager::new(),
            compensations: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// The workflow id this context was constructed for
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn StepStore> {
        &self.store
    }

    /// The sequence manager minting step-key suffixes for this context
    pub fn sequence(&self) -> &SequenceManager {
        &self.sequence
    }

    /// Fail with [`DurableError::Cancelled`] if the workflow has been cancelled
    ///
    /// Store errors encountered during the check are swallowed: this is a
    /// best-effort liveness check, not a correctness gate. The step that
    /// follows is still persisted atomically regardless of whether this
    /// check could run.
    pub async fn check_cancelled(&self) -> Result<(), DurableError> {
        match self.store.is_cancelled(&self.workflow_id).await {
            Ok(true) => Err(DurableError::cancelled(self.workflow_id.clone())),
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(workflow_id = %self.workflow_id, error = %e, "cancellation check failed, proceeding");
                Ok(())
            }
        }
    }

    /// Push a compensation action onto the stack
    ///
    /// Must only be called from the orchestrator thread, or with external
    /// synchronization: the stack itself is not thread-safe.
    pub fn add_compensation<F>(&self, action: F)
    where
        F: FnOnce() -> Result<(), anyhow::Error> + Send + 'static,
    {
        self.compensations.lock().unwrap().push(Box::new(action));
    }

    /// Run every registered compensation, most recently added first
    ///
    /// Each action runs under an error shield: a failing compensation is
    /// logged and the remaining compensations still run. The stack is
    /// empty when this returns.
    pub fn execute_compensations(&self) {
        let actions: Vec<Compensation> = {
            let mut stack = self.compensations.lock().unwrap();
            std::mem::take(&mut *stack)
        };

        for action in actions.into_iter().rev() {
            if let Err(e) = action() {
                error!(workflow_id = %self.workflow_id, error = %e, "compensation failed, continuing");
            }
        }
    }

    /// Number of compensations currently registered
    pub fn compensation_count(&self) -> usize {
        self.compensations.lock().unwrap().len()
    }
}
