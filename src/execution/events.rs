//! Run events delivered to registered handlers

use crate::execution::commit::CommitReport;
use crate::execution::executor::LoopOutcome;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        repository: String,
    },
    LoopStarted {
        name: String,
        max_iterations: usize,
    },
    IterationStarted {
        name: String,
        iteration: usize,
    },
    BuildFailed {
        iteration: usize,
        output: String,
    },
    BuildSucceeded {
        iteration: usize,
    },
    ManifestApplied {
        name: String,
        iteration: usize,
    },
    ManifestFailed {
        name: String,
        iteration: usize,
        error: String,
    },
    FixApplied {
        artifact: String,
    },
    FixFailed {
        artifact: String,
        error: String,
    },
    LoopFinished {
        name: String,
        outcome: LoopOutcome,
        iterations: usize,
    },
    Committed {
        report: CommitReport,
    },
    RunFinished {
        run_id: Uuid,
        success: bool,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventBus {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
