//! Loop executor - drives an ordered step list to convergence under a budget

use crate::core::{error::PipelineError, state::PipelineState, step::Step};
use crate::execution::events::{EventBus, ExecutionEvent};
use crate::execution::interrupt::Interrupt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How a loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopOutcome {
    /// The continuation predicate became false
    Converged,
    /// The iteration budget ran out while the predicate was still true
    Exhausted,
}

impl LoopOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, LoopOutcome::Converged)
    }
}

/// Runs a step list repeatedly until a predicate says stop or the budget is spent
///
/// The executor performs no I/O of its own. Steps run strictly in list order.
pub struct LoopExecutor {
    name: String,
    max_iterations: usize,
    interrupt: Interrupt,
    events: EventBus,
}

impl LoopExecutor {
    /// Create an executor with a budget of `max_iterations` (at least one)
    pub fn new(name: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            max_iterations: max_iterations.max(1),
            interrupt: Interrupt::new(),
            events: EventBus::default(),
        }
    }

    /// Share an interrupt; triggering it abandons the step in flight
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn check_interrupted(&self) -> Result<(), PipelineError> {
        if self.interrupt.is_triggered() {
            warn!("Loop {} interrupted", self.name);
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Run `steps` against `state` until `should_continue` returns false
    ///
    /// `iteration_count` is reset to zero on entry and ends at the index of the
    /// last iteration executed. A step error aborts the loop immediately.
    pub async fn run<F>(
        &self,
        steps: &[Box<dyn Step>],
        should_continue: F,
        state: &mut PipelineState,
    ) -> Result<LoopOutcome, PipelineError>
    where
        F: Fn(&PipelineState) -> bool,
    {
        state.iteration_count = 0;
        state.max_iterations = self.max_iterations;

        info!(
            "Starting loop {} (max {} iterations, run {})",
            self.name, self.max_iterations, state.run_id
        );
        self.events.emit(ExecutionEvent::LoopStarted {
            name: self.name.clone(),
            max_iterations: self.max_iterations,
        });

        loop {
            debug!(
                "Loop {} iteration {}/{}",
                self.name,
                state.iteration_count + 1,
                self.max_iterations
            );
            self.events.emit(ExecutionEvent::IterationStarted {
                name: self.name.clone(),
                iteration: state.iteration_count,
            });

            for step in steps {
                self.check_interrupted()?;
                debug!("Running step {}", step.name());
                tokio::select! {
                    result = step.run(state) => result?,
                    _ = self.interrupt.triggered() => {
                        warn!("Loop {} interrupted during step {}", self.name, step.name());
                        return Err(PipelineError::Cancelled);
                    }
                }
            }

            if !should_continue(state) {
                info!(
                    "Loop {} converged after {} iteration(s)",
                    self.name,
                    state.iteration_count + 1
                );
                return Ok(self.finish(LoopOutcome::Converged, state));
            }

            if state.iteration_count + 1 >= self.max_iterations {
                warn!(
                    "Loop {} exhausted its budget of {} iteration(s)",
                    self.name, self.max_iterations
                );
                return Ok(self.finish(LoopOutcome::Exhausted, state));
            }

            state.iteration_count += 1;
        }
    }

    fn finish(&self, outcome: LoopOutcome, state: &PipelineState) -> LoopOutcome {
        self.events.emit(ExecutionEvent::LoopFinished {
            name: self.name.clone(),
            outcome,
            iterations: state.iteration_count + 1,
        });
        outcome
    }
}
