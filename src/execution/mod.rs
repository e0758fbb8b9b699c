//! Loop execution, the two containerization loops and the final commit

pub mod commit;
pub mod dockerfile;
pub mod engine;
pub mod events;
pub mod executor;
pub mod fixer;
pub mod interrupt;
pub mod kubernetes;
pub mod report;
pub mod scheduler;

pub use commit::{CommitPolicy, CommitReport};
pub use engine::ContainerizeEngine;
pub use events::{EventBus, EventHandler, ExecutionEvent};
pub use executor::{LoopExecutor, LoopOutcome};
pub use fixer::Fixer;
pub use interrupt::Interrupt;
pub use report::{FailedStage, LoopSummary, RunReport, RunStatus};
pub use scheduler::SchedulingStrategy;
