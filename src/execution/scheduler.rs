//! Scheduling of manifest apply attempts within one iteration

/// Strategy for running independent manifest applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Apply manifests one at a time, in name order
    #[default]
    Sequential,

    /// Apply all pending manifests concurrently
    Parallel,

    /// Limited parallelism (max N concurrent applies)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Number of applies allowed in flight for a batch of `pending` manifests
    pub fn concurrency(&self, pending: usize) -> usize {
        let limit = match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => pending,
            SchedulingStrategy::LimitedParallel(max) => (*max).min(pending),
        };
        limit.max(1)
    }
}
