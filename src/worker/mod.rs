pub mod scheduler;

pub use scheduler::{BatchOutcome, BatchScheduler, SchedulerHandle, SchedulerState, SchedulerStats};
