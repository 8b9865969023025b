// Batch pipeline: processing steps, stage tasks, and the scheduler that sequences them

pub mod processing;
pub mod scheduler;
pub mod tasks;

pub use scheduler::{RetryPolicy, RunReport, ScheduledTask, Scheduler, TaskState};
pub use tasks::{Stage, StageReport};
