//! Scheduled jobs.
//!
//! - `job`: the job descriptor, its identity and one firing
//! - `scheduler`: registry of active jobs and their cron triggers

pub mod job;
pub mod scheduler;

pub use job::{Job, JobKind, ONE_SHOT_EXPRESSION, parse_schedule};
pub use scheduler::Scheduler;
