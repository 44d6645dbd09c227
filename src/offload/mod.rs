//! Isolated execution of parse/validate jobs.
//!
//! Jobs run either in short-lived `tlp worker` processes or on blocking
//! threads, bounded by a worker semaphore. A job that is too large, times
//! out past its retries, or whose worker breaks falls back to in-process
//! work, so offloading can slow a session down but never fail it.

mod executor;
mod job;
mod worker;

pub use executor::OffloadExecutor;
pub use job::{
    AttemptFailure, FallbackReason, JobKind, JobOutput, JobState, OffloadJob, OffloadResult,
    RecoveryAction, StartMethod,
};
pub use worker::{WorkerCommand, WorkerRequest, WorkerResponse, execute, run_worker};
