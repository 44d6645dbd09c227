use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::syntax::{ParsedTree, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Parse,
    Validate,
}

impl JobKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validate => "validate",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an offloaded job is isolated from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMethod {
    /// A fresh worker process per job, killed on timeout.
    #[default]
    Process,
    /// A blocking thread in this process; a timed-out job keeps running
    /// until it finishes on its own.
    Thread,
}

/// Why a job ran in-process instead of on the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    OffloadDisabled,
    KindNotTargeted,
    JobTooLarge,
    Timeout,
    SpawnFailed,
    WorkerFailed,
}

impl FallbackReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OffloadDisabled => "offload_disabled",
            Self::KindNotTargeted => "kind_not_targeted",
            Self::JobTooLarge => "job_too_large",
            Self::Timeout => "timeout",
            Self::SpawnFailed => "spawn_failed",
            Self::WorkerFailed => "worker_failed",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one job. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Gated,
    Submitted,
    Running,
    Completed,
    TimedOut,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct OffloadJob {
    pub kind: JobKind,
    pub payload: String,
    pub submitted_at: Instant,
    /// Retries so far; 0 on the first try.
    pub attempt: u8,
    pub state: JobState,
}

impl OffloadJob {
    pub fn new(kind: JobKind, payload: String) -> Self {
        Self {
            kind,
            payload,
            submitted_at: Instant::now(),
            attempt: 0,
            state: JobState::Gated,
        }
    }

    pub(crate) fn transition(&mut self, next: JobState) {
        tracing::trace!(
            kind = %self.kind,
            attempt = self.attempt,
            from = ?self.state,
            to = ?next,
            "offload job transition"
        );
        self.state = next;
    }

    pub fn char_count(&self) -> usize {
        self.payload.chars().count()
    }
}

/// What a job produces, whether on the pool or in-process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobOutput {
    Tree(ParsedTree),
    Report(ValidationReport),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OffloadResult {
    /// The pool ran the job.
    Completed(JobOutput),
    /// The caller must do the work in-process.
    Fallback(FallbackReason),
}

impl OffloadResult {
    pub const fn accepted(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// How a failed attempt is handled next, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry { attempt: u8 },
    Fallback(FallbackReason),
}

/// A failed pool attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    TimedOut,
    SpawnFailed,
    WorkerFailed,
}

impl RecoveryAction {
    pub const fn for_failure(
        failure: AttemptFailure,
        attempt: u8,
        retry_on_timeout: bool,
        retry_limit: u8,
    ) -> Self {
        match failure {
            AttemptFailure::TimedOut if retry_on_timeout && attempt < retry_limit => {
                Self::Retry {
                    attempt: attempt + 1,
                }
            }
            AttemptFailure::TimedOut => Self::Fallback(FallbackReason::Timeout),
            AttemptFailure::SpawnFailed => Self::Fallback(FallbackReason::SpawnFailed),
            AttemptFailure::WorkerFailed => Self::Fallback(FallbackReason::WorkerFailed),
        }
    }
}
