use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::job::{
    AttemptFailure, FallbackReason, JobKind, JobOutput, JobState, OffloadJob, OffloadResult,
    RecoveryAction, StartMethod,
};
use super::worker::{self, WorkerCommand, WorkerRequest, WorkerResponse};
use crate::cache::SyntaxTreeCache;
use crate::config::OffloadConfig;
use crate::error::ConfigError;
use crate::events::{EventBus, PipelineEvent};
use crate::syntax::{ParsedTree, SourceParser, ValidationReport};

/// Runs parse/validate jobs on a bounded pool of isolated workers.
///
/// Every failure mode (size cap, timeout, crashed worker) ends in
/// [`OffloadResult::Fallback`], never in an error: callers always have an
/// in-process way to finish the work.
pub struct OffloadExecutor {
    config: OffloadConfig,
    parser: Arc<dyn SourceParser>,
    cache: Option<Arc<SyntaxTreeCache>>,
    worker: WorkerCommand,
    permits: Arc<Semaphore>,
    events: EventBus,
}

impl OffloadExecutor {
    pub fn new(
        config: OffloadConfig,
        parser: Arc<dyn SourceParser>,
        events: EventBus,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.process_pool_max_workers));

        Ok(Self {
            config,
            parser,
            cache: None,
            worker: WorkerCommand::current_exe(),
            permits,
            events,
        })
    }

    /// Parse jobs check this cache before reaching the pool and store
    /// their results in it.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SyntaxTreeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_worker_command(mut self, worker: WorkerCommand) -> Self {
        self.worker = worker;
        self
    }

    pub const fn config(&self) -> &OffloadConfig {
        &self.config
    }

    pub fn can_offload(&self, kind: JobKind) -> bool {
        self.config.process_pool_enabled && self.config.process_pool_target.contains(&kind)
    }

    /// Runs one job on the pool.
    ///
    /// Disabled offload and untargeted kinds return a fallback without any
    /// pool event; everything else that falls back emits `PoolFallback`.
    pub async fn submit(&self, kind: JobKind, payload: &str) -> OffloadResult {
        if !self.config.process_pool_enabled {
            return OffloadResult::Fallback(FallbackReason::OffloadDisabled);
        }
        if !self.config.process_pool_target.contains(&kind) {
            return OffloadResult::Fallback(FallbackReason::KindNotTargeted);
        }

        let mut job = OffloadJob::new(kind, payload.to_string());

        if job.char_count() > self.config.job_max_chars {
            tracing::debug!(
                kind = %kind,
                chars = job.char_count(),
                limit = self.config.job_max_chars,
                "offload job too large"
            );
            return self.fall_back(&mut job, FallbackReason::JobTooLarge);
        }

        loop {
            job.transition(JobState::Submitted);
            self.events.emit(&PipelineEvent::PoolTaskSubmitted {
                kind,
                attempt: job.attempt,
            });

            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                return self.fall_back(&mut job, FallbackReason::SpawnFailed);
            };

            job.transition(JobState::Running);
            let started = Instant::now();

            let failure = match self.run_attempt(&job, permit).await {
                Ok(output) => {
                    job.transition(JobState::Completed);
                    self.events.emit(&PipelineEvent::PoolTaskCompleted {
                        kind,
                        attempt: job.attempt,
                        duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                    });
                    tracing::debug!(
                        kind = %kind,
                        attempt = job.attempt,
                        total_ms = job.submitted_at.elapsed().as_millis() as u64,
                        "offload job completed"
                    );
                    return OffloadResult::Completed(output);
                }
                Err(failure) => failure,
            };

            if failure == AttemptFailure::TimedOut {
                job.transition(JobState::TimedOut);
                tracing::warn!(
                    kind = %kind,
                    attempt = job.attempt,
                    timeout_ms = self.config.task_timeout_ms,
                    "offload job timed out"
                );
                self.events.emit(&PipelineEvent::PoolTimeout {
                    kind,
                    attempt: job.attempt,
                    timeout_ms: self.config.task_timeout_ms,
                });
            }

            match RecoveryAction::for_failure(
                failure,
                job.attempt,
                self.config.retry_on_timeout,
                self.config.retry_limit,
            ) {
                RecoveryAction::Retry { attempt } => job.attempt = attempt,
                RecoveryAction::Fallback(reason) => return self.fall_back(&mut job, reason),
            }
        }
    }

    /// Parses `source`, through the cache and the pool when available.
    pub async fn parse(&self, source: &str) -> Arc<ParsedTree> {
        if let Some(tree) = self.cache.as_ref().and_then(|cache| cache.get(source)) {
            return tree;
        }

        if self.can_offload(JobKind::Parse)
            && let OffloadResult::Completed(JobOutput::Tree(tree)) =
                self.submit(JobKind::Parse, source).await
        {
            return match &self.cache {
                Some(cache) => cache.insert(source, tree),
                None => Arc::new(tree),
            };
        }

        // Already counted as a miss above.
        let tree = self.parser.parse(source);
        match &self.cache {
            Some(cache) => cache.insert(source, tree),
            None => Arc::new(tree),
        }
    }

    /// Validates `code` on the pool when targeted, in-process otherwise.
    pub async fn validate(&self, code: &str) -> ValidationReport {
        if self.can_offload(JobKind::Validate)
            && let OffloadResult::Completed(JobOutput::Report(report)) =
                self.submit(JobKind::Validate, code).await
        {
            return report;
        }

        self.parser.validate(code)
    }

    fn fall_back(&self, job: &mut OffloadJob, reason: FallbackReason) -> OffloadResult {
        job.transition(JobState::Fallback);
        if reason != FallbackReason::JobTooLarge {
            tracing::warn!(kind = %job.kind, %reason, "offload job falling back to in-process");
        }
        self.events.emit(&PipelineEvent::PoolFallback {
            kind: job.kind,
            reason,
        });
        OffloadResult::Fallback(reason)
    }

    async fn run_attempt(
        &self,
        job: &OffloadJob,
        permit: OwnedSemaphorePermit,
    ) -> Result<JobOutput, AttemptFailure> {
        let timeout = Duration::from_millis(self.config.task_timeout_ms);

        let output = match self.config.start_method {
            StartMethod::Process => {
                let result = tokio::time::timeout(timeout, self.run_in_process(job)).await;
                drop(permit);
                result.map_err(|_| AttemptFailure::TimedOut)??
            }
            StartMethod::Thread => {
                let parser = Arc::clone(&self.parser);
                let kind = job.kind;
                let payload = job.payload.clone();
                // The permit travels with the thread: a timed-out job still
                // occupies its slot until it actually finishes.
                let handle = tokio::task::spawn_blocking(move || {
                    let output = worker::execute(parser.as_ref(), kind, &payload);
                    drop(permit);
                    output
                });

                match tokio::time::timeout(timeout, handle).await {
                    Err(_) => return Err(AttemptFailure::TimedOut),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "offload thread failed");
                        return Err(AttemptFailure::WorkerFailed);
                    }
                    Ok(Ok(output)) => output,
                }
            }
        };

        match (job.kind, &output) {
            (JobKind::Parse, JobOutput::Tree(_)) | (JobKind::Validate, JobOutput::Report(_)) => {
                Ok(output)
            }
            _ => {
                tracing::warn!(kind = %job.kind, "worker returned output of the wrong kind");
                Err(AttemptFailure::WorkerFailed)
            }
        }
    }

    /// One job in a fresh worker process. The child is killed if this
    /// future is dropped, which is how timeouts stop it.
    async fn run_in_process(&self, job: &OffloadJob) -> Result<JobOutput, AttemptFailure> {
        let request = serde_json::to_vec(&WorkerRequest {
            kind: job.kind,
            payload: job.payload.clone(),
        })
        .map_err(|_| AttemptFailure::SpawnFailed)?;

        let mut child = Command::new(&self.worker.program)
            .args(&self.worker.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    program = %self.worker.program.display(),
                    "failed to spawn offload worker"
                );
                AttemptFailure::SpawnFailed
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await.map_err(|e| {
                tracing::warn!(error = %e, "failed to send request to offload worker");
                AttemptFailure::WorkerFailed
            })?;
            // Dropping stdin closes the pipe so the worker sees EOF.
        }

        let output = child.wait_with_output().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to wait on offload worker");
            AttemptFailure::WorkerFailed
        })?;

        if !output.status.success() {
            tracing::warn!(status = %output.status, "offload worker exited with failure");
            return Err(AttemptFailure::WorkerFailed);
        }

        match serde_json::from_slice::<WorkerResponse>(&output.stdout) {
            Ok(WorkerResponse::Ok { output }) => Ok(output),
            Ok(WorkerResponse::Error { message }) => {
                tracing::warn!(%message, "offload worker rejected request");
                Err(AttemptFailure::WorkerFailed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed offload worker response");
                Err(AttemptFailure::WorkerFailed)
            }
        }
    }
}

impl std::fmt::Debug for OffloadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadExecutor")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
