#![allow(clippy::unwrap_used)]
//! Offload jobs running in real worker processes.

use parking_lot::Mutex;
use std::sync::Arc;

use tl_pipeline::config::OffloadConfig;
use tl_pipeline::events::{EventBus, PipelineEvent};
use tl_pipeline::offload::{
    FallbackReason, JobKind, JobOutput, OffloadExecutor, OffloadResult, StartMethod, WorkerCommand,
};
use tl_pipeline::syntax::{BlockParser, SourceParser};

fn process_config(timeout_ms: u64, retry_limit: u8) -> OffloadConfig {
    OffloadConfig {
        process_pool_enabled: true,
        task_timeout_ms: timeout_ms,
        retry_limit,
        start_method: StartMethod::Process,
        ..OffloadConfig::default()
    }
}

fn executor(config: OffloadConfig, worker: WorkerCommand) -> (OffloadExecutor, Arc<Mutex<Vec<PipelineEvent>>>) {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(Arc::new(move |event: &PipelineEvent| {
        sink.lock().push(event.clone());
    }));

    let executor = OffloadExecutor::new(config, Arc::new(BlockParser), bus)
        .unwrap()
        .with_worker_command(worker);
    (executor, seen)
}

fn tlp_worker() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_tlp")).arg("worker")
}

fn names(seen: &Mutex<Vec<PipelineEvent>>) -> Vec<&'static str> {
    seen.lock().iter().map(PipelineEvent::name).collect()
}

#[tokio::test]
async fn test_parse_job_completes_in_worker_process() {
    let (executor, seen) = executor(process_config(10_000, 1), tlp_worker());
    let source = "(a)\n\n```\nfn main() {}\n```\n\n(b)\n";

    let result = executor.submit(JobKind::Parse, source).await;
    let OffloadResult::Completed(JobOutput::Tree(tree)) = result else {
        panic!("expected a parsed tree, got {result:?}");
    };

    assert_eq!(tree, BlockParser.parse(source));
    assert_eq!(names(&seen), vec!["pool_task_submitted", "pool_task_completed"]);
}

#[tokio::test]
async fn test_validate_job_reports_errors_from_worker_process() {
    let (executor, _) = executor(process_config(10_000, 1), tlp_worker());

    let report = executor.validate("(a]").await;
    assert!(!report.valid);
    assert_eq!(report, BlockParser.validate("(a]"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_hanging_worker_times_out_retries_and_falls_back() {
    let (executor, seen) = executor(process_config(100, 1), WorkerCommand::new("sleep").arg("10"));
    let source = "(a)\n\n(b)\n";

    let result = executor.submit(JobKind::Parse, source).await;
    assert_eq!(result, OffloadResult::Fallback(FallbackReason::Timeout));
    assert_eq!(
        names(&seen),
        vec![
            "pool_task_submitted",
            "pool_timeout",
            "pool_task_submitted",
            "pool_timeout",
            "pool_fallback",
        ]
    );

    let attempts: Vec<u8> = seen
        .lock()
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PoolTimeout { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![0, 1]);

    // The caller still gets a tree, parsed in-process.
    let tree = executor.parse(source).await;
    assert_eq!(*tree, BlockParser.parse(source));
}

#[cfg(unix)]
#[tokio::test]
async fn test_crashing_worker_falls_back_without_retry() {
    let (executor, seen) = executor(process_config(10_000, 3), WorkerCommand::new("false"));

    let result = executor.submit(JobKind::Validate, "(a)").await;
    assert_eq!(result, OffloadResult::Fallback(FallbackReason::WorkerFailed));
    assert_eq!(names(&seen), vec!["pool_task_submitted", "pool_fallback"]);
}

#[tokio::test]
async fn test_missing_worker_binary_is_a_spawn_failure() {
    let (executor, seen) = executor(
        process_config(10_000, 1),
        WorkerCommand::new("/nonexistent/tlp-worker-binary"),
    );

    let result = executor.submit(JobKind::Parse, "(a)").await;
    assert_eq!(result, OffloadResult::Fallback(FallbackReason::SpawnFailed));
    assert!(matches!(
        seen.lock().last(),
        Some(PipelineEvent::PoolFallback {
            kind: JobKind::Parse,
            reason: FallbackReason::SpawnFailed,
        })
    ));
}
