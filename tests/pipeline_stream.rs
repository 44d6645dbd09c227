#![allow(clippy::unwrap_used)]
//! End-to-end streaming tests: split, translate, reorder, assemble.

use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tl_pipeline::config::{OffloadConfig, PipelineConfig};
use tl_pipeline::events::{AdaptationReason, EventBus, PipelineEvent};
use tl_pipeline::offload::OffloadExecutor;
use tl_pipeline::pipeline::{AssemblyOptions, StreamingOrchestrator, assemble};
use tl_pipeline::syntax::BlockParser;
use tl_pipeline::translation::{BlockTranslation, TranslationBackend, TranslationContext};

/// Upper-cases every block after a fixed delay.
struct ShoutingBackend {
    delay: Duration,
}

impl TranslationBackend for ShoutingBackend {
    async fn translate_text_block(&self, text: &str, _context: &TranslationContext) -> BlockTranslation {
        tokio::time::sleep(self.delay).await;
        BlockTranslation::success(text.to_uppercase())
    }
}

fn blocks(count: usize) -> String {
    (0..count)
        .map(|i| format!("(block {i:02})\n\n"))
        .collect()
}

fn record(bus: &EventBus) -> Arc<Mutex<Vec<PipelineEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(Arc::new(move |event: &PipelineEvent| {
        sink.lock().push(event.clone());
    }));
    seen
}

fn build(config: &PipelineConfig, delay: Duration, events: EventBus) -> StreamingOrchestrator<ShoutingBackend> {
    let offload = OffloadExecutor::new(OffloadConfig::default(), Arc::new(BlockParser), events.clone()).unwrap();
    StreamingOrchestrator::new(config, Arc::new(ShoutingBackend { delay }), Arc::new(offload), events).unwrap()
}

fn submitted_sizes(events: &[PipelineEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ChunkSubmitted { char_count, .. } => Some(*char_count),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_streamed_outcomes_assemble_into_the_translated_document() {
    let mut config = PipelineConfig::default();
    config.sizer.min_size = 20;
    config.sizer.max_size = 60;
    config.sizer.initial_size = Some(40);

    let bus = EventBus::new();
    let seen = record(&bus);
    let orchestrator = build(&config, Duration::from_millis(2), bus);
    let input = blocks(30);

    let mut outcomes = Vec::new();
    let mut stream = Box::pin(orchestrator.stream_translate(&input));
    while let Some(outcome) = stream.next().await {
        assert_eq!(outcome.index as usize, outcomes.len());
        outcomes.push(outcome);
    }
    drop(stream);

    let artifact = assemble(&outcomes, &AssemblyOptions::default()).unwrap();
    assert!(artifact.is_complete());
    assert_eq!(artifact.text, format!("{}\n", input.trim_end().to_uppercase()));

    let seen = seen.lock();
    assert_eq!(artifact.chunk_count as usize, submitted_sizes(&seen).len());
    assert!(matches!(seen.last(), Some(PipelineEvent::Completed { failed: 0, .. })));
}

#[tokio::test]
async fn test_slow_backend_shrinks_later_chunks() {
    let mut config = PipelineConfig::default();
    config.sizer.min_size = 10;
    config.sizer.max_size = 200;
    config.sizer.initial_size = Some(120);
    config.sizer.target_latency_ms = 1.0;
    config.sizer.cooldown_chunks = 0;
    config.orchestrator.max_concurrent_chunks = 1;
    config.orchestrator.enable_backpressure = false;

    let bus = EventBus::new();
    let seen = record(&bus);
    let orchestrator = build(&config, Duration::from_millis(20), bus);

    let outcomes = orchestrator.translate_all(&blocks(60)).await;
    assert!(outcomes.iter().all(|o| o.success));

    let seen = seen.lock();
    let decisions: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::AdaptationDecision(decision) => Some(decision.clone()),
            _ => None,
        })
        .collect();
    assert!(!decisions.is_empty());
    assert!(decisions.iter().all(|d| d.reason == AdaptationReason::LatencyAboveTarget));
    assert!(decisions.iter().all(|d| d.new_size < d.old_size && d.new_size >= 10));

    let sizes = submitted_sizes(&seen);
    assert!(sizes.last().unwrap() < sizes.first().unwrap(), "{sizes:?}");
}

#[tokio::test]
async fn test_dropping_the_stream_stops_the_session() {
    let mut config = PipelineConfig::default();
    config.sizer.min_size = 1;
    config.sizer.max_size = 12;
    config.sizer.initial_size = Some(12);
    config.orchestrator.max_concurrent_chunks = 1;
    config.orchestrator.enable_backpressure = false;

    let bus = EventBus::new();
    let seen = record(&bus);
    let orchestrator = build(&config, Duration::from_millis(1), bus);
    let input = blocks(10);

    let taken: Vec<_> = orchestrator.stream_translate(&input).take(2).collect().await;
    assert_eq!(taken.iter().map(|o| o.index).collect::<Vec<_>>(), vec![0, 1]);

    let seen = seen.lock();
    assert!(submitted_sizes(&seen).len() < 10);
    assert!(!seen.iter().any(|e| matches!(e, PipelineEvent::Completed { .. })));
}
