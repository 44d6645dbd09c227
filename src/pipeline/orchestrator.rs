use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::chunk::{Chunk, ChunkOutcome};
use super::reorder::ReorderBuffer;
use super::sizer::AdaptiveChunkSizer;
use crate::config::{OrchestratorConfig, PipelineConfig};
use crate::error::ConfigError;
use crate::events::{EventBus, PipelineEvent};
use crate::offload::OffloadExecutor;
use crate::syntax::{BlockSplitter, Splitter};
use crate::translation::{TranslationBackend, TranslationContext};

/// Drives one input through splitting, bounded concurrent translation and
/// in-order delivery.
///
/// At most `submission_window()` chunks are outstanding at any time. Of
/// those, at most `max_concurrent_chunks` are inside the backend; the rest
/// wait for a slot.
///
/// Finished outcomes held back behind a slower, lower-indexed chunk are no
/// longer outstanding and do not count against the window. While one chunk
/// stalls, the reorder buffer can therefore grow up to the rest of the
/// input.
pub struct StreamingOrchestrator<B> {
    config: OrchestratorConfig,
    sizer: AdaptiveChunkSizer,
    backend: Arc<B>,
    offload: Arc<OffloadExecutor>,
    splitter: Arc<dyn Splitter>,
    target_language: String,
    events: EventBus,
}

impl<B> StreamingOrchestrator<B>
where
    B: TranslationBackend + 'static,
{
    /// Validates the sizer and orchestrator sections; an invalid
    /// configuration never starts a session.
    pub fn new(
        config: &PipelineConfig,
        backend: Arc<B>,
        offload: Arc<OffloadExecutor>,
        events: EventBus,
    ) -> Result<Self, ConfigError> {
        config.orchestrator.validate()?;
        let sizer = AdaptiveChunkSizer::new(config.sizer.clone(), events.clone())?;

        Ok(Self {
            config: config.orchestrator.clone(),
            sizer,
            backend,
            offload,
            splitter: Arc::new(BlockSplitter),
            target_language: String::new(),
            events,
        })
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.splitter = splitter;
        self
    }

    #[must_use]
    pub fn with_target_language(mut self, target_language: impl Into<String>) -> Self {
        self.target_language = target_language.into();
        self
    }

    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Lazily translates `input`, yielding outcomes in chunk order.
    ///
    /// Nothing is split or submitted until the stream is polled. Dropping
    /// the stream stops new submissions; chunks already in flight finish on
    /// their own. Each call starts a fresh session with a fresh sizer.
    pub fn stream_translate<'a>(&'a self, input: &'a str) -> impl Stream<Item = ChunkOutcome> + Send + 'a {
        async_stream::stream! {
            let started = Instant::now();
            let window = self.config.submission_window();
            let slots = Arc::new(Semaphore::new(self.config.max_concurrent_chunks));
            let mut sizer = self.sizer.clone();
            let mut reorder = ReorderBuffer::new();
            let mut in_flight = FuturesUnordered::new();
            let mut offset = 0;
            let mut next_index: u32 = 0;
            let mut failed: u32 = 0;

            tracing::info!(chars = input.chars().count(), window, "streaming session started");
            self.events.emit(&PipelineEvent::Started {
                input_chars: input.chars().count(),
                submission_window: window,
            });

            loop {
                while in_flight.len() < window && offset < input.len() {
                    let target = sizer.get_next_chunk_size(self.config.default_chunk_size);
                    let mut end = self.splitter.split_point(input, offset, target as usize);
                    if end <= offset || end > input.len() || !input.is_char_boundary(end) {
                        tracing::warn!(offset, end, "splitter returned an unusable boundary; taking the rest");
                        end = input.len();
                    }

                    let chunk = Chunk::new(next_index, input[offset..end].to_string());
                    offset = end;
                    next_index += 1;

                    self.events.emit(&PipelineEvent::ChunkSubmitted {
                        index: chunk.index,
                        char_count: chunk.char_count,
                        outstanding: in_flight.len() + 1,
                    });
                    in_flight.push(self.spawn_chunk(chunk, Arc::clone(&slots)));
                }

                let Some((index, char_count, outcome)) = in_flight.next().await else {
                    break;
                };

                let utilization = in_flight.len() as f64 / window as f64;
                sizer.update_feedback(char_count, outcome.latency_ms, utilization, None);

                if !outcome.success {
                    failed += 1;
                }
                self.events.emit(&PipelineEvent::ChunkCompleted {
                    index,
                    success: outcome.success,
                    latency_ms: outcome.latency_ms,
                });

                reorder.push(outcome);
                while let Some(ready) = reorder.pop_ready() {
                    yield ready;
                }
            }

            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            tracing::info!(chunks = next_index, failed, elapsed_ms, "streaming session completed");
            self.events.emit(&PipelineEvent::Completed {
                chunks: next_index,
                failed,
                elapsed_ms,
            });
        }
    }

    /// Collects every outcome of `input`, in order.
    pub async fn translate_all(&self, input: &str) -> Vec<ChunkOutcome> {
        self.stream_translate(input).collect().await
    }

    /// Runs one chunk on the runtime. Resolves to `(index, chars, outcome)`
    /// even if the task panics.
    fn spawn_chunk(
        &self,
        chunk: Chunk,
        slots: Arc<Semaphore>,
    ) -> impl std::future::Future<Output = (u32, u32, ChunkOutcome)> + Send + use<B> {
        let index = chunk.index;
        let char_count = chunk.char_count;
        let backend = Arc::clone(&self.backend);
        let offload = Arc::clone(&self.offload);
        let target_language = self.target_language.clone();
        let validate_output = self.config.validate_output;

        let handle = tokio::spawn(async move {
            let tree = offload.parse(&chunk.content).await;
            let context = TranslationContext {
                chunk_index: chunk.index,
                block_count: tree.block_count(),
                target_language,
            };

            let Ok(slot) = slots.acquire_owned().await else {
                return ChunkOutcome::failed(chunk.index, "translation slots closed");
            };

            let started = Instant::now();
            let translation = backend
                .translate_text_block(&chunk.content, &context)
                .await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            drop(slot);

            let mut outcome = ChunkOutcome::from_translation(chunk.index, translation, latency_ms);

            if validate_output && outcome.success {
                let report = offload.validate(&outcome.code).await;
                outcome.warnings.extend(report.errors);
            }

            outcome
        });

        async move {
            let outcome = handle.await.unwrap_or_else(|e| {
                tracing::warn!(index, error = %e, "chunk task failed");
                ChunkOutcome::failed(index, format!("chunk task failed: {e}"))
            });
            (index, char_count, outcome)
        }
    }
}
