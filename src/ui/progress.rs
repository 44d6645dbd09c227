use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::events::{EventListener, PipelineEvent};

const TEMPLATE: &str = "{spinner} {msg} [{bar:30}] {pos}/{len} chunks ({elapsed})";

/// Progress bar fed by pipeline events.
///
/// The total grows as chunks are submitted, since the number of chunks is
/// only known once the input has been fully split.
pub struct ChunkProgress {
    bar: ProgressBar,
}

impl ChunkProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
                .progress_chars("=> "),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar }
    }

    /// A bar that tracks progress without drawing anything.
    ///
    /// Starts at length 0; a bar without a length ignores `inc_length`.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden()),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl EventListener for ChunkProgress {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::ChunkSubmitted { .. } => self.bar.inc_length(1),
            PipelineEvent::ChunkCompleted { success: false, index, .. } => {
                self.bar.inc(1);
                self.bar.println(format!("chunk {index} failed"));
            }
            PipelineEvent::ChunkCompleted { .. } => self.bar.inc(1),
            PipelineEvent::PoolFallback { kind, reason } => {
                self.bar.set_message(format!("Translating ({kind} ran in-process: {reason})"));
            }
            PipelineEvent::Completed { .. } => self.finish(),
            _ => {}
        }
    }
}

impl Drop for ChunkProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
