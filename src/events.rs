//! Pipeline observation stream.
//!
//! Events are read-only: listeners see what the pipeline did but never
//! influence it. Emission is synchronous, and a listener that panics is
//! logged and skipped so one broken observer cannot fail a session.

use parking_lot::RwLock;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::offload::{FallbackReason, JobKind};

/// Why the chunk sizer changed its proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationReason {
    /// Smoothed latency fell below the hysteresis band.
    LatencyBelowTarget,
    /// Smoothed latency rose above the hysteresis band.
    LatencyAboveTarget,
}

impl AdaptationReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LatencyBelowTarget => "latency_below_target",
            Self::LatencyAboveTarget => "latency_above_target",
        }
    }
}

/// Full payload of an accepted size change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationDecision {
    pub old_size: u32,
    pub new_size: u32,
    pub reason: AdaptationReason,
    pub smoothed_latency_ms: f64,
    pub target_latency_ms: f64,
    pub backpressure_utilization: f64,
    pub cooldown_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        input_chars: usize,
        submission_window: usize,
    },
    ChunkSubmitted {
        index: u32,
        char_count: u32,
        /// Outstanding jobs including this one.
        outstanding: usize,
    },
    ChunkCompleted {
        index: u32,
        success: bool,
        latency_ms: f64,
    },
    AdaptationDecision(AdaptationDecision),
    PoolTaskSubmitted {
        kind: JobKind,
        attempt: u8,
    },
    PoolTaskCompleted {
        kind: JobKind,
        attempt: u8,
        duration_ms: f64,
    },
    PoolTimeout {
        kind: JobKind,
        attempt: u8,
        timeout_ms: u64,
    },
    PoolFallback {
        kind: JobKind,
        reason: FallbackReason,
    },
    Completed {
        chunks: u32,
        failed: u32,
        elapsed_ms: f64,
    },
}

impl PipelineEvent {
    /// Short stable name, used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::ChunkSubmitted { .. } => "chunk_submitted",
            Self::ChunkCompleted { .. } => "chunk_completed",
            Self::AdaptationDecision(_) => "adaptation_decision",
            Self::PoolTaskSubmitted { .. } => "pool_task_submitted",
            Self::PoolTaskCompleted { .. } => "pool_task_completed",
            Self::PoolTimeout { .. } => "pool_timeout",
            Self::PoolFallback { .. } => "pool_fallback",
            Self::Completed { .. } => "completed",
        }
    }
}

/// Receives pipeline events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

impl<F> EventListener for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) {
        self(event);
    }
}

/// A cheaply cloneable fan-out list of listeners.
///
/// Clones share the same listener list, so a listener subscribed through
/// one handle sees events emitted through every other.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, event: &PipelineEvent) {
        // Snapshot so a listener may subscribe others without deadlocking.
        let listeners: Vec<_> = self.listeners.read().clone();

        for listener in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if result.is_err() {
                tracing::warn!(event = event.name(), "event listener panicked; ignoring");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Mirrors every event into `tracing` at debug level.
pub struct LogListener;

impl EventListener for LogListener {
    fn on_event(&self, event: &PipelineEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::debug!(target: "tl_pipeline::events", "{json}"),
            Err(_) => tracing::debug!(target: "tl_pipeline::events", "{event:?}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Panicking;

    impl EventListener for Panicking {
        fn on_event(&self, _event: &PipelineEvent) {
            panic!("listener bug");
        }
    }

    fn completed() -> PipelineEvent {
        PipelineEvent::Completed {
            chunks: 2,
            failed: 0,
            elapsed_ms: 1.0,
        }
    }

    #[test]
    fn test_emit_reaches_every_listener() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..2 {
            let seen = Arc::clone(&seen);
            bus.subscribe(Arc::new(move |e: &PipelineEvent| {
                seen.lock().push((id, e.name()));
            }));
        }

        bus.emit(&completed());

        assert_eq!(*seen.lock(), vec![(0, "completed"), (1, "completed")]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        bus.subscribe(Arc::new(Panicking));
        let counter = Arc::clone(&count);
        bus.subscribe(Arc::new(move |_: &PipelineEvent| *counter.lock() += 1));

        bus.emit(&completed());
        bus.emit(&completed());

        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_clones_share_listeners() {
        let bus = EventBus::new();
        let clone = bus.clone();
        clone.subscribe(Arc::new(LogListener));
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = PipelineEvent::PoolFallback {
            kind: JobKind::Parse,
            reason: FallbackReason::JobTooLarge,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "pool_fallback");
        assert_eq!(json["reason"], "job_too_large");
        assert_eq!(json["kind"], "parse");
    }
}
