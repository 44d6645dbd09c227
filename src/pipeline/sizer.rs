//! Feedback controller for chunk sizes.
//!
//! Latency observations are exponentially smoothed and compared against a
//! hysteresis band around the target. Outside the band the size moves by a
//! multiplicative step, then holds for a cooldown. Growth is additionally
//! refused while the submission queue is close to full; shrinking never is.

use crate::config::SizerConfig;
use crate::error::ConfigError;
use crate::events::{AdaptationDecision, AdaptationReason, EventBus, PipelineEvent};

/// Observed latencies below this are treated as this.
const MIN_LATENCY_MS: f64 = 0.001;

/// Snapshot of the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizerState {
    pub current_size: u32,
    pub smoothed_latency_ms: f64,
    pub cooldown_remaining: u32,
}

/// Proposes chunk sizes for one streaming session.
///
/// Owned by the control loop; every mutation goes through `&mut self`.
#[derive(Debug, Clone)]
pub struct AdaptiveChunkSizer {
    config: SizerConfig,
    current_size: Option<u32>,
    smoothed_latency_ms: Option<f64>,
    cooldown_remaining: u32,
    events: EventBus,
}

impl AdaptiveChunkSizer {
    pub fn new(config: SizerConfig, events: EventBus) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            current_size: None,
            smoothed_latency_ms: None,
            cooldown_remaining: 0,
            events,
        })
    }

    pub const fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Current proposal. The first call settles on `initial_size`, or
    /// `default` clamped into bounds when none is configured.
    pub fn get_next_chunk_size(&mut self, default: u32) -> u32 {
        *self.current_size.get_or_insert_with(|| {
            self.config
                .initial_size
                .unwrap_or(default)
                .clamp(self.config.min_size, self.config.max_size)
        })
    }

    /// Folds one observation into the controller.
    ///
    /// Returns the accepted change, if any; the same decision is emitted as
    /// an event. Observations made before the first size request only feed
    /// the smoothed latency.
    pub fn update_feedback(
        &mut self,
        last_chunk_chars: u32,
        observed_latency_ms: f64,
        queue_utilization: f64,
        model_tokens_per_sec: Option<f64>,
    ) -> Option<AdaptationDecision> {
        let observed = if observed_latency_ms.is_finite() {
            observed_latency_ms.max(MIN_LATENCY_MS)
        } else {
            MIN_LATENCY_MS
        };
        let utilization = if queue_utilization.is_nan() {
            0.0
        } else {
            queue_utilization.clamp(0.0, 1.0)
        };

        let alpha = self.config.smoothing_alpha;
        let smoothed = self
            .smoothed_latency_ms
            .map_or(observed, |prev| alpha.mul_add(observed, (1.0 - alpha) * prev));
        self.smoothed_latency_ms = Some(smoothed);

        tracing::trace!(
            chars = last_chunk_chars,
            observed,
            smoothed,
            utilization,
            tokens_per_sec = ?model_tokens_per_sec,
            "sizer feedback"
        );

        let current = self.current_size?;

        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return None;
        }

        let target = self.config.target_latency_ms;
        let lower = target * (1.0 - self.config.hysteresis_pct);
        let upper = target * (1.0 + self.config.hysteresis_pct);

        let (proposed, reason) = if smoothed < lower {
            if utilization >= self.config.backpressure_ceiling {
                tracing::debug!(utilization, "sizer growth held back by queue pressure");
                return None;
            }
            (
                scale(current, 1.0 + self.config.step_pct),
                AdaptationReason::LatencyBelowTarget,
            )
        } else if smoothed > upper {
            (
                scale(current, 1.0 - self.config.step_pct),
                AdaptationReason::LatencyAboveTarget,
            )
        } else {
            return None;
        };

        let new_size = proposed.clamp(self.config.min_size, self.config.max_size);
        if new_size == current {
            return None;
        }

        self.current_size = Some(new_size);
        self.cooldown_remaining = self.config.cooldown_chunks;

        let decision = AdaptationDecision {
            old_size: current,
            new_size,
            reason,
            smoothed_latency_ms: smoothed,
            target_latency_ms: target,
            backpressure_utilization: utilization,
            cooldown_remaining: self.cooldown_remaining,
        };

        tracing::debug!(
            old = current,
            new = new_size,
            reason = reason.as_str(),
            smoothed,
            "chunk size adapted"
        );
        self.events
            .emit(&PipelineEvent::AdaptationDecision(decision.clone()));

        Some(decision)
    }

    pub fn state(&self) -> SizerState {
        SizerState {
            current_size: self.current_size.unwrap_or_else(|| {
                self.config.initial_size.unwrap_or(self.config.min_size)
            }),
            smoothed_latency_ms: self.smoothed_latency_ms.unwrap_or(0.0),
            cooldown_remaining: self.cooldown_remaining,
        }
    }
}

fn scale(size: u32, factor: f64) -> u32 {
    let scaled = (f64::from(size) * factor).round();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled.max(0.0) as u32
    }
}
