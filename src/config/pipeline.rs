//! Option sections consumed by the pipeline core.
//!
//! Every field has a documented default so a config file only needs to
//! mention what it changes. `validate` is the single place where the fatal
//! configuration error class is detected.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::EvictionMode;
use crate::error::ConfigError;
use crate::offload::{JobKind, StartMethod};

/// `[sizer]`: adaptive chunk-size controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    /// Smallest chunk size the sizer may propose (chars).
    pub min_size: u32,
    /// Largest chunk size the sizer may propose (chars).
    pub max_size: u32,
    /// Per-chunk latency the controller steers towards.
    pub target_latency_ms: f64,
    /// Weight of the newest observation in the smoothed latency.
    pub smoothing_alpha: f64,
    /// Half-width of the no-change band, as a fraction of the target.
    pub hysteresis_pct: f64,
    /// Feedback updates to sit out after a size change.
    pub cooldown_chunks: u32,
    /// Multiplicative step applied on each change.
    pub step_pct: f64,
    /// Starting size; falls back to the orchestrator's default chunk size.
    pub initial_size: Option<u32>,
    /// Queue utilization at or above which the sizer refuses to grow.
    pub backpressure_ceiling: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            min_size: 200,
            max_size: 4000,
            target_latency_ms: 2000.0,
            smoothing_alpha: 0.3,
            hysteresis_pct: 0.15,
            cooldown_chunks: 2,
            step_pct: 0.2,
            initial_size: None,
            backpressure_ceiling: 0.8,
        }
    }
}

impl SizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size == 0 {
            return Err(ConfigError::Zero { field: "min_size" });
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::InvalidBounds {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if let Some(initial) = self.initial_size
            && !(self.min_size..=self.max_size).contains(&initial)
        {
            return Err(ConfigError::InitialOutOfBounds {
                initial,
                min: self.min_size,
                max: self.max_size,
            });
        }
        if !(self.target_latency_ms > 0.0 && self.target_latency_ms.is_finite()) {
            return Err(ConfigError::out_of_range(
                "target_latency_ms",
                self.target_latency_ms,
                "> 0",
            ));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::out_of_range(
                "smoothing_alpha",
                self.smoothing_alpha,
                "(0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.hysteresis_pct) {
            return Err(ConfigError::out_of_range(
                "hysteresis_pct",
                self.hysteresis_pct,
                "[0, 1)",
            ));
        }
        if !(self.step_pct > 0.0 && self.step_pct < 1.0) {
            return Err(ConfigError::out_of_range("step_pct", self.step_pct, "(0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.backpressure_ceiling) {
            return Err(ConfigError::out_of_range(
                "backpressure_ceiling",
                self.backpressure_ceiling,
                "[0, 1]",
            ));
        }
        Ok(())
    }
}

/// `[orchestrator]`: chunk submission and concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Chunks translated at the same time.
    pub max_concurrent_chunks: usize,
    /// Extra submitted-but-waiting chunks allowed when backpressure is on.
    pub max_queue_size: usize,
    pub enable_backpressure: bool,
    /// Worker threads for the async runtime (defaults to one per core).
    pub thread_pool_size: Option<usize>,
    /// Size handed to the sizer on its first request.
    pub default_chunk_size: u32,
    /// Check each translated block for structural problems.
    pub validate_output: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: 4,
            max_queue_size: 8,
            enable_backpressure: true,
            thread_pool_size: None,
            default_chunk_size: 1500,
            validate_output: true,
        }
    }
}

impl OrchestratorConfig {
    /// Upper bound on outstanding chunk jobs.
    pub const fn submission_window(&self) -> usize {
        if self.enable_backpressure {
            self.max_concurrent_chunks + self.max_queue_size
        } else {
            self.max_concurrent_chunks
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_chunks == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent_chunks",
            });
        }
        if self.thread_pool_size == Some(0) {
            return Err(ConfigError::Zero {
                field: "thread_pool_size",
            });
        }
        if self.default_chunk_size == 0 {
            return Err(ConfigError::Zero {
                field: "default_chunk_size",
            });
        }
        Ok(())
    }
}

/// `[offload]`: isolated worker pool for parse/validate jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub process_pool_enabled: bool,
    /// Job kinds routed to the pool; others always run in-process.
    pub process_pool_target: Vec<JobKind>,
    pub process_pool_max_workers: usize,
    pub task_timeout_ms: u64,
    /// Payloads longer than this (chars) are never offloaded.
    pub job_max_chars: usize,
    pub retry_on_timeout: bool,
    /// Retries after a timeout before falling back; 0 disables retrying.
    pub retry_limit: u8,
    pub start_method: StartMethod,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            process_pool_enabled: false,
            process_pool_target: vec![JobKind::Parse, JobKind::Validate],
            process_pool_max_workers: 2,
            task_timeout_ms: 5000,
            job_max_chars: 200_000,
            retry_on_timeout: true,
            retry_limit: 1,
            start_method: StartMethod::Process,
        }
    }
}

impl OffloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_pool_max_workers == 0 {
            return Err(ConfigError::Zero {
                field: "process_pool_max_workers",
            });
        }
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "task_timeout_ms",
            });
        }
        Ok(())
    }
}

/// `[cache]`: syntax-tree cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub max_size: usize,
    pub eviction_mode: EvictionMode,
    /// Entry lifetime in `ttl` mode, measured from insertion.
    pub ttl_seconds: u64,
    pub max_memory_mb: Option<f64>,
    /// Entries inspected per LFU eviction, starting from the least recent.
    pub lfu_scan_window: usize,
    pub persistent_path: Option<PathBuf>,
    pub enable_compression: bool,
    /// Run expiry cleanup on a timer (ttl mode only).
    pub cleanup_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            eviction_mode: EvictionMode::Lru,
            ttl_seconds: 3600,
            max_memory_mb: None,
            lfu_scan_window: 16,
            persistent_path: None,
            enable_compression: false,
            cleanup_interval_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn max_memory_bytes(&self) -> Option<usize> {
        self.max_memory_mb
            .map(|mb| (mb * 1024.0 * 1024.0).round() as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Zero { field: "max_size" });
        }
        if self.eviction_mode == EvictionMode::Ttl && self.ttl_seconds == 0 {
            return Err(ConfigError::Zero {
                field: "ttl_seconds",
            });
        }
        if let Some(mb) = self.max_memory_mb
            && !(mb > 0.0 && mb.is_finite())
        {
            return Err(ConfigError::out_of_range("max_memory_mb", mb, "> 0"));
        }
        if self.lfu_scan_window == 0 {
            return Err(ConfigError::Zero {
                field: "lfu_scan_window",
            });
        }
        if self.cleanup_interval_secs == Some(0) {
            return Err(ConfigError::Zero {
                field: "cleanup_interval_secs",
            });
        }
        Ok(())
    }
}

/// All pipeline sections together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sizer: SizerConfig,
    pub orchestrator: OrchestratorConfig,
    pub offload: OffloadConfig,
    pub cache: CacheConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sizer.validate()?;
        self.orchestrator.validate()?;
        self.offload.validate()?;
        self.cache.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_min_greater_than_max_is_rejected() {
        let config = SizerConfig {
            min_size: 500,
            max_size: 100,
            ..SizerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBounds { min: 500, max: 100 })
        );
    }

    #[test]
    fn test_initial_size_outside_bounds_is_rejected() {
        let config = SizerConfig {
            initial_size: Some(10),
            ..SizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InitialOutOfBounds { initial: 10, .. })
        ));
    }

    #[test]
    fn test_sizer_fractions_are_range_checked() {
        for config in [
            SizerConfig {
                smoothing_alpha: 0.0,
                ..SizerConfig::default()
            },
            SizerConfig {
                hysteresis_pct: 1.0,
                ..SizerConfig::default()
            },
            SizerConfig {
                step_pct: 1.5,
                ..SizerConfig::default()
            },
            SizerConfig {
                target_latency_ms: -1.0,
                ..SizerConfig::default()
            },
        ] {
            assert!(matches!(
                config.validate(),
                Err(ConfigError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_submission_window() {
        let mut config = OrchestratorConfig {
            max_concurrent_chunks: 3,
            max_queue_size: 5,
            enable_backpressure: false,
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.submission_window(), 3);

        config.enable_backpressure = true;
        assert_eq!(config.submission_window(), 8);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = OrchestratorConfig {
            max_concurrent_chunks: 0,
            ..OrchestratorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "max_concurrent_chunks"
            })
        );
    }

    #[test]
    fn test_zero_retry_limit_is_valid() {
        let config = OffloadConfig {
            retry_limit: 0,
            ..OffloadConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_cache_ttl_mode_requires_ttl() {
        let config = CacheConfig {
            eviction_mode: EvictionMode::Ttl,
            ttl_seconds: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_memory_bytes() {
        let config = CacheConfig {
            max_memory_mb: Some(0.5),
            ..CacheConfig::default()
        };
        assert_eq!(config.max_memory_bytes(), Some(512 * 1024));
        assert_eq!(CacheConfig::default().max_memory_bytes(), None);
    }

    #[test]
    fn test_partial_toml_section_uses_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [sizer]
            min_size = 50

            [cache]
            eviction_mode = "lfu"

            [offload]
            process_pool_target = ["parse"]
            start_method = "thread"
            "#,
        )
        .unwrap();

        assert_eq!(config.sizer.min_size, 50);
        assert_eq!(config.sizer.max_size, 4000);
        assert_eq!(config.cache.eviction_mode, EvictionMode::Lfu);
        assert_eq!(config.offload.process_pool_target, vec![JobKind::Parse]);
        assert_eq!(config.offload.start_method, StartMethod::Thread);
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
    }
}
