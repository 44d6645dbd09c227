mod manager;
mod pipeline;

pub use manager::{
    ConfigFile, ConfigManager, ProviderConfig, ResolveOptions, ResolvedConfig, TlConfig,
    resolve_config, resolve_target_language,
};
pub use pipeline::{CacheConfig, OffloadConfig, OrchestratorConfig, PipelineConfig, SizerConfig};
