use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::pipeline::{CacheConfig, OffloadConfig, OrchestratorConfig, PipelineConfig, SizerConfig};
use crate::fs::atomic_write;
use crate::paths;

/// Default settings in the `[tl]` section of config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlConfig {
    /// Default provider name.
    pub provider: Option<String>,
    /// Default model name.
    pub model: Option<String>,
    /// Default target language.
    pub to: Option<String>,
}

/// Configuration for a translation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The OpenAI-compatible API endpoint URL.
    pub endpoint: String,
    /// API key stored directly in config (not recommended).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// List of available models for this provider.
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// Gets the API key, preferring environment variable over config file.
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(env_var) = &self.api_key_env
            && let Ok(key) = std::env::var(env_var)
            && !key.is_empty()
        {
            return Some(key);
        }
        self.api_key.clone()
    }

    /// Returns `true` if this provider requires an API key.
    pub const fn requires_api_key(&self) -> bool {
        self.api_key.is_some() || self.api_key_env.is_some()
    }
}

/// The complete configuration file structure.
///
/// Corresponds to `~/.config/tlp/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tl: TlConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub sizer: SizerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub offload: OffloadConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ConfigFile {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            sizer: self.sizer.clone(),
            orchestrator: self.orchestrator.clone(),
            offload: self.offload.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Resolved configuration after merging CLI arguments and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider_name: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub target_language: String,
    pub pipeline: PipelineConfig,
}

/// CLI overrides that take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub to: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Resolves configuration by merging CLI options with config file settings.
///
/// CLI options take precedence over config file values.
///
/// # Errors
///
/// Returns an error if provider, model or target language is missing, if
/// the provider is unknown, if its API key is unset, or if a pipeline
/// section holds invalid values.
pub fn resolve_config(
    options: &ResolveOptions,
    config_file: &ConfigFile,
) -> Result<ResolvedConfig> {
    let provider_name = options
        .provider
        .as_ref()
        .or(config_file.tl.provider.as_ref())
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing required configuration: 'provider'\n\n\
                 Please provide it via:\n  \
                 - CLI option: tlp --provider <name>\n  \
                 - Config file: ~/.config/tlp/config.toml"
            )
        })?;

    let provider_config = config_file.providers.get(&provider_name).ok_or_else(|| {
        let mut available: Vec<_> = config_file.providers.keys().map(String::as_str).collect();
        available.sort_unstable();
        if available.is_empty() {
            anyhow::anyhow!(
                "Provider '{provider_name}' not found\n\n\
                 No providers configured. Add providers to ~/.config/tlp/config.toml"
            )
        } else {
            anyhow::anyhow!(
                "Provider '{provider_name}' not found\n\n\
                 Available providers:\n  \
                 - {}",
                available.join("\n  - ")
            )
        }
    })?;

    let model = options
        .model
        .as_ref()
        .or(config_file.tl.model.as_ref())
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing required configuration: 'model'\n\n\
                 Please provide it via:\n  \
                 - CLI option: tlp --model <name>\n  \
                 - Config file: ~/.config/tlp/config.toml"
            )
        })?;

    if !provider_config.models.is_empty() && !provider_config.models.contains(&model) {
        tracing::warn!(
            model = %model,
            provider = %provider_name,
            configured = %provider_config.models.join(", "),
            "model is not in the provider's configured models list; proceeding anyway"
        );
    }

    let target_language = resolve_target_language(options, config_file).ok_or_else(|| {
        anyhow::anyhow!(
            "Missing required configuration: 'to' (target language)\n\n\
             Please provide it via:\n  \
             - CLI option: tlp --to <lang>\n  \
             - Config file: ~/.config/tlp/config.toml"
        )
    })?;

    let api_key = provider_config.get_api_key();

    if provider_config.requires_api_key() && api_key.is_none() {
        let env_var = provider_config.api_key_env.as_deref().unwrap_or("API_KEY");
        bail!(
            "Provider '{provider_name}' requires an API key\n\n\
             Set the {env_var} environment variable:\n  \
             export {env_var}=\"your-api-key\"\n\n\
             Or set api_key in ~/.config/tlp/config.toml"
        );
    }

    let pipeline = config_file.pipeline();
    pipeline
        .validate()
        .context("Invalid pipeline configuration")?;

    Ok(ResolvedConfig {
        provider_name,
        endpoint: provider_config.endpoint.clone(),
        model,
        api_key,
        target_language,
        pipeline,
    })
}

/// Target language from the CLI, then the config file.
pub fn resolve_target_language(options: &ResolveOptions, config_file: &ConfigFile) -> Option<String> {
    options.to.as_ref().or(config_file.tl.to.as_ref()).cloned()
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Configuration is stored at `$XDG_CONFIG_HOME/tlp/config.toml`
    /// or `~/.config/tlp/config.toml` if `XDG_CONFIG_HOME` is not set.
    pub fn new() -> Self {
        Self {
            config_path: paths::config_dir().join("config.toml"),
        }
    }

    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load(&self) -> Result<ConfigFile> {
        let contents = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config_file: ConfigFile =
            toml::from_str(&contents).with_context(|| "Failed to parse config file")?;

        Ok(config_file)
    }

    pub fn save(&self, config: &ConfigFile) -> Result<()> {
        let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;

        atomic_write(&self.config_path, contents.as_bytes()).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })
    }

    /// Loads the config file, treating a missing file as empty.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(&self) -> Result<ConfigFile> {
        if self.config_path.exists() {
            self.load()
        } else {
            Ok(ConfigFile::default())
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::EvictionMode;
    use tempfile::TempDir;

    fn create_test_manager(temp_dir: &TempDir) -> ConfigManager {
        ConfigManager::with_path(temp_dir.path().join("config.toml"))
    }

    fn create_test_config() -> ConfigFile {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                api_key_env: None,
                models: vec!["gemma3:12b".to_string()],
            },
        );
        providers.insert(
            "openrouter".to_string(),
            ProviderConfig {
                endpoint: "https://openrouter.ai/api".to_string(),
                api_key: None,
                api_key_env: Some("TLP_TEST_NONEXISTENT_API_KEY".to_string()),
                models: vec!["gpt-4o".to_string()],
            },
        );

        ConfigFile {
            tl: TlConfig {
                provider: Some("ollama".to_string()),
                model: Some("gemma3:12b".to_string()),
                to: Some("x86-64 assembly".to_string()),
            },
            providers,
            ..ConfigFile::default()
        }
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_test_manager(&temp_dir);

        let mut config = create_test_config();
        config.cache.eviction_mode = EvictionMode::Ttl;
        config.sizer.min_size = 64;

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.tl.provider, Some("ollama".to_string()));
        assert_eq!(loaded.tl.to, Some("x86-64 assembly".to_string()));
        assert!(loaded.providers.contains_key("openrouter"));
        assert_eq!(loaded.cache.eviction_mode, EvictionMode::Ttl);
        assert_eq!(loaded.sizer.min_size, 64);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_test_manager(&temp_dir);

        assert!(manager.load().is_err());
        let config = manager.load_or_default().unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_load_or_default_reports_broken_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_test_manager(&temp_dir);
        fs::write(manager.config_path(), "[sizer\nmin_size = ").unwrap();

        assert!(manager.load_or_default().is_err());
    }

    #[test]
    fn test_pipeline_sections_parse_from_toml() {
        let config: ConfigFile = toml::from_str(
            r#"
            [tl]
            to = "arm64"

            [orchestrator]
            max_concurrent_chunks = 2
            enable_backpressure = false

            [cache]
            max_memory_mb = 1.5
            "#,
        )
        .unwrap();

        let pipeline = config.pipeline();
        assert_eq!(pipeline.orchestrator.submission_window(), 2);
        assert_eq!(pipeline.cache.max_memory_mb, Some(1.5));
        assert_eq!(pipeline.sizer, SizerConfig::default());
    }

    #[test]
    fn test_provider_requires_api_key() {
        let provider = ProviderConfig {
            endpoint: "https://api.example.com".to_string(),
            api_key: None,
            api_key_env: Some("API_KEY".to_string()),
            models: vec![],
        };
        assert!(provider.requires_api_key());

        let provider = ProviderConfig {
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            api_key_env: None,
            models: vec![],
        };
        assert!(!provider.requires_api_key());
    }

    #[test]
    fn test_resolve_config_falls_back_to_file() {
        let resolved = resolve_config(&ResolveOptions::default(), &create_test_config()).unwrap();

        assert_eq!(resolved.provider_name, "ollama");
        assert_eq!(resolved.endpoint, "http://localhost:11434");
        assert_eq!(resolved.model, "gemma3:12b");
        assert_eq!(resolved.target_language, "x86-64 assembly");
        assert!(resolved.api_key.is_none());
    }

    #[test]
    fn test_resolve_config_provider_not_found_lists_available() {
        let options = ResolveOptions {
            provider: Some("nonexistent".to_string()),
            ..ResolveOptions::default()
        };

        let err = resolve_config(&options, &create_test_config()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("not found"));
        assert!(message.contains("- ollama\n  - openrouter"));
    }

    #[test]
    fn test_resolve_config_missing_model() {
        let mut config = create_test_config();
        config.tl.model = None;

        let err = resolve_config(&ResolveOptions::default(), &config).unwrap_err();
        assert!(err.to_string().contains("'model'"));
    }

    #[test]
    fn test_resolve_config_api_key_required_but_missing() {
        let options = ResolveOptions {
            provider: Some("openrouter".to_string()),
            ..ResolveOptions::default()
        };

        let err = resolve_config(&options, &create_test_config()).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_resolve_config_rejects_invalid_pipeline() {
        let mut config = create_test_config();
        config.sizer.min_size = 5000;

        let err = resolve_config(&ResolveOptions::default(), &config).unwrap_err();
        assert!(err.to_string().contains("Invalid pipeline configuration"));
    }
}
