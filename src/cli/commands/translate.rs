use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use super::cli_cache_config;
use crate::cache::SyntaxTreeCache;
use crate::config::{ConfigFile, PipelineConfig, ResolveOptions, resolve_config, resolve_target_language};
use crate::events::{EventBus, EventListener, LogListener};
use crate::fs::atomic_write;
use crate::input::InputReader;
use crate::offload::OffloadExecutor;
use crate::output;
use crate::pipeline::{Artifact, AssemblyOptions, StreamingOrchestrator, assemble};
use crate::syntax::{BlockParser, SourceParser};
use crate::translation::{PassthroughBackend, TranslationBackend, TranslationClient};
use crate::ui::{ChunkProgress, Style};

pub struct TranslateOptions {
    pub file: Option<String>,
    pub to: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
    pub offload: bool,
}

pub async fn run_translate(options: TranslateOptions, config_file: &ConfigFile) -> Result<()> {
    let resolve_options = ResolveOptions {
        to: options.to.clone(),
        provider: options.provider.clone(),
        model: options.model.clone(),
    };

    let source_text = InputReader::read(options.file.as_deref().map(std::path::Path::new))?;

    if source_text.trim().is_empty() {
        bail!("Error: Input is empty");
    }

    let artifact = if options.dry_run {
        let mut pipeline = config_file.pipeline();
        pipeline
            .validate()
            .context("Invalid pipeline configuration")?;
        pipeline.offload.process_pool_enabled |= options.offload;
        let target_language =
            resolve_target_language(&resolve_options, config_file).unwrap_or_default();

        run_pipeline(PassthroughBackend, pipeline, target_language, &source_text).await?
    } else {
        let mut resolved = resolve_config(&resolve_options, config_file)?;
        resolved.pipeline.offload.process_pool_enabled |= options.offload;
        tracing::info!(
            provider = %resolved.provider_name,
            model = %resolved.model,
            to = %resolved.target_language,
            "resolved configuration"
        );

        let client = TranslationClient::new(resolved.endpoint, resolved.api_key, resolved.model);
        run_pipeline(
            client,
            resolved.pipeline,
            resolved.target_language,
            &source_text,
        )
        .await?
    };

    write_artifact(&artifact, options.output.as_deref())?;

    for warning in &artifact.warnings {
        eprintln!("{} {warning}", Style::warning("warning:"));
    }

    if !artifact.is_complete() {
        let failed: Vec<String> = artifact.failed.iter().map(ToString::to_string).collect();
        bail!(
            "{} of {} chunks failed (chunks {})",
            artifact.failed.len(),
            artifact.chunk_count,
            failed.join(", ")
        );
    }

    Ok(())
}

async fn run_pipeline<B>(
    backend: B,
    pipeline: PipelineConfig,
    target_language: String,
    source_text: &str,
) -> Result<Artifact>
where
    B: TranslationBackend + 'static,
{
    let events = EventBus::new();
    events.subscribe(Arc::new(LogListener));

    let progress = (!output::is_quiet()).then(|| Arc::new(ChunkProgress::new("Translating")));
    if let Some(progress) = &progress {
        events.subscribe(Arc::clone(progress) as Arc<dyn EventListener>);
    }

    let parser: Arc<dyn SourceParser> = Arc::new(BlockParser);
    let cache = Arc::new(
        SyntaxTreeCache::new(cli_cache_config(&pipeline.cache), Arc::clone(&parser))
            .context("Invalid cache configuration")?,
    );
    let cleanup = cache.spawn_cleanup_task();

    let offload = OffloadExecutor::new(pipeline.offload.clone(), parser, events.clone())
        .context("Invalid offload configuration")?
        .with_cache(Arc::clone(&cache));

    let orchestrator =
        StreamingOrchestrator::new(&pipeline, Arc::new(backend), Arc::new(offload), events)
            .context("Invalid pipeline configuration")?
            .with_target_language(target_language);

    let outcomes = orchestrator.translate_all(source_text).await;

    if let Some(progress) = progress {
        progress.finish();
    }
    if let Some(handle) = cleanup {
        handle.abort();
    }
    if let Err(e) = cache.save_to_disk() {
        tracing::warn!(error = %e, "failed to save tree cache");
    }

    Ok(assemble(&outcomes, &AssemblyOptions::default())?)
}

fn write_artifact(artifact: &Artifact, path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            atomic_write(path, artifact.text.as_bytes())?;
            crate::status!("{} {}", Style::success("Wrote"), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(artifact.text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
