use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::cli_cache_config;
use crate::cache::{CacheStats, SyntaxTreeCache};
use crate::cli::CacheCommand;
use crate::config::ConfigFile;
use crate::syntax::BlockParser;
use crate::ui::Style;

pub fn run_cache(command: CacheCommand, config_file: &ConfigFile) -> Result<()> {
    let config = cli_cache_config(&config_file.cache);
    let path = config.persistent_path.clone().unwrap_or_default();

    match command {
        CacheCommand::Stats => {
            let cache = SyntaxTreeCache::new(config, Arc::new(BlockParser))
                .context("Invalid cache configuration")?;
            print_stats(&cache.get_stats(), &path);
        }
        CacheCommand::Clear => clear(&path)?,
    }

    Ok(())
}

fn print_stats(stats: &CacheStats, path: &Path) {
    println!("{}", Style::header("Tree cache"));
    println!("  {:<10} {}", Style::label("file"), Style::value(path.display()));
    println!("  {:<10} {}", Style::label("entries"), Style::value(stats.size));
    println!("  {:<10} {}", Style::label("mode"), Style::value(stats.eviction_mode));

    let memory = match stats.max_memory_bytes {
        Some(max) => format!("{} / {} bytes", stats.memory_bytes, max),
        None => format!("{} bytes", stats.memory_bytes),
    };
    println!("  {:<10} {}", Style::label("memory"), Style::value(memory));
}

fn clear(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("{}", Style::hint("No tree cache file to remove"));
        return Ok(());
    }

    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove tree cache: {}", path.display()))?;
    println!("{} {}", Style::success("Removed"), path.display());

    Ok(())
}
