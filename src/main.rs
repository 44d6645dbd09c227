use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tl_pipeline::cli::commands::{self, cache, translate, worker};
use tl_pipeline::cli::{Args, Command};
use tl_pipeline::error::ConfigError;
use tl_pipeline::output::{self, OutputConfig};
use tl_pipeline::ui::Style;

fn main() {
    let args = Args::parse();

    output::init(OutputConfig {
        quiet: args.quiet,
        ..OutputConfig::default()
    });
    setup_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("{} {e:#}", Style::error("error:"));
        std::process::exit(exit_code(&e));
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Command::Worker) => worker::run(),
        Some(Command::Cache { command }) => {
            let config_file = commands::config_manager(args.config.as_deref()).load_or_default()?;
            cache::run_cache(command, &config_file)
        }
        None => {
            let config_file = commands::config_manager(args.config.as_deref()).load_or_default()?;

            let mut runtime = tokio::runtime::Builder::new_multi_thread();
            if let Some(threads) = config_file.orchestrator.thread_pool_size {
                runtime.worker_threads(threads);
            }
            let runtime = runtime
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;

            let options = translate::TranslateOptions {
                file: args.file,
                to: args.to,
                provider: args.provider,
                model: args.model,
                output: args.output,
                dry_run: args.dry_run,
                offload: args.offload,
            };
            runtime.block_on(translate::run_translate(options, &config_file))
        }
    }
}

/// Logs go to stderr. `TLP_LOG` takes a full filter directive and wins
/// over `-v`.
fn setup_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env("TLP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!output::is_no_color())
        .with_target(false)
        .init();
}

fn exit_code(error: &anyhow::Error) -> i32 {
    let is_config_error = error
        .chain()
        .any(|cause| cause.is::<ConfigError>() || cause.is::<toml::de::Error>());

    if is_config_error {
        exitcode::CONFIG
    } else {
        1
    }
}
