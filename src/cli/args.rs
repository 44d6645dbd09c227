use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tlp")]
#[command(about = "Adaptive streaming translation pipeline")]
#[command(version)]
pub struct Args {
    /// File to translate (reads from stdin if not provided)
    pub file: Option<String>,

    /// Target language
    #[arg(short = 't', long = "to")]
    pub to: Option<String>,

    /// Provider name from the config file
    #[arg(short = 'p', long)]
    pub provider: Option<String>,

    /// Model name
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Write the assembled output to a file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Run the pipeline without calling a provider (blocks are passed through)
    #[arg(long)]
    pub dry_run: bool,

    /// Run parse/validate jobs in isolated worker processes
    #[arg(long)]
    pub offload: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress and status output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or clear the persisted syntax-tree cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Offload worker entry point (one JSON request on stdin)
    #[command(hide = true)]
    Worker,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats,
    /// Delete the persisted cache file
    Clear,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_flags() {
        let args = Args::try_parse_from([
            "tlp", "notes.txt", "-t", "ja", "-o", "out.txt", "--offload", "-vv",
        ])
        .unwrap();
        assert_eq!(args.file.as_deref(), Some("notes.txt"));
        assert_eq!(args.to.as_deref(), Some("ja"));
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert!(args.offload);
        assert_eq!(args.verbose, 2);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cache_subcommand() {
        let args = Args::try_parse_from(["tlp", "cache", "clear"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Cache {
                command: CacheCommand::Clear
            })
        ));
    }

    #[test]
    fn test_worker_subcommand_is_hidden_but_parses() {
        let args = Args::try_parse_from(["tlp", "worker"]).unwrap();
        assert!(matches!(args.command, Some(Command::Worker)));
    }
}
