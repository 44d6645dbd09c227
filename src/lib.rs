//! # tlp - Adaptive Streaming Translation Pipeline
//!
//! `tlp` translates large inputs block by block through an
//! OpenAI-compatible endpoint. The input is split into chunks on safe
//! block boundaries, chunks are translated concurrently, and results are
//! reassembled in order.
//!
//! ## Features
//!
//! - **Adaptive chunking**: chunk sizes follow observed latency towards a target
//! - **Bounded concurrency**: a submission window caps outstanding work
//! - **Offloading**: parse/validate jobs can run in isolated worker processes
//!   with timeouts, retries and in-process fallback
//! - **Tree cache**: parsed chunks are cached (LRU, LFU, TTL, memory-bound)
//!   and persisted between runs
//!
//! ## Quick Start
//!
//! ```bash
//! # Translate a file
//! tlp ./notes.md -t ja
//!
//! # Translate from stdin into a file
//! cat report.md | tlp -o report.ja.md
//!
//! # See how the input would be chunked, without calling a provider
//! tlp --dry-run -v ./notes.md
//! ```
//!
//! ## Configuration
//!
//! Settings are stored in `~/.config/tlp/config.toml`:
//!
//! ```toml
//! [tl]
//! provider = "ollama"
//! model = "gemma3:12b"
//! to = "ja"
//!
//! [providers.ollama]
//! endpoint = "http://localhost:11434"
//! models = ["gemma3:12b", "llama3.2"]
//!
//! [sizer]
//! target_latency_ms = 3000
//!
//! [offload]
//! process_pool_enabled = true
//! task_timeout_ms = 2000
//!
//! [cache]
//! eviction_mode = "lfu"
//! max_memory_mb = 64
//! ```

/// Syntax-tree cache with pluggable eviction and persistence.
pub mod cache;

/// Command-line interface definitions and handlers.
pub mod cli;

/// Configuration file management, provider settings and pipeline options.
pub mod config;

/// Typed errors.
pub mod error;

/// Pipeline event stream and listeners.
pub mod events;

/// File system utilities.
pub mod fs;

/// Input reading from files and stdin.
pub mod input;

/// Isolated parse/validate jobs with timeout, retry and fallback.
pub mod offload;

/// Global output configuration (quiet mode, colors).
pub mod output;

/// XDG-style path utilities for configuration and cache.
pub mod paths;

/// Chunk sizing, streaming orchestration and assembly.
pub mod pipeline;

/// Block splitting, parsing and validation.
pub mod syntax;

/// Translation backends.
pub mod translation;

/// Terminal UI components (progress, colors).
pub mod ui;
