//! Wire protocol between the executor and `tlp worker` processes.
//!
//! One request per process: the executor writes a single JSON request to
//! the worker's stdin and closes it, the worker writes a single JSON
//! response to stdout and exits.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use super::job::{JobKind, JobOutput};
use crate::syntax::SourceParser;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub kind: JobKind,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResponse {
    Ok { output: JobOutput },
    Error { message: String },
}

/// Program and arguments used to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `<this executable> worker`.
    pub fn current_exe() -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("tlp"));
        Self::new(program).arg("worker")
    }
}

/// Runs one job against `parser`. Shared by worker processes and
/// thread-mode jobs.
pub fn execute(parser: &dyn SourceParser, kind: JobKind, payload: &str) -> JobOutput {
    match kind {
        JobKind::Parse => JobOutput::Tree(parser.parse(payload)),
        JobKind::Validate => JobOutput::Report(parser.validate(payload)),
    }
}

/// Worker process body: one request in, one response out.
pub fn run_worker(parser: &dyn SourceParser, mut input: impl Read, mut output: impl Write) -> Result<()> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("Failed to read worker request")?;

    let response = match serde_json::from_str::<WorkerRequest>(&raw) {
        Ok(request) => WorkerResponse::Ok {
            output: execute(parser, request.kind, &request.payload),
        },
        Err(e) => WorkerResponse::Error {
            message: format!("invalid request: {e}"),
        },
    };

    serde_json::to_writer(&mut output, &response).context("Failed to write worker response")?;
    output.flush().context("Failed to flush worker response")?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::syntax::BlockParser;

    fn roundtrip(request: &str) -> WorkerResponse {
        let mut out = Vec::new();
        run_worker(&BlockParser, request.as_bytes(), &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_parse_request() {
        let response = roundtrip(r#"{"kind":"parse","payload":"a\n\nb"}"#);
        let WorkerResponse::Ok {
            output: JobOutput::Tree(tree),
        } = response
        else {
            panic!("expected a tree, got {response:?}");
        };
        assert_eq!(tree.block_count(), 2);
    }

    #[test]
    fn test_validate_request() {
        let response = roundtrip(r#"{"kind":"validate","payload":"(a"}"#);
        let WorkerResponse::Ok {
            output: JobOutput::Report(report),
        } = response
        else {
            panic!("expected a report, got {response:?}");
        };
        assert!(!report.valid);
    }

    #[test]
    fn test_malformed_request_gets_error_response() {
        let response = roundtrip("not json");
        assert!(matches!(response, WorkerResponse::Error { .. }));
    }

    #[test]
    fn test_current_exe_runs_worker_subcommand() {
        let command = WorkerCommand::current_exe();
        assert_eq!(command.args, vec![OsString::from("worker")]);
    }
}
