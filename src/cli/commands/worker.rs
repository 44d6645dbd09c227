use anyhow::Result;
use std::io;

use crate::offload::run_worker;
use crate::syntax::BlockParser;

/// Body of `tlp worker`: one request on stdin, one response on stdout.
pub fn run() -> Result<()> {
    run_worker(&BlockParser, io::stdin().lock(), io::stdout().lock())
}
