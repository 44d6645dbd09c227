//! On-disk format of the syntax-tree cache.
//!
//! The file is a JSON envelope `{version, eviction_mode, entries}`,
//! optionally brotli-compressed behind a 4-byte magic prefix. Entries are
//! decoded one by one so a single corrupt entry costs only itself.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::policy::EvictionMode;
use crate::syntax::ParsedTree;

pub(crate) const FORMAT_VERSION: u32 = 1;

const COMPRESSED_MAGIC: &[u8; 4] = b"TLPZ";
const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PersistedEntry {
    pub key: String,
    pub tree: ParsedTree,
    pub size_bytes: u32,
    pub access_count: u32,
    pub inserted_at: u64,
    pub last_access: u64,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    eviction_mode: EvictionMode,
    entries: &'a [PersistedEntry],
}

/// Envelope with entries left undecoded.
#[derive(Deserialize)]
struct RawEnvelope {
    version: u32,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

#[derive(Debug, Default)]
pub(crate) struct Decoded {
    pub entries: Vec<PersistedEntry>,
    pub skipped: usize,
}

pub(crate) fn encode(
    entries: &[PersistedEntry],
    eviction_mode: EvictionMode,
    compress: bool,
) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(&Envelope {
        version: FORMAT_VERSION,
        eviction_mode,
        entries,
    })
    .context("Failed to serialize tree cache")?;

    if !compress {
        return Ok(json);
    }

    let mut out = COMPRESSED_MAGIC.to_vec();
    let mut writer = brotli::CompressorWriter::new(&mut out, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
    writer
        .write_all(&json)
        .context("Failed to compress tree cache")?;
    drop(writer);

    Ok(out)
}

/// Decodes a cache file.
///
/// Errors mean the whole payload is unusable (bad compression, not JSON,
/// unknown version); bad individual entries are only counted.
pub(crate) fn decode(bytes: &[u8]) -> Result<Decoded> {
    let json = match bytes.strip_prefix(COMPRESSED_MAGIC) {
        Some(compressed) => {
            let mut out = Vec::new();
            brotli::Decompressor::new(compressed, BROTLI_BUFFER)
                .read_to_end(&mut out)
                .context("Failed to decompress tree cache")?;
            out
        }
        None => bytes.to_vec(),
    };

    let envelope: RawEnvelope =
        serde_json::from_slice(&json).context("Tree cache is not a valid cache file")?;

    if envelope.version != FORMAT_VERSION {
        bail!(
            "Unsupported tree cache version {} (expected {FORMAT_VERSION})",
            envelope.version
        );
    }

    let mut decoded = Decoded::default();
    for raw in envelope.entries {
        match serde_json::from_value::<PersistedEntry>(raw) {
            Ok(entry) => decoded.entries.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable tree cache entry");
                decoded.skipped += 1;
            }
        }
    }

    Ok(decoded)
}
