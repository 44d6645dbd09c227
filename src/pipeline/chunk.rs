use serde::{Deserialize, Serialize};

use crate::translation::BlockTranslation;

/// A slice of the input translated as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    pub content: String,
    pub char_count: u32,
}

impl Chunk {
    pub fn new(index: u32, content: String) -> Self {
        let char_count = u32::try_from(content.chars().count()).unwrap_or(u32::MAX);
        Self {
            index,
            content,
            char_count,
        }
    }
}

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub index: u32,
    pub success: bool,
    pub code: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub latency_ms: f64,
}

impl ChunkOutcome {
    pub fn from_translation(index: u32, translation: BlockTranslation, latency_ms: f64) -> Self {
        Self {
            index,
            success: translation.success,
            code: translation.code,
            errors: translation.errors,
            warnings: translation.warnings,
            latency_ms,
        }
    }

    pub fn failed(index: u32, error: impl Into<String>) -> Self {
        Self {
            index,
            success: false,
            code: String::new(),
            errors: vec![error.into()],
            warnings: Vec::new(),
            latency_ms: 0.0,
        }
    }
}
