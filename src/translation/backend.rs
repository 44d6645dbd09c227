use serde::{Deserialize, Serialize};
use std::future::Future;

/// What the backend knows about the block it is translating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    pub chunk_index: u32,
    /// Top-level blocks in the chunk, from its parsed tree.
    pub block_count: usize,
    pub target_language: String,
}

/// Result of translating one block.
///
/// A failed translation is a value, not an error: the pipeline records it
/// and moves on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockTranslation {
    pub success: bool,
    pub code: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub confidence: Option<f64>,
}

impl BlockTranslation {
    pub fn success(code: impl Into<String>) -> Self {
        Self {
            success: true,
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// Turns one block of text into output code.
pub trait TranslationBackend: Send + Sync {
    fn translate_text_block(
        &self,
        text: &str,
        context: &TranslationContext,
    ) -> impl Future<Output = BlockTranslation> + Send;
}

/// Returns every block unchanged. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBackend;

impl TranslationBackend for PassthroughBackend {
    async fn translate_text_block(&self, text: &str, _context: &TranslationContext) -> BlockTranslation {
        BlockTranslation {
            confidence: Some(1.0),
            ..BlockTranslation::success(text)
        }
    }
}
