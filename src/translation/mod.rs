mod backend;
mod client;
mod prompt;
mod sse_parser;

pub use backend::{BlockTranslation, PassthroughBackend, TranslationBackend, TranslationContext};
pub use client::{TranslationClient, TranslationRequest};
pub use sse_parser::sse_to_text_stream;
