//! Default splitter/parser collaborator.
//!
//! The pipeline only depends on the [`Splitter`] and [`SourceParser`] traits;
//! [`BlockSplitter`] and [`BlockParser`] are the line-oriented defaults.

mod parser;
mod splitter;
mod tree;

pub use parser::{BlockParser, SourceParser, ValidationReport};
pub use splitter::{BlockSplitter, Splitter};
pub use tree::{Node, NodeKind, ParsedTree};
