//! The streaming translation pipeline.
//!
//! [`StreamingOrchestrator`] splits the input into chunks sized by an
//! [`AdaptiveChunkSizer`], translates them concurrently inside a bounded
//! submission window, and yields [`ChunkOutcome`]s in chunk order.
//! [`assemble`] turns the ordered outcomes into the final [`Artifact`].

mod assemble;
mod chunk;
mod orchestrator;
mod reorder;
mod sizer;

pub use assemble::{Artifact, AssemblyOptions, assemble};
pub use chunk::{Chunk, ChunkOutcome};
pub use orchestrator::StreamingOrchestrator;
pub use reorder::ReorderBuffer;
pub use sizer::{AdaptiveChunkSizer, SizerState};
