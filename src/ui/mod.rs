mod progress;
mod theme;

pub use progress::ChunkProgress;
pub use theme::Style;
