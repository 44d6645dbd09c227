//! Typed errors for the pipeline core.
//!
//! Only configuration problems are fatal, and they are reported when a
//! component is constructed. Everything that can go wrong mid-stream is
//! expressed as data (failed outcomes, fallback reasons) instead.

use thiserror::Error;

/// Invalid option values detected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("min_size ({min}) must not exceed max_size ({max})")]
    InvalidBounds { min: u32, max: u32 },

    #[error("initial_size ({initial}) is outside [{min}, {max}]")]
    InitialOutOfBounds { initial: u32, min: u32, max: u32 },

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl ConfigError {
    pub(crate) const fn out_of_range(field: &'static str, value: f64, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value,
            expected,
        }
    }
}

/// The outcome set handed to assembly is not a contiguous `0..N` range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("chunk {0} is missing from the outcome set")]
    MissingChunk(u32),

    #[error("chunk {0} appears more than once in the outcome set")]
    DuplicateChunk(u32),
}
