use super::parser::{BlockScanner, is_blank};

/// Chooses content-safe chunk boundaries.
pub trait Splitter: Send + Sync {
    /// Byte offset where the chunk starting at `start` should end.
    ///
    /// `start` is always a previously returned boundary (or 0). The result
    /// lies in `start + 1..=text.len()` whenever `start < text.len()`.
    fn split_point(&self, text: &str, start: usize, target_chars: usize) -> usize;
}

/// Splits only between top-level blocks, never inside a fence or an open
/// bracket.
///
/// Picks the furthest boundary that keeps the chunk within `target_chars`.
/// If the first block alone is larger, the chunk runs to the first boundary
/// after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockSplitter;

impl Splitter for BlockSplitter {
    fn split_point(&self, text: &str, start: usize, target_chars: usize) -> usize {
        let Some(rest) = text.get(start..) else {
            return text.len();
        };

        let mut scanner = BlockScanner::default();
        let mut best: Option<usize> = None;
        let mut seen_content = false;
        let mut after_separator = false;
        let mut chars = 0;
        let mut offset = start;

        for line in rest.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if is_blank(line) && scanner.at_top_level() {
                after_separator = seen_content;
            } else {
                if after_separator {
                    if chars <= target_chars {
                        best = Some(line_start);
                    } else {
                        return best.unwrap_or(line_start);
                    }
                    after_separator = false;
                }
                seen_content = true;
                scanner.feed(line);
            }

            chars += line.chars().count();
        }

        if chars <= target_chars {
            text.len()
        } else {
            best.unwrap_or(text.len())
        }
    }
}
