use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Inputs are chunked, so the cap only guards against runaway pipes.
pub const MAX_INPUT_SIZE: u64 = 64 * 1024 * 1024;

pub struct InputReader;

impl InputReader {
    /// Reads the whole input from `path`, or from stdin when `path` is `None`.
    pub fn read(path: Option<&Path>) -> Result<String> {
        match path {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open file: {}", path.display()))?;
                Self::read_limited(file, &path.display().to_string())
            }
            None => Self::read_limited(io::stdin().lock(), "stdin"),
        }
    }

    fn read_limited(source: impl Read, label: &str) -> Result<String> {
        let mut buffer = Vec::new();
        source
            .take(MAX_INPUT_SIZE + 1)
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read from {label}"))?;

        if buffer.len() as u64 > MAX_INPUT_SIZE {
            bail!(
                "Input from {label} exceeds the maximum allowed size ({} MB)",
                MAX_INPUT_SIZE / 1024 / 1024
            );
        }

        String::from_utf8(buffer).with_context(|| format!("Input from {label} is not valid UTF-8"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "load r1, 4\n\nstore r1").unwrap();

        let content = InputReader::read(Some(temp_file.path())).unwrap();
        assert_eq!(content, "load r1, 4\n\nstore r1");
    }

    #[test]
    fn test_read_nonexistent_file() {
        let err = InputReader::read(Some(Path::new("/nonexistent/input.txt"))).unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }

    #[test]
    fn test_read_unicode() {
        let content = InputReader::read_limited(Cursor::new("こんにちは 🌍".as_bytes()), "test").unwrap();
        assert_eq!(content, "こんにちは 🌍");
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = InputReader::read_limited(Cursor::new(vec![0xff, 0xfe]), "test").unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let source = io::repeat(b'x').take(MAX_INPUT_SIZE + 10);
        let err = InputReader::read_limited(source, "stdin").unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }
}
