use serde::Serialize;

use super::chunk::ChunkOutcome;
use crate::error::AssemblyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Placed between consecutive blocks.
    pub separator: String,
    /// Line-comment prefix of the output language.
    pub comment_prefix: String,
    /// Put a comment where a failed chunk would have been.
    pub include_failed_markers: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            separator: "\n\n".to_string(),
            comment_prefix: ";".to_string(),
            include_failed_markers: true,
        }
    }
}

/// The final output of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub text: String,
    pub chunk_count: u32,
    pub failed: Vec<u32>,
    /// Warnings from every chunk, prefixed with the chunk index.
    pub warnings: Vec<String>,
}

impl Artifact {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Joins outcomes in index order.
///
/// The input may arrive in any order but must cover `0..N` exactly once.
pub fn assemble(outcomes: &[ChunkOutcome], options: &AssemblyOptions) -> Result<Artifact, AssemblyError> {
    let mut ordered: Vec<&ChunkOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|outcome| outcome.index);

    for (expected, outcome) in ordered.iter().enumerate() {
        let expected = expected as u32;
        if outcome.index < expected {
            return Err(AssemblyError::DuplicateChunk(outcome.index));
        }
        if outcome.index > expected {
            return Err(AssemblyError::MissingChunk(expected));
        }
    }

    let mut blocks = Vec::with_capacity(ordered.len());
    let mut failed = Vec::new();
    let mut warnings = Vec::new();

    for outcome in ordered {
        warnings.extend(
            outcome
                .warnings
                .iter()
                .map(|w| format!("chunk {}: {w}", outcome.index)),
        );

        if outcome.success {
            let block = outcome.code.trim_end();
            if !block.is_empty() {
                blocks.push(block.to_string());
            }
        } else {
            failed.push(outcome.index);
            if options.include_failed_markers {
                let reason = outcome
                    .errors
                    .first()
                    .map_or("unknown error", String::as_str);
                blocks.push(format!(
                    "{} chunk {} failed: {}",
                    options.comment_prefix,
                    outcome.index,
                    reason.lines().next().unwrap_or_default()
                ));
            }
        }
    }

    let mut text = blocks.join(&options.separator);
    if !text.is_empty() {
        text.push('\n');
    }

    Ok(Artifact {
        text,
        chunk_count: outcomes.len() as u32,
        failed,
        warnings,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::translation::BlockTranslation;

    fn ok(index: u32, code: &str) -> ChunkOutcome {
        ChunkOutcome::from_translation(index, BlockTranslation::success(code), 1.0)
    }

    #[test]
    fn test_joins_in_index_order() {
        let outcomes = vec![ok(1, "(b)\n\n"), ok(0, "(a)  "), ok(2, "(c)")];
        let artifact = assemble(&outcomes, &AssemblyOptions::default()).unwrap();
        assert_eq!(artifact.text, "(a)\n\n(b)\n\n(c)\n");
        assert_eq!(artifact.chunk_count, 3);
        assert!(artifact.is_complete());
    }

    #[test]
    fn test_failed_chunk_gets_marker() {
        let outcomes = vec![
            ok(0, "(a)"),
            ChunkOutcome::failed(1, "backend timeout\nretry later"),
        ];
        let artifact = assemble(&outcomes, &AssemblyOptions::default()).unwrap();
        assert_eq!(artifact.text, "(a)\n\n; chunk 1 failed: backend timeout\n");
        assert_eq!(artifact.failed, vec![1]);

        let options = AssemblyOptions {
            include_failed_markers: false,
            ..AssemblyOptions::default()
        };
        let artifact = assemble(&outcomes, &options).unwrap();
        assert_eq!(artifact.text, "(a)\n");
    }

    #[test]
    fn test_gaps_and_duplicates_are_rejected() {
        let gap = vec![ok(0, "a"), ok(2, "c")];
        assert_eq!(
            assemble(&gap, &AssemblyOptions::default()),
            Err(AssemblyError::MissingChunk(1))
        );

        let dup = vec![ok(0, "a"), ok(1, "b"), ok(1, "b")];
        assert_eq!(
            assemble(&dup, &AssemblyOptions::default()),
            Err(AssemblyError::DuplicateChunk(1))
        );
    }

    #[test]
    fn test_warnings_are_labelled() {
        let mut outcome = ok(0, "a");
        outcome.warnings.push("line 1: unclosed '('".to_string());
        let artifact = assemble(&[outcome], &AssemblyOptions::default()).unwrap();
        assert_eq!(artifact.warnings, vec!["chunk 0: line 1: unclosed '('"]);
    }

    #[test]
    fn test_empty_input_gives_empty_artifact() {
        let artifact = assemble(&[], &AssemblyOptions::default()).unwrap();
        assert!(artifact.text.is_empty());
        assert_eq!(artifact.chunk_count, 0);
    }
}
