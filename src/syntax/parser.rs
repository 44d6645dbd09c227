use serde::{Deserialize, Serialize};

use super::tree::{Node, NodeKind, ParsedTree};

/// Result of checking a piece of generated code for structural problems.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub const fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Structural parsing and validation of source text.
///
/// Parsing is total: malformed input still yields a tree, with unclosed
/// constructs running to the end of the text.
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> ParsedTree;

    fn validate(&self, code: &str) -> ValidationReport;
}

/// Blank-line-delimited block parser that understands ``` fences and
/// bracket nesting.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockParser;

impl SourceParser for BlockParser {
    fn parse(&self, source: &str) -> ParsedTree {
        let mut scanner = BlockScanner::default();
        let mut blocks = Vec::new();
        let mut current: Option<Node> = None;
        let mut offset = 0;

        for line in source.split_inclusive('\n') {
            let start = offset;
            offset += line.len();

            if is_blank(line) && scanner.at_top_level() {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                continue;
            }

            let end = start + line.trim_end_matches(['\n', '\r']).len();
            let block = current.get_or_insert_with(|| {
                let kind = if is_fence(line) {
                    NodeKind::Fence
                } else {
                    NodeKind::Block
                };
                Node::leaf(kind, start, end)
            });
            block.end = end;
            block.children.push(Node::leaf(NodeKind::Line, start, end));

            scanner.feed(line);
        }

        if let Some(block) = current {
            blocks.push(block);
        }

        ParsedTree {
            root: Node {
                kind: NodeKind::Document,
                start: 0,
                end: source.len(),
                children: blocks,
            },
            source_len: source.len(),
        }
    }

    fn validate(&self, code: &str) -> ValidationReport {
        let mut errors = Vec::new();
        let mut open: Vec<(char, usize)> = Vec::new();
        let mut fence_opened_at: Option<usize> = None;

        for (line_no, line) in (1..).zip(code.lines()) {
            if is_fence(line) {
                fence_opened_at = match fence_opened_at {
                    Some(_) => None,
                    None => Some(line_no),
                };
                continue;
            }
            if fence_opened_at.is_some() {
                continue;
            }

            for c in code_part(line).chars() {
                match c {
                    '(' | '[' | '{' => open.push((c, line_no)),
                    ')' | ']' | '}' => match open.pop() {
                        Some((opener, _)) if closer_for(opener) == c => {}
                        Some((opener, at)) => errors.push(format!(
                            "line {line_no}: '{c}' does not match '{opener}' opened on line {at}"
                        )),
                        None => errors.push(format!("line {line_no}: unexpected '{c}'")),
                    },
                    _ => {}
                }
            }
        }

        errors.extend(
            open.into_iter()
                .map(|(opener, at)| format!("line {at}: unclosed '{opener}'")),
        );
        if let Some(at) = fence_opened_at {
            errors.push(format!("line {at}: unterminated code fence"));
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Tracks whether the scan position is inside a construct that must not be
/// split (an open fence or an unbalanced bracket).
#[derive(Debug, Default)]
pub(crate) struct BlockScanner {
    depth: usize,
    in_fence: bool,
}

impl BlockScanner {
    pub(crate) const fn at_top_level(&self) -> bool {
        self.depth == 0 && !self.in_fence
    }

    pub(crate) fn feed(&mut self, line: &str) {
        if is_fence(line) {
            self.in_fence = !self.in_fence;
            return;
        }
        if self.in_fence {
            return;
        }
        for c in code_part(line).chars() {
            match c {
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
    }
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// The part of a line before a `;` or `//` comment.
fn code_part(line: &str) -> &str {
    let cut = [line.find(';'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

const fn closer_for(opener: char) -> char {
    match opener {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_blocks_on_blank_lines() {
        let source = "mov a, b\nadd a, 1\n\nret\n";
        let tree = BlockParser.parse(source);

        assert_eq!(tree.block_count(), 2);
        assert_eq!(tree.blocks()[0].children.len(), 2);
        assert_eq!(
            tree.text_of(source, &tree.blocks()[0]),
            Some("mov a, b\nadd a, 1")
        );
        assert_eq!(tree.text_of(source, &tree.blocks()[1]), Some("ret"));
    }

    #[test]
    fn test_parse_keeps_fence_with_blank_lines_together() {
        let source = "intro\n\n```\nline one\n\nline two\n```\n\noutro";
        let tree = BlockParser.parse(source);

        let kinds: Vec<_> = tree.blocks().iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![NodeKind::Block, NodeKind::Fence, NodeKind::Block]);
        assert_eq!(tree.blocks()[1].children.len(), 5);
    }

    #[test]
    fn test_parse_keeps_open_brackets_together() {
        let source = "fn main() {\n    a();\n\n    b();\n}\n\nnext";
        let tree = BlockParser.parse(source);

        assert_eq!(tree.block_count(), 2);
        assert_eq!(tree.text_of(source, &tree.blocks()[1]), Some("next"));
    }

    #[test]
    fn test_parse_ignores_brackets_in_comments() {
        let source = "mov a, b ; (unbalanced\n\nret";
        let tree = BlockParser.parse(source);
        assert_eq!(tree.block_count(), 2);
    }

    #[test]
    fn test_parse_empty_source() {
        let tree = BlockParser.parse("");
        assert_eq!(tree.block_count(), 0);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.estimated_bytes() > 0);
    }

    #[test]
    fn test_text_of_rejects_foreign_source() {
        let tree = BlockParser.parse("abc");
        assert_eq!(tree.text_of("abcd", &tree.root), None);
    }

    #[test]
    fn test_validate_balanced_code() {
        let report = BlockParser.validate("call f(x, [y])\n{ ret }\n");
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_validate_reports_unclosed_and_mismatched() {
        let report = BlockParser.validate("f(a]\n{\n");
        assert!(!report.valid);
        assert!(report.errors[0].contains("does not match '('"));
        assert!(report.errors.iter().any(|e| e.contains("unclosed '{'")));
    }

    #[test]
    fn test_validate_reports_unterminated_fence() {
        let report = BlockParser.validate("```\n(\n");
        assert_eq!(report.errors, vec!["line 1: unterminated code fence"]);
    }

    #[test]
    fn test_validate_unexpected_closer() {
        let report = BlockParser.validate("ret)\n");
        assert_eq!(report.errors, vec!["line 1: unexpected ')'"]);
    }
}
