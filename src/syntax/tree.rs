use serde::{Deserialize, Serialize};
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    /// Lines separated from their neighbours by blank lines.
    Block,
    /// A block that opens with a ``` fence.
    Fence,
    Line,
}

/// A node covering the byte range `start..end` of the parsed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
}

impl Node {
    pub const fn leaf(kind: NodeKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTree {
    pub root: Node,
    pub source_len: usize,
}

impl ParsedTree {
    /// Top-level blocks (including fences).
    pub fn blocks(&self) -> &[Node] {
        &self.root.children
    }

    pub fn block_count(&self) -> usize {
        self.root.children.len()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Approximate heap footprint, used for the cache's memory budget.
    pub fn estimated_bytes(&self) -> usize {
        mem::size_of::<Self>() + self.node_count() * mem::size_of::<Node>()
    }

    /// Slice of `source` covered by `node`.
    ///
    /// Returns `None` if `source` is not the text this tree was parsed from.
    pub fn text_of<'a>(&self, source: &'a str, node: &Node) -> Option<&'a str> {
        if source.len() != self.source_len {
            return None;
        }
        source.get(node.start..node.end)
    }
}
