//! Spans and annotations: the result currency of every rule match.
//!
//! An `Annotation` is an immutable tagged span produced by a successful match.
//! Annotations form trees via `children`; the roots of those trees are what a
//! top-level parse call returns.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::RuleId;

/// A half-open interval over an input array: `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: usize,
    pub length: usize,
}

impl Range {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// One past the last covered index.
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn contains(&self, other: &Range) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// The smallest range covering both inputs.
    pub fn merge(&self, other: &Range) -> Range {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Range::new(start, end - start)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

/// A span of input tagged with the rule that produced it.
///
/// Children, when present, are ordered by ascending `range.start`. For rules
/// with a transparent output policy the children of a sub-match are flattened
/// into the parent instead of nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub rule: RuleId,
    pub range: Range,
    pub children: Vec<Annotation>,
}

impl Annotation {
    pub fn new(rule: RuleId, range: Range) -> Self {
        Self {
            rule,
            range,
            children: Vec::new(),
        }
    }

    pub fn with_children(rule: RuleId, range: Range, children: Vec<Annotation>) -> Self {
        Self {
            rule,
            range,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first traversal count, including this node.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Annotation::node_count).sum::<usize>()
    }

    /// Renders the tree with rule names supplied by the caller, one node per
    /// line, indented by depth.
    pub fn pretty<F>(&self, name_of: &F) -> String
    where
        F: Fn(RuleId) -> String,
    {
        let mut out = String::new();
        self.pretty_into(name_of, 0, &mut out);
        out
    }

    fn pretty_into<F>(&self, name_of: &F, depth: usize, out: &mut String)
    where
        F: Fn(RuleId) -> String,
    {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&format!("{} {}\n", name_of(self.rule), self.range));
        for child in &self.children {
            child.pretty_into(name_of, depth + 1, out);
        }
    }
}

/// A rule's output contract.
///
/// If `matched` is false the annotation list is empty and `length` is zero;
/// callers must not advance on a failed result. On success `length` is exactly
/// the number of input elements consumed (zero is legal for look-ahead rules).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub matched: bool,
    pub length: usize,
    pub annotations: Vec<Annotation>,
}

impl ParseResult {
    pub fn failure() -> Self {
        Self {
            matched: false,
            length: 0,
            annotations: Vec::new(),
        }
    }

    pub fn success(length: usize, annotations: Vec<Annotation>) -> Self {
        Self {
            matched: true,
            length,
            annotations,
        }
    }

    /// A zero-length success with no annotations (look-ahead rules).
    pub fn empty_success() -> Self {
        Self::success(0, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_end_and_merge() {
        let a = Range::new(2, 3);
        let b = Range::new(4, 4);
        assert_eq!(a.end(), 5);
        assert_eq!(a.merge(&b), Range::new(2, 6));
        assert!(Range::new(0, 10).contains(&a));
        assert!(!a.contains(&b));
    }

    #[test]
    fn annotation_node_count() {
        let leaf = Annotation::new(RuleId(1), Range::new(0, 1));
        let parent =
            Annotation::with_children(RuleId(0), Range::new(0, 2), vec![leaf.clone(), leaf]);
        assert_eq!(parent.node_count(), 3);
    }

    #[test]
    fn failure_has_no_annotations() {
        let result = ParseResult::failure();
        assert!(!result.matched);
        assert!(result.annotations.is_empty());
        assert_eq!(result.length, 0);
    }
}
