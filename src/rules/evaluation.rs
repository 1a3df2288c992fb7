//! Precedence climbing over competing binary-operation rules.
//!
//! Candidates are sibling rules shaped `(left, operator, right)` with declared
//! precedences. The engine matches operations left to right and rebuilds them
//! into a correctly nested tree: when an earlier operation's precedence is
//! greater than or equal to the next one's, the earlier tree becomes the left
//! operand of the next (ties therefore associate to the left); otherwise the
//! next operation nests as the right operand of the earlier one.
//!
//! Internally the pending operations form a right spine held as a stack with
//! strictly increasing precedence from bottom to top, folded into a single
//! tree once no further operation matches at the right edge.

use crate::annotation::{Annotation, ParseResult, Range};
use crate::errors::WeftError;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::rules::{Rule, RuleElem, RuleRef};

pub(crate) fn match_evaluation<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    candidates: &[RuleRef<T>],
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let first = match try_candidates(graph, candidates, input, at, log, depth)? {
        Some(operation) => operation,
        None => return Ok(ParseResult::failure()),
    };

    let mut spine: Vec<Annotation> = vec![first];
    loop {
        let deepest = spine.last().expect("spine is never empty inside the loop");
        let right_start = match deepest.children.last() {
            Some(right) => right.range.start,
            None => break,
        };

        let mut next = match try_candidates(graph, candidates, input, right_start, log, depth)? {
            Some(operation) => operation,
            None => break,
        };
        // each accepted operation must move the right edge forward, otherwise
        // a zero-width operand would pin the climb in place
        let next_right_start = next
            .children
            .last()
            .map(|child| child.range.start)
            .unwrap_or(right_start);
        if next_right_start <= right_start {
            break;
        }

        // consecutive pops fold into one left operand: each popped operation
        // absorbs the tree popped before it as its right operand, so a chain
        // like add-mul collapsing under a second add keeps the mul subtree
        let mut popped: Option<Annotation> = None;
        while let Some(previous) = spine.last() {
            if graph.precedence_of(previous.rule) >= graph.precedence_of(next.rule) {
                let mut previous = spine.pop().expect("just observed via last()");
                if let Some(tree) = popped.take() {
                    replace_last_child(&mut previous, tree);
                }
                popped = Some(previous);
            } else {
                break;
            }
        }
        if let Some(tree) = popped {
            replace_first_child(&mut next, tree);
        }
        spine.push(next);
    }

    while spine.len() > 1 {
        let subtree = spine.pop().expect("len checked above");
        let parent = spine.last_mut().expect("len checked above");
        replace_last_child(parent, subtree);
    }

    let root = spine.pop().expect("spine holds exactly the final tree");
    let length = root.range.end() - at;
    Ok(ParseResult::success(
        length,
        rule.produce(at, length, vec![root]),
    ))
}

/// Tries each candidate operation in declaration order and returns the first
/// that matches with a usable operation shape: one annotation with at least a
/// left and a right operand child.
fn try_candidates<T: RuleElem>(
    graph: &RuleGraph<T>,
    candidates: &[RuleRef<T>],
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<Option<Annotation>, WeftError> {
    for candidate in candidates {
        let result = graph.eval_ref(candidate, input, at, log, depth + 1)?;
        if !result.matched {
            continue;
        }
        if result.annotations.len() == 1 && result.annotations[0].children.len() >= 2 {
            let operation = result
                .annotations
                .into_iter()
                .next()
                .expect("length checked above");
            return Ok(Some(operation));
        }
        log.debug(
            "evaluation candidate matched without an operation shape",
            Some(Range::new(at, 0)),
        );
    }
    Ok(None)
}

/// Absorbs `tree` as the left operand, widening the parent's span.
fn replace_first_child(parent: &mut Annotation, tree: Annotation) {
    let start = parent.range.start.min(tree.range.start);
    let end = parent.range.end().max(tree.range.end());
    parent.range = Range::new(start, end - start);
    parent.children[0] = tree;
}

/// Absorbs `tree` as the right operand, widening the parent's span.
fn replace_last_child(parent: &mut Annotation, tree: Annotation) {
    let start = parent.range.start.min(tree.range.start);
    let end = parent.range.end().max(tree.range.end());
    parent.range = Range::new(start, end - start);
    let last = parent.children.len() - 1;
    parent.children[last] = tree;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{OutputPolicy, RuleId};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// Single-digit arithmetic: `add` binds at 100, `mul` at 200. The
    /// operator literal is voided, so each operation annotation carries
    /// exactly its two operand children.
    fn arithmetic() -> (RuleGraph<char>, RuleId, RuleId, Rule<char>) {
        let mut g: RuleGraph<char> = RuleGraph::new();
        g.register(Rule::range('0', '9').named("num")).unwrap();

        let operation = |op: &str| {
            Rule::sequence(vec![
                "num".into(),
                Rule::text(op).with_policy(OutputPolicy::Void).into(),
                "num".into(),
            ])
            .with_policy(OutputPolicy::Emit)
        };
        let add = g
            .register(operation("+").named("add").with_precedence(100))
            .unwrap();
        let mul = g
            .register(operation("*").named("mul").with_precedence(200))
            .unwrap();
        g.resolve().unwrap();

        let expr = Rule::evaluation(vec!["add".into(), "mul".into()]).named("expr");
        (g, add, mul, expr)
    }

    #[test]
    fn higher_precedence_on_right_nests_as_right_operand() {
        let (g, add, mul, expr) = arithmetic();
        let mut log = DiagnosticLog::new();

        let result = g.parse_with(&expr, &chars("3+5*2"), 0, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 5);

        let root = &result.annotations[0];
        assert_eq!(root.rule, add);
        assert_eq!(root.range, Range::new(0, 5));
        assert_eq!(root.children[1].rule, mul);
        assert_eq!(root.children[1].range, Range::new(2, 3));
    }

    #[test]
    fn higher_precedence_on_left_nests_as_left_operand() {
        let (g, add, mul, expr) = arithmetic();
        let mut log = DiagnosticLog::new();

        let result = g.parse_with(&expr, &chars("3*5+2"), 0, &mut log).unwrap();
        assert!(result.matched);

        let root = &result.annotations[0];
        assert_eq!(root.rule, add);
        assert_eq!(root.children[0].rule, mul);
        assert_eq!(root.children[0].range, Range::new(0, 3));
    }

    #[test]
    fn equal_precedence_ties_associate_left() {
        let (g, add, _, expr) = arithmetic();
        let mut log = DiagnosticLog::new();

        let result = g.parse_with(&expr, &chars("1+2+3"), 0, &mut log).unwrap();
        let root = &result.annotations[0];
        assert_eq!(root.rule, add);
        assert_eq!(root.range, Range::new(0, 5));
        // (1+2) is the left operand of the outer addition
        assert_eq!(root.children[0].rule, add);
        assert_eq!(root.children[0].range, Range::new(0, 3));
    }

    #[test]
    fn descending_after_ascending_keeps_absorbed_subtrees() {
        let (g, add, mul, expr) = arithmetic();
        let mut log = DiagnosticLog::new();

        // 1+2*3+4 nests as ((1 + (2*3)) + 4): the final addition pops both
        // pending operations and must keep the multiplication inside the
        // folded left operand
        let result = g.parse_with(&expr, &chars("1+2*3+4"), 0, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 7);

        let root = &result.annotations[0];
        assert_eq!(root.rule, add);
        assert_eq!(root.range, Range::new(0, 7));
        assert_eq!(root.children.last().unwrap().range, Range::new(6, 1));

        let left = &root.children[0];
        assert_eq!(left.rule, add);
        assert_eq!(left.range, Range::new(0, 5));
        assert_eq!(left.children[1].rule, mul);
        assert_eq!(left.children[1].range, Range::new(2, 3));
    }

    #[test]
    fn single_operation_stands_alone() {
        let (g, add, _, expr) = arithmetic();
        let mut log = DiagnosticLog::new();

        let result = g.parse_with(&expr, &chars("7*"), 0, &mut log).unwrap();
        assert!(!result.matched);

        let result = g.parse_with(&expr, &chars("7+8"), 0, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 3);
        assert_eq!(result.annotations[0].rule, add);
        assert_eq!(result.annotations[0].children.len(), 2);
    }
}
