//! Look-ahead rules and symbolic references.
//!
//! `not` and `condition` never consume input; they discard the sub-rule's
//! matched length and report zero. A reference delegates to its target, and
//! its output policy decides whether the target's annotations are wrapped
//! (standalone named rule) or passed through (inlined inside a composition).

use crate::annotation::ParseResult;
use crate::errors::WeftError;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::rules::{Rule, RuleElem, RuleRef};

/// Succeeds iff the sub-rule fails. Zero length always.
pub(crate) fn match_not<T: RuleElem>(
    graph: &RuleGraph<T>,
    sub: &RuleRef<T>,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let result = graph.eval_ref(sub, input, at, log, depth + 1)?;
    if result.matched {
        Ok(ParseResult::failure())
    } else {
        Ok(ParseResult::empty_success())
    }
}

/// Succeeds iff the sub-rule succeeds. Zero length always.
pub(crate) fn match_condition<T: RuleElem>(
    graph: &RuleGraph<T>,
    sub: &RuleRef<T>,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let result = graph.eval_ref(sub, input, at, log, depth + 1)?;
    if result.matched {
        Ok(ParseResult::empty_success())
    } else {
        Ok(ParseResult::failure())
    }
}

/// Transparent delegation to the referenced rule.
pub(crate) fn match_reference<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    target: &RuleRef<T>,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let result = graph.eval_ref(target, input, at, log, depth + 1)?;
    if result.matched {
        Ok(ParseResult::success(
            result.length,
            rule.produce(at, result.length, result.annotations),
        ))
    } else {
        Ok(ParseResult::failure())
    }
}
