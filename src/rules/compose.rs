//! Composition rules: sequence, ordered choice, and bounded repetition.

use crate::annotation::{ParseResult, Range};
use crate::errors::{engine_error, ErrorKind, WeftError};
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::rules::{Rule, RuleElem, RuleRef};

/// Every sub-rule must match contiguously from the offset. Fails on the first
/// sub-rule failure with nothing consumed; the failing position is noted in
/// the log for diagnostics.
pub(crate) fn match_sequence<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    subs: &[RuleRef<T>],
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let mut length = 0;
    let mut children = Vec::new();

    for (index, sub) in subs.iter().enumerate() {
        let result = graph.eval_ref(sub, input, at + length, log, depth + 1)?;
        if !result.matched {
            log.debug(
                format!(
                    "sequence '{}' failed at sub-rule {} of {}",
                    rule.describe(),
                    index,
                    subs.len()
                ),
                Some(Range::new(at + length, 0)),
            );
            return Ok(ParseResult::failure());
        }
        length += result.length;
        children.extend(result.annotations);
    }

    Ok(ParseResult::success(
        length,
        rule.produce(at, length, children),
    ))
}

/// Options are tried in declaration order; the first success wins. There is no
/// backtracking into an already-chosen option: grammar authors resolve
/// ambiguity through ordering.
pub(crate) fn match_one_of<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    options: &[RuleRef<T>],
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    for option in options {
        let result = graph.eval_ref(option, input, at, log, depth + 1)?;
        if result.matched {
            return Ok(ParseResult::success(
                result.length,
                rule.produce(at, result.length, result.annotations),
            ));
        }
    }
    Ok(ParseResult::failure())
}

/// Greedy repetition. Succeeds when the repeat count reaches `min`; stops at
/// `max` (zero meaning unbounded) or on the first failure.
///
/// A zero-length successful repetition under an unbounded `max` would never
/// terminate, so it faults instead of looping.
pub(crate) fn match_count<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    sub: &RuleRef<T>,
    min: usize,
    max: usize,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let mut reps = 0;
    let mut length = 0;
    let mut children = Vec::new();

    loop {
        if max > 0 && reps == max {
            break;
        }
        let result = graph.eval_ref(sub, input, at + length, log, depth + 1)?;
        if !result.matched {
            break;
        }
        if result.length == 0 && max == 0 {
            return Err(engine_error(
                ErrorKind::ZeroLengthRepeat {
                    rule: rule.describe(),
                },
                Range::new(at + length, 0),
            ));
        }
        reps += 1;
        length += result.length;
        children.extend(result.annotations);
    }

    if reps >= min {
        Ok(ParseResult::success(
            length,
            rule.produce(at, length, children),
        ))
    } else {
        Ok(ParseResult::failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;
    use crate::rules::OutputPolicy;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn graph() -> RuleGraph<char> {
        RuleGraph::new()
    }

    #[test]
    fn sequence_matches_contiguously() {
        let rule = Rule::sequence(vec![Rule::text("a").into(), Rule::text("bc").into()])
            .with_policy(OutputPolicy::Emit);
        let mut log = DiagnosticLog::new();
        let result = graph()
            .parse_with(&rule, &chars("abc"), 0, &mut log)
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 3);
        assert_eq!(result.annotations[0].children.len(), 2);
    }

    #[test]
    fn sequence_fails_without_partial_commit() {
        let rule: Rule<char> =
            Rule::sequence(vec![Rule::text("a").into(), Rule::text("z").into()]);
        let mut log = DiagnosticLog::new();
        let result = graph()
            .parse_with(&rule, &chars("abc"), 0, &mut log)
            .unwrap();
        assert!(!result.matched);
        assert_eq!(result.length, 0);
        assert!(result.annotations.is_empty());
    }

    #[test]
    fn one_of_takes_first_match_in_order() {
        // "ab" is listed before "a", so it wins even though both match
        let rule = Rule::one_of(vec![Rule::text("ab").into(), Rule::text("a").into()]);
        let mut log = DiagnosticLog::new();
        let result = graph()
            .parse_with(&rule, &chars("ab"), 0, &mut log)
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 2);
    }

    #[test]
    fn count_respects_bounds() {
        let mut log = DiagnosticLog::new();
        let g = graph();
        let input = chars("aaab");

        let two_plus = Rule::repeat(Rule::text("a"), 2, 0);
        let result = g.parse_with(&two_plus, &input, 0, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 3);

        let four_plus: Rule<char> = Rule::repeat(Rule::text("a"), 4, 0);
        assert!(!g.parse_with(&four_plus, &input, 0, &mut log).unwrap().matched);

        let capped = Rule::repeat(Rule::text("a"), 0, 2);
        assert_eq!(g.parse_with(&capped, &input, 0, &mut log).unwrap().length, 2);
    }

    #[test]
    fn count_zero_zero_always_succeeds() {
        let rule: Rule<char> = Rule::repeat(Rule::text("x"), 0, 0);
        let mut log = DiagnosticLog::new();
        let result = graph()
            .parse_with(&rule, &chars("yyy"), 0, &mut log)
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 0);
    }

    #[test]
    fn unbounded_zero_length_repeat_faults() {
        // not() matches with zero length, so an unbounded repeat of it stalls
        let stalling: Rule<char> = Rule::repeat(Rule::not(Rule::text("z")), 0, 0);
        let mut log = DiagnosticLog::new();
        let err = graph()
            .parse_with(&stalling, &chars("aaa"), 0, &mut log)
            .unwrap_err();
        assert_eq!(err.kind.category(), ErrorCategory::Parse);
    }

    #[test]
    fn bounded_zero_length_repeat_terminates() {
        let bounded: Rule<char> = Rule::repeat(Rule::not(Rule::text("z")), 0, 3);
        let mut log = DiagnosticLog::new();
        let result = graph()
            .parse_with(&bounded, &chars("aaa"), 0, &mut log)
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 0);
    }
}
