//! Diagnostic-emitting rules: recoverable report markers and fatal aborts.

use crate::annotation::{ParseResult, Range};
use crate::errors::{engine_error, ErrorKind, WeftError};
use crate::graph::RuleGraph;
use crate::log::{DiagnosticLog, Severity};
use crate::rules::{Rule, RuleElem, RuleRef};

/// A report rule always matches with zero length, records its message in the
/// log, and emits a marker annotation. It never aborts parsing: the
/// surrounding grammar (typically a skip rule in the same branch) consumes
/// the bad span and recovery continues.
pub(crate) fn match_report<T: RuleElem>(
    rule: &Rule<T>,
    severity: Severity,
    message: &str,
    at: usize,
    log: &mut DiagnosticLog,
) -> ParseResult {
    log.push(severity, message, Some(Range::new(at, 0)));
    ParseResult::success(0, rule.produce(at, 0, Vec::new()))
}

/// A fatal rule is a grammar-authored abort. Without a guard it fires
/// unconditionally when reached; with a guard it fires only when the guard
/// matches, and is an ordinary match failure otherwise. Firing raises an
/// error that unwinds past every recovery rule.
pub(crate) fn match_fatal<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    message: &str,
    guard: Option<&RuleRef<T>>,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    if let Some(guard) = guard {
        let result = graph.eval_ref(guard, input, at, log, depth + 1)?;
        if !result.matched {
            return Ok(ParseResult::failure());
        }
    }
    log.push(
        Severity::Fatal,
        format!("{} (rule '{}')", message, rule.describe()),
        Some(Range::new(at, 0)),
    );
    Err(engine_error(
        ErrorKind::FatalMatch {
            message: message.to_string(),
        },
        Range::new(at, 1.min(input.len().saturating_sub(at))),
    ))
}
