//! Forward-scanning skip rules, the error-recovery workhorse.
//!
//! A skip rule advances one element at a time until its trigger matches.
//! `find` fails when the trigger never appears; `stop_at` and `stop_after`
//! treat end of input as an ordinary stop. Only `stop_after` consumes the
//! trigger, so only it surfaces the trigger's annotations.

use crate::annotation::ParseResult;
use crate::errors::WeftError;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::rules::{Rule, RuleElem, RuleRef, SkipPolicy};

pub(crate) fn match_skip<T: RuleElem>(
    graph: &RuleGraph<T>,
    rule: &Rule<T>,
    trigger: &RuleRef<T>,
    policy: SkipPolicy,
    input: &[T],
    at: usize,
    log: &mut DiagnosticLog,
    depth: usize,
) -> Result<ParseResult, WeftError> {
    let mut pos = at;
    loop {
        let result = graph.eval_ref(trigger, input, pos, log, depth + 1)?;
        if result.matched {
            let (length, children) = match policy {
                SkipPolicy::Find | SkipPolicy::StopAt => (pos - at, Vec::new()),
                SkipPolicy::StopAfter => (pos - at + result.length, result.annotations),
            };
            return Ok(ParseResult::success(
                length,
                rule.produce(at, length, children),
            ));
        }
        if pos >= input.len() {
            return Ok(match policy {
                SkipPolicy::Find => ParseResult::failure(),
                SkipPolicy::StopAt | SkipPolicy::StopAfter => {
                    let length = pos - at;
                    ParseResult::success(length, rule.produce(at, length, Vec::new()))
                }
            });
        }
        pos += 1;
    }
}
