//! Tokenization: running a `char` rule graph across a whole input.
//!
//! The tokenizer applies the graph's root rule repeatedly from offset zero,
//! advancing by each match's consumed length. Positions where nothing matches
//! are collected into lexical error spans; a contiguous run of unmatched
//! characters becomes ONE error, closed as soon as matching resumes. One error
//! per bad character would drown real diagnostics in noise.

use crate::annotation::{Annotation, Range};
use crate::errors::WeftError;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;

/// The tokenizer's output: token annotations in input order plus the
/// coalesced lexical error spans.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    text: Vec<char>,
    pub tokens: Vec<Annotation>,
    pub errors: Vec<Range>,
}

impl TokenStream {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The rule-id sequence the grammar layer parses over.
    pub fn ids(&self) -> Vec<usize> {
        self.tokens.iter().map(|t| t.rule.0).collect()
    }

    /// The source text covered by a range, for diagnostics and dumps.
    pub fn text_of(&self, range: Range) -> String {
        let end = range.end().min(self.text.len());
        let start = range.start.min(end);
        self.text[start..end].iter().collect()
    }

    pub fn source(&self) -> &[char] {
        &self.text
    }
}

/// A rule graph specialized to `char` input, wrapped with the scan loop.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    graph: RuleGraph<char>,
}

impl Tokenizer {
    pub fn new(graph: RuleGraph<char>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &RuleGraph<char> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RuleGraph<char> {
        &mut self.graph
    }

    /// Scans the whole input. Lexical errors are recoverable and land in the
    /// stream and the log; only engine faults (fatal rules, recursion limit)
    /// surface as `Err`.
    pub fn tokenize(&self, input: &str, log: &mut DiagnosticLog) -> Result<TokenStream, WeftError> {
        let text: Vec<char> = input.chars().collect();
        let mut stream = TokenStream {
            text,
            tokens: Vec::new(),
            errors: Vec::new(),
        };

        let mut pos = 0;
        let mut error_start: Option<usize> = None;
        while pos < stream.text.len() {
            let result = self.graph.parse(&stream.text, pos, log)?;
            // a zero-length match cannot advance the scan, so it is treated
            // as an unrecognized position
            if result.matched && result.length > 0 {
                close_error_span(&mut stream, &mut error_start, pos, log);
                stream.tokens.extend(result.annotations);
                pos += result.length;
            } else {
                if error_start.is_none() {
                    error_start = Some(pos);
                }
                pos += 1;
            }
        }
        close_error_span(&mut stream, &mut error_start, pos, log);

        Ok(stream)
    }
}

fn close_error_span(
    stream: &mut TokenStream,
    error_start: &mut Option<usize>,
    pos: usize,
    log: &mut DiagnosticLog,
) {
    if let Some(start) = error_start.take() {
        let range = Range::new(start, pos - start);
        log.error(
            format!("unrecognized input '{}'", stream.text_of(range)),
            Some(range),
        );
        stream.errors.push(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{OutputPolicy, Rule};

    /// Recognizes letter runs and spaces; spaces are voided.
    fn letters() -> Tokenizer {
        let mut g: RuleGraph<char> = RuleGraph::new();
        g.register(
            Rule::one_or_more(Rule::range('a', 'z'))
                .named("word")
                .with_policy(OutputPolicy::Root),
        )
        .unwrap();
        g.register(
            Rule::one_or_more(Rule::text(" "))
                .named("space")
                .with_policy(OutputPolicy::Void),
        )
        .unwrap();
        g.register(
            Rule::one_of(vec!["word".into(), "space".into()]).named("token"),
        )
        .unwrap();
        g.resolve().unwrap();
        g.set_root("token").unwrap();
        Tokenizer::new(g)
    }

    #[test]
    fn tokenizes_words_and_voids_spaces() {
        let mut log = DiagnosticLog::new();
        let stream = letters().tokenize("foo bar", &mut log).unwrap();
        assert_eq!(stream.len(), 2);
        assert!(!stream.has_errors());
        assert_eq!(stream.text_of(stream.tokens[0].range), "foo");
        assert_eq!(stream.text_of(stream.tokens[1].range), "bar");
    }

    #[test]
    fn coalesces_contiguous_unmatched_runs() {
        let mut log = DiagnosticLog::new();
        let stream = letters().tokenize("ba--r", &mut log).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.errors, vec![Range::new(2, 2)]);
        assert_eq!(log.problems().count(), 1);
    }

    #[test]
    fn separate_runs_stay_separate_errors() {
        let mut log = DiagnosticLog::new();
        let stream = letters().tokenize("-ab-+cd-", &mut log).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(
            stream.errors,
            vec![Range::new(0, 1), Range::new(3, 2), Range::new(7, 1)]
        );
    }

    #[test]
    fn empty_input_is_an_empty_stream() {
        let mut log = DiagnosticLog::new();
        let stream = letters().tokenize("", &mut log).unwrap();
        assert!(stream.is_empty());
        assert!(!stream.has_errors());
    }
}
