//! Grammar parsing: a rule graph over token ids, layered on the tokenizer.
//!
//! Grammar rules match the `usize` id sequence a [`TokenStream`] yields, so
//! their annotation ranges are in token-index space. [`Grammar::source_range`]
//! maps such a range back to character space for diagnostics.

use crate::annotation::{Annotation, ParseResult, Range};
use crate::errors::WeftError;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::tokenizer::{TokenStream, Tokenizer};

#[derive(Debug, Clone)]
pub struct Grammar {
    graph: RuleGraph<usize>,
}

impl Grammar {
    pub fn new(graph: RuleGraph<usize>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &RuleGraph<usize> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RuleGraph<usize> {
        &mut self.graph
    }

    /// Matches the root rule against a raw token-id sequence.
    pub fn parse(
        &self,
        tokens: &[usize],
        log: &mut DiagnosticLog,
    ) -> Result<ParseResult, WeftError> {
        self.graph.parse(tokens, 0, log)
    }

    /// Matches the root rule against a tokenized stream.
    pub fn parse_stream(
        &self,
        stream: &TokenStream,
        log: &mut DiagnosticLog,
    ) -> Result<ParseResult, WeftError> {
        self.parse(&stream.ids(), log)
    }

    /// Maps a token-index range of a grammar annotation back to the character
    /// range it covers in the original input.
    pub fn source_range(stream: &TokenStream, token_range: Range) -> Range {
        if stream.is_empty() || token_range.is_empty() {
            return Range::default();
        }
        let first = token_range.start.min(stream.len() - 1);
        let last = (token_range.end() - 1).min(stream.len() - 1);
        stream.tokens[first].range.merge(&stream.tokens[last].range)
    }
}

/// A tokenizer/grammar pair: the complete pipeline for one language.
#[derive(Debug, Clone)]
pub struct Syntax {
    pub tokenizer: Tokenizer,
    pub grammar: Grammar,
}

impl Syntax {
    pub fn new(tokenizer: Tokenizer, grammar: Grammar) -> Self {
        Self { tokenizer, grammar }
    }

    /// Tokenizes, then grammar-parses. Lexical errors do not stop the
    /// pipeline; they are in the stream and the log for the caller to weigh.
    pub fn parse(
        &self,
        input: &str,
        log: &mut DiagnosticLog,
    ) -> Result<(TokenStream, ParseResult), WeftError> {
        let stream = self.tokenizer.tokenize(input, log)?;
        let result = self.grammar.parse_stream(&stream, log)?;
        Ok((stream, result))
    }

    /// True when the grammar consumed every token of a clean stream.
    pub fn is_complete(stream: &TokenStream, result: &ParseResult) -> bool {
        result.matched && !stream.has_errors() && result.length == stream.len()
    }

    /// The input text covered by a grammar annotation.
    pub fn text_of(stream: &TokenStream, node: &Annotation) -> String {
        stream.text_of(Grammar::source_range(stream, node.range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{OutputPolicy, Rule, RuleId};

    // token ids as the tokenizer would assign them
    const WORD: usize = 0;
    const COMMA: usize = 1;

    fn list_grammar() -> Grammar {
        let mut g: RuleGraph<usize> = RuleGraph::new();
        g.register(Rule::literal(vec![WORD]).named("word")).unwrap();
        g.register(
            Rule::literal(vec![COMMA])
                .named("comma")
                .with_policy(OutputPolicy::Void),
        )
        .unwrap();
        g.register(
            Rule::sequence(vec![
                "word".into(),
                Rule::zero_or_more(Rule::sequence(vec!["comma".into(), "word".into()])).into(),
            ])
            .named("list")
            .with_policy(OutputPolicy::Emit),
        )
        .unwrap();
        g.resolve().unwrap();
        g.set_root("list").unwrap();
        Grammar::new(g)
    }

    #[test]
    fn parses_token_id_sequences() {
        let grammar = list_grammar();
        let mut log = DiagnosticLog::new();

        let result = grammar.parse(&[WORD, COMMA, WORD, COMMA, WORD], &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, 5);

        let root = &result.annotations[0];
        assert_eq!(root.rule, grammar.graph().find("list").unwrap());
        // commas are voided, leaving the three words
        assert_eq!(root.children.len(), 3);
    }

    #[test]
    fn rejects_malformed_sequences() {
        let grammar = list_grammar();
        let mut log = DiagnosticLog::new();
        let result = grammar.parse(&[COMMA, WORD], &mut log).unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn source_range_spans_covered_tokens() {
        let mut stream = TokenStream::default();
        // "ab, cd" tokenized as word(0..2) comma(2..3) word(4..6)
        stream.tokens = vec![
            Annotation::new(RuleId(WORD), Range::new(0, 2)),
            Annotation::new(RuleId(COMMA), Range::new(2, 1)),
            Annotation::new(RuleId(WORD), Range::new(4, 2)),
        ];
        assert_eq!(
            Grammar::source_range(&stream, Range::new(0, 3)),
            Range::new(0, 6)
        );
        assert_eq!(
            Grammar::source_range(&stream, Range::new(2, 1)),
            Range::new(4, 2)
        );
    }
}
