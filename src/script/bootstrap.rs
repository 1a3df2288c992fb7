//! The fixed syntax the script compiler bootstraps from.
//!
//! Scripts are themselves tokenized and parsed by the engine, so the script
//! language's own tokenizer and grammar are built here programmatically, once
//! per process. The token and node id structs give the AST lifter stable
//! handles into the two graphs.

use once_cell::sync::Lazy;

use crate::grammar::Grammar;
use crate::graph::RuleGraph;
use crate::rules::{OutputPolicy, Rule, RuleElem, RuleId};
use crate::tokenizer::Tokenizer;

/// Static construction cannot fail; a failure here is a bug in this module.
const WELL_FORMED: &str = "bootstrap script syntax is statically well-formed";

pub static BOOTSTRAP: Lazy<BootstrapSyntax> = Lazy::new(BootstrapSyntax::build);

/// Token rule ids of the script tokenizer.
#[derive(Debug, Clone, Copy)]
pub struct ScriptTokens {
    pub identifier: RuleId,
    pub number: RuleId,
    pub literal: RuleId,
    pub charset: RuleId,
    pub eq: RuleId,
    pub semi: RuleId,
    pub pipe: RuleId,
    pub comma: RuleId,
    pub bang: RuleId,
    pub star: RuleId,
    pub plus: RuleId,
    pub question: RuleId,
    pub lparen: RuleId,
    pub rparen: RuleId,
    pub prune_root: RuleId,
    pub prune_children: RuleId,
    pub prune_all: RuleId,
    pub kw_include: RuleId,
    pub kw_find: RuleId,
    pub kw_stop_at: RuleId,
    pub kw_stop_after: RuleId,
    pub kw_fatal: RuleId,
    pub kw_if: RuleId,
    pub kw_eval: RuleId,
    pub kw_error: RuleId,
    pub kw_warning: RuleId,
}

/// Grammar rule ids the AST lifter dispatches on.
#[derive(Debug, Clone, Copy)]
pub struct ScriptNodes {
    pub script: RuleId,
    pub include_decl: RuleId,
    pub rule_decl: RuleId,
    pub alternation: RuleId,
    pub sequence_expr: RuleId,
    pub term: RuleId,
    pub find_expr: RuleId,
    pub stop_at_expr: RuleId,
    pub stop_after_expr: RuleId,
    pub fatal_expr: RuleId,
    pub eval_expr: RuleId,
    pub error_expr: RuleId,
    pub warning_expr: RuleId,
    pub identifier: RuleId,
    pub number: RuleId,
    pub literal: RuleId,
    pub charset: RuleId,
    pub bang: RuleId,
    pub if_marker: RuleId,
    pub star: RuleId,
    pub plus: RuleId,
    pub question: RuleId,
    pub prune_root: RuleId,
    pub prune_children: RuleId,
    pub prune_all: RuleId,
}

pub struct BootstrapSyntax {
    pub tokenizer: Tokenizer,
    pub grammar: Grammar,
    pub tokens: ScriptTokens,
    pub nodes: ScriptNodes,
}

fn register<T: RuleElem>(graph: &mut RuleGraph<T>, rule: Rule<T>) -> RuleId {
    graph.register(rule).expect(WELL_FORMED)
}

/// A keyword token: the literal text, not followed by a word character.
fn keyword(text: &str) -> Rule<char> {
    Rule::sequence(vec![Rule::text(text).into(), Rule::not("word_char").into()])
        .with_policy(OutputPolicy::Root)
        .named(text)
}

fn punct(text: &str, name: &str) -> Rule<char> {
    Rule::text(text).with_policy(OutputPolicy::Root).named(name)
}

impl BootstrapSyntax {
    fn build() -> Self {
        let (tokenizer, tokens) = script_tokenizer();
        let (grammar, nodes) = script_grammar(&tokens);
        Self {
            tokenizer,
            grammar,
            tokens,
            nodes,
        }
    }
}

fn script_tokenizer() -> (Tokenizer, ScriptTokens) {
    let mut g: RuleGraph<char> = RuleGraph::new();

    // shared helpers, referenced by name below
    register(
        &mut g,
        Rule::one_of(vec![
            Rule::range('a', 'z').into(),
            Rule::range('A', 'Z').into(),
            Rule::range('0', '9').into(),
            Rule::text("_").into(),
        ])
        .named("word_char"),
    );
    register(
        &mut g,
        Rule::sequence(vec![Rule::text("\\").into(), Rule::any().into()]).named("escaped_char"),
    );

    register(
        &mut g,
        Rule::one_or_more(Rule::chars(" \t\r\n"))
            .named("ws")
            .with_policy(OutputPolicy::Void),
    );
    register(
        &mut g,
        Rule::sequence(vec![
            Rule::text("//").into(),
            Rule::zero_or_more(Rule::sequence(vec![
                Rule::not(Rule::text("\n")).into(),
                Rule::any().into(),
            ]))
            .into(),
        ])
        .named("comment")
        .with_policy(OutputPolicy::Void),
    );

    let kw_include = register(&mut g, keyword("include"));
    let kw_find = register(&mut g, keyword("find"));
    let kw_stop_after = register(&mut g, keyword("stop_after"));
    let kw_stop_at = register(&mut g, keyword("stop_at"));
    let kw_fatal = register(&mut g, keyword("fatal"));
    let kw_if = register(&mut g, keyword("if"));
    let kw_eval = register(&mut g, keyword("eval"));
    let kw_error = register(&mut g, keyword("error"));
    let kw_warning = register(&mut g, keyword("warning"));

    let identifier = register(
        &mut g,
        Rule::sequence(vec![
            Rule::one_of(vec![
                Rule::range('a', 'z').into(),
                Rule::range('A', 'Z').into(),
                Rule::text("_").into(),
            ])
            .into(),
            Rule::zero_or_more("word_char").into(),
        ])
        .named("identifier")
        .with_policy(OutputPolicy::Root),
    );
    let number = register(
        &mut g,
        Rule::one_or_more(Rule::range('0', '9'))
            .named("number")
            .with_policy(OutputPolicy::Root),
    );

    // quoted literal bodies: escapes are one branch so a backslash can never
    // terminate the literal early
    let quoted = |quote: &str, exclude: &str, name: &str| {
        Rule::sequence(vec![
            Rule::text(quote).into(),
            Rule::zero_or_more(Rule::one_of(vec![
                "escaped_char".into(),
                Rule::sequence(vec![
                    Rule::not(Rule::chars(exclude)).into(),
                    Rule::any().into(),
                ])
                .into(),
            ]))
            .into(),
            Rule::text(quote).into(),
        ])
        .named(name)
    };
    register(&mut g, quoted("'", "'\\", "single_quoted"));
    register(&mut g, quoted("\"", "\"\\", "double_quoted"));
    let literal = register(
        &mut g,
        Rule::one_of(vec!["single_quoted".into(), "double_quoted".into()])
            .named("literal")
            .with_policy(OutputPolicy::Root),
    );
    let charset = register(
        &mut g,
        Rule::sequence(vec![
            Rule::text("{").into(),
            Rule::zero_or_more(Rule::one_of(vec![
                "escaped_char".into(),
                Rule::sequence(vec![
                    Rule::not(Rule::chars("}\\")).into(),
                    Rule::any().into(),
                ])
                .into(),
            ]))
            .into(),
            Rule::text("}").into(),
        ])
        .named("charset")
        .with_policy(OutputPolicy::Root),
    );

    let prune_root = register(&mut g, punct("-r", "prune_root"));
    let prune_children = register(&mut g, punct("-c", "prune_children"));
    let prune_all = register(&mut g, punct("-a", "prune_all"));
    let eq = register(&mut g, punct("=", "eq"));
    let semi = register(&mut g, punct(";", "semi"));
    let pipe = register(&mut g, punct("|", "pipe"));
    let comma = register(&mut g, punct(",", "comma"));
    let bang = register(&mut g, punct("!", "bang"));
    let star = register(&mut g, punct("*", "star"));
    let plus = register(&mut g, punct("+", "plus"));
    let question = register(&mut g, punct("?", "question"));
    let lparen = register(&mut g, punct("(", "lparen"));
    let rparen = register(&mut g, punct(")", "rparen"));

    register(
        &mut g,
        Rule::one_of(vec![
            "ws".into(),
            "comment".into(),
            "include".into(),
            "find".into(),
            "stop_after".into(),
            "stop_at".into(),
            "fatal".into(),
            "if".into(),
            "eval".into(),
            "error".into(),
            "warning".into(),
            "identifier".into(),
            "number".into(),
            "literal".into(),
            "charset".into(),
            "prune_root".into(),
            "prune_children".into(),
            "prune_all".into(),
            "eq".into(),
            "semi".into(),
            "pipe".into(),
            "comma".into(),
            "bang".into(),
            "star".into(),
            "plus".into(),
            "question".into(),
            "lparen".into(),
            "rparen".into(),
        ])
        .named("token"),
    );
    g.resolve().expect(WELL_FORMED);
    g.set_root("token").expect(WELL_FORMED);

    let tokens = ScriptTokens {
        identifier,
        number,
        literal,
        charset,
        eq,
        semi,
        pipe,
        comma,
        bang,
        star,
        plus,
        question,
        lparen,
        rparen,
        prune_root,
        prune_children,
        prune_all,
        kw_include,
        kw_find,
        kw_stop_at,
        kw_stop_after,
        kw_fatal,
        kw_if,
        kw_eval,
        kw_error,
        kw_warning,
    };
    (Tokenizer::new(g), tokens)
}

/// A grammar rule matching one token by id. Visible wrappers emit their own
/// annotation for the lifter; structural tokens are voided at the use site.
fn tok(id: RuleId) -> Rule<usize> {
    Rule::literal(vec![id.0])
}

fn voided(id: RuleId, name: &str) -> Rule<usize> {
    tok(id).with_policy(OutputPolicy::Void).named(name)
}

fn script_grammar(t: &ScriptTokens) -> (Grammar, ScriptNodes) {
    let mut g: RuleGraph<usize> = RuleGraph::new();

    let identifier = register(&mut g, tok(t.identifier).named("t_identifier"));
    let number = register(&mut g, tok(t.number).named("t_number"));
    let literal = register(&mut g, tok(t.literal).named("t_literal"));
    let charset = register(&mut g, tok(t.charset).named("t_charset"));
    let bang = register(&mut g, tok(t.bang).named("t_bang"));
    let if_marker = register(&mut g, tok(t.kw_if).named("t_if"));
    let star = register(&mut g, tok(t.star).named("t_star"));
    let plus = register(&mut g, tok(t.plus).named("t_plus"));
    let question = register(&mut g, tok(t.question).named("t_question"));
    let prune_root = register(&mut g, tok(t.prune_root).named("t_prune_root"));
    let prune_children = register(&mut g, tok(t.prune_children).named("t_prune_children"));
    let prune_all = register(&mut g, tok(t.prune_all).named("t_prune_all"));

    register(&mut g, voided(t.eq, "t_eq"));
    register(&mut g, voided(t.semi, "t_semi"));
    register(&mut g, voided(t.pipe, "t_pipe"));
    register(&mut g, voided(t.comma, "t_comma"));
    register(&mut g, voided(t.lparen, "t_lparen"));
    register(&mut g, voided(t.rparen, "t_rparen"));
    register(&mut g, voided(t.kw_include, "t_include"));
    register(&mut g, voided(t.kw_find, "t_find"));
    register(&mut g, voided(t.kw_stop_at, "t_stop_at"));
    register(&mut g, voided(t.kw_stop_after, "t_stop_after"));
    register(&mut g, voided(t.kw_fatal, "t_fatal"));
    register(&mut g, voided(t.kw_if, "t_if_guard"));
    register(&mut g, voided(t.kw_eval, "t_eval"));
    register(&mut g, voided(t.kw_error, "t_error"));
    register(&mut g, voided(t.kw_warning, "t_warning"));

    let include_decl = register(
        &mut g,
        Rule::sequence(vec!["t_include".into(), "t_literal".into(), "t_semi".into()])
            .named("include_decl")
            .with_policy(OutputPolicy::Emit),
    );
    register(
        &mut g,
        Rule::one_of(vec![
            "t_prune_root".into(),
            "t_prune_children".into(),
            "t_prune_all".into(),
        ])
        .named("prune"),
    );
    let rule_decl = register(
        &mut g,
        Rule::sequence(vec![
            Rule::optional("prune").into(),
            "t_identifier".into(),
            Rule::optional("t_number").into(),
            "t_eq".into(),
            "alternation".into(),
            "t_semi".into(),
        ])
        .named("rule_decl")
        .with_policy(OutputPolicy::Emit),
    );

    let alternation = register(
        &mut g,
        Rule::sequence(vec![
            "sequence_expr".into(),
            Rule::zero_or_more(Rule::sequence(vec![
                "t_pipe".into(),
                "sequence_expr".into(),
            ]))
            .into(),
        ])
        .named("alternation")
        .with_policy(OutputPolicy::Emit),
    );
    let sequence_expr = register(
        &mut g,
        Rule::sequence(vec![
            "term".into(),
            Rule::zero_or_more(Rule::sequence(vec!["t_comma".into(), "term".into()])).into(),
        ])
        .named("sequence_expr")
        .with_policy(OutputPolicy::Emit),
    );
    let term = register(
        &mut g,
        Rule::sequence(vec![
            Rule::optional(Rule::one_of(vec!["t_bang".into(), "t_if".into()])).into(),
            "atom".into(),
            Rule::optional(Rule::one_of(vec![
                "t_star".into(),
                "t_plus".into(),
                "t_question".into(),
            ]))
            .into(),
        ])
        .named("term")
        .with_policy(OutputPolicy::Emit),
    );

    let find_expr = register(
        &mut g,
        Rule::sequence(vec!["t_find".into(), "atom".into()])
            .named("find_expr")
            .with_policy(OutputPolicy::Emit),
    );
    let stop_at_expr = register(
        &mut g,
        Rule::sequence(vec!["t_stop_at".into(), "atom".into()])
            .named("stop_at_expr")
            .with_policy(OutputPolicy::Emit),
    );
    let stop_after_expr = register(
        &mut g,
        Rule::sequence(vec!["t_stop_after".into(), "atom".into()])
            .named("stop_after_expr")
            .with_policy(OutputPolicy::Emit),
    );
    let fatal_expr = register(
        &mut g,
        Rule::sequence(vec![
            "t_fatal".into(),
            "t_literal".into(),
            Rule::optional(Rule::sequence(vec!["t_if_guard".into(), "atom".into()])).into(),
        ])
        .named("fatal_expr")
        .with_policy(OutputPolicy::Emit),
    );
    let eval_expr = register(
        &mut g,
        Rule::sequence(vec![
            "t_eval".into(),
            "t_lparen".into(),
            "t_identifier".into(),
            Rule::zero_or_more(Rule::sequence(vec![
                "t_pipe".into(),
                "t_identifier".into(),
            ]))
            .into(),
            "t_rparen".into(),
        ])
        .named("eval_expr")
        .with_policy(OutputPolicy::Emit),
    );
    let error_expr = register(
        &mut g,
        Rule::sequence(vec!["t_error".into(), "t_literal".into()])
            .named("error_expr")
            .with_policy(OutputPolicy::Emit),
    );
    let warning_expr = register(
        &mut g,
        Rule::sequence(vec!["t_warning".into(), "t_literal".into()])
            .named("warning_expr")
            .with_policy(OutputPolicy::Emit),
    );

    register(
        &mut g,
        Rule::sequence(vec!["t_lparen".into(), "alternation".into(), "t_rparen".into()])
            .named("group"),
    );
    // keyword forms before the bare identifier, literals first
    register(
        &mut g,
        Rule::one_of(vec![
            "t_literal".into(),
            "t_charset".into(),
            "group".into(),
            "find_expr".into(),
            "stop_at_expr".into(),
            "stop_after_expr".into(),
            "fatal_expr".into(),
            "eval_expr".into(),
            "error_expr".into(),
            "warning_expr".into(),
            "t_identifier".into(),
        ])
        .named("atom"),
    );

    register(
        &mut g,
        Rule::one_of(vec!["include_decl".into(), "rule_decl".into()]).named("item"),
    );
    let script = register(
        &mut g,
        Rule::zero_or_more("item")
            .named("script")
            .with_policy(OutputPolicy::Emit),
    );

    g.resolve().expect(WELL_FORMED);
    g.set_root_id(script);

    let nodes = ScriptNodes {
        script,
        include_decl,
        rule_decl,
        alternation,
        sequence_expr,
        term,
        find_expr,
        stop_at_expr,
        stop_after_expr,
        fatal_expr,
        eval_expr,
        error_expr,
        warning_expr,
        identifier,
        number,
        literal,
        charset,
        bang,
        if_marker,
        star,
        plus,
        question,
        prune_root,
        prune_children,
        prune_all,
    };
    (Grammar::new(g), nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::DiagnosticLog;

    #[test]
    fn tokenizes_a_declaration() {
        let b = &*BOOTSTRAP;
        let mut log = DiagnosticLog::new();
        let stream = b
            .tokenizer
            .tokenize("-c word = {'a'..'z'}+; // letters", &mut log)
            .unwrap();
        assert!(!stream.has_errors());
        let kinds: Vec<RuleId> = stream.tokens.iter().map(|t| t.rule).collect();
        assert_eq!(
            kinds,
            vec![
                b.tokens.prune_children,
                b.tokens.identifier,
                b.tokens.eq,
                b.tokens.charset,
                b.tokens.plus,
                b.tokens.semi,
            ]
        );
    }

    #[test]
    fn keywords_beat_identifiers_but_prefixes_stay_identifiers() {
        let b = &*BOOTSTRAP;
        let mut log = DiagnosticLog::new();
        let stream = b
            .tokenizer
            .tokenize("find findings stop_after stop_at", &mut log)
            .unwrap();
        let kinds: Vec<RuleId> = stream.tokens.iter().map(|t| t.rule).collect();
        assert_eq!(
            kinds,
            vec![
                b.tokens.kw_find,
                b.tokens.identifier,
                b.tokens.kw_stop_after,
                b.tokens.kw_stop_at,
            ]
        );
    }

    #[test]
    fn literals_handle_escaped_quotes() {
        let b = &*BOOTSTRAP;
        let mut log = DiagnosticLog::new();
        let stream = b.tokenizer.tokenize(r"'it\'s' ", &mut log).unwrap();
        assert!(!stream.has_errors());
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.tokens[0].rule, b.tokens.literal);
    }

    #[test]
    fn parses_a_two_rule_script() {
        let b = &*BOOTSTRAP;
        let mut log = DiagnosticLog::new();
        let source = "foo = 'bar'; root = foo | 'baz', foo?;";
        let stream = b.tokenizer.tokenize(source, &mut log).unwrap();
        assert!(!stream.has_errors());

        let result = b.grammar.parse_stream(&stream, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, stream.len());

        let script = &result.annotations[0];
        assert_eq!(script.rule, b.nodes.script);
        assert_eq!(script.children.len(), 2);
        assert_eq!(script.children[0].rule, b.nodes.rule_decl);
        assert_eq!(script.children[1].rule, b.nodes.rule_decl);
    }

    #[test]
    fn parses_includes_and_eval_forms() {
        let b = &*BOOTSTRAP;
        let mut log = DiagnosticLog::new();
        let source = "include 'base.tokens'; expr = eval( add | mul );";
        let stream = b.tokenizer.tokenize(source, &mut log).unwrap();
        let result = b.grammar.parse_stream(&stream, &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, stream.len());

        let script = &result.annotations[0];
        assert_eq!(script.children[0].rule, b.nodes.include_decl);
        let decl = &script.children[1];
        assert_eq!(decl.rule, b.nodes.rule_decl);
    }
}
