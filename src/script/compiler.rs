//! Compiling script ASTs into live rule graphs.
//!
//! One compiler handles both targets: tokenizer scripts build a `char` graph,
//! grammar scripts build a `usize` graph over a tokenizer's token ids. The
//! two differ only in how literals and character sets land, captured by the
//! `TargetBuilder` trait. Includes are walked depth-first with an active-path
//! stack for cycle detection and a seen-set for idempotence.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use crate::annotation::Range;
use crate::errors::{
    to_source_span, unspanned, ErrorKind, ErrorReporting, PhaseContext, SourceContext, WeftError,
};
use crate::grammar::Grammar;
use crate::graph::RuleGraph;
use crate::log::DiagnosticLog;
use crate::rules::{OutputPolicy, Rule, RuleElem, RuleKind, RuleRef};
use crate::script::ast::{lift_script, CharsetItem, ScriptDecl, ScriptExpr, ScriptItem};
use crate::script::bootstrap::BOOTSTRAP;
use crate::tokenizer::Tokenizer;

/// Resolves include paths to script sources.
pub trait ScriptLoader {
    fn load(&self, path: &str) -> Result<String, String>;
}

/// Loads scripts from disk, relative to a base directory.
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ScriptLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, String> {
        fs::read_to_string(self.base.join(path)).map_err(|e| e.to_string())
    }
}

/// In-memory scripts, for tests and embedded syntaxes.
#[derive(Default)]
pub struct MemoryLoader {
    scripts: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), source.into());
        self
    }
}

impl ScriptLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<String, String> {
        self.scripts
            .get(path)
            .cloned()
            .ok_or_else(|| "no such script".to_string())
    }
}

/// Include traversal state for one compile call.
#[derive(Default)]
struct Walk {
    active: Vec<String>,
    seen: HashSet<String>,
    last_decl: Option<String>,
}

pub struct ScriptCompiler<L: ScriptLoader> {
    loader: L,
}

impl<L: ScriptLoader> ScriptCompiler<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    pub fn compile_tokenizer(
        &self,
        path: &str,
        log: &mut DiagnosticLog,
    ) -> Result<Tokenizer, WeftError> {
        let mut graph = RuleGraph::new();
        let mut walk = Walk::default();
        self.process_file(path, &mut graph, &CharTarget, &mut walk, log)?;
        finish_tokenizer(graph, walk.last_decl)
    }

    /// Compiles an embedded tokenizer script; includes still go through the
    /// loader.
    pub fn compile_tokenizer_source(
        &self,
        name: &str,
        source: &str,
        log: &mut DiagnosticLog,
    ) -> Result<Tokenizer, WeftError> {
        let mut graph = RuleGraph::new();
        let mut walk = Walk::default();
        walk.seen.insert(name.to_string());
        self.process_source(name, source, &mut graph, &CharTarget, &mut walk, log)?;
        finish_tokenizer(graph, walk.last_decl)
    }

    pub fn compile_grammar(
        &self,
        path: &str,
        tokenizer: &Tokenizer,
        log: &mut DiagnosticLog,
    ) -> Result<Grammar, WeftError> {
        let mut graph = RuleGraph::new();
        let mut walk = Walk::default();
        let target = TokenTarget { tokenizer };
        self.process_file(path, &mut graph, &target, &mut walk, log)?;
        finish_grammar(graph, walk.last_decl, tokenizer)
    }

    pub fn compile_grammar_source(
        &self,
        name: &str,
        source: &str,
        tokenizer: &Tokenizer,
        log: &mut DiagnosticLog,
    ) -> Result<Grammar, WeftError> {
        let mut graph = RuleGraph::new();
        let mut walk = Walk::default();
        walk.seen.insert(name.to_string());
        let target = TokenTarget { tokenizer };
        self.process_source(name, source, &mut graph, &target, &mut walk, log)?;
        finish_grammar(graph, walk.last_decl, tokenizer)
    }

    fn process_file<T: RuleElem>(
        &self,
        path: &str,
        graph: &mut RuleGraph<T>,
        target: &dyn TargetBuilder<T>,
        walk: &mut Walk,
        log: &mut DiagnosticLog,
    ) -> Result<(), WeftError> {
        if walk.active.iter().any(|p| p == path) {
            let ctx = include_context();
            return Err(ctx.report(
                ErrorKind::CircularInclude {
                    path: path.to_string(),
                },
                unspanned(),
            ));
        }
        if !walk.seen.insert(path.to_string()) {
            log.debug(format!("skipping duplicate include of '{}'", path), None);
            return Ok(());
        }
        log.info(format!("including '{}'", path), None);

        let source = self.loader.load(path).map_err(|reason| {
            include_context().report(
                ErrorKind::IncludeFailed {
                    path: path.to_string(),
                    reason,
                },
                unspanned(),
            )
        })?;
        self.process_source(path, &source, graph, target, walk, log)
    }

    fn process_source<T: RuleElem>(
        &self,
        name: &str,
        source: &str,
        graph: &mut RuleGraph<T>,
        target: &dyn TargetBuilder<T>,
        walk: &mut Walk,
        log: &mut DiagnosticLog,
    ) -> Result<(), WeftError> {
        let items = parse_items(name, source, log)?;
        let ctx = PhaseContext::new(SourceContext::from_file(name, source), "compile");

        walk.active.push(name.to_string());
        let outcome = (|| {
            for item in items {
                match item {
                    ScriptItem::Include { path, .. } => {
                        self.process_file(&path, graph, target, walk, log)?;
                    }
                    ScriptItem::Decl(decl) => {
                        compile_decl(&decl, graph, target, &ctx)?;
                        walk.last_decl = Some(decl.name);
                    }
                }
            }
            Ok(())
        })();
        walk.active.pop();
        outcome
    }
}

fn include_context() -> PhaseContext {
    PhaseContext::new(SourceContext::fallback("include resolution"), "compile")
}

/// Parses one script source with the bootstrap syntax and lifts the AST.
fn parse_items(
    name: &str,
    source: &str,
    log: &mut DiagnosticLog,
) -> Result<Vec<ScriptItem>, WeftError> {
    let b = &*BOOTSTRAP;
    let ctx = PhaseContext::new(SourceContext::from_file(name, source), "compile");

    let stream = b.tokenizer.tokenize(source, log)?;
    if stream.has_errors() {
        return Err(ctx
            .syntax_error(
                "script contains unrecognized characters",
                to_source_span(stream.errors[0]),
            )
            .with_help("check for unterminated literals and stray punctuation"));
    }

    let result = b.grammar.parse_stream(&stream, log)?;
    if !result.matched || result.length != stream.len() {
        let at = if result.matched { result.length } else { 0 };
        let range = stream.tokens.get(at).map(|t| t.range).unwrap_or_default();
        return Err(ctx
            .syntax_error("malformed script statement", to_source_span(range))
            .with_help("every declaration ends with ';'"));
    }

    lift_script(&stream, &result.annotations[0], &b.nodes, &ctx)
}

fn compile_decl<T: RuleElem>(
    decl: &ScriptDecl,
    graph: &mut RuleGraph<T>,
    target: &dyn TargetBuilder<T>,
    ctx: &PhaseContext,
) -> Result<(), WeftError> {
    if graph.find(&decl.name).is_some() {
        return Err(ctx.duplicate_rule(&decl.name, to_source_span(decl.range)));
    }
    let rule = build_expr(&decl.expr, target, ctx)?
        .named(decl.name.clone())
        .with_policy(decl.policy)
        .with_precedence(decl.precedence);
    graph.register(rule)?;
    Ok(())
}

fn build_expr<T: RuleElem>(
    expr: &ScriptExpr,
    target: &dyn TargetBuilder<T>,
    ctx: &PhaseContext,
) -> Result<Rule<T>, WeftError> {
    match expr {
        ScriptExpr::Literal { text, range } => target.literal(text, *range, ctx),
        ScriptExpr::Charset { items, range } => target.charset(items, *range, ctx),
        ScriptExpr::Reference { name, .. } => Ok(Rule::reference(name.as_str())),
        ScriptExpr::Sequence(subs) => {
            let mut refs: Vec<RuleRef<T>> = Vec::with_capacity(subs.len());
            for sub in subs {
                refs.push(build_expr(sub, target, ctx)?.into());
            }
            Ok(Rule::sequence(refs))
        }
        ScriptExpr::OneOf(options) => {
            let mut refs: Vec<RuleRef<T>> = Vec::with_capacity(options.len());
            for option in options {
                refs.push(build_expr(option, target, ctx)?.into());
            }
            Ok(Rule::one_of(refs))
        }
        ScriptExpr::Repeat { sub, min, max } => {
            Ok(Rule::repeat(build_expr(sub, target, ctx)?, *min, *max))
        }
        ScriptExpr::Not(sub) => Ok(Rule::not(build_expr(sub, target, ctx)?)),
        ScriptExpr::Condition(sub) => Ok(Rule::condition(build_expr(sub, target, ctx)?)),
        ScriptExpr::Skip { trigger, policy } => {
            Ok(Rule::skip(build_expr(trigger, target, ctx)?, *policy))
        }
        ScriptExpr::Fatal { message, guard } => match guard {
            Some(guard) => Ok(Rule::fatal_if(
                message.clone(),
                build_expr(guard, target, ctx)?,
            )),
            None => Ok(Rule::fatal(message.clone())),
        },
        ScriptExpr::Eval { candidates } => Ok(Rule::evaluation(
            candidates
                .iter()
                .map(|(name, _)| RuleRef::Name(name.clone()))
                .collect(),
        )),
        ScriptExpr::Report { severity, message } => Ok(Rule::report(*severity, message.clone())),
    }
}

/// How literals and character sets land in a specific target graph.
trait TargetBuilder<T: RuleElem> {
    fn literal(&self, text: &str, range: Range, ctx: &PhaseContext) -> Result<Rule<T>, WeftError>;
    fn charset(
        &self,
        items: &[CharsetItem],
        range: Range,
        ctx: &PhaseContext,
    ) -> Result<Rule<T>, WeftError>;
}

struct CharTarget;

impl TargetBuilder<char> for CharTarget {
    fn literal(
        &self,
        text: &str,
        range: Range,
        ctx: &PhaseContext,
    ) -> Result<Rule<char>, WeftError> {
        if text.is_empty() {
            return Err(ctx.report(
                ErrorKind::MalformedLiteral {
                    value: "''".to_string(),
                },
                to_source_span(range),
            ));
        }
        Ok(Rule::text(text))
    }

    fn charset(
        &self,
        items: &[CharsetItem],
        _range: Range,
        _ctx: &PhaseContext,
    ) -> Result<Rule<char>, WeftError> {
        let singles: Vec<char> = items
            .iter()
            .filter_map(|item| match item {
                CharsetItem::Single(c) => Some(*c),
                CharsetItem::Span(..) => None,
            })
            .collect();
        let mut options: Vec<RuleRef<char>> = Vec::new();
        if !singles.is_empty() {
            options.push(Rule::set(singles).into());
        }
        for item in items {
            if let CharsetItem::Span(low, high) = item {
                options.push(Rule::range(*low, *high).into());
            }
        }
        if options.len() == 1 {
            match options.remove(0) {
                RuleRef::Inline(rule) => Ok(*rule),
                _ => unreachable!("charset options are built inline"),
            }
        } else {
            Ok(Rule::one_of(options))
        }
    }
}

struct TokenTarget<'a> {
    tokenizer: &'a Tokenizer,
}

impl TargetBuilder<usize> for TokenTarget<'_> {
    /// A literal in a grammar script stands for the token sequence the
    /// tokenizer produces for it.
    fn literal(
        &self,
        text: &str,
        range: Range,
        ctx: &PhaseContext,
    ) -> Result<Rule<usize>, WeftError> {
        let mut scratch = DiagnosticLog::new();
        let stream = self.tokenizer.tokenize(text, &mut scratch)?;
        if stream.has_errors() || stream.is_empty() {
            return Err(ctx
                .report(
                    ErrorKind::MalformedLiteral {
                        value: text.to_string(),
                    },
                    to_source_span(range),
                )
                .with_help("grammar literals must tokenize cleanly"));
        }
        Ok(Rule::literal(stream.ids()))
    }

    fn charset(
        &self,
        _items: &[CharsetItem],
        range: Range,
        ctx: &PhaseContext,
    ) -> Result<Rule<usize>, WeftError> {
        Err(ctx.report(
            ErrorKind::UnsupportedConstruct {
                construct: "a character set in a grammar script".to_string(),
            },
            to_source_span(range),
        ))
    }
}

/// The root is the rule named `root`, or the last declaration.
fn assign_root<T: RuleElem>(
    graph: &mut RuleGraph<T>,
    last_decl: Option<String>,
) -> Result<(), WeftError> {
    if graph.find("root").is_some() {
        return graph.set_root("root");
    }
    match last_decl {
        Some(name) => graph.set_root(&name),
        None => Err(include_context().report(
            ErrorKind::InvalidRule {
                message: "script defines no rules".to_string(),
            },
            unspanned(),
        )),
    }
}

fn finish_tokenizer(
    mut graph: RuleGraph<char>,
    last_decl: Option<String>,
) -> Result<Tokenizer, WeftError> {
    graph.resolve()?;
    assign_root(&mut graph, last_decl)?;
    // A root alternation dispatches between token rules; left opaque it would
    // wrap every scan in its own annotation, hiding which alternative matched
    // and turning voided alternatives back into tokens. Unprefixed root
    // alternations therefore default to transparent, matching the
    // programmatic `Rule::one_of` default. An explicit prune prefix still
    // wins.
    if let Some(id) = graph.root() {
        if let Some(root) = graph.get_mut(id) {
            if matches!(root.kind, RuleKind::OneOf(_)) && root.policy == OutputPolicy::Emit {
                root.policy = OutputPolicy::Children;
            }
        }
    }
    Ok(Tokenizer::new(graph))
}

/// Dangling names in a grammar script are token references: each one that
/// names a tokenizer rule becomes a single-token literal rule.
fn finish_grammar(
    mut graph: RuleGraph<usize>,
    last_decl: Option<String>,
    tokenizer: &Tokenizer,
) -> Result<Grammar, WeftError> {
    for name in graph.unresolved_names() {
        if let Some(token_id) = tokenizer.graph().find(&name) {
            graph.register(Rule::literal(vec![token_id.0]).named(name))?;
        }
    }
    graph.resolve()?;
    assign_root(&mut graph, last_decl)?;
    Ok(Grammar::new(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Syntax;

    fn compiler(scripts: &[(&str, &str)]) -> ScriptCompiler<MemoryLoader> {
        let mut loader = MemoryLoader::new();
        for (name, source) in scripts {
            loader = loader.insert(*name, *source);
        }
        ScriptCompiler::new(loader)
    }

    #[test]
    fn round_trips_a_two_rule_tokenizer() {
        let c = compiler(&[("t", "foo = 'bar'; root = foo;")]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("t", &mut log).unwrap();

        let stream = tokenizer.tokenize("bar", &mut log).unwrap();
        assert!(!stream.has_errors());
        assert_eq!(stream.len(), 1);
        assert_eq!(
            tokenizer.graph().name_of(stream.tokens[0].rule),
            "root".to_string()
        );
    }

    #[test]
    fn last_declaration_is_the_default_root() {
        let c = compiler(&[("t", "a = 'a'; b = 'b';")]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("t", &mut log).unwrap();
        let root = tokenizer.graph().root().unwrap();
        assert_eq!(tokenizer.graph().name_of(root), "b");
    }

    #[test]
    fn duplicate_includes_are_idempotent() {
        let c = compiler(&[
            ("main", "include 'base'; include 'base'; root = num;"),
            ("base", "num = {'0'..'9'}+;"),
        ]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("main", &mut log).unwrap();

        assert!(tokenizer.graph().find("num").is_some());
        let including = log
            .iter()
            .filter(|e| e.message.contains("including 'base'"))
            .count();
        assert_eq!(including, 1);
    }

    #[test]
    fn include_cycles_are_compile_errors() {
        let c = compiler(&[
            ("a", "include 'b'; x = 'x';"),
            ("b", "include 'a'; y = 'y';"),
        ]);
        let mut log = DiagnosticLog::new();
        let err = c.compile_tokenizer("a", &mut log).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularInclude { .. }));
    }

    #[test]
    fn duplicate_rule_names_are_compile_errors() {
        let c = compiler(&[("t", "a = 'x'; a = 'y';")]);
        let mut log = DiagnosticLog::new();
        let err = c.compile_tokenizer("t", &mut log).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateRule { .. }));
    }

    #[test]
    fn grammar_literals_and_token_references_resolve() {
        let c = compiler(&[
            ("t", "-a ws = {' ','\\t'}+; num = {'0'..'9'}+; word = {'a'..'z'}+; root = ws | num | word;"),
            ("g", "root = 'let', word, num;"),
        ]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("t", &mut log).unwrap();
        let grammar = c.compile_grammar("g", &tokenizer, &mut log).unwrap();

        let syntax = Syntax::new(tokenizer, grammar);
        let (stream, result) = syntax.parse("let answer 42", &mut log).unwrap();
        assert!(Syntax::is_complete(&stream, &result));
        let root = &result.annotations[0];
        assert_eq!(syntax.grammar.graph().name_of(root.rule), "root");
    }

    #[test]
    fn unresolved_grammar_references_fail_to_compile() {
        let c = compiler(&[
            ("t", "num = {'0'..'9'}+;"),
            ("g", "root = num, missing;"),
        ]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("t", &mut log).unwrap();
        let err = c.compile_grammar("g", &tokenizer, &mut log).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnresolvedReference { .. }));
    }

    #[test]
    fn compiled_evaluation_climbs_precedence() {
        let c = compiler(&[
            ("t", "-a ws = ' '+; num = {'0'..'9'}+; plus = '+'; star = '*'; root = ws | num | plus | star;"),
            (
                "g",
                "add 100 = operand, plus, operand; \
                 mul 200 = operand, star, operand; \
                 -c operand = num; \
                 root = eval( add | mul );",
            ),
        ]);
        let mut log = DiagnosticLog::new();
        let tokenizer = c.compile_tokenizer("t", &mut log).unwrap();
        let grammar = c.compile_grammar("g", &tokenizer, &mut log).unwrap();

        let syntax = Syntax::new(tokenizer, grammar);
        let (stream, result) = syntax.parse("3 + 5 * 2", &mut log).unwrap();
        assert!(result.matched);
        assert_eq!(result.length, stream.len());

        let root = &result.annotations[0];
        let op = &root.children[0];
        assert_eq!(syntax.grammar.graph().name_of(op.rule), "add");
        let right = op.children.last().unwrap();
        assert_eq!(syntax.grammar.graph().name_of(right.rule), "mul");
    }
}
