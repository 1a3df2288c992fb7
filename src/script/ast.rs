//! Lifting parsed script annotations into a compiler-facing AST.
//!
//! The bootstrap grammar yields annotation trees over token indices; this
//! module resolves them against the token stream's text into `ScriptItem`
//! values, unescaping literals and parsing character-set bodies along the way.
//! All ranges on the AST are character ranges into the script source, ready
//! for error labels.

use crate::annotation::{Annotation, Range};
use crate::errors::{to_source_span, ErrorKind, ErrorReporting, PhaseContext, WeftError};
use crate::grammar::Grammar;
use crate::log::Severity;
use crate::rules::{OutputPolicy, SkipPolicy};
use crate::script::bootstrap::ScriptNodes;
use crate::tokenizer::TokenStream;
use thiserror::Error;

/// One top-level script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptItem {
    Include { path: String, range: Range },
    Decl(ScriptDecl),
}

/// `[prune] name [precedence] = expr ;`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDecl {
    pub name: String,
    pub policy: OutputPolicy,
    pub precedence: i32,
    pub expr: ScriptExpr,
    pub range: Range,
}

/// One entry of a `{...}` character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetItem {
    Single(char),
    Span(char, char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptExpr {
    Literal {
        text: String,
        range: Range,
    },
    Charset {
        items: Vec<CharsetItem>,
        range: Range,
    },
    Reference {
        name: String,
        range: Range,
    },
    Sequence(Vec<ScriptExpr>),
    OneOf(Vec<ScriptExpr>),
    Repeat {
        sub: Box<ScriptExpr>,
        min: usize,
        max: usize,
    },
    Not(Box<ScriptExpr>),
    Condition(Box<ScriptExpr>),
    Skip {
        trigger: Box<ScriptExpr>,
        policy: SkipPolicy,
    },
    Fatal {
        message: String,
        guard: Option<Box<ScriptExpr>>,
    },
    Eval {
        candidates: Vec<(String, Range)>,
    },
    Report {
        severity: Severity,
        message: String,
    },
}

pub fn lift_script(
    stream: &TokenStream,
    script: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<Vec<ScriptItem>, WeftError> {
    let mut items = Vec::new();
    for child in &script.children {
        if child.rule == nodes.include_decl {
            let literal = expect_child(child, 0, ctx, stream)?;
            items.push(ScriptItem::Include {
                path: unquote(stream, literal, ctx)?,
                range: char_range(stream, child),
            });
        } else if child.rule == nodes.rule_decl {
            items.push(ScriptItem::Decl(lift_decl(stream, child, nodes, ctx)?));
        } else {
            return Err(unexpected(stream, child, ctx));
        }
    }
    Ok(items)
}

fn lift_decl(
    stream: &TokenStream,
    decl: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<ScriptDecl, WeftError> {
    let mut children = decl.children.iter().peekable();

    let mut policy = OutputPolicy::Emit;
    if let Some(first) = children.peek() {
        let selected = if first.rule == nodes.prune_root {
            Some(OutputPolicy::Root)
        } else if first.rule == nodes.prune_children {
            Some(OutputPolicy::Children)
        } else if first.rule == nodes.prune_all {
            Some(OutputPolicy::Void)
        } else {
            None
        };
        if let Some(selected) = selected {
            policy = selected;
            children.next();
        }
    }

    let name_node = children
        .next()
        .filter(|n| n.rule == nodes.identifier)
        .ok_or_else(|| {
            ctx.syntax_error(
                "rule declaration is missing a name",
                to_source_span(char_range(stream, decl)),
            )
        })?;
    let name = token_text(stream, name_node);

    let mut precedence = 0;
    if let Some(next) = children.peek() {
        if next.rule == nodes.number {
            let node = children.next().expect("peeked above");
            let text = token_text(stream, node);
            precedence = text.parse().map_err(|_| {
                ctx.syntax_error(
                    &format!("precedence '{}' is out of range", text),
                    to_source_span(char_range(stream, node)),
                )
            })?;
        }
    }

    let expr_node = children
        .next()
        .filter(|n| n.rule == nodes.alternation)
        .ok_or_else(|| {
            ctx.syntax_error(
                &format!("rule '{}' has no expression", name),
                to_source_span(char_range(stream, decl)),
            )
        })?;
    let expr = lift_expr(stream, expr_node, nodes, ctx)?;

    Ok(ScriptDecl {
        name,
        policy,
        precedence,
        expr,
        range: char_range(stream, decl),
    })
}

fn lift_expr(
    stream: &TokenStream,
    alternation: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<ScriptExpr, WeftError> {
    let mut options = Vec::with_capacity(alternation.children.len());
    for child in &alternation.children {
        options.push(lift_sequence(stream, child, nodes, ctx)?);
    }
    if options.len() == 1 {
        Ok(options.pop().expect("length checked above"))
    } else {
        Ok(ScriptExpr::OneOf(options))
    }
}

fn lift_sequence(
    stream: &TokenStream,
    sequence: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<ScriptExpr, WeftError> {
    let mut terms = Vec::with_capacity(sequence.children.len());
    for child in &sequence.children {
        terms.push(lift_term(stream, child, nodes, ctx)?);
    }
    if terms.len() == 1 {
        Ok(terms.pop().expect("length checked above"))
    } else {
        Ok(ScriptExpr::Sequence(terms))
    }
}

fn lift_term(
    stream: &TokenStream,
    term: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<ScriptExpr, WeftError> {
    let mut children = term.children.iter().peekable();

    let mut negated = false;
    let mut conditional = false;
    if let Some(first) = children.peek() {
        if first.rule == nodes.bang {
            negated = true;
            children.next();
        } else if first.rule == nodes.if_marker {
            conditional = true;
            children.next();
        }
    }

    let atom = children.next().ok_or_else(|| {
        ctx.syntax_error(
            "term has no atom",
            to_source_span(char_range(stream, term)),
        )
    })?;
    let mut expr = lift_atom(stream, atom, nodes, ctx)?;

    if let Some(suffix) = children.next() {
        let (min, max) = if suffix.rule == nodes.star {
            (0, 0)
        } else if suffix.rule == nodes.plus {
            (1, 0)
        } else if suffix.rule == nodes.question {
            (0, 1)
        } else {
            return Err(unexpected(stream, suffix, ctx));
        };
        expr = ScriptExpr::Repeat {
            sub: Box::new(expr),
            min,
            max,
        };
    }

    if negated {
        expr = ScriptExpr::Not(Box::new(expr));
    } else if conditional {
        expr = ScriptExpr::Condition(Box::new(expr));
    }
    Ok(expr)
}

fn lift_atom(
    stream: &TokenStream,
    atom: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
) -> Result<ScriptExpr, WeftError> {
    let range = char_range(stream, atom);
    let rule = atom.rule;

    if rule == nodes.literal {
        Ok(ScriptExpr::Literal {
            text: unquote(stream, atom, ctx)?,
            range,
        })
    } else if rule == nodes.charset {
        let raw = token_text(stream, atom);
        let body = &raw[1..raw.len() - 1];
        let items = parse_charset(body).map_err(|_| {
            ctx.report(
                ErrorKind::MalformedCharset { value: raw.clone() },
                to_source_span(range),
            )
        })?;
        Ok(ScriptExpr::Charset { items, range })
    } else if rule == nodes.identifier {
        Ok(ScriptExpr::Reference {
            name: token_text(stream, atom),
            range,
        })
    } else if rule == nodes.alternation {
        lift_expr(stream, atom, nodes, ctx)
    } else if rule == nodes.find_expr {
        skip_atom(stream, atom, nodes, ctx, SkipPolicy::Find)
    } else if rule == nodes.stop_at_expr {
        skip_atom(stream, atom, nodes, ctx, SkipPolicy::StopAt)
    } else if rule == nodes.stop_after_expr {
        skip_atom(stream, atom, nodes, ctx, SkipPolicy::StopAfter)
    } else if rule == nodes.fatal_expr {
        let message = unquote(stream, expect_child(atom, 0, ctx, stream)?, ctx)?;
        let guard = match atom.children.get(1) {
            Some(node) => Some(Box::new(lift_atom(stream, node, nodes, ctx)?)),
            None => None,
        };
        Ok(ScriptExpr::Fatal { message, guard })
    } else if rule == nodes.eval_expr {
        let mut candidates = Vec::with_capacity(atom.children.len());
        for child in &atom.children {
            candidates.push((token_text(stream, child), char_range(stream, child)));
        }
        Ok(ScriptExpr::Eval { candidates })
    } else if rule == nodes.error_expr || rule == nodes.warning_expr {
        let severity = if rule == nodes.error_expr {
            Severity::Error
        } else {
            Severity::Warning
        };
        Ok(ScriptExpr::Report {
            severity,
            message: unquote(stream, expect_child(atom, 0, ctx, stream)?, ctx)?,
        })
    } else {
        Err(unexpected(stream, atom, ctx))
    }
}

fn skip_atom(
    stream: &TokenStream,
    node: &Annotation,
    nodes: &ScriptNodes,
    ctx: &PhaseContext,
    policy: SkipPolicy,
) -> Result<ScriptExpr, WeftError> {
    let trigger = lift_atom(stream, expect_child(node, 0, ctx, stream)?, nodes, ctx)?;
    Ok(ScriptExpr::Skip {
        trigger: Box::new(trigger),
        policy,
    })
}

// ----------------------------------------------------------------------
// Text helpers
// ----------------------------------------------------------------------

/// Character range a grammar annotation covers in the script source.
fn char_range(stream: &TokenStream, node: &Annotation) -> Range {
    Grammar::source_range(stream, node.range)
}

/// Source text of a single-token annotation.
fn token_text(stream: &TokenStream, node: &Annotation) -> String {
    stream.text_of(char_range(stream, node))
}

fn expect_child<'a>(
    node: &'a Annotation,
    index: usize,
    ctx: &PhaseContext,
    stream: &TokenStream,
) -> Result<&'a Annotation, WeftError> {
    node.children.get(index).ok_or_else(|| {
        ctx.syntax_error(
            "malformed script construct",
            to_source_span(char_range(stream, node)),
        )
    })
}

fn unexpected(stream: &TokenStream, node: &Annotation, ctx: &PhaseContext) -> WeftError {
    ctx.syntax_error(
        &format!("unexpected '{}'", token_text(stream, node)),
        to_source_span(char_range(stream, node)),
    )
}

/// Strips quotes from a literal token and processes escapes.
fn unquote(
    stream: &TokenStream,
    node: &Annotation,
    ctx: &PhaseContext,
) -> Result<String, WeftError> {
    let raw = token_text(stream, node);
    let body: String = raw.chars().skip(1).take(raw.chars().count() - 2).collect();
    unescape(&body).map_err(|_| {
        ctx.report(
            ErrorKind::MalformedLiteral { value: raw },
            to_source_span(char_range(stream, node)),
        )
    })
}

/// Processes backslash escapes; errors on an unknown escape character.
fn unescape(text: &str) -> Result<String, char> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '\'' | '"' | '{' | '}')) => out.push(c),
            Some(other) => return Err(other),
            None => return Err('\\'),
        }
    }
    Ok(out)
}

/// What can go wrong inside a `{...}` body. Callers surface these as a
/// `MalformedCharset` diagnostic on the whole token.
#[derive(Debug, Error, PartialEq)]
enum CharsetError {
    #[error("expected a quoted character")]
    ExpectedQuoted,
    #[error("bad escape")]
    BadEscape,
    #[error("unterminated character")]
    Unterminated,
    #[error("expected '..'")]
    ExpectedSpan,
    #[error("empty span '{0}'..'{1}'")]
    EmptySpan(char, char),
    #[error("empty character set")]
    Empty,
}

/// Parses the body of a `{...}` character set: quoted characters and
/// `'a'..'z'` spans, separated by whitespace or commas.
fn parse_charset(body: &str) -> Result<Vec<CharsetItem>, CharsetError> {
    let mut items = Vec::new();
    let mut chars = body.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let low = quoted_char(&mut chars)?;

        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.next() != Some('.') {
                return Err(CharsetError::ExpectedSpan);
            }
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            let high = quoted_char(&mut chars)?;
            if high < low {
                return Err(CharsetError::EmptySpan(low, high));
            }
            items.push(CharsetItem::Span(low, high));
        } else {
            items.push(CharsetItem::Single(low));
        }
    }

    if items.is_empty() {
        return Err(CharsetError::Empty);
    }
    Ok(items)
}

fn quoted_char(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<char, CharsetError> {
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(CharsetError::ExpectedQuoted),
    };
    let c = match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(c @ ('\\' | '\'' | '"' | '{' | '}')) => c,
            _ => return Err(CharsetError::BadEscape),
        },
        Some(c) => c,
        None => return Err(CharsetError::Unterminated),
    };
    if chars.next() != Some(quote) {
        return Err(CharsetError::Unterminated);
    }
    Ok(c)
}
