//! The weft command-line interface.
//!
//! Thin handlers over the library: compile the named scripts, run the
//! pipeline, and render token streams or parse trees for humans (or as JSON
//! for tooling).

use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::{fs, process};

use crate::annotation::Annotation;
use crate::cli::args::{Command, WeftArgs};
use crate::errors::{
    print_error, to_source_span, unspanned, ErrorKind, ErrorReporting, PhaseContext,
    SourceContext, WeftError,
};
use crate::grammar::{Grammar, Syntax};
use crate::log::DiagnosticLog;
use crate::script::{FsLoader, ScriptCompiler};
use crate::tokenizer::{TokenStream, Tokenizer};

pub mod args;

/// The main entry point for the CLI.
pub fn run() {
    let args = WeftArgs::parse();
    let mut log = DiagnosticLog::new();

    let result = match args.command {
        Command::Tokens {
            tokens,
            input,
            json,
        } => handle_tokens(&tokens, &input, json, &mut log),
        Command::Check { tokens, grammar } => handle_check(&tokens, grammar.as_deref(), &mut log),
        Command::Parse {
            tokens,
            grammar,
            input,
            json,
        } => handle_parse(&tokens, &grammar, &input, json, &mut log),
        Command::Codegen {
            tokens,
            grammar,
            module,
        } => handle_codegen(&tokens, &grammar, &module, &mut log),
        Command::Calc => crate::calc::run_repl(),
    };

    for entry in log.problems() {
        eprintln!("{}", entry);
    }
    if let Err(error) = result {
        print_error(error);
        process::exit(1);
    }
}

// ----------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------

fn handle_tokens(
    tokens: &Path,
    input: &Path,
    json: bool,
    log: &mut DiagnosticLog,
) -> Result<(), WeftError> {
    let tokenizer = compile_tokenizer_file(tokens, log)?;
    let source = read_input(input)?;
    let stream = tokenizer.tokenize(&source, log)?;

    if json {
        let dump: Vec<TokenDump> = stream
            .tokens
            .iter()
            .map(|t| TokenDump {
                name: tokenizer.graph().name_of(t.rule),
                start: t.range.start,
                length: t.range.length,
                text: stream.text_of(t.range),
            })
            .collect();
        println!("{}", to_json(&dump)?);
    } else {
        for token in &stream.tokens {
            println!(
                "{} {} '{}'",
                tokenizer.graph().name_of(token.rule),
                token.range,
                stream.text_of(token.range)
            );
        }
        for error in &stream.errors {
            println!("error {} '{}'", error, stream.text_of(*error));
        }
    }
    Ok(())
}

fn handle_check(
    tokens: &Path,
    grammar: Option<&Path>,
    log: &mut DiagnosticLog,
) -> Result<(), WeftError> {
    let tokenizer = compile_tokenizer_file(tokens, log)?;
    println!(
        "{}: ok ({} rules)",
        tokens.display(),
        tokenizer.graph().len()
    );

    if let Some(grammar_path) = grammar {
        let grammar = compile_grammar_file(grammar_path, &tokenizer, log)?;
        println!(
            "{}: ok ({} rules)",
            grammar_path.display(),
            grammar.graph().len()
        );
    }
    Ok(())
}

fn handle_parse(
    tokens: &Path,
    grammar: &Path,
    input: &Path,
    json: bool,
    log: &mut DiagnosticLog,
) -> Result<(), WeftError> {
    let tokenizer = compile_tokenizer_file(tokens, log)?;
    let grammar = compile_grammar_file(grammar, &tokenizer, log)?;
    let syntax = Syntax::new(tokenizer, grammar);

    let source = read_input(input)?;
    let ctx = PhaseContext::new(
        SourceContext::from_file(input.display().to_string(), source.clone()),
        "parse",
    );
    let (stream, result) = syntax.parse(&source, log)?;

    if stream.has_errors() {
        return Err(ctx.syntax_error(
            "input contains unrecognized characters",
            to_source_span(stream.errors[0]),
        ));
    }
    if !Syntax::is_complete(&stream, &result) {
        let span = stream
            .tokens
            .get(result.length)
            .map(|t| to_source_span(t.range))
            .unwrap_or_else(unspanned);
        return Err(ctx.syntax_error("input does not match the grammar", span));
    }

    if json {
        let dump: Vec<NodeDump> = result
            .annotations
            .iter()
            .map(|node| NodeDump::build(node, &syntax.grammar, &stream))
            .collect();
        println!("{}", to_json(&dump)?);
    } else {
        let graph = syntax.grammar.graph();
        for node in &result.annotations {
            print!("{}", node.pretty(&|id| graph.name_of(id)));
        }
    }
    Ok(())
}

fn handle_codegen(
    tokens: &Path,
    grammar: &Path,
    module: &str,
    log: &mut DiagnosticLog,
) -> Result<(), WeftError> {
    let tokenizer = compile_tokenizer_file(tokens, log)?;
    let grammar = compile_grammar_file(grammar, &tokenizer, log)?;

    println!("// Generated by `weft codegen`. Do not edit.");
    println!("pub mod {} {{", module);
    println!("    pub mod tokens {{");
    emit_consts(tokenizer.graph().rules().map(|r| (&r.name, r.id)));
    println!("    }}");
    println!("    pub mod rules {{");
    emit_consts(grammar.graph().rules().map(|r| (&r.name, r.id)));
    println!("    }}");
    println!("}}");
    Ok(())
}

/// Emits one `pub const` per named rule; anonymous rules carry generated
/// `kind@id` names and are skipped.
fn emit_consts<'a>(rules: impl Iterator<Item = (&'a String, Option<crate::rules::RuleId>)>) {
    for (name, id) in rules {
        if name.contains('@') {
            continue;
        }
        let Some(id) = id else { continue };
        println!("        pub const {}: usize = {};", const_name(name), id.0);
    }
}

fn const_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

// ----------------------------------------------------------------------
// Shared plumbing
// ----------------------------------------------------------------------

#[derive(Serialize)]
struct TokenDump {
    name: String,
    start: usize,
    length: usize,
    text: String,
}

#[derive(Serialize)]
struct NodeDump {
    name: String,
    start: usize,
    length: usize,
    text: String,
    children: Vec<NodeDump>,
}

impl NodeDump {
    fn build(node: &Annotation, grammar: &Grammar, stream: &TokenStream) -> Self {
        let source = Grammar::source_range(stream, node.range);
        Self {
            name: grammar.graph().name_of(node.rule),
            start: node.range.start,
            length: node.range.length,
            text: stream.text_of(source),
            children: node
                .children
                .iter()
                .map(|child| NodeDump::build(child, grammar, stream))
                .collect(),
        }
    }
}

fn compile_tokenizer_file(path: &Path, log: &mut DiagnosticLog) -> Result<Tokenizer, WeftError> {
    let (loader, name) = fs_loader_for(path)?;
    ScriptCompiler::new(loader).compile_tokenizer(&name, log)
}

fn compile_grammar_file(
    path: &Path,
    tokenizer: &Tokenizer,
    log: &mut DiagnosticLog,
) -> Result<Grammar, WeftError> {
    let (loader, name) = fs_loader_for(path)?;
    ScriptCompiler::new(loader).compile_grammar(&name, tokenizer, log)
}

/// Splits a script path into a loader rooted at its directory plus the file
/// name, so the script's own includes resolve next to it.
fn fs_loader_for(path: &Path) -> Result<(FsLoader, String), WeftError> {
    let base: PathBuf = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io_error(path, "not a valid file path"))?;
    Ok((FsLoader::new(base), name.to_string()))
}

fn read_input(path: &Path) -> Result<String, WeftError> {
    fs::read_to_string(path).map_err(|e| io_error(path, &e.to_string()))
}

fn io_error(path: &Path, reason: &str) -> WeftError {
    PhaseContext::new(SourceContext::fallback("file access"), "cli").report(
        ErrorKind::Io {
            path: path.display().to_string(),
            reason: reason.to_string(),
        },
        unspanned(),
    )
}

fn to_json<T: Serialize>(value: &T) -> Result<String, WeftError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        PhaseContext::new(SourceContext::fallback("json output"), "cli").report(
            ErrorKind::Io {
                path: "<stdout>".to_string(),
                reason: e.to_string(),
            },
            unspanned(),
        )
    })
}
