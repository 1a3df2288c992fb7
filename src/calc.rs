//! Interactive calculator: a small consumer of the full pipeline.
//!
//! The arithmetic syntax is compiled from embedded weft scripts at startup,
//! so the REPL exercises the script compiler, the tokenizer, the grammar
//! layer, and precedence climbing end to end.

use std::io::{self, BufRead, Write};

use crate::annotation::Annotation;
use crate::errors::{
    print_error, to_source_span, unspanned, ErrorReporting, PhaseContext, SourceContext, WeftError,
};
use crate::grammar::{Grammar, Syntax};
use crate::log::DiagnosticLog;
use crate::script::{MemoryLoader, ScriptCompiler};
use crate::tokenizer::TokenStream;

const CALC_TOKENS: &str = r"
-a ws = {' ', '\t'}+;
-r number = {'0'..'9'}+, ('.', {'0'..'9'}+)?;
plus = '+';
minus = '-';
star = '*';
slash = '/';
lparen = '(';
rparen = ')';
root = ws | number | plus | minus | star | slash | lparen | rparen;
";

const CALC_GRAMMAR: &str = r"
add 100 = operand, plus, operand;
sub 100 = operand, minus, operand;
mul 200 = operand, star, operand;
div 200 = operand, slash, operand;
-a lp = lparen;
-a rp = rparen;
-c group = lp, expr, rp;
-c operand = number | group;
-c expr = eval( add | sub | mul | div ) | operand;
root = expr;
";

pub struct Calculator {
    syntax: Syntax,
}

impl Calculator {
    pub fn new() -> Result<Self, WeftError> {
        let compiler = ScriptCompiler::new(MemoryLoader::new());
        let mut log = DiagnosticLog::new();
        let tokenizer = compiler.compile_tokenizer_source("calc.tokens", CALC_TOKENS, &mut log)?;
        let grammar =
            compiler.compile_grammar_source("calc.grammar", CALC_GRAMMAR, &tokenizer, &mut log)?;
        Ok(Self {
            syntax: Syntax::new(tokenizer, grammar),
        })
    }

    pub fn evaluate(&self, line: &str, log: &mut DiagnosticLog) -> Result<f64, WeftError> {
        let ctx = PhaseContext::new(SourceContext::from_file("<calc>", line), "calc");
        let (stream, result) = self.syntax.parse(line, log)?;

        if stream.has_errors() {
            return Err(ctx.syntax_error(
                "unrecognized characters in expression",
                to_source_span(stream.errors[0]),
            ));
        }
        if !Syntax::is_complete(&stream, &result) {
            let span = stream
                .tokens
                .get(result.length)
                .map(|t| to_source_span(t.range))
                .unwrap_or_else(unspanned);
            return Err(ctx
                .syntax_error("incomplete expression", span)
                .with_help("expected a full arithmetic expression, e.g. (1 + 2) * 3"));
        }

        self.eval_node(&result.annotations[0], &stream, &ctx)
    }

    fn eval_node(
        &self,
        node: &Annotation,
        stream: &TokenStream,
        ctx: &PhaseContext,
    ) -> Result<f64, WeftError> {
        let name = self.syntax.grammar.graph().name_of(node.rule);
        match name.as_str() {
            "number" => {
                let text = Syntax::text_of(stream, node);
                text.parse().map_err(|_| {
                    ctx.syntax_error(
                        &format!("'{}' is not a number", text),
                        self.node_span(stream, node),
                    )
                })
            }
            "add" => self.eval_binary(node, stream, ctx, |l, r| l + r),
            "sub" => self.eval_binary(node, stream, ctx, |l, r| l - r),
            "mul" => self.eval_binary(node, stream, ctx, |l, r| l * r),
            "div" => self.eval_binary(node, stream, ctx, |l, r| l / r),
            // wrapper nodes (root) carry exactly one meaningful child
            _ if node.children.len() == 1 => self.eval_node(&node.children[0], stream, ctx),
            _ => Err(ctx.syntax_error(
                &format!("cannot evaluate '{}'", name),
                self.node_span(stream, node),
            )),
        }
    }

    fn eval_binary(
        &self,
        node: &Annotation,
        stream: &TokenStream,
        ctx: &PhaseContext,
        apply: fn(f64, f64) -> f64,
    ) -> Result<f64, WeftError> {
        let (Some(left), Some(right)) = (node.children.first(), node.children.last()) else {
            return Err(ctx.syntax_error("malformed operation", self.node_span(stream, node)));
        };
        Ok(apply(
            self.eval_node(left, stream, ctx)?,
            self.eval_node(right, stream, ctx)?,
        ))
    }

    fn node_span(&self, stream: &TokenStream, node: &Annotation) -> miette::SourceSpan {
        to_source_span(Grammar::source_range(stream, node.range))
    }
}

fn is_exit_command(line: &str) -> bool {
    matches!(line, "x" | "exit" | "quit" | "q")
}

/// Main REPL entry point.
pub fn run_repl() -> Result<(), WeftError> {
    let calculator = Calculator::new()?;
    println!("weft calc");
    println!("Enter an arithmetic expression, or 'q' to exit.");
    println!();

    let stdin = io::stdin();
    loop {
        print!("calc> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        let mut log = DiagnosticLog::new();
        match calculator.evaluate(line, &mut log) {
            Ok(value) => println!("{}", value),
            Err(error) => print_error(error),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(line: &str) -> Result<f64, WeftError> {
        let calc = Calculator::new().unwrap();
        let mut log = DiagnosticLog::new();
        calc.evaluate(line, &mut log)
    }

    #[test]
    fn respects_operator_precedence() {
        assert_eq!(eval("3 + 5 * 2").unwrap(), 13.0);
        assert_eq!(eval("3 * 5 + 2").unwrap(), 17.0);
        assert_eq!(eval("10 - 4 / 2").unwrap(), 8.0);
    }

    #[test]
    fn ties_evaluate_left_to_right() {
        assert_eq!(eval("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(eval("16 / 4 / 2").unwrap(), 2.0);
    }

    #[test]
    fn parentheses_group_subexpressions() {
        assert_eq!(eval("(3 + 5) * 2").unwrap(), 16.0);
        assert_eq!(eval("2 * (1 + 1)").unwrap(), 4.0);
    }

    #[test]
    fn plain_numbers_and_decimals() {
        assert_eq!(eval("42").unwrap(), 42.0);
        assert_eq!(eval("2.5 + 0.5").unwrap(), 3.0);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(eval("1 +").is_err());
        assert!(eval("hello").is_err());
    }

    #[test]
    fn exit_commands() {
        for word in ["x", "exit", "quit", "q"] {
            assert!(is_exit_command(word));
        }
        assert!(!is_exit_command("expression"));
    }
}
