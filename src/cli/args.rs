//! Defines the command-line arguments and subcommands for the weft CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "weft",
    version,
    about = "A parser-construction toolkit: script-compiled tokenizers and grammars."
)]
pub struct WeftArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Tokenize an input file and dump the token stream.
    Tokens {
        /// The tokenizer script (.tokens).
        #[arg(required = true)]
        tokens: PathBuf,
        /// The input file to tokenize.
        #[arg(required = true)]
        input: PathBuf,
        /// Emit the token stream as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compile scripts and report diagnostics without parsing anything.
    Check {
        /// The tokenizer script (.tokens).
        #[arg(required = true)]
        tokens: PathBuf,
        /// An optional grammar script (.grammar) to compile against it.
        grammar: Option<PathBuf>,
    },
    /// Run the full pipeline and print the parse tree.
    Parse {
        /// The tokenizer script (.tokens).
        #[arg(required = true)]
        tokens: PathBuf,
        /// The grammar script (.grammar).
        #[arg(required = true)]
        grammar: PathBuf,
        /// The input file to parse.
        #[arg(required = true)]
        input: PathBuf,
        /// Emit the parse tree as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Generate a Rust module mapping rule names to stable ids.
    Codegen {
        /// The tokenizer script (.tokens).
        #[arg(required = true)]
        tokens: PathBuf,
        /// The grammar script (.grammar).
        #[arg(required = true)]
        grammar: PathBuf,
        /// Name of the generated module.
        #[arg(long, default_value = "syntax_ids")]
        module: String,
    },
    /// Interactive arithmetic calculator.
    Calc,
}
