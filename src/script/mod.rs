//! The script compiler: EBNF-like text in, live rule graphs out.
//!
//! Scripts are parsed with a fixed bootstrap syntax built from the engine's
//! own primitives ([`bootstrap`]), lifted into a small AST ([`ast`]), then
//! compiled into tokenizer or grammar rule graphs ([`compiler`]).

pub mod ast;
pub mod bootstrap;
pub mod compiler;

pub use ast::{CharsetItem, ScriptDecl, ScriptExpr, ScriptItem};
pub use bootstrap::{BootstrapSyntax, ScriptNodes, ScriptTokens, BOOTSTRAP};
pub use compiler::{FsLoader, MemoryLoader, ScriptCompiler, ScriptLoader};
