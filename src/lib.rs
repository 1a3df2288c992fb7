pub use crate::errors::{
    print_error, ErrorKind, ErrorReporting, PhaseContext, SourceContext, WeftError,
};
pub use crate::log::{DiagnosticLog, LogEntry, Severity};

pub mod annotation;
pub mod calc;
pub mod cli;
pub mod errors;
pub mod grammar;
pub mod graph;
pub mod log;
pub mod rules;
pub mod script;
pub mod tokenizer;
