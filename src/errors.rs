//! Weft error handling.
//!
//! One error type for every phase: graph construction, script compilation, and
//! parse-time faults. Match failure is never an error; it travels as an
//! ordinary `ParseResult` return value. Everything here is for conditions that
//! unwind: registry invariant violations, malformed scripts, and
//! grammar-authored fatal branches.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

use crate::annotation::Range;

/// Source context for error reporting: the script or input text an error
/// points into. Falls back to a synthetic snippet when no real source exists
/// (for example a fault raised while matching a raw token array).
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("// {}", context),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

/// The single error type: what went wrong, where, and how to help.
#[derive(Debug)]
pub struct WeftError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
}

/// All error conditions as a closed enum.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Graph construction - fail-fast invariant violations
    DuplicateRule {
        name: String,
    },
    UnresolvedReference {
        name: String,
    },
    UnknownRule {
        name: String,
    },
    InvalidRule {
        message: String,
    },

    // Parse-time faults - escape normal error recovery
    ZeroLengthRepeat {
        rule: String,
    },
    RecursionLimit {
        rule: String,
    },
    FatalMatch {
        message: String,
    },

    // Script compilation - structural errors in grammar scripts
    SyntaxError {
        message: String,
    },
    MalformedLiteral {
        value: String,
    },
    MalformedCharset {
        value: String,
    },
    UnsupportedConstruct {
        construct: String,
    },
    CircularInclude {
        path: String,
    },
    IncludeFailed {
        path: String,
        reason: String,
    },

    // Boundary concerns
    Io {
        path: String,
        reason: String,
    },
}

/// Where the error happened.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Graph,
    Parse,
    Compile,
    Io,
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateRule { .. }
            | Self::UnresolvedReference { .. }
            | Self::UnknownRule { .. }
            | Self::InvalidRule { .. } => ErrorCategory::Graph,

            Self::ZeroLengthRepeat { .. }
            | Self::RecursionLimit { .. }
            | Self::FatalMatch { .. } => ErrorCategory::Parse,

            Self::SyntaxError { .. }
            | Self::MalformedLiteral { .. }
            | Self::MalformedCharset { .. }
            | Self::UnsupportedConstruct { .. }
            | Self::CircularInclude { .. }
            | Self::IncludeFailed { .. } => ErrorCategory::Compile,

            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::DuplicateRule { .. } => "duplicate_rule",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::UnknownRule { .. } => "unknown_rule",
            Self::InvalidRule { .. } => "invalid_rule",
            Self::ZeroLengthRepeat { .. } => "zero_length_repeat",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::FatalMatch { .. } => "fatal_match",
            Self::SyntaxError { .. } => "syntax_error",
            Self::MalformedLiteral { .. } => "malformed_literal",
            Self::MalformedCharset { .. } => "malformed_charset",
            Self::UnsupportedConstruct { .. } => "unsupported_construct",
            Self::CircularInclude { .. } => "circular_include",
            Self::IncludeFailed { .. } => "include_failed",
            Self::Io { .. } => "io",
        }
    }
}

impl std::error::Error for WeftError {}

impl fmt::Display for WeftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::DuplicateRule { name } => {
                write!(f, "Graph error: rule '{}' is already registered", name)
            }
            ErrorKind::UnresolvedReference { name } => {
                write!(f, "Graph error: reference to undefined rule '{}'", name)
            }
            ErrorKind::UnknownRule { name } => {
                write!(f, "Graph error: no rule named '{}'", name)
            }
            ErrorKind::InvalidRule { message } => {
                write!(f, "Graph error: {}", message)
            }
            ErrorKind::ZeroLengthRepeat { rule } => {
                write!(
                    f,
                    "Parse fault: unbounded repeat of '{}' matched zero elements",
                    rule
                )
            }
            ErrorKind::RecursionLimit { rule } => {
                write!(
                    f,
                    "Parse fault: recursion limit exceeded while matching '{}'",
                    rule
                )
            }
            ErrorKind::FatalMatch { message } => {
                write!(f, "Parse fault: {}", message)
            }
            ErrorKind::SyntaxError { message } => {
                write!(f, "Script error: {}", message)
            }
            ErrorKind::MalformedLiteral { value } => {
                write!(f, "Script error: malformed literal '{}'", value)
            }
            ErrorKind::MalformedCharset { value } => {
                write!(f, "Script error: malformed character set '{}'", value)
            }
            ErrorKind::UnsupportedConstruct { construct } => {
                write!(f, "Script error: {} is not allowed here", construct)
            }
            ErrorKind::CircularInclude { path } => {
                write!(f, "Script error: include cycle through '{}'", path)
            }
            ErrorKind::IncludeFailed { path, reason } => {
                write!(f, "Script error: cannot include '{}': {}", path, reason)
            }
            ErrorKind::Io { path, reason } => {
                write!(f, "I/O error: {}: {}", path, reason)
            }
        }
    }
}

impl Diagnostic for WeftError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

impl WeftError {
    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::DuplicateRule { .. } => "second definition here".into(),
            ErrorKind::UnresolvedReference { .. } => "undefined reference".into(),
            ErrorKind::UnknownRule { .. } => "unknown rule".into(),
            ErrorKind::InvalidRule { .. } => "invalid rule".into(),
            ErrorKind::ZeroLengthRepeat { .. } => "repeat stalled here".into(),
            ErrorKind::RecursionLimit { .. } => "recursion limit".into(),
            ErrorKind::FatalMatch { .. } => "fatal branch reached".into(),
            ErrorKind::SyntaxError { .. } => "syntax error".into(),
            ErrorKind::MalformedLiteral { .. } => "malformed literal".into(),
            ErrorKind::MalformedCharset { .. } => "malformed set".into(),
            ErrorKind::UnsupportedConstruct { .. } => "not allowed here".into(),
            ErrorKind::CircularInclude { .. } => "include cycle".into(),
            ErrorKind::IncludeFailed { .. } => "include failed".into(),
            ErrorKind::Io { .. } => "i/o failure".into(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }
}

/// Context-aware error creation. Each phase context knows which source text
/// its errors point into.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> WeftError;

    fn duplicate_rule(&self, name: &str, span: SourceSpan) -> WeftError {
        self.report(ErrorKind::DuplicateRule { name: name.into() }, span)
    }

    fn unresolved_reference(&self, name: &str, span: SourceSpan) -> WeftError {
        self.report(ErrorKind::UnresolvedReference { name: name.into() }, span)
    }

    fn syntax_error(&self, message: &str, span: SourceSpan) -> WeftError {
        self.report(
            ErrorKind::SyntaxError {
                message: message.into(),
            },
            span,
        )
    }
}

/// Error creation context for a named phase over a known source text.
pub struct PhaseContext {
    pub source: SourceContext,
    pub phase: String,
}

impl PhaseContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source,
            phase: phase.into(),
        }
    }
}

impl ErrorReporting for PhaseContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> WeftError {
        let error_code = format!("weft::{}::{}", self.phase, kind.code_suffix());
        WeftError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }
}

/// Constructor for faults raised inside the matching engine, where no source
/// text is available (the input is an arbitrary element array).
pub fn engine_error(kind: ErrorKind, range: Range) -> WeftError {
    let context = PhaseContext::new(SourceContext::fallback("rule matching"), "match");
    context.report(kind, to_source_span(range))
}

/// Placeholder span for errors with no specific location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts a weft `Range` to a miette `SourceSpan`.
pub fn to_source_span(range: Range) -> SourceSpan {
    SourceSpan::from(range.start..range.end())
}

/// Prints a WeftError with full miette diagnostics.
///
/// Use this for user-facing error display in CLI and REPL contexts.
pub fn print_error(error: WeftError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
