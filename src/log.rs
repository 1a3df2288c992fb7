//! The bounded diagnostic log.
//!
//! Every compile and parse session owns a `DiagnosticLog` and threads it
//! explicitly through the engine; there is no ambient global log. The buffer
//! is a ring: under pressure the oldest entries are dropped and counted, so an
//! interactive session can keep logging indefinitely without growing.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::annotation::Range;

pub const DEFAULT_LOG_CAPACITY: usize = 512;

/// Severity in descending order, so the derived `Ord` makes `Fatal` the
/// minimum and [`DiagnosticLog::worst`] a plain `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    /// Problems are entries a user must see; info and debug are narration.
    pub fn is_problem(&self) -> bool {
        *self <= Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub range: Option<Range>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "[{}] {} (at {})", self.severity, self.message, range),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: usize,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>, range: Option<Range>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(LogEntry {
            severity,
            message: message.into(),
            range,
        });
    }

    pub fn error(&mut self, message: impl Into<String>, range: Option<Range>) {
        self.push(Severity::Error, message, range);
    }

    pub fn warning(&mut self, message: impl Into<String>, range: Option<Range>) {
        self.push(Severity::Warning, message, range);
    }

    pub fn info(&mut self, message: impl Into<String>, range: Option<Range>) {
        self.push(Severity::Info, message, range);
    }

    pub fn debug(&mut self, message: impl Into<String>, range: Option<Range>) {
        self.push(Severity::Debug, message, range);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries of warning severity or worse.
    pub fn problems(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.severity.is_problem())
    }

    /// The most severe entry recorded, if any.
    pub fn worst(&self) -> Option<Severity> {
        self.entries.iter().map(|e| e.severity).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many entries were evicted to stay within capacity.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}
