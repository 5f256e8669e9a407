//! Diagnostics
//!
//! A [`Diagnostic`] is produced by a compiler service in compilable-unit
//! coordinates and translated into snippet coordinates before it is stored on
//! a snippet. Resolution errors (a referenced name could not be found) are
//! distinguished from every other error because only they are recoverable.

use std::fmt;
use std::ops::Deref;

use crate::util::span::{position_of, Span};

/// Diagnostic codes shared by the engine and the sandbox front end
pub mod codes {
    /// A referenced name could not be found
    pub const UNRESOLVED: &str = "E0100";
    /// Type mismatch
    pub const TYPE_MISMATCH: &str = "E0200";
    /// Call with wrong arguments
    pub const BAD_CALL: &str = "E0201";
    /// Illegal modifier or declaration form
    pub const ILLEGAL: &str = "E0300";
    /// Name reserved for generated code
    pub const RESERVED: &str = "E0301";
    /// Syntax error found while classifying input
    pub const SYNTAX: &str = "E0001";
    /// Modifier accepted but ignored
    pub const IGNORED_MODIFIER: &str = "W0100";
    /// Compiler service failed as a whole
    pub const COMPILER_FAILURE: &str = "E0900";
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single compiler message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Error code (see [`codes`])
    pub code: &'static str,
    /// Rendered message
    pub message: String,
    /// Location, in the coordinates of whatever text produced it
    pub span: Option<Span>,
    /// The name that failed to resolve, for resolution errors
    pub symbol: Option<String>,
}

impl Diagnostic {
    /// Create an error
    pub fn error(
        code: &'static str,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            symbol: None,
        }
    }

    /// Create a warning
    pub fn warning(
        code: &'static str,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
            symbol: None,
        }
    }

    /// Create a resolution error for `symbol`
    pub fn unresolved(
        symbol: impl Into<String>,
        what: &str,
        span: Option<Span>,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            severity: Severity::Error,
            code: codes::UNRESOLVED,
            message: format!("cannot find {}: {}", what, symbol),
            span,
            symbol: Some(symbol),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }

    /// Check if this is a resolution error
    pub fn is_resolution(&self) -> bool {
        self.is_error() && self.symbol.is_some()
    }

    /// Replace the span with `span`
    pub fn with_span(
        mut self,
        span: Option<Span>,
    ) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// Diagnostics attributed to one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagList(Vec<Diagnostic>);

impl DiagList {
    /// Create an empty list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a diagnostic
    pub fn push(
        &mut self,
        diagnostic: Diagnostic,
    ) {
        self.0.push(diagnostic);
    }

    /// Append every diagnostic in `other`
    pub fn extend(
        &mut self,
        other: impl IntoIterator<Item = Diagnostic>,
    ) {
        self.0.extend(other);
    }

    /// Check if any diagnostic is an error
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// True when there are errors and every one of them is a resolution error
    pub fn has_resolution_errors_and_no_others(&self) -> bool {
        self.has_errors()
            && self
                .0
                .iter()
                .filter(|d| d.is_error())
                .all(Diagnostic::is_resolution)
    }

    /// Names that failed to resolve, deduplicated, in order of appearance
    pub fn unresolved_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for symbol in self.0.iter().filter_map(|d| d.symbol.as_ref()) {
            if !names.contains(symbol) {
                names.push(symbol.clone());
            }
        }
        names
    }

    /// Everything except resolution errors
    pub fn without_resolution_errors(&self) -> DiagList {
        self.0
            .iter()
            .filter(|d| !d.is_resolution())
            .cloned()
            .collect()
    }

    /// Take the inner vector
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Deref for DiagList {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Diagnostic> for DiagList {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Diagnostic>> for DiagList {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl IntoIterator for DiagList {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Render a diagnostic against the snippet source it belongs to
///
/// ```text
/// error[E0100]: cannot find symbol: x
///    1 | int timesx(int v){ return v*x; }
///      |                              ^
/// ```
pub fn render(
    diagnostic: &Diagnostic,
    source: &str,
) -> String {
    let mut output = format!("{}\n", diagnostic);
    let Some(span) = diagnostic.span else {
        return output;
    };
    let start = position_of(source, span.start);
    let end = position_of(source, span.end.max(span.start));
    if let Some(line) = source.lines().nth(start.line - 1) {
        output.push_str(&format!("{:>4} | {}\n", start.line, line));
        let width = if start.line == end.line {
            end.column.saturating_sub(start.column).max(1)
        } else {
            line.chars().count().saturating_sub(start.column - 1).max(1)
        };
        output.push_str(&format!(
            "{} | {}{}\n",
            " ".repeat(4),
            " ".repeat(start.column - 1),
            "^".repeat(width)
        ));
    }
    output
}
