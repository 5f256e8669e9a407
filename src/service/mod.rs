//! Collaborator contracts
//!
//! The engine never parses, type checks, or executes anything itself. It talks
//! to three services through the traits below and hands them only the data
//! one call needs: compilable units, class names, and class bytes.
//!
//! - [`Wrapper`] turns a snippet fragment plus its visible context into a
//!   [`CompilationUnit`] with a [`PositionMap`]
//! - [`Compiler`] analyzes and generates batches of units
//! - [`ExecutionHost`] loads, redefines, and invokes classes
//!
//! [`pool`] provides a bounded worker pool around any compiler and
//! [`indexer`] the background library index.

pub mod indexer;
pub mod pool;

use crate::engine::snippet::SubKind;
use crate::util::diagnostic::Diagnostic;
use crate::util::span::Span;

pub use indexer::{IndexEntry, LibraryIndexer, SuspendGuard};
pub use pool::PooledCompiler;

/// Compiled class name and its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBytes {
    /// Fully qualified class name
    pub name: String,
    /// Opaque class file contents
    pub bytes: Vec<u8>,
}

/// A declaration visible to the fragment being wrapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    /// Class the declaration lives in
    pub class_name: String,
    /// What kind of declaration it is
    pub sub_kind: SubKind,
    /// Source of the declaration (real or corralled)
    pub fragment: String,
}

/// Everything the wrapper needs for one unit
#[derive(Debug, Clone, Copy)]
pub struct WrapRequest<'a> {
    /// Class name the unit must compile into
    pub class_name: &'a str,
    /// Sub-kind of the snippet
    pub sub_kind: SubKind,
    /// Active fragment (guts or corralled guts)
    pub fragment: &'a str,
    /// Declarations the fragment may reference
    pub context: &'a [ContextEntry],
}

/// Maps offsets between a fragment and the compilable unit wrapping it
///
/// The fragment is embedded verbatim, so the mapping is a shift. Offsets in
/// the unit outside the embedded fragment have no fragment counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionMap {
    unit_start: usize,
    fragment_len: usize,
}

impl PositionMap {
    /// Fragment embedded at `unit_start` with length `fragment_len`
    pub fn new(
        unit_start: usize,
        fragment_len: usize,
    ) -> Self {
        Self {
            unit_start,
            fragment_len,
        }
    }

    /// Fragment offset to unit offset
    pub fn to_unit(
        &self,
        offset: usize,
    ) -> usize {
        self.unit_start + offset.min(self.fragment_len)
    }

    /// Unit offset to fragment offset
    pub fn to_fragment(
        &self,
        offset: usize,
    ) -> Option<usize> {
        if offset < self.unit_start || offset > self.unit_start + self.fragment_len {
            return None;
        }
        Some(offset - self.unit_start)
    }

    /// Unit span to fragment span; spans leaving the fragment are clamped
    pub fn span_to_fragment(
        &self,
        span: Span,
    ) -> Option<Span> {
        let start = self.to_fragment(span.start)?;
        let end = self.to_fragment(span.end).unwrap_or(self.fragment_len);
        Some(Span::new(start, end.max(start)))
    }

    /// Offset of the fragment in the unit
    pub fn unit_start(&self) -> usize {
        self.unit_start
    }
}

/// One wrapped fragment, ready for the compiler
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompilationUnit {
    /// Class the unit compiles into
    pub class_name: String,
    /// Complete compilable text
    pub source: String,
    /// Fragment/unit offset translation
    pub map: PositionMap,
}

impl CompilationUnit {
    /// Translate a unit diagnostic into fragment coordinates
    ///
    /// Diagnostics located in the generated part of the unit keep no span.
    pub fn to_fragment_diagnostic(
        &self,
        diagnostic: Diagnostic,
    ) -> Diagnostic {
        let span = diagnostic.span.and_then(|s| self.map.span_to_fragment(s));
        diagnostic.with_span(span)
    }
}

/// Text transformation service
pub trait Wrapper: Send + Sync {
    /// Wrap a fragment into a compilable unit
    fn wrap(
        &self,
        request: &WrapRequest<'_>,
    ) -> CompilationUnit;
}

/// Analysis result for one unit
#[derive(Debug, Clone, Default)]
pub struct UnitAnalysis {
    /// Diagnostics in unit coordinates
    pub diagnostics: Vec<Diagnostic>,
    /// Erased parameter signature, for method declarations that type checked
    pub erased_signature: Option<String>,
}

/// Result of [`Compiler::analyze`]
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// One entry per unit, in batch order
    Ok(Vec<UnitAnalysis>),
    /// The compiler could not process the batch at all
    Fatal(String),
}

/// Generation result for one unit
#[derive(Debug, Clone, Default)]
pub struct UnitGeneration {
    /// Diagnostics in unit coordinates; any error means no classes
    pub diagnostics: Vec<Diagnostic>,
    /// Emitted classes
    pub classes: Vec<ClassBytes>,
}

/// Result of [`Compiler::generate`]
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// One entry per unit, in batch order
    Ok(Vec<UnitGeneration>),
    /// The compiler could not process the batch at all
    Fatal(String),
}

/// Compiler service
///
/// Both operations must be side-effect free: the engine calls them repeatedly
/// on overlapping batches within one pass.
pub trait Compiler: Send + Sync {
    /// Type check a batch
    fn analyze(
        &self,
        batch: &[CompilationUnit],
    ) -> AnalysisOutcome;

    /// Generate classes for a batch
    fn generate(
        &self,
        batch: &[CompilationUnit],
    ) -> GenerationOutcome;
}

/// Per-class install result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Classes that could not be installed, with the reason
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    /// Everything installed
    pub fn all_installed() -> Self {
        Self::default()
    }

    /// Check whether `name` was installed
    pub fn is_installed(
        &self,
        name: &str,
    ) -> bool {
        !self.failed.iter().any(|(failed, _)| failed == name)
    }
}

/// Host failures that are not about a particular invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The execution process is gone
    #[error("execution engine terminated: {0}")]
    Terminated(String),
    /// The host does not support the request
    #[error("operation not implemented by host: {0}")]
    NotImplemented(String),
    /// Anything else that breaks the host protocol
    #[error("host protocol failure: {0}")]
    Internal(String),
}

/// Invocation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// User code raised an exception
    #[error("exception: {message}")]
    User {
        /// Exception message
        message: String,
    },
    /// Execution reached a corralled stub
    #[error("attempted to use {member} in {class_name}, which is not yet defined")]
    Unresolved {
        /// Class holding the stub
        class_name: String,
        /// Member whose stub was reached
        member: String,
    },
    /// Interrupted by [`ExecutionHost::stop`]
    #[error("stopped")]
    Stopped,
    /// Host-level failure
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Execution host
///
/// All methods take `&self` so that [`ExecutionHost::stop`] can be called
/// from another thread while an invocation is running.
pub trait ExecutionHost: Send + Sync {
    /// Install classes that were never loaded
    fn load(
        &self,
        classes: &[ClassBytes],
    ) -> Result<InstallReport, HostError>;

    /// Replace loaded classes in place; failure means structural
    /// incompatibility
    fn redefine(
        &self,
        classes: &[ClassBytes],
    ) -> Result<InstallReport, HostError>;

    /// Run the entry point of a class; returns the display form of the value
    fn invoke(
        &self,
        class_name: &str,
        entry_point: &str,
    ) -> Result<Option<String>, InvokeError>;

    /// Best-effort interrupt of the running invocation
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_map_round_trip() {
        let map = PositionMap::new(40, 10);
        assert_eq!(map.to_unit(3), 43);
        assert_eq!(map.to_fragment(43), Some(3));
        assert_eq!(map.to_fragment(12), None);
        assert_eq!(map.to_fragment(51), None);
    }

    #[test]
    fn test_span_clamped_to_fragment() {
        let map = PositionMap::new(5, 4);
        assert_eq!(map.span_to_fragment(Span::new(6, 20)), Some(Span::new(1, 4)));
        assert_eq!(map.span_to_fragment(Span::new(0, 2)), None);
    }

    #[test]
    fn test_install_report() {
        let report = InstallReport {
            failed: vec![("$Snip1_0".to_string(), "shape changed".to_string())],
        };
        assert!(!report.is_installed("$Snip1_0"));
        assert!(report.is_installed("$Snip2_0"));
    }
}
