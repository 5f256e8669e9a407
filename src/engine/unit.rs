//! Per-pass evaluation units
//!
//! A [`Unit`] wraps one snippet for the duration of a single `eval` or
//! `drop`. It holds everything the fixpoint loop recomputes (diagnostics,
//! corral attempt, pending redefinitions) and is discarded once the snippet's
//! final state has been written back.

use crate::engine::event::{EvalException, SnippetEvent};
use crate::engine::snippet::{Snippet, SnippetId, Status, SubKind};
use crate::service::{ClassBytes, CompilationUnit};
use crate::util::diagnostic::DiagList;

/// Working state of one snippet during a pass
#[derive(Debug, Clone)]
pub(crate) struct Unit {
    snippet: SnippetId,
    sub_kind: SubKind,
    cause: Option<SnippetId>,
    previous_status: Status,
    status: Status,
    signature_changed: bool,
    initial_class_name: String,

    /// Diagnostics found before compilation (classifier warnings)
    generated: DiagList,
    diagnostics: DiagList,
    corral_diagnostics: DiagList,
    unresolved: Vec<String>,
    attempting_corral: bool,
    dependencies_needed: bool,
    to_redefine: Vec<ClassBytes>,
    erased_signature: Option<String>,

    /// Slot occupant to overwrite when the unit is first initialized
    replaces: Option<SnippetId>,
    secondary_events: Vec<SnippetEvent>,
    wrapped: CompilationUnit,
}

impl Unit {
    /// Unit for a directly submitted snippet
    ///
    /// `previous` is the active occupant of the same slot, if any; its status
    /// becomes the event's previous status.
    pub(crate) fn direct(
        snippet: &Snippet,
        previous: Option<&Snippet>,
        generated: DiagList,
    ) -> Self {
        let previous_status = previous.map(Snippet::status).unwrap_or(Status::Nonexistent);
        Self {
            snippet: snippet.id(),
            sub_kind: snippet.sub_kind(),
            cause: None,
            previous_status,
            status: snippet.status(),
            signature_changed: true,
            initial_class_name: snippet.class_name().to_string(),
            generated,
            diagnostics: DiagList::new(),
            corral_diagnostics: DiagList::new(),
            unresolved: Vec::new(),
            attempting_corral: false,
            dependencies_needed: false,
            to_redefine: Vec::new(),
            erased_signature: None,
            replaces: previous.map(Snippet::id),
            secondary_events: Vec::new(),
            wrapped: CompilationUnit::default(),
        }
    }

    /// Unit for a snippet pulled in because `cause` changed
    pub(crate) fn dependency(
        snippet: &Snippet,
        cause: SnippetId,
    ) -> Self {
        Self {
            snippet: snippet.id(),
            sub_kind: snippet.sub_kind(),
            cause: Some(cause),
            previous_status: snippet.status(),
            status: snippet.status(),
            signature_changed: false,
            initial_class_name: snippet.class_name().to_string(),
            generated: DiagList::new(),
            diagnostics: DiagList::new(),
            corral_diagnostics: DiagList::new(),
            unresolved: Vec::new(),
            attempting_corral: false,
            dependencies_needed: false,
            to_redefine: Vec::new(),
            erased_signature: snippet.erased_signature().map(str::to_string),
            replaces: None,
            secondary_events: Vec::new(),
            wrapped: CompilationUnit::default(),
        }
    }

    pub(crate) fn snippet(&self) -> SnippetId {
        self.snippet
    }

    pub(crate) fn sub_kind(&self) -> SubKind {
        self.sub_kind
    }

    pub(crate) fn is_dependency(&self) -> bool {
        self.cause.is_some()
    }

    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn is_defined(&self) -> bool {
        self.status.is_defined()
    }

    pub(crate) fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub(crate) fn erased_signature(&self) -> Option<&str> {
        self.erased_signature.as_deref()
    }

    pub(crate) fn wrapped(&self) -> &CompilationUnit {
        &self.wrapped
    }

    pub(crate) fn set_wrapped(
        &mut self,
        unit: CompilationUnit,
    ) {
        self.wrapped = unit;
    }

    /// Reset the per-iteration state; returns the slot occupant still waiting
    /// to be overwritten
    pub(crate) fn initialize(&mut self) -> Option<SnippetId> {
        self.attempting_corral = false;
        self.dependencies_needed = false;
        self.to_redefine.clear();
        self.corral_diagnostics = DiagList::new();
        self.replaces.take()
    }

    /// Fragment currently compiled for the snippet
    pub(crate) fn active_fragment<'a>(
        &self,
        snippet: &'a Snippet,
    ) -> &'a str {
        match snippet.corralled() {
            Some(corralled) if self.attempting_corral => corralled,
            _ => snippet.guts(),
        }
    }

    /// Record the analysis diagnostics, already in snippet coordinates
    pub(crate) fn set_diagnostics(
        &mut self,
        diagnostics: DiagList,
    ) {
        self.unresolved = diagnostics.unresolved_names();
        let mut all = diagnostics;
        all.extend(self.generated.iter().cloned());
        self.diagnostics = all;
    }

    /// Record diagnostics of the corralled re-analysis; unresolved names keep
    /// coming from the real fragment
    pub(crate) fn set_corral_diagnostics(
        &mut self,
        diagnostics: DiagList,
    ) {
        self.corral_diagnostics = diagnostics;
    }

    pub(crate) fn set_erased_signature(
        &mut self,
        signature: Option<String>,
    ) {
        if signature.is_some() {
            self.erased_signature = signature;
        }
    }

    /// Errors that can be fixed by declaring something else
    ///
    /// Only declarations recover. A dependency recovers from any error; a
    /// direct submission only from resolution errors, and never when it is a
    /// variable with an initializer.
    pub(crate) fn is_recoverable(&self) -> bool {
        self.diagnostics.has_errors()
            && self.sub_kind.is_declaration()
            && (self.is_dependency()
                || (self.sub_kind != SubKind::VarDeclarationWithInitializer
                    && self.diagnostics.has_resolution_errors_and_no_others()))
    }

    /// Switch to the corralled fragment when the unit is recoverable and has
    /// one
    pub(crate) fn corral_if_needed(
        &mut self,
        snippet: &Snippet,
    ) -> bool {
        self.attempting_corral = self.is_recoverable() && snippet.corralled().is_some();
        self.attempting_corral
    }

    /// Final status of this iteration's analysis
    pub(crate) fn set_status(&mut self) {
        self.status = if !self.diagnostics.has_errors() {
            Status::Valid
        } else if self.is_recoverable() {
            if self.attempting_corral && !self.corral_diagnostics.has_errors() {
                Status::RecoverableDefined
            } else {
                Status::RecoverableNotDefined
            }
        } else {
            Status::Rejected
        };
    }

    /// Generation failed for a unit analysis accepted; returns false when the
    /// unit was not part of the problem
    pub(crate) fn smash(
        &mut self,
        diagnostics: DiagList,
    ) -> bool {
        if !self.is_defined() || !diagnostics.has_errors() {
            return false;
        }
        self.set_diagnostics(diagnostics);
        self.status = if self.is_recoverable() {
            Status::RecoverableNotDefined
        } else {
            Status::Rejected
        };
        true
    }

    /// A method with the same erased signature was overwritten
    pub(crate) fn record_erasure_overwrite(
        &mut self,
        event: SnippetEvent,
    ) {
        self.previous_status = event.previous_status;
        self.signature_changed = true;
        self.secondary_events.push(event);
    }

    pub(crate) fn push_secondary_event(
        &mut self,
        event: SnippetEvent,
    ) {
        self.secondary_events.push(event);
    }

    /// Sort freshly compiled classes into loads and redefinitions; returns
    /// the classes to load
    pub(crate) fn classes_to_load(
        &mut self,
        new: Vec<ClassBytes>,
        stale: Vec<ClassBytes>,
    ) -> Vec<ClassBytes> {
        if !new.is_empty() {
            self.dependencies_needed = true;
        }
        self.to_redefine = stale;
        new
    }

    pub(crate) fn take_redefinitions(&mut self) -> Vec<ClassBytes> {
        std::mem::take(&mut self.to_redefine)
    }

    /// Definedness, class name, or signature changed since the call began
    pub(crate) fn signature_changed(
        &self,
        snippet: &Snippet,
    ) -> bool {
        self.status.is_defined() != self.previous_status.is_defined()
            || (self.status.is_defined() && snippet.class_name() != self.initial_class_name)
            || self.signature_changed
    }

    /// Dependents must be recomputed after this iteration
    ///
    /// A unit still waiting on a missing name always pulls its dependents in,
    /// so that a chain of waiting declarations is re-examined as soon as any
    /// link arrives. Each submission to such a chain of length N costs about
    /// N passes over a growing working set, and building the chain one
    /// declaration at a time grows far faster than linearly in N.
    pub(crate) fn affects_dependents(
        &self,
        snippet: &Snippet,
    ) -> bool {
        self.signature_changed(snippet)
            || self.dependencies_needed
            || self.status == Status::RecoverableNotDefined
    }

    /// Diagnostics to persist on the snippet
    ///
    /// Recoverable snippets report their missing names through the unresolved
    /// list instead of as errors.
    pub(crate) fn final_diagnostics(&self) -> DiagList {
        match self.status {
            Status::RecoverableDefined | Status::RecoverableNotDefined => self.diagnostics.without_resolution_errors(),
            _ => self.diagnostics.clone(),
        }
    }

    /// Event for this unit followed by its secondary events
    pub(crate) fn events(
        &self,
        snippet: &Snippet,
        value: Option<String>,
        exception: Option<EvalException>,
    ) -> Vec<SnippetEvent> {
        let mut events = Vec::with_capacity(1 + self.secondary_events.len());
        events.push(SnippetEvent {
            snippet: self.snippet,
            previous_status: self.previous_status,
            status: snippet.status(),
            signature_changed: self.signature_changed(snippet),
            cause: self.cause,
            value,
            exception,
        });
        events.extend(self.secondary_events.iter().cloned());
        events
    }
}
