//! Incremental snippet engine
//!
//! The [`Engine`] owns every registry (keys, snippets, dependencies, class
//! artifacts) and drives the collaborators in [`crate::service`]. Each call to
//! [`Engine::eval`] or [`Engine::drop`] runs to completion and returns the
//! events describing every status transition it caused.
//!
//! # Example
//!
//! ```rust,no_run
//! use snippet_engine::sandbox::{classify, Sandbox};
//! use snippet_engine::util::config::EngineConfig;
//!
//! let mut engine = Sandbox::new().engine(EngineConfig::default());
//! for draft in classify("int x = 6; int timesx(int v) { return v * x; }") {
//!     for event in engine.eval(draft).unwrap() {
//!         println!("{}", event);
//!     }
//! }
//! ```

pub mod deps;
pub mod error;
mod eval;
pub mod event;
pub mod key;
pub mod snippet;
pub mod tracker;
mod unit;

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::service::{Compiler, ExecutionHost, HostError, InvokeError, LibraryIndexer, SuspendGuard, Wrapper};
use crate::util::config::EngineConfig;
use crate::util::diagnostic::DiagList;

use deps::DependencyIndex;
use key::{KeyKind, KeyRegistry};
use snippet::SnippetStore;
use tracker::ClassTracker;
use unit::Unit;

pub use error::{EngineError, EngineResult};
pub use event::{EvalException, SnippetEvent};
pub use key::Key;
pub use snippet::{Snippet, SnippetDraft, SnippetId, Status, SubKind};

/// Interrupts a running invocation from another thread
#[derive(Clone)]
pub struct StopHandle {
    host: Arc<dyn ExecutionHost>,
}

impl StopHandle {
    /// Ask the host to stop the running invocation, if any
    pub fn stop(&self) {
        self.host.stop();
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StopHandle").finish_non_exhaustive()
    }
}

/// Incremental evaluation engine
pub struct Engine {
    config: EngineConfig,
    keys: KeyRegistry,
    store: SnippetStore,
    deps: DependencyIndex,
    tracker: ClassTracker,
    wrapper: Arc<dyn Wrapper>,
    compiler: Arc<dyn Compiler>,
    host: Arc<dyn ExecutionHost>,
    indexer: Option<LibraryIndexer>,
    closed: Option<String>,
}

impl Engine {
    /// Create an engine over the given collaborators
    pub fn new(
        config: EngineConfig,
        wrapper: Arc<dyn Wrapper>,
        compiler: Arc<dyn Compiler>,
        host: Arc<dyn ExecutionHost>,
    ) -> Self {
        Self {
            config,
            keys: KeyRegistry::new(),
            store: SnippetStore::new(),
            deps: DependencyIndex::new(),
            tracker: ClassTracker::new(),
            wrapper,
            compiler,
            host,
            indexer: None,
            closed: None,
        }
    }

    /// Suspend `indexer` while the engine is evaluating
    pub fn with_indexer(
        mut self,
        indexer: LibraryIndexer,
    ) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Background library index, if one is attached
    pub fn indexer(&self) -> Option<&LibraryIndexer> {
        self.indexer.as_ref()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one classified snippet
    ///
    /// Returns the primary event for the new snippet first, followed by the
    /// interesting events of overwritten and dependent snippets.
    pub fn eval(
        &mut self,
        draft: SnippetDraft,
    ) -> EngineResult<Vec<SnippetEvent>> {
        self.ensure_open()?;
        let _suspended = self.suspend_indexer();

        if draft.sub_kind == SubKind::Unknown || draft.diagnostics.iter().any(|d| d.is_error()) {
            return Ok(vec![self.reject(draft)]);
        }

        let kind = draft.sub_kind.kind();
        let store = &self.store;
        let registration = self.keys.register(
            kind,
            draft.name.as_deref(),
            draft.parameter_types.as_deref(),
            |key| store.latest(key.index()).is_some_and(|s| s.status().is_active()),
        );
        let previous = if registration.reused {
            self.store.latest(registration.key.index()).map(Snippet::id)
        } else {
            None
        };

        let generated: DiagList = draft.diagnostics.clone().into();
        let id = self.store.next_id();
        let snippet = Snippet::new(
            id,
            registration.key,
            registration.sequence,
            &self.config.class_prefix,
            draft,
        );
        let unit = Unit::direct(&snippet, previous.map(|p| &self.store[p]), generated);
        self.store.insert(snippet);
        debug!(snippet = %id, key = %self.store[id].key(), "eval");

        let units = self.compile_and_load(vec![unit])?;
        self.inherit_diagnostics(id, &units);

        let snippet = &self.store[id];
        let (value, exception) = if snippet.status().is_defined() && snippet.sub_kind().is_executable() {
            self.execute(id)
        } else {
            (None, None)
        };

        let mut events = Vec::new();
        let mut value_and_exception = Some((value, exception));
        for unit in &units {
            let snippet = &self.store[unit.snippet()];
            let unit_events = if unit.snippet() == id {
                let (value, exception) = value_and_exception.take().unwrap_or_default();
                unit.events(snippet, value, exception)
            } else {
                unit.events(snippet, None, None)
            };
            for (i, event) in unit_events.into_iter().enumerate() {
                let primary = unit.snippet() == id && i == 0;
                if primary || event.is_interesting() {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    /// Drop a declaration or import and recompute its dependents
    pub fn drop(
        &mut self,
        id: SnippetId,
    ) -> EngineResult<Vec<SnippetEvent>> {
        self.ensure_open()?;
        let snippet = self.store.get(id).ok_or(EngineError::UnknownSnippet(id))?;
        if !snippet.kind().is_persistent() {
            return Err(EngineError::NotPersistent(id));
        }
        if !snippet.status().is_active() {
            return Ok(Vec::new());
        }
        let _suspended = self.suspend_indexer();

        let previous_status = snippet.status();
        self.store[id].set_status(Status::Dropped);
        debug!(snippet = %id, "drop");

        let dependents = self.dependents(&self.store[id], &Default::default());
        let units = self.compile_and_load(dependents)?;

        let mut events = vec![SnippetEvent {
            snippet: id,
            previous_status,
            status: Status::Dropped,
            signature_changed: true,
            cause: None,
            value: None,
            exception: None,
        }];
        for unit in &units {
            let snippet = &self.store[unit.snippet()];
            events.extend(unit.events(snippet, None, None).into_iter().filter(SnippetEvent::is_interesting));
        }
        Ok(events)
    }

    /// Look up a snippet
    pub fn snippet(
        &self,
        id: SnippetId,
    ) -> Option<&Snippet> {
        self.store.get(id)
    }

    /// Every snippet ever created, in creation order
    pub fn snippets(&self) -> impl Iterator<Item = &Snippet> {
        self.store.iter()
    }

    /// Status of a snippet
    pub fn status(
        &self,
        id: SnippetId,
    ) -> EngineResult<Status> {
        self.snippet(id).map(Snippet::status).ok_or(EngineError::UnknownSnippet(id))
    }

    /// Diagnostics of a snippet's last evaluation
    pub fn diagnostics(
        &self,
        id: SnippetId,
    ) -> EngineResult<&DiagList> {
        self.snippet(id).map(Snippet::diagnostics).ok_or(EngineError::UnknownSnippet(id))
    }

    /// Names a recoverable snippet is waiting for
    pub fn unresolved(
        &self,
        id: SnippetId,
    ) -> EngineResult<&[String]> {
        self.snippet(id).map(Snippet::unresolved).ok_or(EngineError::UnknownSnippet(id))
    }

    /// Active snippets of `kind`
    pub fn active(
        &self,
        kind: KeyKind,
    ) -> impl Iterator<Item = &Snippet> {
        self.store
            .iter()
            .filter(move |s| s.kind() == kind && s.status().is_active())
    }

    /// Active variables
    pub fn variables(&self) -> impl Iterator<Item = &Snippet> {
        self.active(KeyKind::Variable)
    }

    /// Active methods
    pub fn methods(&self) -> impl Iterator<Item = &Snippet> {
        self.active(KeyKind::Method)
    }

    /// Active types
    pub fn types(&self) -> impl Iterator<Item = &Snippet> {
        self.active(KeyKind::Type)
    }

    /// Active imports
    pub fn imports(&self) -> impl Iterator<Item = &Snippet> {
        self.active(KeyKind::Import)
    }

    /// Handle for interrupting evaluation from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            host: Arc::clone(&self.host),
        }
    }

    /// Close the engine; later calls fail with [`EngineError::Closed`]
    pub fn close(&mut self) {
        if self.closed.is_none() {
            info!("engine closed");
            self.closed = Some("closed by user".to_string());
        }
    }

    /// Check if the engine is closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        match &self.closed {
            Some(reason) => Err(EngineError::Closed(reason.clone())),
            None => Ok(()),
        }
    }

    fn suspend_indexer(&self) -> Option<SuspendGuard> {
        self.indexer.as_ref().map(LibraryIndexer::suspend)
    }

    /// Close the engine because the host failed
    pub(crate) fn host_failed(
        &mut self,
        err: HostError,
    ) -> EngineError {
        error!(%err, "execution host failed, closing engine");
        self.closed = Some(err.to_string());
        err.into()
    }

    /// Erroneous input is rejected without compiling
    fn reject(
        &mut self,
        draft: SnippetDraft,
    ) -> SnippetEvent {
        let registration = self.keys.register(KeyKind::Erroneous, None, None, |_| false);
        let diagnostics: DiagList = draft.diagnostics.clone().into();
        let id = self.store.next_id();
        let mut snippet = Snippet::new(
            id,
            registration.key,
            registration.sequence,
            &self.config.class_prefix,
            draft,
        );
        snippet.set_compilation_status(Status::Rejected, Vec::new(), diagnostics);
        self.store.insert(snippet);
        debug!(snippet = %id, "rejected before compilation");
        SnippetEvent {
            snippet: id,
            previous_status: Status::Nonexistent,
            status: Status::Rejected,
            signature_changed: false,
            cause: None,
            value: None,
            exception: None,
        }
    }

    /// A snippet that failed without saying why takes the diagnostics of the
    /// snippets processed with it
    fn inherit_diagnostics(
        &mut self,
        id: SnippetId,
        units: &[Unit],
    ) {
        let snippet = &self.store[id];
        if snippet.status().is_defined() || !snippet.diagnostics().is_empty() || !snippet.unresolved().is_empty() {
            return;
        }
        let inherited: DiagList = units
            .iter()
            .filter(|u| u.snippet() != id)
            .flat_map(|u| self.store[u.snippet()].diagnostics().iter().cloned())
            .collect();
        self.store[id].set_diagnostics(inherited);
    }

    /// Invoke the entry point of a defined executable snippet
    fn execute(
        &mut self,
        id: SnippetId,
    ) -> (Option<String>, Option<EvalException>) {
        let snippet = &self.store[id];
        let has_value = snippet.sub_kind().has_value();
        match self.host.invoke(snippet.class_name(), &self.config.entry_point) {
            Ok(value) => (value.filter(|_| has_value), None),
            Err(InvokeError::User { message }) => (None, Some(EvalException::User { message })),
            Err(InvokeError::Unresolved { class_name, member }) => {
                let owner = self.store.by_class_name(&class_name).map(Snippet::id);
                (
                    None,
                    Some(EvalException::UnresolvedReference {
                        snippet: owner,
                        member,
                    }),
                )
            }
            Err(InvokeError::Stopped) => {
                debug!(snippet = %id, "stopped");
                (None, None)
            }
            Err(InvokeError::Host(err)) => {
                self.host_failed(err);
                (None, None)
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("snippets", &self.store.len())
            .field("keys", &self.keys.len())
            .field("classes", &self.tracker.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
