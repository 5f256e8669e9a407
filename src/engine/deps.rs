//! Reference-dependency index
//!
//! Maps a referenced name to the key indices of snippets whose declare or body
//! references include it. Entries are only added when a pass finishes; stale
//! entries are harmless because dependents are filtered by activity before
//! they join a working set.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::engine::key::KeyKind;
use crate::engine::snippet::{Snippet, SubKind};

/// Name to referencing key indices
#[derive(Debug, Default)]
pub struct DependencyIndex {
    by_name: HashMap<String, IndexSet<usize>>,
}

impl DependencyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every name a declaration or import references
    ///
    /// Statements and expressions are never recomputed, so they are not
    /// recorded.
    pub fn record_references(
        &mut self,
        snippet: &Snippet,
    ) {
        if !snippet.kind().is_persistent() {
            return;
        }
        let index = snippet.key().index();
        let names = snippet
            .declare_references()
            .iter()
            .chain(snippet.body_references());
        for name in names {
            self.by_name.entry(name.clone()).or_default().insert(index);
        }
    }

    /// Key indices referencing `name`, in recording order
    pub fn dependents_of_name(
        &self,
        name: &str,
    ) -> impl Iterator<Item = usize> + '_ {
        self.by_name.get(name).into_iter().flatten().copied()
    }

    /// Key indices that may be affected when `snippet` changes
    ///
    /// A declaration affects its own name. A wildcard import may shadow or
    /// supply any name, so it affects everything recorded. Non-persistent
    /// snippets affect nothing.
    pub fn dependents_of(
        &self,
        snippet: &Snippet,
    ) -> IndexSet<usize> {
        if !snippet.kind().is_persistent() {
            return IndexSet::new();
        }
        if snippet.sub_kind() == SubKind::WildcardImport {
            return self.by_name.values().flatten().copied().collect();
        }
        match snippet.unit_name() {
            Some(name) if snippet.kind() != KeyKind::Erroneous => self.dependents_of_name(name).collect(),
            _ => IndexSet::new(),
        }
    }

    /// Number of distinct names recorded
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
