//! Snippets and the snippet store
//!
//! A snippet has an immutable core produced by the classifier (source, key,
//! sub-kind, guts, references) and evaluation state the engine rewrites during
//! a pass. Only [`Status`] is meant to be read as current truth; the rest is
//! working state for recomputation.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::engine::key::{Key, KeyKind};
use crate::util::diagnostic::{DiagList, Diagnostic};

/// Fine-grained snippet classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKind {
    /// `import a.b.C;`
    SingleImport,
    /// `import a.b.*;`
    WildcardImport,
    /// Class declaration
    Class,
    /// Top-level method declaration
    Method,
    /// Variable without initializer
    VarDeclaration,
    /// Variable with initializer
    VarDeclarationWithInitializer,
    /// `name = value;`
    Assignment,
    /// Any other statement
    Statement,
    /// Bare expression
    Expression,
    /// Input that could not be classified
    Unknown,
}

impl SubKind {
    /// Key kind for this sub-kind
    pub fn kind(&self) -> KeyKind {
        match self {
            SubKind::SingleImport | SubKind::WildcardImport => KeyKind::Import,
            SubKind::Class => KeyKind::Type,
            SubKind::Method => KeyKind::Method,
            SubKind::VarDeclaration | SubKind::VarDeclarationWithInitializer => KeyKind::Variable,
            SubKind::Assignment | SubKind::Statement => KeyKind::Statement,
            SubKind::Expression => KeyKind::Expression,
            SubKind::Unknown => KeyKind::Erroneous,
        }
    }

    /// Declarations can be recovered by corralling
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            SubKind::Class
                | SubKind::Method
                | SubKind::VarDeclaration
                | SubKind::VarDeclarationWithInitializer
        )
    }

    /// Executable snippets are invoked after a successful pass
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            SubKind::VarDeclaration
                | SubKind::VarDeclarationWithInitializer
                | SubKind::Assignment
                | SubKind::Statement
                | SubKind::Expression
        )
    }

    /// Executing the snippet yields a value worth reporting
    pub fn has_value(&self) -> bool {
        matches!(
            self,
            SubKind::VarDeclaration
                | SubKind::VarDeclarationWithInitializer
                | SubKind::Assignment
                | SubKind::Expression
        )
    }
}

/// Snippet lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Placeholder for "no previous snippet"
    Nonexistent,
    /// Fully defined
    Valid,
    /// Signature usable by others despite unresolved references
    RecoverableDefined,
    /// Not usable yet, may become valid without resubmission
    RecoverableNotDefined,
    /// Failed permanently
    Rejected,
    /// Removed by the user
    Dropped,
    /// Superseded by a newer declaration
    Overwritten,
}

impl Status {
    /// Active snippets take part in recomputation
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Status::Valid | Status::RecoverableDefined | Status::RecoverableNotDefined
        )
    }

    /// Defined snippets produce classes others can resolve against
    pub fn is_defined(&self) -> bool {
        matches!(self, Status::Valid | Status::RecoverableDefined)
    }
}

impl fmt::Display for Status {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Status::Nonexistent => "NONEXISTENT",
            Status::Valid => "VALID",
            Status::RecoverableDefined => "RECOVERABLE_DEFINED",
            Status::RecoverableNotDefined => "RECOVERABLE_NOT_DEFINED",
            Status::Rejected => "REJECTED",
            Status::Dropped => "DROPPED",
            Status::Overwritten => "OVERWRITTEN",
        };
        write!(f, "{}", name)
    }
}

/// Snippet handle, stable for the lifetime of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippetId(usize);

impl SnippetId {
    /// 1-based number shown to users
    pub fn get(&self) -> usize {
        self.0
    }

    /// Handle from a user-visible number
    pub fn from_number(number: usize) -> Self {
        Self(number)
    }
}

impl fmt::Display for SnippetId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classifier output: one snippet waiting to be evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetDraft {
    /// Source as entered
    pub source: String,
    /// Classification
    pub sub_kind: SubKind,
    /// Key name (full path for imports)
    pub name: Option<String>,
    /// Name dependents refer to; `*` for wildcard imports
    pub unit_name: Option<String>,
    /// Written parameter types, for methods
    pub parameter_types: Option<String>,
    /// Minimal compilable fragment
    pub guts: String,
    /// Signature-preserving fragment with stubbed bodies, if the kind has one
    pub corralled: Option<String>,
    /// Names visible from the signature
    pub declare_references: Vec<String>,
    /// Names used only in bodies
    pub body_references: Vec<String>,
    /// Diagnostics found while classifying
    pub diagnostics: Vec<Diagnostic>,
}

/// One accepted unit of source
#[derive(Debug, Clone)]
pub struct Snippet {
    id: SnippetId,
    key: Key,
    sub_kind: SubKind,
    source: String,
    unit_name: Option<String>,
    guts: String,
    corralled: Option<String>,
    declare_references: Vec<String>,
    body_references: Vec<String>,

    status: Status,
    sequence: u32,
    class_name: String,
    unresolved: Vec<String>,
    diagnostics: DiagList,
    erased_signature: Option<String>,
}

impl Snippet {
    pub(crate) fn new(
        id: SnippetId,
        key: Key,
        sequence: u32,
        class_prefix: &str,
        draft: SnippetDraft,
    ) -> Self {
        let class_name = class_name_for(class_prefix, key.index(), sequence);
        Self {
            id,
            key,
            sub_kind: draft.sub_kind,
            source: draft.source,
            unit_name: draft.unit_name,
            guts: draft.guts,
            corralled: draft.corralled,
            declare_references: draft.declare_references,
            body_references: draft.body_references,
            status: Status::Nonexistent,
            sequence,
            class_name,
            unresolved: Vec::new(),
            diagnostics: DiagList::new(),
            erased_signature: None,
        }
    }

    /// Handle
    pub fn id(&self) -> SnippetId {
        self.id
    }

    /// Identity
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Key kind
    pub fn kind(&self) -> KeyKind {
        self.sub_kind.kind()
    }

    /// Classification
    pub fn sub_kind(&self) -> SubKind {
        self.sub_kind
    }

    /// Source as entered
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declared name
    pub fn name(&self) -> Option<&str> {
        self.key.name()
    }

    /// Name dependents refer to
    pub fn unit_name(&self) -> Option<&str> {
        self.unit_name.as_deref().or(self.key.name())
    }

    /// Minimal compilable fragment
    pub fn guts(&self) -> &str {
        &self.guts
    }

    /// Stubbed fragment, if the kind supports corralling
    pub fn corralled(&self) -> Option<&str> {
        self.corralled.as_deref()
    }

    /// Names visible from the signature
    pub fn declare_references(&self) -> &[String] {
        &self.declare_references
    }

    /// Names used only in bodies
    pub fn body_references(&self) -> &[String] {
        &self.body_references
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Sequence number within the key's slot
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Class the snippet compiles into
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Referenced names that could not be resolved in the last pass
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Diagnostics of the last pass, in snippet coordinates
    pub fn diagnostics(&self) -> &DiagList {
        &self.diagnostics
    }

    /// Erased parameter signature, for analyzed methods
    pub fn erased_signature(&self) -> Option<&str> {
        self.erased_signature.as_deref()
    }

    pub(crate) fn set_sequence(
        &mut self,
        sequence: u32,
        class_prefix: &str,
    ) {
        self.sequence = sequence;
        self.class_name = class_name_for(class_prefix, self.key.index(), sequence);
    }

    pub(crate) fn set_status(
        &mut self,
        status: Status,
    ) {
        self.status = status;
    }

    pub(crate) fn set_compilation_status(
        &mut self,
        status: Status,
        unresolved: Vec<String>,
        diagnostics: DiagList,
    ) {
        self.status = status;
        self.unresolved = unresolved;
        self.diagnostics = diagnostics;
    }

    pub(crate) fn set_diagnostics(
        &mut self,
        diagnostics: DiagList,
    ) {
        self.diagnostics = diagnostics;
    }

    pub(crate) fn set_erased_signature(
        &mut self,
        signature: Option<String>,
    ) {
        self.erased_signature = signature;
    }
}

impl fmt::Display for Snippet {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{} {}", self.id, self.key, self.status)
    }
}

fn class_name_for(
    prefix: &str,
    index: usize,
    sequence: u32,
) -> String {
    format!("{}{}_{}", prefix, index, sequence)
}

/// Every snippet ever created
#[derive(Debug, Default)]
pub struct SnippetStore {
    snippets: Vec<Snippet>,
    latest_by_key: HashMap<usize, SnippetId>,
}

impl SnippetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle the next inserted snippet will get
    pub(crate) fn next_id(&self) -> SnippetId {
        SnippetId(self.snippets.len() + 1)
    }

    /// Insert a snippet built for [`SnippetStore::next_id`]
    pub(crate) fn insert(
        &mut self,
        snippet: Snippet,
    ) -> SnippetId {
        let id = snippet.id();
        debug_assert_eq!(id, self.next_id());
        self.latest_by_key.insert(snippet.key().index(), id);
        self.snippets.push(snippet);
        id
    }

    /// Look up a snippet
    pub fn get(
        &self,
        id: SnippetId,
    ) -> Option<&Snippet> {
        id.0.checked_sub(1).and_then(|i| self.snippets.get(i))
    }

    /// Most recent snippet created for a key index
    pub fn latest(
        &self,
        key_index: usize,
    ) -> Option<&Snippet> {
        self.latest_by_key
            .get(&key_index)
            .and_then(|id| self.get(*id))
    }

    /// Snippet currently compiled into `class_name`
    pub fn by_class_name(
        &self,
        class_name: &str,
    ) -> Option<&Snippet> {
        self.snippets
            .iter()
            .rev()
            .find(|s| s.class_name() == class_name)
    }

    /// All snippets in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets.iter()
    }

    /// Number of snippets
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

impl Index<SnippetId> for SnippetStore {
    type Output = Snippet;

    /// Panics on an id that was not issued by this store
    fn index(
        &self,
        id: SnippetId,
    ) -> &Self::Output {
        &self.snippets[id.0 - 1]
    }
}

impl IndexMut<SnippetId> for SnippetStore {
    fn index_mut(
        &mut self,
        id: SnippetId,
    ) -> &mut Self::Output {
        &mut self.snippets[id.0 - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::key::KeyRegistry;

    fn draft(
        sub_kind: SubKind,
        name: &str,
    ) -> SnippetDraft {
        SnippetDraft {
            source: format!("{};", name),
            sub_kind,
            name: Some(name.to_string()),
            unit_name: None,
            parameter_types: None,
            guts: format!("{};", name),
            corralled: None,
            declare_references: Vec::new(),
            body_references: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_status_predicates() {
        assert!(Status::Valid.is_defined());
        assert!(Status::RecoverableDefined.is_defined());
        assert!(!Status::RecoverableNotDefined.is_defined());
        assert!(Status::RecoverableNotDefined.is_active());
        assert!(!Status::Overwritten.is_active());
        assert!(!Status::Nonexistent.is_active());
    }

    #[test]
    fn test_sub_kind_classification() {
        assert_eq!(SubKind::WildcardImport.kind(), KeyKind::Import);
        assert!(SubKind::VarDeclarationWithInitializer.is_declaration());
        assert!(!SubKind::Expression.is_declaration());
        assert!(SubKind::Expression.has_value());
        assert!(!SubKind::Statement.has_value());
        assert!(!SubKind::Method.is_executable());
    }

    #[test]
    fn test_store_tracks_latest_per_key() {
        let mut keys = KeyRegistry::new();
        let mut store = SnippetStore::new();

        let reg = keys.register(KeyKind::Variable, Some("x"), None, |_| true);
        let first = store.insert(Snippet::new(store.next_id(), reg.key, reg.sequence, "$S", draft(SubKind::VarDeclaration, "x")));
        let reg = keys.register(KeyKind::Variable, Some("x"), None, |_| true);
        let second = store.insert(Snippet::new(store.next_id(), reg.key, reg.sequence, "$S", draft(SubKind::VarDeclaration, "x")));

        let latest = store.latest(1).unwrap();
        assert_eq!(latest.id(), second);
        assert_ne!(store.get(first).unwrap().class_name(), latest.class_name());
        assert_eq!(store.by_class_name("$S1_1").unwrap().id(), second);
        assert!(store.get(SnippetId::from_number(0)).is_none());
    }

    #[test]
    fn test_sequence_changes_class_name() {
        let mut keys = KeyRegistry::new();
        let reg = keys.register(KeyKind::Method, Some("f"), Some(""), |_| true);
        let mut snippet = Snippet::new(SnippetId(1), reg.key, 0, "$S", draft(SubKind::Method, "f"));
        assert_eq!(snippet.class_name(), "$S1_0");
        snippet.set_sequence(3, "$S");
        assert_eq!(snippet.class_name(), "$S1_3");
    }
}
