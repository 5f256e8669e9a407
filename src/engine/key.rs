//! Snippet identity
//!
//! A [`Key`] names the *slot* a snippet occupies. Persistent declarations
//! (imports, types, methods, variables) with the same kind and name, and for
//! methods the same written parameter types, share a slot: redeclaring them
//! reuses the key and bumps the slot's sequence number. Statements,
//! expressions, and erroneous input always get a fresh key.

use std::collections::HashMap;
use std::fmt;

/// Key kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Import,
    Type,
    Method,
    Variable,
    Statement,
    Expression,
    Erroneous,
}

impl KeyKind {
    /// Persistent kinds can be overwritten and depended upon
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            KeyKind::Import | KeyKind::Type | KeyKind::Method | KeyKind::Variable
        )
    }
}

impl fmt::Display for KeyKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            KeyKind::Import => "import",
            KeyKind::Type => "type",
            KeyKind::Method => "method",
            KeyKind::Variable => "variable",
            KeyKind::Statement => "statement",
            KeyKind::Expression => "expression",
            KeyKind::Erroneous => "erroneous",
        };
        write!(f, "{}", name)
    }
}

/// Immutable snippet identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    index: usize,
    kind: KeyKind,
    name: Option<String>,
    parameter_types: Option<String>,
}

impl Key {
    /// Monotonic index, never reused by another slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Kind tag
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Declared name, for persistent kinds
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Written parameter types, for methods
    pub fn parameter_types(&self) -> Option<&str> {
        self.parameter_types.as_deref()
    }
}

impl fmt::Display for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match (&self.name, &self.parameter_types) {
            (Some(name), Some(params)) => write!(f, "#{} {} {}({})", self.index, self.kind, name, params),
            (Some(name), None) => write!(f, "#{} {} {}", self.index, self.kind, name),
            _ => write!(f, "#{} {}", self.index, self.kind),
        }
    }
}

/// Slot lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotId {
    kind: KeyKind,
    name: String,
    parameter_types: String,
}

#[derive(Debug)]
struct Slot {
    key: Key,
    sequence: u32,
}

/// Result of [`KeyRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Key for the new snippet
    pub key: Key,
    /// Sequence number within the slot
    pub sequence: u32,
    /// The slot already existed with an active occupant
    pub reused: bool,
}

/// Allocates keys and tracks per-slot sequence numbers
#[derive(Debug)]
pub struct KeyRegistry {
    next_index: usize,
    slots: HashMap<SlotId, usize>,
    by_index: HashMap<usize, Slot>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_index: 1,
            slots: HashMap::new(),
            by_index: HashMap::new(),
        }
    }

    /// Register a snippet
    ///
    /// A persistent snippet reuses an existing slot only when
    /// `occupant_active` reports that the slot's current occupant is still
    /// active; otherwise a fresh index is allocated.
    pub fn register(
        &mut self,
        kind: KeyKind,
        name: Option<&str>,
        parameter_types: Option<&str>,
        occupant_active: impl FnOnce(&Key) -> bool,
    ) -> Registration {
        let parameter_types = if kind == KeyKind::Method {
            Some(parameter_types.unwrap_or_default().to_string())
        } else {
            None
        };

        let slot_id = match (kind.is_persistent(), name) {
            (true, Some(name)) => Some(SlotId {
                kind,
                name: name.to_string(),
                parameter_types: parameter_types.clone().unwrap_or_default(),
            }),
            _ => None,
        };

        let existing = slot_id
            .as_ref()
            .and_then(|id| self.slots.get(id))
            .and_then(|index| self.by_index.get_mut(index));
        if let Some(slot) = existing {
            if occupant_active(&slot.key) {
                slot.sequence += 1;
                return Registration {
                    key: slot.key.clone(),
                    sequence: slot.sequence,
                    reused: true,
                };
            }
        }

        let index = self.next_index;
        self.next_index += 1;
        let key = Key {
            index,
            kind,
            name: if kind.is_persistent() { name.map(str::to_string) } else { None },
            parameter_types,
        };
        if let Some(slot_id) = slot_id {
            self.slots.insert(slot_id, index);
        }
        self.by_index.insert(
            index,
            Slot {
                key: key.clone(),
                sequence: 0,
            },
        );
        Registration {
            key,
            sequence: 0,
            reused: false,
        }
    }

    /// Bump and return the sequence number of the slot at `index`
    ///
    /// Used when a snippet must move to a brand-new class name.
    pub fn next_sequence(
        &mut self,
        index: usize,
    ) -> u32 {
        match self.by_index.get_mut(&index) {
            Some(slot) => {
                slot.sequence += 1;
                slot.sequence
            }
            None => 0,
        }
    }

    /// Current sequence number of the slot at `index`
    pub fn sequence(
        &self,
        index: usize,
    ) -> Option<u32> {
        self.by_index.get(&index).map(|slot| slot.sequence)
    }

    /// Number of keys allocated so far
    pub fn len(&self) -> usize {
        self.next_index - 1
    }

    /// Check if no key was ever allocated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_redeclaration_reuses_slot() {
        let mut keys = KeyRegistry::new();
        let first = keys.register(KeyKind::Variable, Some("x"), None, |_| true);
        let second = keys.register(KeyKind::Variable, Some("x"), None, |_| true);
        assert_eq!(first.key, second.key);
        assert!(second.reused);
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn test_inactive_occupant_gets_fresh_index() {
        let mut keys = KeyRegistry::new();
        let first = keys.register(KeyKind::Variable, Some("x"), None, |_| true);
        let second = keys.register(KeyKind::Variable, Some("x"), None, |_| false);
        assert_ne!(first.key.index(), second.key.index());
        assert!(!second.reused);
    }

    #[test]
    fn test_method_slots_split_on_parameter_text() {
        let mut keys = KeyRegistry::new();
        let a = keys.register(KeyKind::Method, Some("f"), Some("int"), |_| true);
        let b = keys.register(KeyKind::Method, Some("f"), Some("double"), |_| true);
        let c = keys.register(KeyKind::Method, Some("f"), Some("int"), |_| true);
        assert_ne!(a.key, b.key);
        assert_eq!(a.key, c.key);
        assert_eq!(a.key.parameter_types(), Some("int"));
    }

    #[test]
    fn test_kinds_do_not_share_slots() {
        let mut keys = KeyRegistry::new();
        let var = keys.register(KeyKind::Variable, Some("A"), None, |_| true);
        let ty = keys.register(KeyKind::Type, Some("A"), None, |_| true);
        assert_ne!(var.key.index(), ty.key.index());
    }

    #[test]
    fn test_statements_never_share() {
        let mut keys = KeyRegistry::new();
        let a = keys.register(KeyKind::Expression, Some("1 + 1"), None, |_| true);
        let b = keys.register(KeyKind::Expression, Some("1 + 1"), None, |_| true);
        assert_ne!(a.key, b.key);
        assert_eq!(a.key.name(), None);
    }

    #[test]
    fn test_next_sequence_for_replacement() {
        let mut keys = KeyRegistry::new();
        let reg = keys.register(KeyKind::Statement, None, None, |_| true);
        assert_eq!(keys.next_sequence(reg.key.index()), 1);
        assert_eq!(keys.next_sequence(reg.key.index()), 2);
        assert_eq!(keys.sequence(reg.key.index()), Some(2));
    }

    proptest! {
        #[test]
        fn prop_index_stable_and_sequence_increasing(names in proptest::collection::vec("[a-c]", 1..40)) {
            let mut keys = KeyRegistry::new();
            let mut seen: HashMap<String, (usize, u32)> = HashMap::new();
            for name in names {
                let reg = keys.register(KeyKind::Variable, Some(&name), None, |_| true);
                if let Some((index, sequence)) = seen.get(&name) {
                    prop_assert_eq!(*index, reg.key.index());
                    prop_assert!(reg.sequence > *sequence);
                }
                seen.insert(name, (reg.key.index(), reg.sequence));
            }
            prop_assert_eq!(keys.len(), seen.len());
        }
    }
}
