//! Artifact tracker
//!
//! Remembers, per class name, the bytes most recently compiled and the bytes
//! most recently installed in the host, so the engine can tell whether a class
//! must be loaded, redefined, or left alone.

use std::collections::HashMap;

use crate::service::ClassBytes;

/// What installing a class requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Never loaded
    New,
    /// Loaded bytes differ from the compiled bytes
    Stale,
    /// Loaded bytes are the compiled bytes
    Current,
}

#[derive(Debug, Default)]
struct ClassRecord {
    current: Vec<u8>,
    loaded: Option<Vec<u8>>,
}

/// Compiled vs loaded bytes per class name
#[derive(Debug, Default)]
pub struct ClassTracker {
    classes: HashMap<String, ClassRecord>,
}

impl ClassTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember freshly compiled bytes
    pub fn record_compiled(
        &mut self,
        class: &ClassBytes,
    ) {
        self.classes.entry(class.name.clone()).or_default().current = class.bytes.clone();
    }

    /// Install state of `name`; `None` for classes never compiled
    pub fn state(
        &self,
        name: &str,
    ) -> Option<ArtifactState> {
        let record = self.classes.get(name)?;
        Some(match &record.loaded {
            None => ArtifactState::New,
            Some(loaded) if *loaded != record.current => ArtifactState::Stale,
            Some(_) => ArtifactState::Current,
        })
    }

    /// Bytes most recently compiled for `name`
    pub fn compiled(
        &self,
        name: &str,
    ) -> Option<ClassBytes> {
        self.classes.get(name).map(|record| ClassBytes {
            name: name.to_string(),
            bytes: record.current.clone(),
        })
    }

    /// The compiled bytes of `name` are now installed
    pub fn mark_loaded(
        &mut self,
        name: &str,
    ) {
        if let Some(record) = self.classes.get_mut(name) {
            record.loaded = Some(record.current.clone());
        }
    }

    /// Number of classes ever compiled
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class was ever compiled
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(
        name: &str,
        bytes: &[u8],
    ) -> ClassBytes {
        ClassBytes {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_new_then_current_then_stale() {
        let mut tracker = ClassTracker::new();
        assert_eq!(tracker.state("$S1_0"), None);

        tracker.record_compiled(&class("$S1_0", b"a"));
        assert_eq!(tracker.state("$S1_0"), Some(ArtifactState::New));

        tracker.mark_loaded("$S1_0");
        assert_eq!(tracker.state("$S1_0"), Some(ArtifactState::Current));

        tracker.record_compiled(&class("$S1_0", b"a"));
        assert_eq!(tracker.state("$S1_0"), Some(ArtifactState::Current));

        tracker.record_compiled(&class("$S1_0", b"b"));
        assert_eq!(tracker.state("$S1_0"), Some(ArtifactState::Stale));
        assert_eq!(tracker.compiled("$S1_0").unwrap().bytes, b"b".to_vec());
    }

    #[test]
    fn test_failed_redefine_stays_stale() {
        let mut tracker = ClassTracker::new();
        tracker.record_compiled(&class("$S1_0", b"a"));
        tracker.mark_loaded("$S1_0");
        tracker.record_compiled(&class("$S1_0", b"b"));
        // no mark_loaded: the host refused
        assert_eq!(tracker.state("$S1_0"), Some(ArtifactState::Stale));
    }
}
