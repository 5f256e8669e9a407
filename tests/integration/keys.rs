//! Key registry properties
//!
//! - a live declaration of the same kind and name keeps its key index
//! - every other registration gets a fresh, never reused index
//! - the sequence of a reused slot grows by one per redeclaration
//! - driven through the engine, a key index never has two active snippets

use std::collections::HashMap;

use proptest::prelude::*;
use snippet_engine::engine::key::{KeyKind, KeyRegistry};
use snippet_engine::engine::{Engine, SnippetId};

use crate::common::{engine, eval};

#[derive(Debug, Clone)]
enum Step {
    /// Declare a variable; `live` says whether its previous occupant is active
    Declare { name: usize, live: bool },
    /// A statement, which never shares a key
    Statement,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0usize..4, any::<bool>()).prop_map(|(name, live)| Step::Declare { name, live }),
        1 => Just(Step::Statement),
    ]
}

/// Declarations competing for a handful of slots, some of them rejected
const SOURCES: &[&str] = &[
    "int v0;",
    "String v0;",
    "int v0 = \"s\";",
    "int v1 = 2;",
    "double v1 = v0;",
    "int f(int a) { return a; }",
    "int f(String s) { return 1; }",
    "double f(int a) { return a; }",
    "int f(int a) { return \"s\"; }",
    "int g(List<String> l) { return 1; }",
    "int g(List<int> l) { return 2; }",
    "int h() { return f(1) + v1; }",
    "class C { int n; }",
    "class C { String s; }",
    "v1 + 1",
];

#[derive(Debug, Clone)]
enum Action {
    Eval(usize),
    Drop(usize),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0..SOURCES.len()).prop_map(Action::Eval),
        1 => (1usize..30).prop_map(Action::Drop),
    ]
}

fn active_per_index(engine: &Engine) -> HashMap<usize, Vec<SnippetId>> {
    let mut active: HashMap<usize, Vec<SnippetId>> = HashMap::new();
    for snippet in engine.snippets().filter(|s| s.status().is_active()) {
        active.entry(snippet.key().index()).or_default().push(snippet.id());
    }
    active
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn slots_are_reused_only_while_live(steps in prop::collection::vec(step(), 1..40)) {
        let mut keys = KeyRegistry::new();
        let mut slots: HashMap<usize, (usize, u32)> = HashMap::new();
        let mut seen = Vec::new();

        for step in steps {
            match step {
                Step::Declare { name, live } => {
                    let var = format!("v{}", name);
                    let reg = keys.register(KeyKind::Variable, Some(&var), None, |_| live);
                    match slots.get(&name).copied() {
                        Some((index, sequence)) if live => {
                            prop_assert!(reg.reused);
                            prop_assert_eq!(reg.key.index(), index);
                            prop_assert_eq!(reg.sequence, sequence + 1);
                        }
                        _ => {
                            prop_assert!(!reg.reused);
                            prop_assert_eq!(reg.sequence, 0);
                            prop_assert!(!seen.contains(&reg.key.index()));
                            seen.push(reg.key.index());
                        }
                    }
                    prop_assert_eq!(reg.key.name(), Some(var.as_str()));
                    slots.insert(name, (reg.key.index(), reg.sequence));
                }
                Step::Statement => {
                    let reg = keys.register(KeyKind::Statement, None, None, |_| true);
                    prop_assert!(!reg.reused);
                    prop_assert!(reg.key.name().is_none());
                    prop_assert!(!seen.contains(&reg.key.index()));
                    seen.push(reg.key.index());
                }
            }
        }
        prop_assert_eq!(keys.len(), seen.len());
    }

    #[test]
    fn method_slots_follow_parameter_text(
        params in prop::collection::vec(prop::sample::select(vec!["", "int", "String", "int, int"]), 1..20)
    ) {
        let mut keys = KeyRegistry::new();
        let mut indices: HashMap<&str, usize> = HashMap::new();

        for p in params {
            let reg = keys.register(KeyKind::Method, Some("m"), Some(p), |_| true);
            prop_assert_eq!(reg.key.parameter_types(), Some(p));
            match indices.get(p) {
                Some(index) => prop_assert_eq!(reg.key.index(), *index),
                None => {
                    prop_assert!(!indices.values().any(|i| *i == reg.key.index()));
                    indices.insert(p, reg.key.index());
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn engine_keeps_one_active_snippet_per_key(actions in prop::collection::vec(action(), 1..16)) {
        let (_sandbox, mut engine) = engine();

        for action in actions {
            match action {
                Action::Eval(i) => {
                    eval(&mut engine, SOURCES[i]);
                }
                Action::Drop(n) => {
                    // expressions and unknown ids are refused, which is fine here
                    let _ = engine.drop(SnippetId::from_number(n));
                }
            }
            for (index, ids) in active_per_index(&engine) {
                prop_assert!(ids.len() <= 1, "key {} active in {:?}", index, ids);
            }
        }
    }
}
