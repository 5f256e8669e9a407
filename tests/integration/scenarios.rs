use snippet_engine::engine::{EngineError, SnippetId, Status};

use crate::common::{engine, eval, submit, transitions, value};

#[test]
fn test_drop_variable_leaves_method_waiting() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "int x;");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Status::Valid);
    assert_eq!(events[0].previous_status, Status::Nonexistent);
    let x = events[0].snippet;

    let events = eval(&mut engine, "int timesx(int v) { return v * x; }");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Status::Valid);
    let timesx = events[0].snippet;

    let events = engine.drop(x).unwrap();
    assert_eq!(
        transitions(&events),
        vec![(x, Status::Dropped), (timesx, Status::RecoverableNotDefined)]
    );
    assert_eq!(events[1].cause, Some(x));
    assert!(events[1].signature_changed);
    assert_eq!(engine.unresolved(timesx).unwrap(), ["x".to_string()]);
    assert!(engine.diagnostics(timesx).unwrap().is_empty());

    let events = eval(&mut engine, "int x = 3;");
    assert_eq!(events[0].value.as_deref(), Some("3"));
    assert_eq!(events[1].snippet, timesx);
    assert_eq!(events[1].status, Status::Valid);
    assert_eq!(value(&mut engine, "timesx(2)").as_deref(), Some("6"));
}

#[test]
fn test_mutually_referencing_classes_converge() {
    let (_sandbox, mut engine) = engine();

    let a = submit(&mut engine, "class A { B b; }");
    assert_eq!(engine.status(a).unwrap(), Status::RecoverableNotDefined);
    assert_eq!(engine.unresolved(a).unwrap(), ["B".to_string()]);

    let events = eval(&mut engine, "class B { A a; }");
    let b = events[0].snippet;
    assert_eq!(
        transitions(&events),
        vec![(b, Status::Valid), (a, Status::Valid)]
    );
    assert_eq!(events[1].previous_status, Status::RecoverableNotDefined);
    assert_eq!(events[1].cause, Some(b));
    assert!(engine.unresolved(a).unwrap().is_empty());

    assert_eq!(value(&mut engine, "new B().a").as_deref(), Some("null"));
    assert_eq!(value(&mut engine, "new A().b").as_deref(), Some("null"));
}

#[test]
fn test_redeclaration_with_new_return_type() {
    let (_sandbox, mut engine) = engine();

    let first = submit(&mut engine, "int f() { return 1; }");
    let events = eval(&mut engine, "double f() { return 2.0; }");
    let second = events[0].snippet;
    assert_eq!(
        transitions(&events),
        vec![(second, Status::Valid), (first, Status::Overwritten)]
    );
    assert_eq!(events[0].previous_status, Status::Valid);
    assert_eq!(events[1].cause, Some(second));

    let old = engine.snippet(first).unwrap();
    let new = engine.snippet(second).unwrap();
    assert_eq!(old.key().index(), new.key().index());
    assert_eq!(new.sequence(), old.sequence() + 1);
    assert_ne!(old.class_name(), new.class_name());
    assert_eq!(value(&mut engine, "f()").as_deref(), Some("2.0"));
}

#[test]
fn test_drop_cascades_to_transitive_dependents() {
    let (_sandbox, mut engine) = engine();

    let x = submit(&mut engine, "int x = 2;");
    let timesx = submit(&mut engine, "int timesx(int v) { return v * x; }");
    let twice = submit(&mut engine, "int twice(int v) { return timesx(v) * 2; }");
    let unrelated = submit(&mut engine, "int y = 5;");
    assert_eq!(value(&mut engine, "twice(3)").as_deref(), Some("12"));

    let events = engine.drop(x).unwrap();
    assert_eq!(
        transitions(&events),
        vec![
            (x, Status::Dropped),
            (timesx, Status::RecoverableNotDefined),
            (twice, Status::RecoverableNotDefined),
        ]
    );
    assert_eq!(engine.status(unrelated).unwrap(), Status::Valid);
    assert_eq!(engine.unresolved(twice).unwrap(), ["timesx".to_string()]);
}

#[test]
fn test_drop_overload_leaves_caller_untouched() {
    let (_sandbox, mut engine) = engine();

    submit(&mut engine, "int f(int a) { return a; }");
    let strings = submit(&mut engine, "int f(String s) { return 0; }");
    let g = submit(&mut engine, "int g() { return f(1); }");

    let events = engine.drop(strings).unwrap();
    assert_eq!(transitions(&events), vec![(strings, Status::Dropped)]);
    assert_eq!(engine.status(g).unwrap(), Status::Valid);
    assert_eq!(value(&mut engine, "g()").as_deref(), Some("1"));
}

#[test]
fn test_drop_rules() {
    let (_sandbox, mut engine) = engine();

    let x = submit(&mut engine, "int x;");
    let expr = submit(&mut engine, "1 + 1");
    assert_eq!(engine.drop(expr), Err(EngineError::NotPersistent(expr)));

    let missing = SnippetId::from_number(99);
    assert_eq!(engine.drop(missing), Err(EngineError::UnknownSnippet(missing)));

    assert_eq!(engine.drop(x).unwrap().len(), 1);
    assert!(engine.drop(x).unwrap().is_empty());
    assert_eq!(engine.status(x).unwrap(), Status::Dropped);
}

#[test]
fn test_rejected_input_is_reported_once() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "int f( {");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Status::Rejected);
    assert!(engine.diagnostics(events[0].snippet).unwrap().has_errors());

    let events = eval(&mut engine, "int n = \"text\";");
    assert_eq!(events[0].status, Status::Rejected);
    assert!(engine.variables().next().is_none());
}
