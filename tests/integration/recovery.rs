use snippet_engine::engine::{EvalException, Status};

use crate::common::{engine, eval, submit, value};

#[test]
fn test_corralled_class_recovers_without_resubmission() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "class Box { int get() { return helper(); } }");
    let boxed = events[0].snippet;
    assert_eq!(events[0].status, Status::RecoverableDefined);
    assert_eq!(engine.unresolved(boxed).unwrap(), ["helper".to_string()]);

    let events = eval(&mut engine, "Box b = new Box();");
    assert_eq!(events[0].status, Status::Valid);

    let events = eval(&mut engine, "b.get()");
    assert_eq!(events[0].value, None);
    match &events[0].exception {
        Some(EvalException::UnresolvedReference { snippet, member }) => {
            assert_eq!(*snippet, Some(boxed));
            assert!(member.contains("get"), "{}", member);
        }
        other => panic!("expected unresolved reference, got {:?}", other),
    }

    let events = eval(&mut engine, "int helper() { return 7; }");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].snippet, boxed);
    assert_eq!(events[1].previous_status, Status::RecoverableDefined);
    assert_eq!(events[1].status, Status::Valid);
    assert!(engine.unresolved(boxed).unwrap().is_empty());

    // The existing instance sees the redefined body
    assert_eq!(value(&mut engine, "b.get()").as_deref(), Some("7"));
}

#[test]
fn test_recovery_is_idempotent() {
    let (_sandbox, mut engine) = engine();

    let boxed = submit(&mut engine, "class Box { int get() { return helper(); } }");
    submit(&mut engine, "int helper() { return 7; }");
    assert_eq!(engine.status(boxed).unwrap(), Status::Valid);

    // Redeclaring the dependency with the same signature changes nothing
    // visible for the class
    let events = eval(&mut engine, "int helper() { return 8; }");
    assert!(events.iter().all(|e| e.snippet != boxed));
    assert_eq!(engine.status(boxed).unwrap(), Status::Valid);
    assert_eq!(value(&mut engine, "new Box().get()").as_deref(), Some("8"));
}

#[test]
fn test_forward_referencing_method_waits() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "int area(int w) { return w * height; }");
    let area = events[0].snippet;
    assert_eq!(events[0].status, Status::RecoverableNotDefined);

    // Calling a method that is not defined yet is an ordinary error
    let events = eval(&mut engine, "area(2)");
    assert_eq!(events[0].status, Status::Rejected);

    let events = eval(&mut engine, "int height = 21;");
    assert_eq!(events[1].snippet, area);
    assert_eq!(events[1].status, Status::Valid);
    assert_eq!(value(&mut engine, "area(2)").as_deref(), Some("42"));
}

#[test]
fn test_initialized_variable_is_not_recoverable() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "int y = later;");
    assert_eq!(events[0].status, Status::Rejected);
    let y = events[0].snippet;
    assert!(engine.diagnostics(y).unwrap().has_errors());

    // Declaring the missing name does not bring a rejected snippet back
    let events = eval(&mut engine, "int later = 1;");
    assert_eq!(events.len(), 1);
    assert_eq!(engine.status(y).unwrap(), Status::Rejected);
}

fn cycle_member(
    i: usize,
    n: usize,
) -> String {
    format!(
        "int f{i}(int k) {{ if (k <= 0) {{ return 0; }} return f{next}(k - 1) + 1; }}",
        i = i,
        next = (i + 1) % n
    )
}

#[test]
fn test_cycle_converges_when_closed() {
    const N: usize = 8;
    let (_sandbox, mut engine) = engine();

    let mut ids = Vec::new();
    for i in 0..N - 1 {
        let events = eval(&mut engine, &cycle_member(i, N));
        assert_eq!(events[0].status, Status::RecoverableNotDefined, "f{}", i);
        ids.push(events[0].snippet);
    }

    let events = eval(&mut engine, &cycle_member(N - 1, N));
    ids.push(events[0].snippet);
    assert_eq!(events[0].status, Status::Valid);
    assert_eq!(events.len(), N);
    for id in &ids {
        assert_eq!(engine.status(*id).unwrap(), Status::Valid);
        assert!(engine.unresolved(*id).unwrap().is_empty());
    }

    assert_eq!(value(&mut engine, "f0(20)").as_deref(), Some("20"));
    assert_eq!(value(&mut engine, "f5(3)").as_deref(), Some("3"));
}
