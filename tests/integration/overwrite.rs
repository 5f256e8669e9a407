use snippet_engine::engine::Status;

use crate::common::{engine, eval, submit, transitions, value};

#[test]
fn test_same_erasure_overwrites_other_overload() {
    let (_sandbox, mut engine) = engine();

    let strings = submit(&mut engine, "int f(List<String> l) { return 1; }");
    let events = eval(&mut engine, "int f(List<int> l) { return 2; }");
    let ints = events[0].snippet;

    let old = engine.snippet(strings).unwrap();
    let new = engine.snippet(ints).unwrap();
    assert_ne!(old.key().index(), new.key().index());
    assert_eq!(new.erased_signature(), Some("(List)"));

    assert_eq!(
        transitions(&events),
        vec![(ints, Status::Valid), (strings, Status::Overwritten)]
    );
    assert_eq!(events[1].cause, Some(ints));
    assert_eq!(value(&mut engine, "f(null)").as_deref(), Some("2"));
    assert_eq!(engine.methods().count(), 1);
}

#[test]
fn test_overloads_live_side_by_side() {
    let (_sandbox, mut engine) = engine();

    let by_int = submit(&mut engine, "String g(int a) { return \"int\"; }");
    let events = eval(&mut engine, "String g(String s) { return \"text\"; }");
    assert_eq!(events.len(), 1);
    assert_eq!(engine.status(by_int).unwrap(), Status::Valid);

    assert_eq!(value(&mut engine, "g(1)").as_deref(), Some("\"int\""));
    assert_eq!(value(&mut engine, "g(\"x\")").as_deref(), Some("\"text\""));
    assert_eq!(engine.methods().count(), 2);
}

#[test]
fn test_incompatible_redefinition_moves_to_new_class() {
    let (_sandbox, mut engine) = engine();

    submit(&mut engine, "class Q { int v; }");
    let p = submit(&mut engine, "class P { Q q; int get() { return 1; } }");
    let before = engine.snippet(p).unwrap().class_name().to_string();
    let sequence = engine.snippet(p).unwrap().sequence();

    // P's field now points at a different class, so the loaded P cannot be
    // redefined in place
    let events = eval(&mut engine, "class Q { int v; int w; }");
    let q = events[0].snippet;
    let p_event = events
        .iter()
        .find(|e| e.snippet == p)
        .unwrap_or_else(|| panic!("no event for P in {:?}", events));
    assert_eq!(p_event.status, Status::Valid);
    assert!(p_event.signature_changed);
    assert_eq!(p_event.cause, Some(q));

    let replaced = engine.snippet(p).unwrap();
    assert_ne!(replaced.class_name(), before);
    assert_eq!(replaced.sequence(), sequence + 1);
    assert_eq!(value(&mut engine, "new P().get()").as_deref(), Some("1"));
}

#[test]
fn test_compatible_redefinition_keeps_class() {
    let (_sandbox, mut engine) = engine();

    submit(&mut engine, "int base() { return 1; }");
    let user = submit(&mut engine, "int user() { return base() + 1; }");
    let before = engine.snippet(user).unwrap().class_name().to_string();

    let events = eval(&mut engine, "int base() { return 10; }");
    assert!(events.iter().all(|e| e.snippet != user), "{:?}", events);
    assert_eq!(engine.snippet(user).unwrap().class_name(), before);
    assert_eq!(value(&mut engine, "user()").as_deref(), Some("11"));
}

#[test]
fn test_variable_redeclaration() {
    let (_sandbox, mut engine) = engine();

    let first = submit(&mut engine, "int x = 4;");
    let reader = submit(&mut engine, "int read() { return x; }");
    assert_eq!(value(&mut engine, "x = 9;").as_deref(), Some("9"));
    assert_eq!(value(&mut engine, "read()").as_deref(), Some("9"));

    let events = eval(&mut engine, "String x = \"nine\";");
    let second = events[0].snippet;
    assert_eq!(events[0].value.as_deref(), Some("\"nine\""));
    assert!(events.iter().any(|e| e.snippet == first && e.status == Status::Overwritten));
    let read_event = events
        .iter()
        .find(|e| e.snippet == reader)
        .unwrap_or_else(|| panic!("no event for read in {:?}", events));
    assert_eq!(read_event.status, Status::RecoverableNotDefined);
    assert_eq!(read_event.cause, Some(second));
}
