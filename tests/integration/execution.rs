use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use snippet_engine::engine::{EngineError, EvalException, Status};

use crate::common::{engine, eval, submit, value};

#[test]
fn test_user_exceptions_are_reported() {
    let (_sandbox, mut engine) = engine();

    submit(&mut engine, "int boom(int n) { if (n > 2) { throw \"too big\"; } return n; }");
    assert_eq!(value(&mut engine, "boom(2)").as_deref(), Some("2"));

    let events = eval(&mut engine, "boom(3)");
    assert_eq!(events[0].status, Status::Valid);
    assert_eq!(events[0].value, None);
    assert_eq!(
        events[0].exception,
        Some(EvalException::User {
            message: "too big".to_string()
        })
    );

    let events = eval(&mut engine, "1 / 0");
    assert!(matches!(
        &events[0].exception,
        Some(EvalException::User { message }) if message.contains("ArithmeticException")
    ));
}

#[test]
fn test_failed_initializer_keeps_declaration() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "int z = 1 / 0;");
    assert_eq!(events[0].status, Status::Valid);
    assert!(events[0].exception.is_some());
    assert_eq!(engine.variables().count(), 1);
}

#[test]
fn test_declared_type_coerces_initializer() {
    let (_sandbox, mut engine) = engine();

    let events = eval(&mut engine, "double d = 2;");
    assert_eq!(events[0].value.as_deref(), Some("2.0"));
    assert_eq!(value(&mut engine, "d").as_deref(), Some("2.0"));

    submit(&mut engine, "int sq(int n) { int m = n * n; return m; }");
    assert_eq!(value(&mut engine, "sq(4)").as_deref(), Some("16"));
}

#[test]
fn test_stop_interrupts_running_snippet() {
    let (_sandbox, mut engine) = engine();
    let handle = engine.stop_handle();
    let done = Arc::new(AtomicBool::new(false));

    let stopper = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                handle.stop();
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let events = eval(&mut engine, "while (true) { }");
    done.store(true, Ordering::Relaxed);
    stopper.join().unwrap();

    assert_eq!(events[0].status, Status::Valid);
    assert_eq!(events[0].exception, None);
    assert!(!engine.is_closed());
    assert_eq!(value(&mut engine, "40 + 2").as_deref(), Some("42"));
}

#[test]
fn test_exit_closes_engine() {
    let (sandbox, mut engine) = engine();

    submit(&mut engine, "import lib.sys.*;");
    let events = eval(&mut engine, "exit(3);");
    assert_eq!(events[0].status, Status::Valid);
    assert!(engine.is_closed());
    assert_eq!(sandbox.host().exit_code(), Some(3));

    let result = engine.eval(snippet_engine::sandbox::classify_snippet("1 + 1"));
    assert!(matches!(result, Err(EngineError::Closed(_))));
    assert!(matches!(engine.drop(events[0].snippet), Err(EngineError::Closed(_))));
}

#[test]
fn test_close_rejects_further_work() {
    let (_sandbox, mut engine) = engine();

    submit(&mut engine, "int x = 1;");
    engine.close();
    assert!(engine.is_closed());
    assert!(matches!(
        engine.eval(snippet_engine::sandbox::classify_snippet("x")),
        Err(EngineError::Closed(_))
    ));
}

#[test]
fn test_console_output_is_collected() {
    let (sandbox, mut engine) = engine();

    submit(&mut engine, "import lib.sys.println;");
    submit(&mut engine, "void greet(String who) { println(\"hello \" + who); }");
    let events = eval(&mut engine, "greet(\"shell\");");
    assert_eq!(events[0].value, None);
    assert_eq!(sandbox.host().take_output(), vec!["hello shell".to_string()]);
    assert!(sandbox.host().take_output().is_empty());
}
