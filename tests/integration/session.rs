use std::io::Write;

use snippet_engine::engine::EngineError;
use snippet_engine::repl::{CommandHandler, CommandResult, Session};
use snippet_engine::util::config::{self, ShellConfig};

fn session() -> Session {
    let mut config = ShellConfig::default();
    config.repl.colors = false;
    config.engine.index_library = false;
    Session::new(&config)
}

#[test]
fn test_forward_reference_feedback() {
    let mut session = session();
    let lines = session
        .eval("int timesx(int v) { return v * x; } int x = 6; timesx(7)")
        .unwrap();
    assert_eq!(
        lines,
        vec![
            "|  created method timesx(int), however, it cannot be referenced until x is declared".to_string(),
            "|  created variable x".to_string(),
            "x ==> 6".to_string(),
            "|    update modified method timesx(int)".to_string(),
            "$3 ==> 42".to_string(),
        ]
    );
}

#[test]
fn test_replacement_feedback() {
    let mut session = session();
    session.eval("int f() { return 1; }").unwrap();
    let lines = session.eval("double f() { return 2.0; }").unwrap();
    assert_eq!(
        lines,
        vec![
            "|  replaced method f()".to_string(),
            "|    update overwrote method f()".to_string(),
        ]
    );
}

#[test]
fn test_errors_and_exceptions_feedback() {
    let mut session = session();

    let lines = session.eval("int n = \"text\";").unwrap();
    assert_eq!(lines[0], "|  Error:");
    assert!(lines.len() > 1);

    let lines = session.eval("1 / 0").unwrap();
    assert_eq!(lines, vec!["|  Exception java.lang.ArithmeticException: / by zero".to_string()]);
}

#[test]
fn test_program_output_comes_first() {
    let mut session = session();
    let lines = session
        .eval("import lib.sys.*; int loud(int v) { println(v); return v; } loud(5)")
        .unwrap();
    let tail = &lines[lines.len() - 2..];
    assert_eq!(tail, ["5".to_string(), "$3 ==> 5".to_string()]);
}

#[test]
fn test_exit_stops_session() {
    let mut session = session();
    let lines = session
        .eval("import lib.sys.*; exit(4); int never = 1;")
        .unwrap();
    assert!(lines.iter().all(|l| !l.contains("never")), "{:?}", lines);
    assert_eq!(session.exit_code(), Some(4));
    assert!(session.engine().is_closed());
    assert!(matches!(session.eval("1"), Err(EngineError::Closed(_))));
}

#[test]
fn test_commands_after_recovery() {
    let mut session = session();
    session.eval("class Box { int get() { return helper(); } }").unwrap();

    let mut handler = CommandHandler::new(&mut session);
    assert_eq!(
        handler.handle("/types"),
        CommandResult::Output(vec!["|    class Box (RECOVERABLE_DEFINED)".to_string()])
    );
    assert_eq!(
        handler.handle("/list"),
        CommandResult::Output(vec!["   1 : class Box { int get() { return helper(); } }".to_string()])
    );

    session.eval("int helper() { return 3; }").unwrap();
    let mut handler = CommandHandler::new(&mut session);
    assert_eq!(
        handler.handle("/types"),
        CommandResult::Output(vec!["|    class Box".to_string()])
    );
    assert_eq!(
        handler.handle("/lookup lib"),
        CommandResult::Output(vec!["|  Library indexing is disabled".to_string()])
    );
}

#[test]
fn test_session_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[engine]\nclass_prefix = \"$Test\"\nindex_library = false\n\n[repl]\ncolors = false"
    )
    .unwrap();

    let config = config::load_config_file(file.path()).unwrap();
    let mut session = Session::new(&config);
    session.eval("int x = 1;").unwrap();
    let snippet = session.engine().snippets().next().unwrap();
    assert!(snippet.class_name().starts_with("$Test"), "{}", snippet.class_name());
}
