//! Shared helpers for the integration tests

use snippet_engine::engine::{Engine, SnippetEvent, SnippetId, Status};
use snippet_engine::sandbox::{classify_snippet, Sandbox};
use snippet_engine::util::config::EngineConfig;

/// Engine over a fresh sandbox, without the background library index
pub fn engine() -> (Sandbox, Engine) {
    let sandbox = Sandbox::new();
    let config = EngineConfig {
        index_library: false,
        ..EngineConfig::default()
    };
    let engine = sandbox.engine(config);
    (sandbox, engine)
}

/// Submit one snippet and return its events
pub fn eval(
    engine: &mut Engine,
    source: &str,
) -> Vec<SnippetEvent> {
    engine
        .eval(classify_snippet(source))
        .unwrap_or_else(|err| panic!("eval of {:?} failed: {}", source, err))
}

/// Submit one snippet and return the id of the snippet it created
pub fn submit(
    engine: &mut Engine,
    source: &str,
) -> SnippetId {
    eval(engine, source)[0].snippet
}

/// Value of an executed expression
pub fn value(
    engine: &mut Engine,
    source: &str,
) -> Option<String> {
    let events = eval(engine, source);
    assert_eq!(events[0].exception, None, "{} raised", source);
    events[0].value.clone()
}

/// `(snippet, status)` of every event, in order
pub fn transitions(events: &[SnippetEvent]) -> Vec<(SnippetId, Status)> {
    events.iter().map(|e| (e.snippet, e.status)).collect()
}
