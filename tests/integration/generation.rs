//! Code generation failing after analysis accepted a unit

use std::sync::Arc;

use snippet_engine::engine::{Engine, Status};
use snippet_engine::sandbox::wrap::parse_sections;
use snippet_engine::sandbox::{Sandbox, SandboxCompiler, TextWrapper};
use snippet_engine::service::{AnalysisOutcome, CompilationUnit, Compiler, GenerationOutcome};
use snippet_engine::util::config::EngineConfig;
use snippet_engine::util::diagnostic::{codes, Diagnostic};

use crate::common::{eval, submit, value};

/// Refuses to emit code for any unit whose own text mentions `fragile`
struct FragileCompiler(SandboxCompiler);

impl Compiler for FragileCompiler {
    fn analyze(
        &self,
        batch: &[CompilationUnit],
    ) -> AnalysisOutcome {
        self.0.analyze(batch)
    }

    fn generate(
        &self,
        batch: &[CompilationUnit],
    ) -> GenerationOutcome {
        let mut results = match self.0.generate(batch) {
            GenerationOutcome::Ok(results) => results,
            fatal => return fatal,
        };
        for (unit, result) in batch.iter().zip(results.iter_mut()) {
            let fragile = parse_sections(&unit.source)
                .map(|sections| sections.unit.text.contains("fragile"))
                .unwrap_or(false);
            if fragile {
                result.classes.clear();
                result
                    .diagnostics
                    .push(Diagnostic::error(codes::COMPILER_FAILURE, "code too large", None));
            }
        }
        GenerationOutcome::Ok(results)
    }
}

fn fragile_engine(sandbox: &Sandbox) -> Engine {
    let config = EngineConfig {
        index_library: false,
        ..EngineConfig::default()
    };
    let compiler = FragileCompiler(SandboxCompiler::new(config.entry_point.clone()));
    Engine::new(
        config,
        Arc::new(TextWrapper::new()),
        Arc::new(compiler),
        sandbox.host().clone(),
    )
}

#[test]
fn test_generation_failure_rejects_only_that_unit() {
    let sandbox = Sandbox::new();
    let mut engine = fragile_engine(&sandbox);

    submit(&mut engine, "int helper() { return 2; }");
    let events = eval(&mut engine, "int fragile() { return helper(); }");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Status::Rejected);
    let diagnostics = engine.diagnostics(events[0].snippet).unwrap();
    assert!(diagnostics.iter().any(|d| d.code == codes::COMPILER_FAILURE));

    assert!(!engine.is_closed());
    assert_eq!(value(&mut engine, "helper()").as_deref(), Some("2"));
}
