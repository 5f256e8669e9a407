//! Shell session
//!
//! One engine plus the host it runs on. Input goes through the classifier
//! snippet by snippet; each snippet's console output is printed before its
//! feedback.

use std::sync::Arc;

use tracing::debug;

use crate::engine::key::KeyKind;
use crate::engine::{Engine, EngineError, EngineResult, SnippetEvent, SnippetId};
use crate::repl::feedback::Feedback;
use crate::sandbox::{classify, Sandbox, SandboxHost};
use crate::util::config::ShellConfig;

/// Interactive session state
pub struct Session {
    engine: Engine,
    host: Arc<SandboxHost>,
    feedback: Feedback,
}

impl Session {
    pub fn new(config: &ShellConfig) -> Self {
        let sandbox = Sandbox::new();
        Self {
            engine: sandbox.engine(config.engine.clone()),
            host: Arc::clone(sandbox.host()),
            feedback: Feedback::new(config.repl.colors),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Exit status requested by the program, once it exited
    pub fn exit_code(&self) -> Option<i64> {
        self.host.exit_code()
    }

    /// Evaluate every snippet in `input`; returns the lines to print
    pub fn eval(
        &mut self,
        input: &str,
    ) -> EngineResult<Vec<String>> {
        let mut lines = Vec::new();
        for draft in classify(input) {
            debug!(kind = ?draft.sub_kind, "submitting snippet");
            let events = self.engine.eval(draft)?;
            self.report(&events, &mut lines);
            if self.engine.is_closed() {
                break;
            }
        }
        Ok(lines)
    }

    /// Drop by snippet number or by declared name (every overload)
    pub fn drop(
        &mut self,
        target: &str,
    ) -> EngineResult<Vec<String>> {
        let ids: Vec<SnippetId> = match target.parse::<usize>() {
            Ok(number) => vec![SnippetId::from_number(number)],
            Err(_) => self
                .engine
                .snippets()
                .filter(|s| s.kind().is_persistent() && s.status().is_active())
                .filter(|s| s.name() == Some(target) || (s.kind() == KeyKind::Import && s.key().name() == Some(target)))
                .map(|s| s.id())
                .collect(),
        };
        if ids.is_empty() {
            return Ok(vec![format!("|  No such snippet: {}", target)]);
        }

        let mut lines = Vec::new();
        for id in ids {
            match self.engine.drop(id) {
                Ok(events) => self.report(&events, &mut lines),
                Err(err @ (EngineError::UnknownSnippet(_) | EngineError::NotPersistent(_))) => {
                    lines.push(format!("|  {}", err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(lines)
    }

    fn report(
        &self,
        events: &[SnippetEvent],
        lines: &mut Vec<String>,
    ) {
        lines.extend(self.host.take_output());
        lines.extend(self.feedback.render(&self.engine, events));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Session").field("engine", &self.engine).finish_non_exhaustive()
    }
}
