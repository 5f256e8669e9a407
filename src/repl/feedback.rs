//! Event feedback
//!
//! Turns the events of one `eval` or `drop` into the lines shown to the user:
//!
//! ```text
//! |  created method timesx(int), however, it cannot be referenced until x is declared
//! |  created variable x
//! x ==> 6
//! |    update modified method timesx(int)
//! ```

use owo_colors::OwoColorize;

use crate::engine::key::KeyKind;
use crate::engine::{Engine, EvalException, Snippet, SnippetEvent, Status};
use crate::util::diagnostic::render;

const BAR: &str = "|  ";

/// Renders events, optionally with ANSI colors
#[derive(Debug, Clone, Copy)]
pub struct Feedback {
    colors: bool,
}

impl Feedback {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    fn error(
        &self,
        text: &str,
    ) -> String {
        if self.colors {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    fn note(
        &self,
        text: &str,
    ) -> String {
        if self.colors {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn value(
        &self,
        text: &str,
    ) -> String {
        if self.colors {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    /// Lines for the events of one call, primary event first
    pub fn render(
        &self,
        engine: &Engine,
        events: &[SnippetEvent],
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for event in events {
            let Some(snippet) = engine.snippet(event.snippet) else {
                continue;
            };
            if event.cause.is_none() {
                self.primary(engine, snippet, event, &mut lines);
            } else {
                self.update(engine, snippet, event, &mut lines);
            }
        }
        lines
    }

    fn primary(
        &self,
        engine: &Engine,
        snippet: &Snippet,
        event: &SnippetEvent,
        lines: &mut Vec<String>,
    ) {
        match event.status {
            Status::Rejected => {
                lines.push(self.error(&format!("{}Error:", BAR)));
                for diagnostic in snippet.diagnostics().iter() {
                    for line in render(diagnostic, snippet.source()).lines() {
                        lines.push(self.error(&format!("{}{}", BAR, line)));
                    }
                }
            }
            Status::Dropped => lines.push(self.note(&format!("{}dropped {}", BAR, describe(snippet)))),
            _ if snippet.kind().is_persistent() => {
                let verb = match event.previous_status {
                    Status::Nonexistent | Status::Dropped | Status::Overwritten | Status::Rejected => "created",
                    _ if event.signature_changed => "replaced",
                    _ => "modified",
                };
                lines.push(self.note(&format!(
                    "{}{} {}{}",
                    BAR,
                    verb,
                    describe(snippet),
                    recoverable_suffix(engine, snippet)
                )));
            }
            _ => {}
        }

        if let Some(value) = &event.value {
            let name = match snippet.kind() {
                KeyKind::Variable => snippet.name().unwrap_or_default().to_string(),
                _ => format!("${}", snippet.id()),
            };
            lines.push(self.value(&format!("{} ==> {}", name, value)));
        }
        if let Some(exception) = &event.exception {
            lines.push(self.error(&format!("{}{}", BAR, exception_text(engine, exception))));
        }
    }

    fn update(
        &self,
        engine: &Engine,
        snippet: &Snippet,
        event: &SnippetEvent,
        lines: &mut Vec<String>,
    ) {
        let what = match event.status {
            Status::Overwritten => "overwrote",
            Status::Dropped => "dropped",
            _ if event.status.is_defined() || event.status == Status::RecoverableNotDefined => "modified",
            _ => "rejected",
        };
        let suffix = if event.status.is_active() {
            recoverable_suffix(engine, snippet)
        } else {
            String::new()
        };
        lines.push(self.note(&format!("{}  update {} {}{}", BAR, what, describe(snippet), suffix)));
    }
}

/// `variable x`, `method f(int)`, `class A`, `import lib.math.*`
pub fn describe(snippet: &Snippet) -> String {
    let name = snippet.name().unwrap_or_default();
    match snippet.kind() {
        KeyKind::Variable => format!("variable {}", name),
        KeyKind::Method => format!("method {}({})", name, snippet.key().parameter_types().unwrap_or_default()),
        KeyKind::Type => format!("class {}", name),
        KeyKind::Import => format!("import {}", name),
        other => format!("{} {}", other, snippet.source()),
    }
}

fn recoverable_suffix(
    engine: &Engine,
    snippet: &Snippet,
) -> String {
    let waiting_for = || {
        snippet
            .unresolved()
            .iter()
            .map(|name| resolve_description(engine, name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match snippet.status() {
        Status::RecoverableDefined => format!(", however, it cannot be invoked until {} is declared", waiting_for()),
        Status::RecoverableNotDefined => {
            format!(", however, it cannot be referenced until {} is declared", waiting_for())
        }
        _ => String::new(),
    }
}

/// Unresolved names are described by what they were last declared as
fn resolve_description(
    engine: &Engine,
    name: &str,
) -> String {
    engine
        .snippets()
        .filter(|s| s.name() == Some(name) && s.kind().is_persistent())
        .last()
        .map(|s| match s.kind() {
            KeyKind::Variable => format!("variable {}", name),
            KeyKind::Method => format!("method {}", name),
            KeyKind::Type => format!("class {}", name),
            _ => name.to_string(),
        })
        .unwrap_or_else(|| name.to_string())
}

fn exception_text(
    engine: &Engine,
    exception: &EvalException,
) -> String {
    match exception {
        EvalException::User { message } => format!("Exception {}", message),
        EvalException::UnresolvedReference { snippet, member } => {
            let owner = snippet.and_then(|id| engine.snippet(id));
            match owner {
                Some(owner) => format!(
                    "attempted to use {}, which cannot be invoked until {} is declared",
                    member,
                    owner.unresolved().join(", ")
                ),
                None => exception.to_string(),
            }
        }
    }
}
