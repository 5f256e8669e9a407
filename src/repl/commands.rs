//! REPL command handler
//!
//! Handles lines starting with `/`.

use crate::engine::{Snippet, Status};
use crate::repl::feedback::describe;
use crate::repl::session::Session;

/// Command result
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Exit the REPL
    Exit,
    /// Nothing to print
    Continue,
    /// Lines to print
    Output(Vec<String>),
}

/// Command handler for one session
pub struct CommandHandler<'a> {
    session: &'a mut Session,
}

impl<'a> CommandHandler<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Check if `line` is a command rather than code
    pub fn is_command(line: &str) -> bool {
        line.trim_start().starts_with('/')
    }

    /// Handle a command line
    pub fn handle(
        &mut self,
        line: &str,
    ) -> CommandResult {
        let cmd = line.trim().trim_start_matches('/');
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        match parts.first().copied().unwrap_or("") {
            "exit" | "quit" | "q" => CommandResult::Exit,
            "help" | "h" | "?" => CommandResult::Output(help()),
            "list" | "l" => listing(
                self.session.engine().snippets().filter(|s| s.status().is_active()),
                |s| format!("{:>4} : {}", s.id(), s.source()),
            ),
            "vars" | "v" => listing(self.session.engine().variables(), status_line),
            "methods" | "m" => listing(self.session.engine().methods(), status_line),
            "types" | "t" => listing(self.session.engine().types(), status_line),
            "imports" | "i" => listing(self.session.engine().imports(), |s| format!("|    {}", s.source())),
            "drop" | "d" => match parts.get(1) {
                Some(target) => match self.session.drop(target) {
                    Ok(lines) => CommandResult::Output(lines),
                    Err(err) => CommandResult::Output(vec![format!("|  {}", err)]),
                },
                None => CommandResult::Output(vec!["|  Usage: /drop <name|id>".to_string()]),
            },
            "lookup" => {
                let prefix = parts.get(1).copied().unwrap_or("");
                match self.session.engine().indexer() {
                    Some(indexer) => {
                        indexer.flush();
                        listing(indexer.lookup(prefix).iter(), |entry| {
                            format!("|    {:<20} {}", entry.qualified_name, entry.detail)
                        })
                    }
                    None => CommandResult::Output(vec!["|  Library indexing is disabled".to_string()]),
                }
            }
            "" => CommandResult::Continue,
            other => CommandResult::Output(vec![format!("|  Unknown command: /{}", other)]),
        }
    }
}

fn listing<T>(
    items: impl Iterator<Item = T>,
    line: impl Fn(T) -> String,
) -> CommandResult {
    let lines: Vec<String> = items.map(line).collect();
    if lines.is_empty() {
        CommandResult::Continue
    } else {
        CommandResult::Output(lines)
    }
}

fn status_line(snippet: &Snippet) -> String {
    match snippet.status() {
        Status::Valid => format!("|    {}", describe(snippet)),
        status => format!("|    {} ({})", describe(snippet), status),
    }
}

fn help() -> Vec<String> {
    [
        "Type a declaration, statement, or expression to evaluate it.",
        "",
        "  /list              list the snippets you have typed",
        "  /vars              list declared variables",
        "  /methods           list declared methods",
        "  /types             list declared classes",
        "  /imports           list active imports",
        "  /drop <name|id>    delete a declaration or import",
        "  /lookup <prefix>   search the library",
        "  /help              show this help",
        "  /exit              leave the shell",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}
