//! Line-based REPL with rustyline
//!
//! Lines are collected until the buffered input is complete (balanced
//! brackets, closed strings and comments), then evaluated as a whole.

use std::io;

use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, EditMode, Editor};
use tracing::debug;

use crate::repl::commands::{CommandHandler, CommandResult};
use crate::repl::session::Session;
use crate::sandbox::syntax::is_complete;
use crate::util::config::ReplConfig;

/// Interactive shell
pub struct LineRepl {
    config: ReplConfig,
    editor: Editor<(), FileHistory>,
    session: Session,
}

impl LineRepl {
    pub fn new(
        session: Session,
        config: ReplConfig,
    ) -> io::Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .max_history_size(config.history_size)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(rl_config)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Readline error: {:?}", e)))?;

        if let Some(history_file) = &config.history_file {
            if history_file.exists() {
                let _ = editor.load_history(history_file);
            }
        }

        Ok(Self {
            config,
            editor,
            session,
        })
    }

    /// Run until `/exit`, end of input, or program exit; returns the exit status
    pub fn run(&mut self) -> io::Result<i64> {
        println!("snippet shell {}, type /help for help", crate::VERSION);

        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                &self.config.prompt
            } else {
                &self.config.continuation_prompt
            };

            match self.editor.readline(prompt) {
                Ok(line) => {
                    if buffer.is_empty() && CommandHandler::is_command(&line) {
                        let _ = self.editor.add_history_entry(line.as_str());
                        match CommandHandler::new(&mut self.session).handle(&line) {
                            CommandResult::Exit => break,
                            CommandResult::Continue => {}
                            CommandResult::Output(lines) => lines.iter().for_each(|l| println!("{}", l)),
                        }
                        continue;
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');
                    if !is_complete(&buffer) {
                        continue;
                    }
                    let input = std::mem::take(&mut buffer);
                    let _ = self.editor.add_history_entry(input.trim_end());
                    match self.session.eval(&input) {
                        Ok(lines) => lines.iter().for_each(|l| println!("{}", l)),
                        Err(err) => {
                            println!("|  {}", err);
                            break;
                        }
                    }
                    if self.session.engine().is_closed() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("input discarded");
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
            }
        }

        if let Some(history_file) = &self.config.history_file {
            let _ = self.editor.save_history(history_file);
        }
        Ok(self.session.exit_code().unwrap_or(0))
    }
}
