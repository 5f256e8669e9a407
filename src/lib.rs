//! Snippet Engine
//!
//! Incremental, dependency-driven evaluation of source snippets for
//! interactive language shells. Declarations may refer to names that do not
//! exist yet; the engine keeps them around in a recoverable state and brings
//! them to life once their references are declared.
//!
//! # Example
//!
//! ```no_run
//! use snippet_engine::repl::Session;
//! use snippet_engine::util::config::ShellConfig;
//!
//! let mut session = Session::new(&ShellConfig::default());
//! for line in session.eval("int timesx(int v) { return v * x; } int x = 6; timesx(7)").unwrap() {
//!     println!("{}", line);
//! }
//! ```
//!
//! # Layout
//!
//! - [`engine`] - keys, snippets, dependencies, and the fixpoint loop
//! - [`service`] - wrapper, compiler, and execution host contracts
//! - [`sandbox`] - a small Java-like language implementing those contracts
//! - [`repl`] - the interactive shell

#![warn(rust_2018_idioms)]

pub mod engine;
pub mod repl;
pub mod sandbox;
pub mod service;
pub mod util;

pub use engine::{Engine, EngineError, EngineResult, SnippetEvent, SnippetId, Status};
pub use sandbox::{classify, Sandbox};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "snip";
