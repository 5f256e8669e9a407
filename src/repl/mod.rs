//! Interactive shell
//!
//! - [`Session`] - engine, host, and feedback for one user
//! - [`LineRepl`] - rustyline front end
//! - [`CommandHandler`] - `/` commands

pub mod commands;
pub mod feedback;
pub mod line;
pub mod session;

pub use commands::{CommandHandler, CommandResult};
pub use feedback::Feedback;
pub use line::LineRepl;
pub use session::Session;
