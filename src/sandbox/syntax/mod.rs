//! Sandbox language front end
//!
//! Lexing, parsing, and splitting raw input into snippet sources.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod split;

pub use ast::Item;
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse_item, ParseError};
pub use split::{is_complete, split_snippets};
