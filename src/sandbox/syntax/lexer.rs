//! Lexer for the sandbox language

use crate::util::span::Span;

/// Lexer error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("invalid number literal: {text}")]
    InvalidNumber { text: String, offset: usize },
    #[error("invalid escape sequence: \\{ch}")]
    InvalidEscape { ch: char, offset: usize },
}

impl LexError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString { offset }
            | LexError::UnexpectedChar { offset, .. }
            | LexError::InvalidNumber { offset, .. }
            | LexError::InvalidEscape { offset, .. } => Span::new(*offset, *offset + 1),
        }
    }
}

/// Token kind
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwImport,
    KwClass,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwThrow,
    KwNew,
    KwTrue,
    KwFalse,
    KwNull,

    // Modifiers
    KwPublic,
    KwPrivate,
    KwProtected,
    KwStatic,
    KwFinal,
    KwAbstract,

    Identifier(String),
    IntLiteral(i64),
    DoubleLiteral(f64),
    StringLiteral(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

impl TokenKind {
    /// Text used in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::IntLiteral(v) => format!("'{}'", v),
            TokenKind::DoubleLiteral(v) => format!("'{}'", v),
            TokenKind::StringLiteral(_) => "string literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::KwImport => "import",
            TokenKind::KwClass => "class",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwWhile => "while",
            TokenKind::KwReturn => "return",
            TokenKind::KwThrow => "throw",
            TokenKind::KwNew => "new",
            TokenKind::KwTrue => "true",
            TokenKind::KwFalse => "false",
            TokenKind::KwNull => "null",
            TokenKind::KwPublic => "public",
            TokenKind::KwPrivate => "private",
            TokenKind::KwProtected => "protected",
            TokenKind::KwStatic => "static",
            TokenKind::KwFinal => "final",
            TokenKind::KwAbstract => "abstract",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::Neq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Identifier(_)
            | TokenKind::IntLiteral(_)
            | TokenKind::DoubleLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::Eof => "",
        }
    }
}

/// Token with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn keyword(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "import" => TokenKind::KwImport,
        "class" => TokenKind::KwClass,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "return" => TokenKind::KwReturn,
        "throw" => TokenKind::KwThrow,
        "new" => TokenKind::KwNew,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "null" => TokenKind::KwNull,
        "public" => TokenKind::KwPublic,
        "private" => TokenKind::KwPrivate,
        "protected" => TokenKind::KwProtected,
        "static" => TokenKind::KwStatic,
        "final" => TokenKind::KwFinal,
        "abstract" => TokenKind::KwAbstract,
        _ => return None,
    };
    Some(kind)
}

/// Tokenize `source`; the last token is always [`TokenKind::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        source,
        offset: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek() == Some('/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let start = self.offset;
        let Some(c) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let kind = match c {
            c if c == '_' || unicode_ident::is_xid_start(c) => self.scan_identifier(start),
            c if c.is_ascii_digit() => self.scan_number(start)?,
            '"' => self.scan_string(start)?,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Assign),
            '!' => self.either('=', TokenKind::Neq, TokenKind::Not),
            '<' => self.either('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.either('=', TokenKind::Ge, TokenKind::Gt),
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::And
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::Or
            }
            ch => return Err(LexError::UnexpectedChar { ch, offset: start }),
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.offset),
        })
    }

    fn either(
        &mut self,
        next: char,
        matched: TokenKind,
        otherwise: TokenKind,
    ) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    fn scan_identifier(
        &mut self,
        start: usize,
    ) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == '$' || unicode_ident::is_xid_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.offset];
        keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
    }

    fn scan_number(
        &mut self,
        start: usize,
    ) -> Result<TokenKind, LexError> {
        let mut is_double = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_double && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                is_double = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.offset];
        let invalid = || LexError::InvalidNumber {
            text: text.to_string(),
            offset: start,
        };
        if is_double {
            text.parse().map(TokenKind::DoubleLiteral).map_err(|_| invalid())
        } else {
            text.parse().map(TokenKind::IntLiteral).map_err(|_| invalid())
        }
    }

    fn scan_string(
        &mut self,
        start: usize,
    ) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        loop {
            let escape_at = self.offset;
            match self.advance() {
                None | Some('\n') => return Err(LexError::UnterminatedString { offset: start }),
                Some('"') => return Ok(TokenKind::StringLiteral(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(ch) => return Err(LexError::InvalidEscape { ch, offset: escape_at }),
                    None => return Err(LexError::UnterminatedString { offset: start }),
                },
                Some(c) => value.push(c),
            }
        }
    }
}
