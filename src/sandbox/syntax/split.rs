//! Raw input to snippet sources
//!
//! Input typed at the prompt (or read from a script) may hold several
//! snippets. A snippet ends at a top-level `;` or at the `}` closing a
//! top-level block, unless that block is followed by `else`. Whatever is left
//! without a terminator is the last snippet.

/// Lexical state shared by the splitter and the completeness check
#[derive(Debug, Default)]
struct Scan {
    depth: i32,
    in_string: bool,
    escaped: bool,
    line_comment: bool,
    block_comment: bool,
    prev: Option<char>,
}

impl Scan {
    /// Feed one character; returns true when it is significant code
    fn feed(
        &mut self,
        c: char,
        next: Option<char>,
    ) -> bool {
        let prev = self.prev.replace(c);
        if self.line_comment {
            if c == '\n' {
                self.line_comment = false;
            }
            return false;
        }
        if self.block_comment {
            if c == '/' && prev == Some('*') {
                self.block_comment = false;
            }
            return false;
        }
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return true;
        }
        match (c, next) {
            ('/', Some('/')) => {
                self.line_comment = true;
                false
            }
            ('/', Some('*')) => {
                self.block_comment = true;
                false
            }
            ('"', _) => {
                self.in_string = true;
                true
            }
            ('{' | '(', _) => {
                self.depth += 1;
                true
            }
            ('}' | ')', _) => {
                self.depth -= 1;
                true
            }
            (c, _) => !c.is_whitespace(),
        }
    }
}

/// Split `input` into trimmed snippet sources
pub fn split_snippets(input: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut snippets = Vec::new();
    let mut scan = Scan::default();
    let mut start = 0;
    let mut significant = false;
    // The second char of a comment opener is never fed, so `/*/` stays open
    let mut skip_next = false;

    for (i, &(offset, c)) in chars.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let next = chars.get(i + 1).map(|&(_, n)| n);
        let was_code = !scan.in_string && !scan.line_comment && !scan.block_comment;
        let code = scan.feed(c, next);
        if was_code && (scan.line_comment || scan.block_comment) {
            skip_next = true;
        }
        if !was_code || scan.depth != 0 {
            significant |= code;
            continue;
        }

        let end = offset + c.len_utf8();
        let terminates = match c {
            ';' => true,
            '}' => !next_word_is(&input[end..], "else"),
            _ => false,
        };
        if c != ';' {
            significant |= code;
        }
        if terminates {
            if significant {
                snippets.push(input[start..end].trim());
            }
            start = end;
            significant = false;
        }
    }

    if significant {
        let rest = input[start..].trim();
        if !rest.is_empty() {
            snippets.push(rest);
        }
    }
    snippets
}

fn next_word_is(
    rest: &str,
    word: &str,
) -> bool {
    let rest = rest.trim_start();
    rest.starts_with(word)
        && !rest[word.len()..]
            .chars()
            .next()
            .is_some_and(|c| c == '_' || c.is_alphanumeric())
}

/// Check if input can be submitted, or needs a continuation line
///
/// Input is incomplete while a string, block comment, brace, or parenthesis
/// is still open. An unbalanced closer counts as complete so that the parser
/// gets to report it.
pub fn is_complete(code: &str) -> bool {
    let chars: Vec<char> = code.chars().collect();
    let mut scan = Scan::default();
    let mut skip_next = false;
    for (i, &c) in chars.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let was_code = !scan.in_string && !scan.line_comment && !scan.block_comment;
        scan.feed(c, chars.get(i + 1).copied());
        if was_code && (scan.line_comment || scan.block_comment) {
            skip_next = true;
        }
        if scan.depth < 0 {
            return true;
        }
    }
    scan.depth == 0 && !scan.in_string && !scan.block_comment
}
