//! Comment removal that keeps line numbers intact.
//!
//! Single-line comments (`-- ...`) are dropped up to, but not including,
//! the line break. Block comments (`/* ... */`, nesting allowed) are
//! replaced by as many `\n` as they contained, so every line of code stays
//! on the same line number as in the original text. Comment markers inside
//! string literals and quoted identifiers are left alone. This covers
//! escape strings (`E'it\'s'`), where a backslash escapes the next
//! character, and dollar-quoted bodies (`$$ ... $$`, `$fn$ ... $fn$`).

use std::collections::HashSet;

use tracing::debug;

/// Sanitizer failure, located in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeError {
    /// 1-based line where the offending construct starts.
    pub line: usize,
    /// Description of the problem.
    pub message: String,
}

impl std::fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fatal: Line {}, {}.", self.line, self.message)
    }
}

/// Strips comments from SQL text.
pub fn strip_comments(input: &str) -> Result<String, SanitizeError> {
    let mut sanitizer = Sanitizer::new(input);
    sanitizer.run()?;
    Ok(sanitizer.output)
}

/// 1-based numbers of the lines that start inside a block comment.
///
/// An unterminated block comment covers every line up to the end of the
/// input.
#[must_use]
pub fn block_comment_lines(input: &str) -> HashSet<usize> {
    let mut sanitizer = Sanitizer::new(input);
    if let Err(err) = sanitizer.run() {
        debug!(line = err.line, "Block comment runs to the end of the text");
    }
    sanitizer.commented_lines
}

struct Sanitizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    output: String,
    commented_lines: HashSet<usize>,
}

impl<'a> Sanitizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            output: String::with_capacity(input.len()),
            commented_lines: HashSet::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn follows_word(&self) -> bool {
        self.input[..self.pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
    }

    fn push_advance(&mut self) -> Option<char> {
        let c = self.advance()?;
        self.output.push(c);
        Some(c)
    }

    fn run(&mut self) -> Result<(), SanitizeError> {
        while let Some(c) = self.peek() {
            match c {
                '-' if self.peek_next() == Some('-') => self.skip_line_comment(),
                '/' if self.peek_next() == Some('*') => self.skip_block_comment()?,
                '\'' | '"' => self.copy_quoted(c),
                'E' | 'e' if self.peek_next() == Some('\'') && !self.follows_word() => {
                    self.copy_escape_string();
                }
                '$' if !self.follows_word() => self.copy_dollar_quoted(),
                _ => {
                    self.advance();
                    self.output.push(c);
                }
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n' && c != '\r') {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), SanitizeError> {
        let start_line = self.line;
        let mut depth = 0usize;

        loop {
            match (self.peek(), self.peek_next()) {
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                (Some(c), _) => {
                    self.advance();
                    if c == '\n' {
                        self.output.push('\n');
                        self.commented_lines.insert(self.line);
                    }
                }
                (None, _) => {
                    return Err(SanitizeError {
                        line: start_line,
                        message: if depth > 1 {
                            format!("{depth} nested block comments are not terminated")
                        } else {
                            "block comment is not terminated".to_string()
                        },
                    });
                }
            }
        }
    }

    /// Copies a quoted literal or identifier verbatim. A doubled quote is an
    /// escaped quote. An unterminated quote runs to the end of the input.
    fn copy_quoted(&mut self, quote: char) {
        self.advance();
        self.output.push(quote);

        while let Some(c) = self.advance() {
            self.output.push(c);
            if c == quote {
                if self.peek() == Some(quote) {
                    self.advance();
                    self.output.push(quote);
                } else {
                    break;
                }
            }
        }
    }

    /// Copies an `E'...'` escape string. A backslash escapes the character
    /// after it; a doubled quote is an escaped quote as well.
    fn copy_escape_string(&mut self) {
        self.push_advance();
        self.push_advance();

        while let Some(c) = self.push_advance() {
            match c {
                '\\' => {
                    self.push_advance();
                }
                '\'' if self.peek() == Some('\'') => {
                    self.push_advance();
                }
                '\'' => break,
                _ => {}
            }
        }
    }

    /// Copies a dollar-quoted body, delimiters included. A `$` that does not
    /// open a `$tag$` delimiter (a `$1` parameter, say) is plain code.
    fn copy_dollar_quoted(&mut self) {
        let rest = &self.input[self.pos + 1..];
        let tag_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        let opens =
            rest[tag_len..].starts_with('$') && !tag.starts_with(|c: char| c.is_ascii_digit());
        if !opens {
            self.push_advance();
            return;
        }

        let delimiter = format!("${tag}$");
        let body_start = self.pos + delimiter.len();
        let end = self.input[body_start..]
            .find(&delimiter)
            .map_or(self.input.len(), |at| body_start + at + delimiter.len());
        while self.pos < end {
            self.push_advance();
        }
    }
}
