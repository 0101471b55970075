//! Tokenizer for TypeScript-style source files.
//!
//! The lexer produces a flat token vector that the [`crate::parser`] walks with
//! arbitrary lookahead. It understands just enough of the language to keep
//! declarations intact: comments, string/template/regex literals, numbers and
//! punctuators. A `/** ... */` comment is attached to the token that follows it
//! so the parser can lift descriptions and `@deprecated` tags onto declarations.

use crate::error::{Error, Result};

/// Kind of a lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Ident(String),
    /// Single or double quoted string, escapes resolved
    Str(String),
    /// Template literal; `text` is the cooked text when there are no substitutions
    Template { text: String, substitutions: bool },
    /// Numeric literal
    Number(f64),
    /// Regular expression literal body (without slashes and flags)
    Regex(String),
    /// Operator or delimiter
    Punct(&'static str),
    /// End of input
    Eof,
}

/// A token with its source position
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    /// Doc comment immediately preceding this token
    pub doc: Option<String>,
    /// Whether a line break separates this token from the previous one
    pub newline_before: bool,
}

// Longest first. `>` is never combined with a following `>` so that nested
// generic argument lists close correctly; the parser re-joins shifts.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "??=", "&&=", "||=", "=>", "==", "!=", "<=", ">=", "&&", "||", "??",
    "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "{", "}", "(", ")", "[",
    "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
    "@", "#",
];

const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

/// Splits TypeScript source into tokens.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Creates a lexer over the given source text
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole input. The returned vector always ends with [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut pending_doc: Option<String> = None;
        let mut newline_before = false;

        // Shebang line
        if self.peek() == Some('#') && self.peek_at(1) == Some('!') {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
        }

        loop {
            let Some(c) = self.peek() else { break };

            if c == '\n' {
                newline_before = true;
                self.advance();
                continue;
            }
            if c.is_whitespace() {
                self.advance();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                let is_doc = self.peek_at(2) == Some('*') && self.peek_at(3) != Some('/');
                let text = self.block_comment()?;
                if text.contains('\n') {
                    newline_before = true;
                }
                if is_doc {
                    pending_doc = Some(clean_doc_comment(&text));
                }
                continue;
            }

            let line = self.line;
            let column = self.column;
            let prev = tokens.last().map(|t| &t.kind);

            let kind = if is_ident_start(c) {
                TokenKind::Ident(self.identifier())
            } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
                TokenKind::Number(self.number()?)
            } else if c == '"' || c == '\'' {
                TokenKind::Str(self.string(c)?)
            } else if c == '`' {
                let (text, substitutions) = self.template()?;
                TokenKind::Template { text, substitutions }
            } else if c == '/' && regex_allowed(prev) {
                TokenKind::Regex(self.regex()?)
            } else {
                TokenKind::Punct(self.punctuator()?)
            };

            tokens.push(Token {
                kind,
                line,
                column,
                doc: pending_doc.take(),
                newline_before,
            });
            newline_before = false;
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
            doc: None,
            newline_before: true,
        });
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse("<source>", self.line, self.column, message)
    }

    fn block_comment(&mut self) -> Result<String> {
        self.advance();
        self.advance();
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(text);
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated block comment")),
            }
        }
    }

    fn identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn number(&mut self) -> Result<f64> {
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('b') | Some('B') => Some(2),
                Some('o') | Some('O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                // may exceed the i64 range, as in 64-bit bigint masks
                let mut value = 0.0_f64;
                let mut any_digit = false;
                while let Some(c) = self.peek() {
                    if let Some(digit) = c.to_digit(radix) {
                        value = value * f64::from(radix) + f64::from(digit);
                        any_digit = true;
                    } else if c != '_' {
                        break;
                    }
                    self.advance();
                }
                if self.peek() == Some('n') {
                    self.advance();
                }
                if !any_digit {
                    return Err(self.error("numeric literal has no digits"));
                }
                return Ok(value);
            }
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // numeric separator
            } else if c == '.' && !seen_dot && !seen_exp && self.peek_at(1) != Some('.') {
                seen_dot = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    self.advance();
                    text.push(sign);
                }
            } else {
                break;
            }
            self.advance();
        }
        if self.peek() == Some('n') {
            self.advance();
        }
        text.parse::<f64>()
            .map_err(|_| self.error(format!("invalid numeric literal `{}`", text)))
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let Some(c) = self.advance() else {
            return Err(self.error("unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'u' => {
                let mut hex = String::new();
                if self.peek() == Some('{') {
                    self.advance();
                    while let Some(h) = self.advance() {
                        if h == '}' {
                            break;
                        }
                        hex.push(h);
                    }
                } else {
                    for _ in 0..4 {
                        if let Some(h) = self.advance() {
                            hex.push(h);
                        }
                    }
                }
                let ch = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                out.push(ch.unwrap_or('\u{fffd}'));
            }
            'x' => {
                let mut hex = String::new();
                for _ in 0..2 {
                    if let Some(h) = self.advance() {
                        hex.push(h);
                    }
                }
                let ch = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                out.push(ch.unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<String> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => self.escape(&mut value)?,
                Some('\n') | None => return Err(self.error("unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<(String, bool)> {
        self.advance();
        let mut text = String::new();
        let mut substitutions = false;
        loop {
            match self.advance() {
                Some('`') => return Ok((text, substitutions)),
                Some('\\') => self.escape(&mut text)?,
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    substitutions = true;
                    self.skip_template_substitution()?;
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated template literal")),
            }
        }
    }

    fn skip_template_substitution(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    self.advance();
                }
                Some(q @ ('"' | '\'')) => {
                    self.string(q)?;
                }
                Some('`') => {
                    self.template()?;
                }
                Some(_) => {
                    self.advance();
                }
                None => return Err(self.error("unterminated template substitution")),
            }
        }
        Ok(())
    }

    fn regex(&mut self) -> Result<String> {
        self.advance();
        let mut body = String::new();
        let mut in_class = false;
        loop {
            match self.advance() {
                Some('\\') => {
                    body.push('\\');
                    match self.advance() {
                        Some(c) if c != '\n' => body.push(c),
                        _ => return Err(self.error("unterminated regular expression")),
                    }
                }
                Some('[') => {
                    in_class = true;
                    body.push('[');
                }
                Some(']') => {
                    in_class = false;
                    body.push(']');
                }
                Some('/') if !in_class => break,
                Some('\n') | None => return Err(self.error("unterminated regular expression")),
                Some(c) => body.push(c),
            }
        }
        // flags
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
        Ok(body)
    }

    fn punctuator(&mut self) -> Result<&'static str> {
        for p in PUNCTUATORS {
            let matches = p.chars().enumerate().all(|(i, pc)| self.peek_at(i) == Some(pc));
            if !matches {
                continue;
            }
            // `a ? .5 : b` is a conditional, not optional chaining
            if *p == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            for _ in 0..p.chars().count() {
                self.advance();
            }
            return Ok(p);
        }
        let c = self.peek().unwrap_or('\0');
        Err(self.error(format!("unexpected character `{}`", c)))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn regex_allowed(prev: Option<&TokenKind>) -> bool {
    match prev {
        None => true,
        Some(TokenKind::Punct(p)) => !matches!(*p, ")" | "]" | "}" | "++" | "--"),
        Some(TokenKind::Ident(word)) => REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()),
        Some(_) => false,
    }
}

/// Strips the leading `*` gutter from a doc comment body.
fn clean_doc_comment(raw: &str) -> String {
    raw.trim_start_matches('*')
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
