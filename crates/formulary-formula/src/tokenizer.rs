//! Formula tokenizer.
//!
//! An ordered lexer: at each position the first matching rule wins, in this
//! order: string, number, identifier, brackets, separators, operator cluster,
//! whitespace, and finally a single unrecognized character. Every byte of the
//! input lands in exactly one token, so `reconstruct(&tokenize(x)) == x`.

use std::fmt;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `"text"` with `""` as the escaped quote
    String,
    /// `12`, `3.5`, `1e-3`
    Number,
    /// `[A-Za-z_][A-Za-z0-9_.]*`
    Identifier,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    /// Run of `+ - * / ^ & = < > ! :`
    Operator,
    Whitespace,
    /// Any other single character, including an unterminated quote
    Unknown,
}

/// A lexed slice of formula text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

impl Token {
    /// Create a token
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    /// Check if this is an identifier token
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Check if this token separates call arguments
    pub fn is_separator(&self) -> bool {
        matches!(self.kind, TokenKind::Comma | TokenKind::Semicolon)
    }

    /// Same span and kind with different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

const OPERATOR_CHARS: &str = "+-*/^&=<>!:";

fn is_operator_char(c: char) -> bool {
    OPERATOR_CHARS.contains(c)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Iterator over the tokens of a formula
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `input`
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Length of the longest complete string literal at the cursor.
    ///
    /// A `""` pair is an escaped quote, but its first quote may also close the
    /// literal when no later quote does.
    fn match_string(&self) -> Option<usize> {
        let rest = self.rest();
        let mut chars = rest.char_indices().skip(1).peekable();
        let mut last_close = None;
        while let Some((i, c)) = chars.next() {
            if c == '"' {
                if matches!(chars.peek(), Some((_, '"'))) {
                    last_close = Some(i + 1);
                    chars.next();
                    continue;
                }
                return Some(i + 1);
            }
        }
        last_close
    }

    /// Length of a number at the cursor
    fn match_number(&self) -> usize {
        let bytes = self.rest().as_bytes();
        let digits_from = |start: usize| {
            bytes[start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
        };

        let mut len = digits_from(0);

        // Fraction only when at least one digit follows the dot
        if bytes.get(len) == Some(&b'.') {
            let fraction = digits_from(len + 1);
            if fraction > 0 {
                len += 1 + fraction;
            }
        }

        // Exponent only when complete
        if matches!(bytes.get(len), Some(b'e') | Some(b'E')) {
            let mut cursor = len + 1;
            if matches!(bytes.get(cursor), Some(b'+') | Some(b'-')) {
                cursor += 1;
            }
            let exponent = digits_from(cursor);
            if exponent > 0 {
                len = cursor + exponent;
            }
        }

        len
    }

    fn match_while(&self, first_len: usize, pred: impl Fn(char) -> bool) -> usize {
        first_len
            + self.rest()[first_len..]
                .chars()
                .take_while(|c| pred(*c))
                .map(char::len_utf8)
                .sum::<usize>()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let c = self.rest().chars().next()?;

        let (kind, len) = match c {
            '"' => match self.match_string() {
                Some(len) => (TokenKind::String, len),
                None => (TokenKind::Unknown, 1),
            },
            '0'..='9' => (TokenKind::Number, self.match_number()),
            c if is_identifier_start(c) => (
                TokenKind::Identifier,
                self.match_while(1, is_identifier_continue),
            ),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '{' => (TokenKind::LBrace, 1),
            '}' => (TokenKind::RBrace, 1),
            ',' => (TokenKind::Comma, 1),
            ';' => (TokenKind::Semicolon, 1),
            c if is_operator_char(c) => (TokenKind::Operator, self.match_while(1, is_operator_char)),
            c if c.is_whitespace() => (
                TokenKind::Whitespace,
                self.match_while(c.len_utf8(), char::is_whitespace),
            ),
            c => (TokenKind::Unknown, c.len_utf8()),
        };

        let start = self.pos;
        self.pos += len;
        Some(Token::new(kind, &self.input[start..self.pos], start, self.pos))
    }
}

/// Split formula text into tokens
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

/// Concatenate token text back into formula text
pub fn reconstruct(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}
