//! HostLang tokens.
//!
//! Macro definitions are stored as raw token sequences, so tokens are part of
//! the public data model and not just a lexer detail.

use std::fmt;

/// Reserved words of HostLang. Lexed as atoms, then reclassified.
pub const RESERVED: &[&str] = &[
    "after", "and", "andalso", "band", "begin", "bnot", "bor", "bsl", "bsr", "bxor", "case",
    "catch", "cond", "div", "end", "fun", "if", "let", "not", "of", "or", "orelse", "receive",
    "rem", "try", "when", "xor",
];

/// Punctuation and operator tokens, longest first where prefixes overlap.
pub const PUNCTUATION: &[&str] = &[
    "...", "=:=", "=/=", "..", "::", "->", "<-", "<=", "=>", ":=", "==", "/=", "=<", ">=", "++",
    "--", "<<", ">>", "||", "(", ")", "[", "]", "{", "}", ",", ";", ":", "|", "?", "#", "+",
    "-", "*", "/", "<", ">", "=", "!", ".",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Atom(String),
    Var(String),
    Integer(i64),
    /// An integer literal outside the `i64` range, as written.
    BigInteger(String),
    Float(f64),
    Char(char),
    String(String),
    Keyword(&'static str),
    Punct(&'static str),
    /// The `.` that ends a declaration.
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32) -> Self {
        Self { kind, line }
    }

    pub fn atom(name: impl Into<String>, line: u32) -> Self {
        Self::new(TokenKind::Atom(name.into()), line)
    }

    pub fn punct(text: &'static str, line: u32) -> Self {
        Self::new(TokenKind::Punct(text), line)
    }

    pub fn dot(line: u32) -> Self {
        Self::new(TokenKind::Dot, line)
    }

    pub fn is_punct(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == text)
    }

    /// Atom or variable name, the two shapes that may follow a `?`.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Atom(s) | TokenKind::Var(s) => Some(s),
            _ => None,
        }
    }
}

/// Interns punctuation text to its static spelling.
pub fn punct_str(text: &str) -> Option<&'static str> {
    PUNCTUATION.iter().copied().find(|p| *p == text)
}

pub fn keyword_str(text: &str) -> Option<&'static str> {
    RESERVED.iter().copied().find(|k| *k == text)
}

/// Renders tokens as HostLang source text, one space between tokens.
pub fn tokens_to_string(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.kind.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Atom(name) if is_bare_atom(name) => f.write_str(name),
            TokenKind::Atom(name) => write!(f, "'{}'", escape(name, '\'')),
            TokenKind::Var(name) => f.write_str(name),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::BigInteger(text) => f.write_str(text),
            TokenKind::Float(x) => write!(f, "{:?}", x),
            TokenKind::Char(c) => write!(f, "${}", escape(&c.to_string(), '\0')),
            TokenKind::String(s) => write!(f, "\"{}\"", escape(s, '"')),
            TokenKind::Keyword(k) => f.write_str(k),
            TokenKind::Punct(p) => f.write_str(p),
            TokenKind::Dot => f.write_str("."),
        }
    }
}

fn is_bare_atom(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@')
        && keyword_str(name).is_none()
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
