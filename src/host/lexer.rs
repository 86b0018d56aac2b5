//! HostLang Lexer
//!
//! The `RawToken` enum is the logos-derived scanner output. `tokenize` cooks
//! it into line-tagged `Token`s: reserved words are split from atoms, escapes
//! are resolved, and a `.` followed by whitespace, a comment or end of input
//! becomes the declaration end marker.

use logos::{Lexer, Logos};

use super::token::{keyword_str, punct_str, Token, TokenKind};
use crate::errors::HostParseError;

#[derive(Debug, Clone, PartialEq)]
enum Number {
    Int(i64),
    /// Digits too large for `i64`, kept as written.
    Big(String),
    Float(f64),
}

/// Raw token from logos (before cooking).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"%[^\n]*")]
enum RawToken {
    #[regex(r"[a-z][A-Za-z0-9_@]*")]
    Atom,

    #[regex(r"'([^'\\]|\\.)*'")]
    QuotedAtom,

    #[regex(r"[A-Z_][A-Za-z0-9_@]*")]
    Var,

    #[regex(r"[0-9]+", lex_number)]
    Number(Number),

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    #[regex(r"\$([^\\]|\\[^x^0-7]|\\\^.|\\[0-7][0-7]?[0-7]?|\\x[0-9A-Fa-f][0-9A-Fa-f]|\\x\{[0-9A-Fa-f]+\})")]
    Char,

    #[token("...")]
    #[token("=:=")]
    #[token("=/=")]
    #[token("..")]
    #[token("::")]
    #[token("->")]
    #[token("<-")]
    #[token("<=")]
    #[token("=>")]
    #[token(":=")]
    #[token("==")]
    #[token("/=")]
    #[token("=<")]
    #[token(">=")]
    #[token("++")]
    #[token("--")]
    #[token("<<")]
    #[token(">>")]
    #[token("||")]
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("{")]
    #[token("}")]
    #[token(",")]
    #[token(";")]
    #[token(":")]
    #[token("|")]
    #[token("?")]
    #[token("#")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("<")]
    #[token(">")]
    #[token("=")]
    #[token("!")]
    Punct,

    #[token(".")]
    Period,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Tokenizes HostLang source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, HostParseError> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    let mut line = 1u32;
    let mut counted = 0usize;

    while let Some(raw) = lexer.next() {
        let span = lexer.span();
        line += newlines(&source[counted..span.start]);
        counted = span.start;
        let slice = lexer.slice();

        let Ok(raw) = raw else {
            return Err(HostParseError::new(
                line,
                format!("illegal token starting at {:?}", slice),
            ));
        };

        let kind = match raw {
            RawToken::Atom => match keyword_str(slice) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Atom(slice.to_string()),
            },
            RawToken::QuotedAtom => TokenKind::Atom(unescape(&slice[1..slice.len() - 1], line)?),
            RawToken::Var => TokenKind::Var(slice.to_string()),
            RawToken::Number(Number::Int(n)) => TokenKind::Integer(n),
            RawToken::Number(Number::Big(text)) => TokenKind::BigInteger(text),
            RawToken::Number(Number::Float(x)) => TokenKind::Float(x),
            RawToken::String => TokenKind::String(unescape(&slice[1..slice.len() - 1], line)?),
            RawToken::Char => {
                let text = unescape(&slice[1..], line)?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => TokenKind::Char(c),
                    _ => return Err(HostParseError::new(line, format!("bad character literal {}", slice))),
                }
            }
            RawToken::Punct => match punct_str(slice) {
                Some(p) => TokenKind::Punct(p),
                None => return Err(HostParseError::new(line, format!("unknown operator {}", slice))),
            },
            RawToken::Period => {
                let ends_form = lexer
                    .remainder()
                    .chars()
                    .next()
                    .map_or(true, |c| c.is_whitespace() || c == '%');
                if ends_form {
                    TokenKind::Dot
                } else {
                    TokenKind::Punct(".")
                }
            }
        };
        tokens.push(Token::new(kind, line));
    }

    Ok(tokens)
}

// ============================================================================
// LEXER CALLBACKS AND HELPERS
// ============================================================================

/// Extends a digit run into a radix integer (`16#FF`) or a float
/// (`1.5`, `2.0e-3`). A `.` not followed by a digit is left alone so that
/// `1..9` and `X = 1.` scan correctly. Integers past the `i64` range come
/// back as `Number::Big`.
fn lex_number(lex: &mut Lexer<RawToken>) -> Option<Number> {
    let digits = lex.slice();
    let rest = lex.remainder();
    let bytes = rest.as_bytes();

    if bytes.first() == Some(&b'#') {
        let len = rest[1..]
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len() - 1);
        if len == 0 {
            return digits.parse().ok().map(Number::Int);
        }
        let base: u32 = digits.parse().ok()?;
        if !(2..=36).contains(&base) {
            return None;
        }
        let text = &rest[1..1 + len];
        if !text.chars().all(|c| c.is_digit(base)) {
            return None;
        }
        let number = match i64::from_str_radix(text, base) {
            Ok(value) => Number::Int(value),
            Err(_) => Number::Big(format!("{}#{}", digits, text)),
        };
        lex.bump(1 + len);
        return Some(number);
    }

    if bytes.first() == Some(&b'.') && bytes.get(1).is_some_and(u8::is_ascii_digit) {
        let mut len = 1 + rest[1..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len() - 1);
        let tail = &rest[len..];
        let tail_bytes = tail.as_bytes();
        if matches!(tail_bytes.first(), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(tail_bytes.get(1), Some(b'+') | Some(b'-')));
            let exp_digits = tail[1 + sign..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(tail.len() - 1 - sign);
            if exp_digits > 0 {
                len += 1 + sign + exp_digits;
            }
        }
        let text = format!("{}{}", digits, &rest[..len]);
        lex.bump(len);
        return text.parse().ok().map(Number::Float);
    }

    Some(match digits.parse() {
        Ok(value) => Number::Int(value),
        Err(_) => Number::Big(digits.to_string()),
    })
}

fn newlines(text: &str) -> u32 {
    text.bytes().filter(|b| *b == b'\n').count() as u32
}

/// Resolves HostLang escape sequences inside quoted atoms, strings and
/// character literals: the single-letter escapes, octal `\101`, hex `\x41`
/// and `\x{41}`, and control `\^A`.
fn unescape(text: &str, line: u32) -> Result<String, HostParseError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            return Err(HostParseError::new(line, "unterminated escape sequence"));
        };
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            's' => out.push(' '),
            'e' => out.push('\x1b'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'd' => out.push('\x7f'),
            '0'..='7' => {
                let mut value = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            'x' => {
                let digits: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(2).collect()
                };
                let value = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| HostParseError::new(line, format!("bad hex escape \\x{}", digits)))?;
                out.push(value);
            }
            '^' => {
                let Some(c) = chars.next() else {
                    return Err(HostParseError::new(line, "unterminated control escape"));
                };
                out.extend(char::from_u32(c as u32 & 31));
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_define() {
        assert_eq!(
            kinds("-define(FOO(X), X + 1)."),
            vec![
                TokenKind::Punct("-"),
                TokenKind::Atom("define".into()),
                TokenKind::Punct("("),
                TokenKind::Var("FOO".into()),
                TokenKind::Punct("("),
                TokenKind::Var("X".into()),
                TokenKind::Punct(")"),
                TokenKind::Punct(","),
                TokenKind::Var("X".into()),
                TokenKind::Punct("+"),
                TokenKind::Integer(1),
                TokenKind::Punct(")"),
                TokenKind::Dot,
            ]
        );
    }

    #[test]
    fn numbers_ranges_and_radix() {
        assert_eq!(
            kinds("1..9 2.5e3 16#ff $a"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Punct(".."),
                TokenKind::Integer(9),
                TokenKind::Float(2500.0),
                TokenKind::Integer(255),
                TokenKind::Char('a'),
            ]
        );
    }

    #[test]
    fn record_access_dot_is_not_end_marker() {
        let tokens = kinds("X#r.f.");
        assert_eq!(tokens[3], TokenKind::Punct("."));
        assert_eq!(tokens.last(), Some(&TokenKind::Dot));
    }

    #[test]
    fn keywords_and_quoted_atoms() {
        assert_eq!(
            kinds("case 'hello world' of"),
            vec![
                TokenKind::Keyword("case"),
                TokenKind::Atom("hello world".into()),
                TokenKind::Keyword("of"),
            ]
        );
    }

    #[test]
    fn tracks_lines_and_skips_comments() {
        let tokens = tokenize("a % comment\n\"x\ny\"\nb").unwrap();
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn integers_past_i64_keep_their_text() {
        assert_eq!(
            kinds("18446744073709551615 16#FFFFFFFFFFFFFFFFFF 9223372036854775807"),
            vec![
                TokenKind::BigInteger("18446744073709551615".into()),
                TokenKind::BigInteger("16#FFFFFFFFFFFFFFFFFF".into()),
                TokenKind::Integer(i64::MAX),
            ]
        );
    }

    #[test]
    fn hex_and_control_escapes() {
        assert_eq!(
            kinds(r#""\x41\x{42}\x{1F600}" 'a\x20b' "\^A\^z" "\101\0""#),
            vec![
                TokenKind::String("AB\u{1F600}".into()),
                TokenKind::Atom("a b".into()),
                TokenKind::String("\u{1}\u{1a}".into()),
                TokenKind::String("A\0".into()),
            ]
        );
    }

    #[test]
    fn escaped_character_literals() {
        assert_eq!(
            kinds(r"$\x41 $\x{7A} $\101 $\^C $\n $x"),
            vec![
                TokenKind::Char('A'),
                TokenKind::Char('z'),
                TokenKind::Char('A'),
                TokenKind::Char('\u{3}'),
                TokenKind::Char('\n'),
                TokenKind::Char('x'),
            ]
        );
    }

    #[test]
    fn bad_hex_escape_is_an_error() {
        assert!(tokenize(r#""\x{zz}""#).is_err());
    }
}
