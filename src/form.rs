//! MacroLang forms and their printer.
//!
//! `Form` is the closed value type every translation produces. Quote-like
//! wrappers are ordinary two-element lists headed by `quote`, `backquote`,
//! `comma` or `comma-at`; the printer renders them with the reader shorthands
//! so that printed text reads back as an equal form.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A MacroLang value: atom, list, or literal.
///
/// # Examples
///
/// ```rust
/// use hdrinc::form::Form;
/// let f = Form::list(vec![Form::sym("export"), Form::list(vec![Form::sym("foo"), Form::Integer(2)])]);
/// assert_eq!(f.to_string(), "(export (foo 2))");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Form {
    Symbol(String),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Form>),
    /// Improper list `(a b . tail)`.
    Dotted(Vec<Form>, Box<Form>),
    Tuple(Vec<Form>),
    Binary(Vec<u8>),
}

/// Symbols printed with reader shorthand when they head a two-element list.
const SHORTHANDS: [(&str, &str); 4] = [
    ("quote", "'"),
    ("backquote", "`"),
    ("comma-at", ",@"),
    ("comma", ","),
];

/// Characters that end a bare symbol in the reader grammar.
const DELIMITERS: &[char] = &['(', ')', '[', ']', '"', '\'', '`', ',', ';', '|', '\\'];

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Form {
    pub fn sym(name: impl Into<String>) -> Form {
        Form::Symbol(name.into())
    }

    pub fn list(items: Vec<Form>) -> Form {
        Form::List(items)
    }

    /// The empty list `()`.
    pub fn nil() -> Form {
        Form::List(Vec::new())
    }

    pub fn string(text: impl Into<String>) -> Form {
        Form::String(text.into())
    }

    /// Builds `(head item...)`.
    pub fn call(head: &str, args: impl IntoIterator<Item = Form>) -> Form {
        let mut items = vec![Form::sym(head)];
        items.extend(args);
        Form::List(items)
    }

    pub fn quote(form: Form) -> Form {
        Form::call("quote", [form])
    }

    pub fn backquote(form: Form) -> Form {
        Form::call("backquote", [form])
    }

    pub fn comma(form: Form) -> Form {
        Form::call("comma", [form])
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Form::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Form]> {
        match self {
            Form::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    /// Returns the inner form of `(wrapper x)`.
    pub fn unwrap_call(&self, wrapper: &str) -> Option<&Form> {
        match self.as_list() {
            Some([head, inner]) if head.is_symbol(wrapper) => Some(inner),
            _ => None,
        }
    }

    /// Replaces every sub-form equal to a key with its paired value, in any
    /// position of the tree.
    pub fn substitute(&self, pairs: &[(Form, Form)]) -> Form {
        if let Some((_, replacement)) = pairs.iter().find(|(key, _)| key == self) {
            return replacement.clone();
        }
        let walk = |items: &[Form]| items.iter().map(|f| f.substitute(pairs)).collect();
        match self {
            Form::List(items) => Form::List(walk(items)),
            Form::Tuple(items) => Form::Tuple(walk(items)),
            Form::Dotted(items, tail) => Form::Dotted(walk(items), Box::new(tail.substitute(pairs))),
            atom => atom.clone(),
        }
    }
}

/// Renders a form as readable MacroLang text, flattened to one string.
///
/// Total over every form. Translated macro bodies that used the host's
/// stringify operator call this through `hdrinc:stringify`.
///
/// # Examples
///
/// ```rust
/// use hdrinc::form::{stringify, Form};
/// assert_eq!(stringify(&Form::quote(Form::sym("ok"))), "'ok");
/// ```
pub fn stringify(form: &Form) -> String {
    form.to_string()
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Symbol(s) => write_symbol(f, s),
            Form::Integer(n) => write!(f, "{}", n),
            Form::Float(x) => write!(f, "{:?}", x),
            Form::String(s) => write_string(f, s),
            Form::List(items) => {
                if let Some((prefix, inner)) = shorthand(items) {
                    return write!(f, "{}{}", prefix, inner);
                }
                f.write_str("(")?;
                write_items(f, items)?;
                f.write_str(")")
            }
            Form::Dotted(items, tail) => {
                f.write_str("(")?;
                write_items(f, items)?;
                write!(f, " . {})", tail)
            }
            Form::Tuple(items) => {
                f.write_str("#(")?;
                write_items(f, items)?;
                f.write_str(")")
            }
            Form::Binary(bytes) => {
                f.write_str("#B(")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", byte)?;
                }
                f.write_str(")")
            }
        }
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn shorthand(items: &[Form]) -> Option<(&'static str, &Form)> {
    let [Form::Symbol(head), inner] = items else {
        return None;
    };
    SHORTHANDS
        .iter()
        .find(|(name, _)| *name == head.as_str())
        .map(|(_, prefix)| (*prefix, inner))
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Form]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_symbol(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if is_bare_symbol(s) {
        return f.write_str(s);
    }
    f.write_str("|")?;
    for c in s.chars() {
        if c == '|' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("|")
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

/// A symbol prints bare only when the reader would read the same text back
/// as that symbol.
fn is_bare_symbol(s: &str) -> bool {
    if s.is_empty() || s == "." || s.starts_with('#') {
        return false;
    }
    if s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok() {
        return false;
    }
    s.chars()
        .all(|c| !c.is_whitespace() && !c.is_control() && !DELIMITERS.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_quote_shorthands() {
        let form = Form::backquote(Form::list(vec![
            Form::sym("+"),
            Form::comma(Form::sym("X")),
            Form::Integer(1),
        ]));
        assert_eq!(stringify(&form), "`(+ ,X 1)");
    }

    #[test]
    fn bars_symbols_that_would_misread() {
        assert_eq!(stringify(&Form::sym("hello world")), "|hello world|");
        assert_eq!(stringify(&Form::sym("42")), "|42|");
        assert_eq!(stringify(&Form::sym("a|b")), "|a\\|b|");
        assert_eq!(stringify(&Form::sym("m:f")), "m:f");
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(stringify(&Form::Float(1.0)), "1.0");
        assert_eq!(stringify(&Form::Float(-2.5)), "-2.5");
    }

    #[test]
    fn substitute_reaches_nested_quotes() {
        let body = Form::quote(Form::list(vec![Form::sym("X"), Form::sym("Y")]));
        let out = body.substitute(&[(Form::sym("X"), Form::comma(Form::sym("X")))]);
        assert_eq!(stringify(&out), "'(,X Y)");
    }
}
