//! MacroLang Parser
//!
//! Converts MacroLang source text into `Form`s. Purely syntactic: quote-like
//! reader shorthands become their two-element list forms and nothing else is
//! interpreted.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::{to_source_span, ReadError, SourceContext};
use crate::form::Form;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct FormParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Reads every form in `source_text`.
pub fn read_forms(source_text: &str, source_name: &str) -> Result<Vec<Form>, ReadError> {
    let source = SourceContext::from_file(source_name, source_text);
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut pairs = FormParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, &source))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_form(p, &source))
        .collect()
}

/// Reads exactly one form; anything else is a syntax error.
pub fn read_one(source_text: &str) -> Result<Form, ReadError> {
    let mut forms = read_forms(source_text, "<input>")?;
    if forms.len() != 1 {
        let source = SourceContext::from_file("<input>", source_text);
        return Err(make_syntax_error(
            &source,
            format!("expected one form, found {}", forms.len()),
            0,
            source_text.len(),
        ));
    }
    Ok(forms.remove(0))
}

// ============================================================================
// FORM BUILDERS
// ============================================================================

fn build_form(pair: Pair<Rule>, source: &SourceContext) -> Result<Form, ReadError> {
    let (start, end) = (pair.as_span().start(), pair.as_span().end());

    match pair.as_rule() {
        Rule::quoted => build_wrapped("quote", pair, source),
        Rule::backquoted => build_wrapped("backquote", pair, source),
        Rule::comma => build_wrapped("comma", pair, source),
        Rule::comma_at => build_wrapped("comma-at", pair, source),

        Rule::list => {
            let mut items = Vec::new();
            let mut tail = None;
            for child in pair.into_inner() {
                if child.as_rule() == Rule::dotted_tail {
                    let inner = first_inner(child, source, start, end)?;
                    tail = Some(build_form(inner, source)?);
                } else {
                    items.push(build_form(child, source)?);
                }
            }
            Ok(match tail {
                Some(tail) => Form::Dotted(items, Box::new(tail)),
                None => Form::List(items),
            })
        }

        Rule::tuple => {
            let items: Result<Vec<_>, _> =
                pair.into_inner().map(|p| build_form(p, source)).collect();
            Ok(Form::Tuple(items?))
        }

        Rule::binary => {
            let mut bytes = Vec::new();
            for child in pair.into_inner() {
                let text = child.as_str();
                let (s, e) = (child.as_span().start(), child.as_span().end());
                let byte = text
                    .parse::<u8>()
                    .map_err(|_| make_literal_error(source, "byte", text, s, e))?;
                bytes.push(byte);
            }
            Ok(Form::Binary(bytes))
        }

        Rule::string => {
            let inner = first_inner(pair, source, start, end)?;
            Ok(Form::String(unescape(inner.as_str())))
        }

        Rule::integer => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(Form::Integer)
                .map_err(|_| make_literal_error(source, "integer", text, start, end))
        }

        Rule::float => {
            let text = pair.as_str();
            text.parse::<f64>()
                .map(Form::Float)
                .map_err(|_| make_literal_error(source, "float", text, start, end))
        }

        Rule::bar_symbol => {
            let inner = first_inner(pair, source, start, end)?;
            Ok(Form::Symbol(unescape_bars(inner.as_str())))
        }

        Rule::symbol => Ok(Form::Symbol(pair.as_str().to_string())),

        rule => Err(make_syntax_error(
            source,
            format!("unexpected rule {:?}", rule),
            start,
            end,
        )),
    }
}

fn build_wrapped(
    wrapper: &str,
    pair: Pair<Rule>,
    source: &SourceContext,
) -> Result<Form, ReadError> {
    let (start, end) = (pair.as_span().start(), pair.as_span().end());
    let inner = first_inner(pair, source, start, end)?;
    Ok(Form::call(wrapper, [build_form(inner, source)?]))
}

fn first_inner<'i>(
    pair: Pair<'i, Rule>,
    source: &SourceContext,
    start: usize,
    end: usize,
) -> Result<Pair<'i, Rule>, ReadError> {
    pair.into_inner()
        .next()
        .ok_or_else(|| make_syntax_error(source, "missing form".to_string(), start, end))
}

// ============================================================================
// UTILITIES
// ============================================================================

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

fn unescape_bars(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => result.extend(chars.next()),
            ch => result.push(ch),
        }
    }
    result
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn make_syntax_error(source: &SourceContext, message: String, start: usize, end: usize) -> ReadError {
    ReadError::Syntax {
        message,
        src: source.to_named_source(),
        span: to_source_span(start, end),
    }
}

fn make_literal_error(
    source: &SourceContext,
    literal_type: &'static str,
    value: &str,
    start: usize,
    end: usize,
) -> ReadError {
    ReadError::InvalidLiteral {
        literal_type,
        value: value.to_string(),
        src: source.to_named_source(),
        span: to_source_span(start, end),
    }
}

fn convert_parse_error(error: Error<Rule>, source: &SourceContext) -> ReadError {
    let (start, end) = match error.location {
        pest::error::InputLocation::Pos(pos) => (pos, pos),
        pest::error::InputLocation::Span((start, end)) => (start, end),
    };

    let rendered = error.to_string();
    let message = if start >= source.content.len() {
        "unexpected end of input"
    } else if rendered.contains("EOI") {
        "unbalanced closing delimiter"
    } else {
        "malformed form"
    };

    make_syntax_error(source, message.to_string(), start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(read_forms("", "test").unwrap().is_empty());
    }

    #[test]
    fn reads_shorthands() {
        let form = read_one("`(a ,b ,@c 'd)").unwrap();
        assert_eq!(form.to_string(), "`(a ,b ,@c 'd)");
        assert_eq!(
            form,
            Form::backquote(Form::list(vec![
                Form::sym("a"),
                Form::comma(Form::sym("b")),
                Form::call("comma-at", [Form::sym("c")]),
                Form::quote(Form::sym("d")),
            ]))
        );
    }

    #[test]
    fn reads_literals() {
        let forms = read_forms("-12 3.5 1e3 \"a\\\"b\" |x y| #(1 two) #B(1 255) (a . b)", "t").unwrap();
        assert_eq!(
            forms,
            vec![
                Form::Integer(-12),
                Form::Float(3.5),
                Form::Float(1000.0),
                Form::string("a\"b"),
                Form::sym("x y"),
                Form::Tuple(vec![Form::Integer(1), Form::sym("two")]),
                Form::Binary(vec![1, 255]),
                Form::Dotted(vec![Form::sym("a")], Box::new(Form::sym("b"))),
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let forms = read_forms("; line\n(a #| block |# b)", "t").unwrap();
        assert_eq!(forms, vec![Form::list(vec![Form::sym("a"), Form::sym("b")])]);
    }

    #[test]
    fn unmatched_paren() {
        assert!(read_forms("(a b", "t").is_err());
    }
}
