//! Macro-definition translation.
//!
//! Each host macro name becomes one `defmacro` with a clause per arity. A
//! clause body is built by rewriting the raw definition tokens into a plain
//! host expression, parsing it, converting it, and then turning every formal
//! parameter into an unquote inside a backquoted template.

use tracing::{debug, warn};

use crate::convert::expr_to_form;
use crate::errors::{TranslateError, Warning};
use crate::form::Form;
use crate::host::parser::parse_expr_tokens;
use crate::host::{MacroArity, MacroDefinition, MacroTable, Token, TokenKind};
use crate::session::SessionState;

/// Module of the runtime stringify helper called by translated `??Arg`.
pub const STRINGIFY_MODULE: &str = "hdrinc";
pub const STRINGIFY_FUNCTION: &str = "stringify";

// ============================================================================
// PUBLIC API
// ============================================================================

/// Translates a macro table into `defmacro` forms, one per name that has at
/// least one defined arity.
pub fn translate_macros(table: &MacroTable, state: SessionState) -> (Vec<Form>, SessionState) {
    let mut forms = Vec::new();
    let mut state = state;

    for (name, entries) in table.iter() {
        let mut defined: Vec<(MacroArity, &[String], &[Token])> = entries
            .iter()
            .filter_map(|(arity, def)| match def {
                MacroDefinition::Defined { params, body } => Some((*arity, params.as_slice(), body.as_slice())),
                MacroDefinition::Absent | MacroDefinition::Predefined => None,
            })
            .collect();
        if defined.is_empty() {
            continue;
        }
        // Sort is stable, so fixed arities keep definition order.
        defined.sort_by_key(|(arity, _, _)| *arity == MacroArity::NoArgs);

        let mut clauses = Vec::with_capacity(defined.len());
        for (arity, params, body) in defined {
            match macro_clause(arity, params, body) {
                Ok(clause) => clauses.push(clause),
                Err(error) => {
                    let warning = Warning::Macro {
                        name: name.to_string(),
                        arity,
                        reason: error.to_string(),
                    };
                    warn!(%warning, "dropping macro clause");
                    state = state.with_warning(warning);
                }
            }
        }
        if clauses.is_empty() {
            continue;
        }

        let mut items = vec![Form::sym(name)];
        items.extend(clauses);
        let form = Form::call("defmacro", items);
        debug!(%form, "translated macro");
        forms.push(form);
    }

    (forms, state)
}

/// Rewrites macro-use shapes in a definition body into ordinary host syntax.
///
/// | input               | output                          |
/// |---------------------|---------------------------------|
/// | `? ? Arg`           | `hdrinc:stringify(quote(Arg))`  |
/// | `? atom (`          | `atom (`                        |
/// | `? Var (`           | `'Var' (`                       |
/// | `? name :` / `.`    | `name ( ) :` / `name ( ) .`     |
/// | `? name`            | `name ( )`                      |
///
/// Anything else passes through unchanged.
pub fn rewrite_tokens(tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        let line = token.line;
        if !token.is_punct("?") {
            out.push(token.clone());
            i += 1;
            continue;
        }

        let next = tokens.get(i + 1);
        if next.is_some_and(|t| t.is_punct("?")) {
            if let Some(arg) = tokens.get(i + 2) {
                out.extend(stringify_call(arg.clone(), line));
                i += 3;
                continue;
            }
        }

        let Some(name) = next.and_then(Token::name) else {
            out.push(token.clone());
            i += 1;
            continue;
        };
        out.push(Token::atom(name, line));
        let after = tokens.get(i + 2);
        if !after.is_some_and(|t| t.is_punct("(")) {
            out.push(Token::punct("(", line));
            out.push(Token::punct(")", line));
        }
        i += 2;
    }
    out
}

// ============================================================================
// CLAUSE CONSTRUCTION
// ============================================================================

/// `((_) `body)` for the no-argument form, `(((list P...)) `body)` otherwise.
fn macro_clause(arity: MacroArity, params: &[String], body: &[Token]) -> Result<Form, TranslateError> {
    let head = match arity {
        MacroArity::NoArgs => Form::list(vec![Form::sym("_")]),
        MacroArity::Fixed(_) => Form::list(vec![Form::call("list", params.iter().map(Form::sym))]),
    };
    Ok(Form::list(vec![head, macro_body(params, body)?]))
}

fn macro_body(params: &[String], body: &[Token]) -> Result<Form, TranslateError> {
    let mut tokens = rewrite_tokens(body);
    let line = tokens.last().map_or(0, |t| t.line);
    tokens.push(Token::dot(line));

    let expr = parse_expr_tokens(&tokens)?;
    let template = Form::backquote(expr_to_form(&expr)?);

    let unquotes: Vec<(Form, Form)> = params
        .iter()
        .map(|p| (Form::sym(p), Form::comma(Form::sym(p))))
        .collect();
    Ok(template.substitute(&unquotes))
}

/// `STRINGIFY_MODULE : STRINGIFY_FUNCTION ( quote ( Arg ) )`
fn stringify_call(arg: Token, line: u32) -> Vec<Token> {
    vec![
        Token::atom(STRINGIFY_MODULE, line),
        Token::punct(":", line),
        Token::atom(STRINGIFY_FUNCTION, line),
        Token::punct("(", line),
        Token::new(TokenKind::Atom("quote".to_string()), line),
        Token::punct("(", line),
        arg,
        Token::punct(")", line),
        Token::punct(")", line),
    ]
}
