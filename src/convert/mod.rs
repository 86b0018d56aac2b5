//! Host syntax to MacroLang forms.
//!
//! `expr_to_form` covers expressions and patterns, which share one tree.
//! `literal_to_form` is the stricter conversion used for attribute values,
//! where only constant data is allowed. Types live in [`types`].

pub mod types;

use crate::errors::TranslateError;
use crate::form::Form;
use crate::host::{BinElement, Clause, HostExpr, MapField, Qualifier};

pub use types::{fun_spec_to_form, type_to_form};

type CResult = Result<Form, TranslateError>;

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Converts an expression or pattern.
///
/// # Examples
///
/// ```rust
/// use hdrinc::convert::expr_to_form;
/// use hdrinc::host::HostExpr;
///
/// let e = HostExpr::Tuple(vec![HostExpr::Atom("ok".into()), HostExpr::Var("X".into())]);
/// assert_eq!(expr_to_form(&e).unwrap().to_string(), "(tuple 'ok X)");
/// ```
pub fn expr_to_form(expr: &HostExpr) -> CResult {
    Ok(match expr {
        HostExpr::Atom(name) => Form::quote(Form::sym(name)),
        HostExpr::Var(name) => Form::sym(name),
        HostExpr::Integer(n) => Form::Integer(*n),
        HostExpr::Float(x) => Form::Float(*x),
        HostExpr::Char(c) => Form::Integer(i64::from(u32::from(*c))),
        HostExpr::String(s) => Form::string(s),
        HostExpr::Nil => Form::nil(),
        HostExpr::Cons(..) => cons_to_form(expr)?,
        HostExpr::Tuple(items) => Form::call("tuple", exprs(items)?),
        HostExpr::Binary(elements) => Form::call(
            "binary",
            elements.iter().map(bin_element_to_form).collect::<Result<Vec<_>, _>>()?,
        ),
        HostExpr::Map { base: None, fields } => Form::call("map", map_pairs(fields)?),
        HostExpr::Map {
            base: Some(base),
            fields,
        } => {
            let head = if fields.iter().all(|f| f.exact) {
                "map-update"
            } else if fields.iter().all(|f| !f.exact) {
                "map-set"
            } else {
                return Err(TranslateError::Unsupported(
                    "map update mixing '=>' and ':='".to_string(),
                ));
            };
            let mut args = vec![expr_to_form(base)?];
            args.extend(map_pairs(fields)?);
            Form::call(head, args)
        }
        HostExpr::RecordNew { name, fields } => {
            let mut args = vec![Form::sym(name)];
            args.extend(record_pairs(fields)?);
            Form::call("make-record", args)
        }
        HostExpr::RecordUpdate { expr, name, fields } => {
            let mut args = vec![expr_to_form(expr)?, Form::sym(name)];
            args.extend(record_pairs(fields)?);
            Form::call("record-update", args)
        }
        HostExpr::RecordField { expr, name, field } => Form::call(
            "record-field",
            [expr_to_form(expr)?, Form::sym(name), Form::sym(field)],
        ),
        HostExpr::RecordIndex { name, field } => {
            Form::call("record-index", [Form::sym(name), Form::sym(field)])
        }
        HostExpr::BinaryOp { op, left, right } => {
            Form::call(op, [expr_to_form(left)?, expr_to_form(right)?])
        }
        HostExpr::UnaryOp { op, operand } => Form::call(op, [expr_to_form(operand)?]),
        HostExpr::Match(pattern, value) => {
            Form::call("=", [expr_to_form(pattern)?, expr_to_form(value)?])
        }
        HostExpr::Call { fun, args } => match fun.as_ref() {
            HostExpr::Atom(name) => Form::call(name, exprs(args)?),
            other => {
                let mut items = vec![expr_to_form(other)?];
                items.extend(exprs(args)?);
                Form::call("funcall", items)
            }
        },
        HostExpr::RemoteCall { module, fun, args } => match (module.as_ref(), fun.as_ref()) {
            (HostExpr::Atom(m), HostExpr::Atom(f)) => Form::call(&format!("{}:{}", m, f), exprs(args)?),
            (m, f) => {
                let mut items = vec![expr_to_form(m)?, expr_to_form(f)?];
                items.extend(exprs(args)?);
                Form::call("call", items)
            }
        },
        HostExpr::Block(body) => Form::call("progn", exprs(body)?),
        HostExpr::Case { expr, clauses } => {
            let mut items = vec![expr_to_form(expr)?];
            for clause in clauses {
                let mut converted = vec![pattern_head(clause)?];
                converted.extend(guard_and_body(clause)?);
                items.push(Form::list(converted));
            }
            Form::call("case", items)
        }
        HostExpr::If(clauses) => {
            let mut items = Vec::with_capacity(clauses.len());
            for clause in clauses {
                let mut converted = vec![guard_test(&clause.guards)?];
                converted.extend(exprs(&clause.body)?);
                items.push(Form::list(converted));
            }
            Form::call("cond", items)
        }
        HostExpr::Fun(clauses) => Form::call(
            "match-lambda",
            clauses.iter().map(function_clause).collect::<Result<Vec<_>, _>>()?,
        ),
        HostExpr::FunRef {
            module: None,
            name,
            arity,
        } => Form::call("function", [Form::sym(name), arity_form(*arity)]),
        HostExpr::FunRef {
            module: Some(module),
            name,
            arity,
        } => Form::call(
            "function",
            [Form::sym(module), Form::sym(name), arity_form(*arity)],
        ),
        HostExpr::Catch(inner) => Form::call("catch", [expr_to_form(inner)?]),
        HostExpr::ListComp { expr, qualifiers } => {
            let quals = qualifiers
                .iter()
                .map(qualifier_to_form)
                .collect::<Result<Vec<_>, _>>()?;
            Form::call("lc", [Form::list(quals), expr_to_form(expr)?])
        }
    })
}

/// Converts one function or `fun` clause to `((pattern...) [(when ...)] body...)`.
pub fn function_clause(clause: &Clause) -> CResult {
    let mut items = vec![Form::list(exprs(&clause.patterns)?)];
    items.extend(guard_and_body(clause)?);
    Ok(Form::list(items))
}

fn exprs(items: &[HostExpr]) -> Result<Vec<Form>, TranslateError> {
    items.iter().map(expr_to_form).collect()
}

/// `[a, b]` → `(list a b)`, `[h | t]` → `(cons h t)`, `[a, b | t]` → `(list* a b t)`.
fn cons_to_form(expr: &HostExpr) -> CResult {
    let mut items = Vec::new();
    let mut cursor = expr;
    while let HostExpr::Cons(head, tail) = cursor {
        items.push(expr_to_form(head)?);
        cursor = tail;
    }
    Ok(match (cursor, items.len()) {
        (HostExpr::Nil, _) => Form::call("list", items),
        (tail, 1) => {
            items.push(expr_to_form(tail)?);
            Form::call("cons", items)
        }
        (tail, _) => {
            items.push(expr_to_form(tail)?);
            Form::call("list*", items)
        }
    })
}

fn bin_element_to_form(element: &BinElement) -> CResult {
    let value = expr_to_form(&element.value)?;
    if element.size.is_none() && element.specs.is_empty() {
        return Ok(value);
    }
    let mut items = vec![value];
    if let Some(size) = &element.size {
        items.push(Form::call("size", [expr_to_form(size)?]));
    }
    for (spec, unit) in &element.specs {
        items.push(match unit {
            Some(n) => Form::call(spec, [Form::Integer(*n)]),
            None => Form::sym(spec),
        });
    }
    Ok(Form::list(items))
}

fn map_pairs(fields: &[MapField]) -> Result<Vec<Form>, TranslateError> {
    let mut pairs = Vec::with_capacity(fields.len() * 2);
    for field in fields {
        pairs.push(expr_to_form(&field.key)?);
        pairs.push(expr_to_form(&field.value)?);
    }
    Ok(pairs)
}

fn record_pairs(fields: &[(String, HostExpr)]) -> Result<Vec<Form>, TranslateError> {
    let mut pairs = Vec::with_capacity(fields.len() * 2);
    for (name, value) in fields {
        pairs.push(Form::sym(name));
        pairs.push(expr_to_form(value)?);
    }
    Ok(pairs)
}

fn qualifier_to_form(qualifier: &Qualifier) -> CResult {
    Ok(match qualifier {
        Qualifier::Generator(pattern, list) => {
            Form::call("<-", [expr_to_form(pattern)?, expr_to_form(list)?])
        }
        Qualifier::BitGenerator(pattern, binary) => {
            Form::call("<=", [expr_to_form(pattern)?, expr_to_form(binary)?])
        }
        Qualifier::Filter(test) => expr_to_form(test)?,
    })
}

fn arity_form(arity: usize) -> Form {
    Form::Integer(arity as i64)
}

// ============================================================================
// CLAUSES AND GUARDS
// ============================================================================

fn pattern_head(clause: &Clause) -> CResult {
    match clause.patterns.as_slice() {
        [pattern] => expr_to_form(pattern),
        patterns => Err(TranslateError::Unsupported(format!(
            "case clause with {} patterns",
            patterns.len()
        ))),
    }
}

/// The optional `(when ...)` form followed by the body forms.
fn guard_and_body(clause: &Clause) -> Result<Vec<Form>, TranslateError> {
    let mut items = Vec::new();
    match clause.guards.as_slice() {
        [] => {}
        [conjunction] => items.push(Form::call("when", exprs(conjunction)?)),
        alternatives => items.push(Form::call("when", [guard_test(alternatives)?])),
    }
    items.extend(exprs(&clause.body)?);
    Ok(items)
}

/// Folds a guard sequence into one test: `;` becomes `orelse`, `,` becomes
/// `andalso`.
fn guard_test(alternatives: &[Vec<HostExpr>]) -> CResult {
    let mut tests = alternatives
        .iter()
        .map(|conjunction| {
            let mut parts = exprs(conjunction)?;
            Ok(if parts.len() == 1 {
                parts.remove(0)
            } else {
                Form::call("andalso", parts)
            })
        })
        .collect::<Result<Vec<_>, TranslateError>>()?;
    Ok(match tests.len() {
        0 => Form::quote(Form::sym("true")),
        1 => tests.remove(0),
        _ => Form::call("orelse", tests),
    })
}

// ============================================================================
// LITERALS
// ============================================================================

/// Converts constant data. Atoms become bare symbols here, since attribute
/// values are never evaluated.
pub fn literal_to_form(expr: &HostExpr) -> CResult {
    Ok(match expr {
        HostExpr::Atom(name) => Form::sym(name),
        HostExpr::Integer(n) => Form::Integer(*n),
        HostExpr::Float(x) => Form::Float(*x),
        HostExpr::Char(c) => Form::Integer(i64::from(u32::from(*c))),
        HostExpr::String(s) => Form::string(s),
        HostExpr::Nil => Form::nil(),
        HostExpr::Tuple(items) => Form::Tuple(items.iter().map(literal_to_form).collect::<Result<_, _>>()?),
        HostExpr::Cons(..) => {
            let mut items = Vec::new();
            let mut cursor = expr;
            while let HostExpr::Cons(head, tail) = cursor {
                items.push(literal_to_form(head)?);
                cursor = tail;
            }
            match cursor {
                HostExpr::Nil => Form::List(items),
                tail => Form::Dotted(items, Box::new(literal_to_form(tail)?)),
            }
        }
        HostExpr::Binary(elements) => {
            let bytes = elements
                .iter()
                .map(|e| match (&e.value, &e.size, e.specs.is_empty()) {
                    (HostExpr::Integer(n), None, true) => u8::try_from(*n).ok(),
                    _ => None,
                })
                .collect::<Option<Vec<u8>>>();
            match bytes {
                Some(bytes) => Form::Binary(bytes),
                None => return Err(not_a_literal(expr)),
            }
        }
        _ => return Err(not_a_literal(expr)),
    })
}

fn not_a_literal(expr: &HostExpr) -> TranslateError {
    let shown = expr_to_form(expr).map_or_else(|_| format!("{:?}", expr), |f| f.to_string());
    TranslateError::NotALiteral(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::lexer::tokenize;
    use crate::host::parser::parse_expr_tokens;

    fn convert(source: &str) -> String {
        let expr = parse_expr_tokens(&tokenize(source).unwrap()).unwrap();
        expr_to_form(&expr).unwrap().to_string()
    }

    #[test]
    fn lists_and_cons() {
        assert_eq!(convert("[1, 2]."), "(list 1 2)");
        assert_eq!(convert("[H | T]."), "(cons H T)");
        assert_eq!(convert("[a, b | T]."), "(list* 'a 'b T)");
        assert_eq!(convert("[]."), "()");
    }

    #[test]
    fn calls() {
        assert_eq!(convert("f(X, 1)."), "(f X 1)");
        assert_eq!(convert("F(X)."), "(funcall F X)");
        assert_eq!(convert("lists:map(F, L)."), "(lists:map F L)");
        assert_eq!(convert("M:f()."), "(call M 'f)");
    }

    #[test]
    fn records_and_maps() {
        assert_eq!(convert("#r{a = 1}."), "(make-record r a 1)");
        assert_eq!(convert("X#r.a."), "(record-field X r a)");
        assert_eq!(convert("#{a => 1}."), "(map 'a 1)");
        assert_eq!(convert("M#{a := 1}."), "(map-update M 'a 1)");
    }

    #[test]
    fn control_flow() {
        assert_eq!(
            convert("case X of {ok, V} when V > 0 -> V; _ -> 0 end."),
            "(case X ((tuple 'ok V) (when (> V 0)) V) (_ 0))"
        );
        assert_eq!(
            convert("if X > 0; X < -5 -> a; true -> b end."),
            "(cond ((orelse (> X 0) (< X -5)) 'a) ('true 'b))"
        );
        assert_eq!(convert("fun f/2."), "(function f 2)");
        assert_eq!(convert("[X || X <- L, X > 1]."), "(lc ((<- X L) (> X 1)) X)");
    }

    #[test]
    fn binaries() {
        assert_eq!(convert("<<1, X:8/integer-unit:1>>."), "(binary 1 (X (size 8) integer (unit 1)))");
    }

    #[test]
    fn literals() {
        let expr = parse_expr_tokens(&tokenize("{vsn, [1, \"a\" | b]}.").unwrap()).unwrap();
        assert_eq!(literal_to_form(&expr).unwrap().to_string(), "#(vsn (1 \"a\" . b))");
        let call = parse_expr_tokens(&tokenize("f(x).").unwrap()).unwrap();
        assert!(matches!(literal_to_form(&call), Err(TranslateError::NotALiteral(_))));
    }
}
