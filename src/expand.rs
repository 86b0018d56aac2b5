//! Macro clause expander.
//!
//! Applies a translated `(defmacro name clause...)` to actual argument forms:
//! picks the first clause whose head accepts the arguments, binds the formal
//! parameters, and instantiates the backquoted template. Arguments are bound
//! verbatim and never evaluated.

use std::collections::HashMap;

use crate::errors::ExpandError;
use crate::form::Form;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ClauseHead {
    /// `(_)`: any argument list.
    Any,
    /// `((list P...))`: exactly that many arguments.
    Exactly(Vec<String>),
}

/// The clauses of one translated macro, ready to expand.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroClauses {
    name: String,
    clauses: Vec<(ClauseHead, Form)>,
}

// ============================================================================
// PUBLIC API
// ============================================================================

impl MacroClauses {
    pub fn from_form(form: &Form) -> Result<Self, ExpandError> {
        let not_a_macro = || ExpandError::NotAMacro(form.to_string());
        let items = form.as_list().ok_or_else(not_a_macro)?;
        let [head, name, clauses @ ..] = items else {
            return Err(not_a_macro());
        };
        if !head.is_symbol("defmacro") {
            return Err(not_a_macro());
        }
        let name = name.as_symbol().ok_or_else(not_a_macro)?.to_string();

        let clauses = clauses
            .iter()
            .map(|clause| {
                parse_clause(clause).ok_or_else(|| ExpandError::MalformedClause {
                    name: name.clone(),
                    clause: clause.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, clauses })
    }

    /// Expands with the first matching clause.
    pub fn expand(&self, args: &[Form]) -> Result<Form, ExpandError> {
        for (head, template) in &self.clauses {
            let bindings: HashMap<&str, &Form> = match head {
                ClauseHead::Any => HashMap::new(),
                ClauseHead::Exactly(params) if params.len() == args.len() => {
                    params.iter().map(String::as_str).zip(args).collect()
                }
                ClauseHead::Exactly(_) => continue,
            };
            return instantiate(template, &bindings, 1);
        }
        Err(ExpandError::NoMatchingClause {
            name: self.name.clone(),
            count: args.len(),
        })
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// `(head (backquote template))` → head pattern and template.
fn parse_clause(clause: &Form) -> Option<(ClauseHead, Form)> {
    let [head, body] = clause.as_list()? else {
        return None;
    };
    let template = body.unwrap_call("backquote")?.clone();
    let head = match head.as_list()? {
        [wild] if wild.is_symbol("_") => ClauseHead::Any,
        [pattern] => {
            let items = pattern.as_list()?;
            let (list, params) = items.split_first()?;
            if !list.is_symbol("list") {
                return None;
            }
            let params = params
                .iter()
                .map(|p| p.as_symbol().map(str::to_string))
                .collect::<Option<Vec<_>>>()?;
            ClauseHead::Exactly(params)
        }
        _ => return None,
    };
    Some((head, template))
}

/// Instantiates a backquote template at nesting `depth`; unquotes at depth 1
/// take their bound argument.
fn instantiate(form: &Form, bindings: &HashMap<&str, &Form>, depth: usize) -> Result<Form, ExpandError> {
    if let Some(inner) = form.unwrap_call("comma") {
        if depth > 1 {
            return Ok(Form::comma(instantiate(inner, bindings, depth - 1)?));
        }
        return lookup(inner, bindings).cloned();
    }
    if let Some(inner) = form.unwrap_call("backquote") {
        return Ok(Form::backquote(instantiate(inner, bindings, depth + 1)?));
    }

    match form {
        Form::List(items) => Ok(Form::List(instantiate_items(items, bindings, depth)?)),
        Form::Tuple(items) => Ok(Form::Tuple(instantiate_items(items, bindings, depth)?)),
        Form::Dotted(items, tail) => Ok(Form::Dotted(
            instantiate_items(items, bindings, depth)?,
            Box::new(instantiate(tail, bindings, depth)?),
        )),
        atom => Ok(atom.clone()),
    }
}

fn instantiate_items(
    items: &[Form],
    bindings: &HashMap<&str, &Form>,
    depth: usize,
) -> Result<Vec<Form>, ExpandError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.unwrap_call("comma-at") {
            Some(inner) if depth == 1 => match lookup(inner, bindings)? {
                Form::List(spliced) => out.extend(spliced.iter().cloned()),
                other => return Err(ExpandError::BadSplice(other.to_string())),
            },
            _ => out.push(instantiate(item, bindings, depth)?),
        }
    }
    Ok(out)
}

fn lookup<'f>(form: &Form, bindings: &HashMap<&str, &'f Form>) -> Result<&'f Form, ExpandError> {
    form.as_symbol()
        .and_then(|name| bindings.get(name).copied())
        .ok_or_else(|| ExpandError::Unbound(form.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::read_one;

    fn clauses(text: &str) -> MacroClauses {
        MacroClauses::from_form(&read_one(text).unwrap()).unwrap()
    }

    #[test]
    fn binds_arguments_verbatim() {
        let m = clauses("(defmacro FOO (((list X)) `(+ ,X 1)))");
        let arg = read_one("(f 'y)").unwrap();
        assert_eq!(m.expand(&[arg]).unwrap().to_string(), "(+ (f 'y) 1)");
    }

    #[test]
    fn wildcard_clause_accepts_any_arguments() {
        let m = clauses("(defmacro BAR ((_) `42))");
        assert_eq!(m.expand(&[]).unwrap(), Form::Integer(42));
        assert_eq!(m.expand(&[Form::sym("ignored")]).unwrap(), Form::Integer(42));
    }

    #[test]
    fn first_matching_clause_wins() {
        let m = clauses("(defmacro M (((list A B)) `(two ,A ,B)) ((_) `none))");
        assert_eq!(
            m.expand(&[Form::Integer(1), Form::Integer(2)]).unwrap().to_string(),
            "(two 1 2)"
        );
        assert_eq!(m.expand(&[Form::Integer(1)]).unwrap().to_string(), "none");
    }

    #[test]
    fn no_clause_matches() {
        let m = clauses("(defmacro M (((list A)) `,A))");
        assert!(matches!(m.expand(&[]), Err(ExpandError::NoMatchingClause { count: 0, .. })));
    }

    #[test]
    fn nested_backquote_keeps_inner_unquote() {
        let m = clauses("(defmacro M (((list A)) `(x `(y ,,A))))");
        assert_eq!(m.expand(&[Form::sym("q")]).unwrap().to_string(), "(x `(y ,q))");
    }

    #[test]
    fn splices_lists() {
        let m = clauses("(defmacro M (((list L)) `(a ,@L b)))");
        let arg = read_one("(1 2)").unwrap();
        assert_eq!(m.expand(&[arg]).unwrap().to_string(), "(a 1 2 b)");
        assert!(matches!(m.expand(&[Form::Integer(3)]), Err(ExpandError::BadSplice(_))));
    }

    #[test]
    fn rejects_non_macros() {
        assert!(MacroClauses::from_form(&read_one("(defun f ())").unwrap()).is_err());
    }
}
