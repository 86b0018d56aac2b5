//! Declaration translation.
//!
//! Each host declaration becomes at most one MacroLang form or module
//! attribute. A declaration that cannot be converted is dropped with a
//! warning and the rest of the file still translates.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::convert::{expr_to_form, fun_spec_to_form, function_clause, literal_to_form, type_to_form};
use crate::errors::{IncludeError, TranslateError, Warning};
use crate::form::Form;
use crate::host::{DeclKind, FunType, HostDeclaration, HostForm, RecordField, TypeExpr};
use crate::session::SessionState;

/// Module attributes and top-level forms, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedDecls {
    pub attributes: Vec<Form>,
    pub forms: Vec<Form>,
}

enum Output {
    Attribute(Form),
    Form(Form),
    Nothing,
}

/// Translates every declaration of one header.
pub fn translate_declarations(
    declarations: &[HostForm],
    state: SessionState,
) -> (TranslatedDecls, SessionState) {
    let typed_records: HashSet<&str> = declarations
        .iter()
        .filter_map(|d| match &d.decl {
            HostDeclaration::RecordType { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();

    let mut out = TranslatedDecls::default();
    let mut state = state;
    for host_form in declarations {
        let result = match &host_form.decl {
            HostDeclaration::Record { name, .. } if typed_records.contains(name.as_str()) => {
                Ok(Output::Nothing)
            }
            HostDeclaration::Record { name, fields } | HostDeclaration::RecordType { name, fields } => {
                record_form(name, fields)
                    .map(Output::Form)
                    .map_err(|e| Warning::Record {
                        name: name.clone(),
                        reason: e.to_string(),
                    })
            }
            HostDeclaration::Type { name, params, def } => type_form("deftype", name, params, def)
                .map(Output::Form)
                .map_err(|e| Warning::Type {
                    name: name.clone(),
                    reason: e.to_string(),
                }),
            HostDeclaration::Opaque { name, params, def } => type_form("defopaque", name, params, def)
                .map(Output::Form)
                .map_err(|e| Warning::Opaque {
                    name: name.clone(),
                    reason: e.to_string(),
                }),
            HostDeclaration::Spec {
                name,
                arity,
                clauses,
            } => spec_form(name, *arity, clauses)
                .map(Output::Form)
                .map_err(|e| Warning::Spec {
                    name: name.clone(),
                    arity: *arity,
                    reason: e.to_string(),
                }),
            HostDeclaration::Export(funs) => Ok(Output::Attribute(Form::call("export", fun_arities(funs)))),
            HostDeclaration::Import { module, funs } => {
                let mut from = vec![Form::sym(module)];
                from.extend(fun_arities(funs));
                Ok(Output::Attribute(Form::call("import", [Form::call("from", from)])))
            }
            HostDeclaration::Attribute { name, value } => literal_to_form(value)
                .map(|v| Output::Attribute(Form::call(name, [v])))
                .map_err(|e| Warning::Attribute {
                    name: name.clone(),
                    reason: e.to_string(),
                }),
            HostDeclaration::Function {
                name,
                arity,
                clauses,
            } => clauses
                .iter()
                .map(function_clause)
                .collect::<Result<Vec<_>, _>>()
                .map(|cs| {
                    let mut items = vec![Form::sym(name)];
                    items.extend(cs);
                    Output::Form(Form::call("defun", items))
                })
                .map_err(|e| Warning::Function {
                    name: name.clone(),
                    arity: *arity,
                    reason: e.to_string(),
                }),
            HostDeclaration::Unsupported {
                kind,
                name,
                arity,
                reason,
            } => Err(unsupported_warning(*kind, name, *arity, reason)),
            HostDeclaration::ParseError(error) => {
                state = state.with_error(IncludeError::HostParse(error.clone()));
                Ok(Output::Nothing)
            }
            HostDeclaration::Eof | HostDeclaration::Warning(_) => Ok(Output::Nothing),
        };

        match result {
            Ok(Output::Attribute(form)) => {
                debug!(line = host_form.line, %form, "translated attribute");
                out.attributes.push(form);
            }
            Ok(Output::Form(form)) => {
                debug!(line = host_form.line, %form, "translated declaration");
                out.forms.push(form);
            }
            Ok(Output::Nothing) => {}
            Err(warning) => {
                warn!(line = host_form.line, %warning, "dropping declaration");
                state = state.with_warning(warning);
            }
        }
    }
    (out, state)
}

// ============================================================================
// FORM BUILDERS
// ============================================================================

/// `(defrecord name field...)`; a field is `f`, `(f default)` or
/// `(f default-or-'undefined type)`.
fn record_form(name: &str, fields: &[RecordField]) -> Result<Form, TranslateError> {
    let mut items = vec![Form::sym(name)];
    for field in fields {
        let default = field.default.as_ref().map(expr_to_form).transpose()?;
        items.push(match (default, &field.ty) {
            (None, None) => Form::sym(&field.name),
            (Some(default), None) => Form::list(vec![Form::sym(&field.name), default]),
            (default, Some(ty)) => Form::list(vec![
                Form::sym(&field.name),
                default.unwrap_or_else(|| Form::quote(Form::sym("undefined"))),
                type_to_form(ty)?,
            ]),
        });
    }
    Ok(Form::call("defrecord", items))
}

fn type_form(head: &str, name: &str, params: &[String], def: &TypeExpr) -> Result<Form, TranslateError> {
    let mut signature = vec![Form::sym(name)];
    signature.extend(params.iter().map(Form::sym));
    Ok(Form::call(head, [Form::list(signature), type_to_form(def)?]))
}

fn spec_form(name: &str, arity: usize, clauses: &[FunType]) -> Result<Form, TranslateError> {
    let mut items = vec![Form::list(vec![Form::sym(name), Form::Integer(arity as i64)])];
    for clause in clauses {
        items.push(fun_spec_to_form(clause)?);
    }
    Ok(Form::call("defspec", items))
}

fn unsupported_warning(kind: DeclKind, name: &str, arity: usize, reason: &str) -> Warning {
    let name = name.to_string();
    let reason = reason.to_string();
    match kind {
        DeclKind::Function => Warning::Function { name, arity, reason },
        DeclKind::Record => Warning::Record { name, reason },
        DeclKind::Type => Warning::Type { name, reason },
        DeclKind::Opaque => Warning::Opaque { name, reason },
        DeclKind::Spec => Warning::Spec { name, arity, reason },
        DeclKind::Attribute => Warning::Attribute { name, reason },
    }
}

fn fun_arities(funs: &[(String, usize)]) -> Vec<Form> {
    funs.iter()
        .map(|(name, arity)| Form::list(vec![Form::sym(name), Form::Integer(*arity as i64)]))
        .collect()
}
