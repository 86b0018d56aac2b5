//! Type expressions and spec signatures.

use crate::errors::TranslateError;
use crate::form::Form;
use crate::host::{FunType, TypeExpr};

type CResult = Result<Form, TranslateError>;

pub fn type_to_form(ty: &TypeExpr) -> CResult {
    Ok(match ty {
        TypeExpr::Var(name) => Form::sym(name),
        TypeExpr::Atom(name) => Form::quote(Form::sym(name)),
        TypeExpr::Integer(n) => Form::Integer(*n),
        TypeExpr::Nil => Form::nil(),
        TypeExpr::Named { module, name, args } => {
            let head = match module {
                Some(module) => format!("{}:{}", module, name),
                None => name.clone(),
            };
            Form::call(&head, types(args)?)
        }
        TypeExpr::Union(alternatives) => Form::call("UNION", types(alternatives)?),
        TypeExpr::Range(low, high) => Form::call("range", [bound(low)?, bound(high)?]),
        TypeExpr::Tuple(items) => Form::call("tuple", types(items)?),
        TypeExpr::List(elem) => Form::call("list", [type_to_form(elem)?]),
        TypeExpr::NonEmptyList(elem) => Form::call("nonempty-list", [type_to_form(elem)?]),
        TypeExpr::Map(fields) => {
            let mut pairs = Vec::with_capacity(fields.len() * 2);
            for field in fields {
                pairs.push(type_to_form(&field.key)?);
                pairs.push(type_to_form(&field.value)?);
            }
            Form::call("map", pairs)
        }
        TypeExpr::AnyFun => Form::call("lambda", [Form::sym("any")]),
        TypeExpr::Fun { args: None, ret } => {
            Form::call("lambda", [Form::sym("any"), type_to_form(ret)?])
        }
        TypeExpr::Fun {
            args: Some(args),
            ret,
        } => Form::call("lambda", [Form::list(types(args)?), type_to_form(ret)?]),
        TypeExpr::Record { name, fields } => {
            let mut items = vec![Form::sym(name)];
            for (field, ty) in fields {
                items.push(Form::list(vec![Form::sym(field), type_to_form(ty)?]));
            }
            Form::call("record", items)
        }
        // Annotation names are documentation only.
        TypeExpr::Annotated(_, inner) => type_to_form(inner)?,
        TypeExpr::Bitstring { base, unit } => {
            Form::call("bitstring", [Form::Integer(*base), Form::Integer(*unit)])
        }
    })
}

/// One `-spec` signature: `((arg...) ret)` plus `((Var type)...)` when it
/// has constraints.
pub fn fun_spec_to_form(signature: &FunType) -> CResult {
    let mut items = vec![
        Form::list(types(&signature.args)?),
        type_to_form(&signature.ret)?,
    ];
    if !signature.constraints.is_empty() {
        let constraints = signature
            .constraints
            .iter()
            .map(|(var, ty)| Ok(Form::list(vec![Form::sym(var), type_to_form(ty)?])))
            .collect::<Result<Vec<_>, TranslateError>>()?;
        items.push(Form::list(constraints));
    }
    Ok(Form::list(items))
}

fn types(items: &[TypeExpr]) -> Result<Vec<Form>, TranslateError> {
    items.iter().map(type_to_form).collect()
}

fn bound(ty: &TypeExpr) -> CResult {
    match ty {
        TypeExpr::Integer(n) => Ok(Form::Integer(*n)),
        other => Err(TranslateError::Unsupported(format!(
            "range bound {}",
            type_to_form(other)?
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_and_remote_types() {
        let ty = TypeExpr::Union(vec![
            TypeExpr::Named {
                module: None,
                name: "integer".into(),
                args: vec![],
            },
            TypeExpr::Named {
                module: Some("dict".into()),
                name: "dict".into(),
                args: vec![TypeExpr::Var("K".into())],
            },
            TypeExpr::Atom("undefined".into()),
        ]);
        assert_eq!(
            type_to_form(&ty).unwrap().to_string(),
            "(UNION (integer) (dict:dict K) 'undefined)"
        );
    }

    #[test]
    fn fun_types() {
        let any = TypeExpr::Named {
            module: None,
            name: "any".into(),
            args: vec![],
        };
        assert_eq!(type_to_form(&TypeExpr::AnyFun).unwrap().to_string(), "(lambda any)");
        let fun = TypeExpr::Fun {
            args: Some(vec![TypeExpr::Var("A".into())]),
            ret: Box::new(any),
        };
        assert_eq!(type_to_form(&fun).unwrap().to_string(), "(lambda (A) (any))");
    }

    #[test]
    fn range_needs_integer_bounds() {
        let ok = TypeExpr::Range(Box::new(TypeExpr::Integer(0)), Box::new(TypeExpr::Integer(255)));
        assert_eq!(type_to_form(&ok).unwrap().to_string(), "(range 0 255)");
        let bad = TypeExpr::Range(Box::new(TypeExpr::Var("N".into())), Box::new(TypeExpr::Integer(1)));
        assert!(type_to_form(&bad).is_err());
    }

    #[test]
    fn spec_signature_with_constraints() {
        let signature = FunType {
            args: vec![TypeExpr::Var("A".into())],
            ret: TypeExpr::List(Box::new(TypeExpr::Var("A".into()))),
            constraints: vec![(
                "A".into(),
                TypeExpr::Named {
                    module: None,
                    name: "atom".into(),
                    args: vec![],
                },
            )],
        };
        assert_eq!(
            fun_spec_to_form(&signature).unwrap().to_string(),
            "((A) (list A) ((A (atom))))"
        );
    }
}
