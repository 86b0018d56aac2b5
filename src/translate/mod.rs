//! Translation of one header into a single aggregate form.

pub mod decls;
pub mod macros;

use crate::form::Form;
use crate::host::HostFile;
use crate::session::SessionState;

pub use decls::{translate_declarations, TranslatedDecls};
pub use macros::{rewrite_tokens, translate_macros, STRINGIFY_FUNCTION, STRINGIFY_MODULE};

/// Runs both translators over a header and assembles
/// `(progn (extend-module () (attr...)) form... defmacro...)`.
///
/// The `extend-module` form is left out when the header has no attributes.
pub fn translate_header(file: &HostFile, state: SessionState) -> (Form, SessionState) {
    let (decls, state) = translate_declarations(&file.declarations, state);
    let (macros, state) = translate_macros(&file.macros, state);

    let mut body = Vec::with_capacity(decls.forms.len() + macros.len() + 1);
    if !decls.attributes.is_empty() {
        body.push(Form::call(
            "extend-module",
            [Form::nil(), Form::list(decls.attributes)],
        ));
    }
    body.extend(decls.forms);
    body.extend(macros);
    (Form::call("progn", body), state)
}
