//! hdrinc: header inclusion for a Lisp-dialect macro compiler.
//!
//! Headers written in an attribute-based host notation are read into
//! declarations plus a raw macro table, then translated into MacroLang forms:
//! records, types, specs and functions become definitions, module attributes
//! are gathered under one `extend-module`, and each preprocessor macro becomes
//! a pattern-matching `defmacro` whose clauses expand to backquoted templates.

pub use crate::errors::{IncludeError, Warning};
pub use crate::form::{stringify, Form};
pub use crate::include::{IncludeOutcome, IncludeResolver, Includer};
pub use crate::session::SessionState;

pub mod cli;
pub mod config;
pub mod convert;
pub mod errors;
pub mod expand;
pub mod form;
pub mod host;
pub mod include;
pub mod session;
pub mod syntax;
pub mod translate;
