//! hdrinc Error Handling
//!
//! Two families of failures live here. Those that travel inside a
//! `SessionState` (include errors and per-item warnings) are plain `Clone`
//! values that keep the original diagnostic text. Those returned straight to a
//! caller (reader, expander, configuration) carry `miette` diagnostics for the
//! CLI to render.

use std::fmt;
use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use thiserror::Error;

use crate::host::MacroArity;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text attached to reader diagnostics.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn to_named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.content.clone())
    }
}

/// Converts a byte range to a miette span.
pub fn to_source_span(start: usize, end: usize) -> SourceSpan {
    SourceSpan::from(start..end)
}

// ============================================================================
// READER ERRORS
// ============================================================================

/// Failures reading MacroLang text.
#[derive(Debug, Error, Diagnostic)]
pub enum ReadError {
    #[error("syntax error: {message}")]
    #[diagnostic(
        code(hdrinc::read::syntax),
        help("check for unbalanced parentheses or an unterminated string")
    )]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid {literal_type} literal '{value}'")]
    #[diagnostic(code(hdrinc::read::invalid_literal))]
    InvalidLiteral {
        literal_type: &'static str,
        value: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid literal")]
        span: SourceSpan,
    },
}

// ============================================================================
// HOST GRAMMAR AND TRANSLATION ERRORS
// ============================================================================

/// A failure tokenizing or parsing HostLang, located by header line.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {message}")]
pub struct HostParseError {
    pub line: u32,
    pub message: String,
}

impl HostParseError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Why one declaration or macro arity could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("not a literal: {0}")]
    NotALiteral(String),

    #[error(transparent)]
    Parse(#[from] HostParseError),
}

// ============================================================================
// SESSION DIAGNOSTICS
// ============================================================================

/// Which entry point a missing include came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeKind {
    File,
    Lib,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncludeKind::File => f.write_str("file"),
            IncludeKind::Lib => f.write_str("lib"),
        }
    }
}

/// Errors fatal to one include. Accumulated in `SessionState::errors`.
/// Serialized with an `error` tag, since `NoInclude` has its own `kind`.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum IncludeError {
    #[error("bad include name: {form}")]
    #[diagnostic(
        code(hdrinc::include::bad_name),
        help("include directives take exactly one string argument")
    )]
    BadIncludeName { form: String },

    #[error("no such include {kind}: {name}")]
    #[diagnostic(
        code(hdrinc::include::no_include),
        help("add the containing directory with -I, or a library root with --lib-root")
    )]
    NoInclude { kind: IncludeKind, name: String },

    #[error("failed to read {}: {reason}", .path.display())]
    #[diagnostic(code(hdrinc::include::read))]
    Read { path: PathBuf, reason: String },

    #[error("host parse error at {0}")]
    #[diagnostic(code(hdrinc::include::host_parse))]
    HostParse(HostParseError),
}

/// One dropped item. Accumulated in `SessionState::warnings`.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("unable to translate function {name}/{arity}: {reason}")]
    Function {
        name: String,
        arity: usize,
        reason: String,
    },

    #[error("unable to translate record {name}: {reason}")]
    Record { name: String, reason: String },

    #[error("unable to translate type {name}: {reason}")]
    Type { name: String, reason: String },

    #[error("unable to translate opaque type {name}: {reason}")]
    Opaque { name: String, reason: String },

    #[error("unable to translate spec {name}/{arity}: {reason}")]
    Spec {
        name: String,
        arity: usize,
        reason: String,
    },

    #[error("unable to translate attribute {name}: {reason}")]
    Attribute { name: String, reason: String },

    #[error("unable to translate macro {}: {reason}", macro_label(.name, .arity))]
    Macro {
        name: String,
        arity: MacroArity,
        reason: String,
    },
}

fn macro_label(name: &str, arity: &MacroArity) -> String {
    match arity {
        MacroArity::Fixed(n) => format!("{}/{}", name, n),
        MacroArity::NoArgs => name.to_string(),
    }
}

// ============================================================================
// EXPANDER AND CONFIGURATION ERRORS
// ============================================================================

/// Failures applying a translated macro to arguments.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ExpandError {
    #[error("not a macro definition: {0}")]
    #[diagnostic(code(hdrinc::expand::not_a_macro))]
    NotAMacro(String),

    #[error("malformed macro clause in {name}: {clause}")]
    #[diagnostic(code(hdrinc::expand::malformed_clause))]
    MalformedClause { name: String, clause: String },

    #[error("no clause of {name} matches {count} argument(s)")]
    #[diagnostic(code(hdrinc::expand::no_clause))]
    NoMatchingClause { name: String, count: usize },

    #[error("unbound template variable {0}")]
    #[diagnostic(code(hdrinc::expand::unbound))]
    Unbound(String),

    #[error("cannot splice non-list value {0}")]
    #[diagnostic(code(hdrinc::expand::splice))]
    BadSplice(String),
}

/// Failures loading an `IncludeConfig` file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config file {}", .path.display())]
    #[diagnostic(code(hdrinc::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", .path.display())]
    #[diagnostic(
        code(hdrinc::config::yaml),
        help("expected keys: include_path, lib_roots, header_suffix, legacy_record_types")
    )]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a diagnostic with full miette rendering to stderr.
pub fn print_error<E>(error: E)
where
    E: Diagnostic + Send + Sync + 'static,
{
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
