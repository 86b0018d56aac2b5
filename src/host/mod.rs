//! HostLang: the attribute-based header notation.
//!
//! This module holds the host syntax trees, the declaration and macro table
//! model handed to the translators, and the `HostFormSupplier` seam through
//! which header files are read.

pub mod lexer;
pub mod parser;
pub mod reader;
pub mod token;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::errors::{HostParseError, IncludeError};
pub use reader::HeaderReader;
pub use token::{Token, TokenKind};

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HostExpr {
    Atom(String),
    Var(String),
    Integer(i64),
    Float(f64),
    Char(char),
    String(String),
    Nil,
    Cons(Box<HostExpr>, Box<HostExpr>),
    Tuple(Vec<HostExpr>),
    Binary(Vec<BinElement>),
    /// `#{...}` when `base` is `None`, `Base#{...}` otherwise.
    Map {
        base: Option<Box<HostExpr>>,
        fields: Vec<MapField>,
    },
    RecordNew {
        name: String,
        fields: Vec<(String, HostExpr)>,
    },
    RecordUpdate {
        expr: Box<HostExpr>,
        name: String,
        fields: Vec<(String, HostExpr)>,
    },
    RecordField {
        expr: Box<HostExpr>,
        name: String,
        field: String,
    },
    RecordIndex {
        name: String,
        field: String,
    },
    BinaryOp {
        op: String,
        left: Box<HostExpr>,
        right: Box<HostExpr>,
    },
    UnaryOp {
        op: String,
        operand: Box<HostExpr>,
    },
    Match(Box<HostExpr>, Box<HostExpr>),
    Call {
        fun: Box<HostExpr>,
        args: Vec<HostExpr>,
    },
    RemoteCall {
        module: Box<HostExpr>,
        fun: Box<HostExpr>,
        args: Vec<HostExpr>,
    },
    Block(Vec<HostExpr>),
    Case {
        expr: Box<HostExpr>,
        clauses: Vec<Clause>,
    },
    /// Clauses carry no patterns, only guards and bodies.
    If(Vec<Clause>),
    Fun(Vec<Clause>),
    FunRef {
        module: Option<String>,
        name: String,
        arity: usize,
    },
    Catch(Box<HostExpr>),
    ListComp {
        expr: Box<HostExpr>,
        qualifiers: Vec<Qualifier>,
    },
}

/// One clause of a function, `fun`, `case` or `if`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub patterns: Vec<HostExpr>,
    /// Alternatives separated by `;`, each a conjunction separated by `,`.
    pub guards: Vec<Vec<HostExpr>>,
    pub body: Vec<HostExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapField {
    pub key: HostExpr,
    pub value: HostExpr,
    /// `:=` rather than `=>`.
    pub exact: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinElement {
    pub value: HostExpr,
    pub size: Option<HostExpr>,
    /// Type specifiers such as `binary` or `unit:8`.
    pub specs: Vec<(String, Option<i64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    Generator(HostExpr, HostExpr),
    BitGenerator(HostExpr, HostExpr),
    Filter(HostExpr),
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Var(String),
    Atom(String),
    Integer(i64),
    Nil,
    /// Built-in, user or remote type application such as `integer()`,
    /// `t(A)` or `m:t()`.
    Named {
        module: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Union(Vec<TypeExpr>),
    Range(Box<TypeExpr>, Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    List(Box<TypeExpr>),
    NonEmptyList(Box<TypeExpr>),
    Map(Vec<MapFieldType>),
    AnyFun,
    /// `args` is `None` for `fun((...) -> R)`.
    Fun {
        args: Option<Vec<TypeExpr>>,
        ret: Box<TypeExpr>,
    },
    Record {
        name: String,
        fields: Vec<(String, TypeExpr)>,
    },
    Annotated(String, Box<TypeExpr>),
    Bitstring {
        base: i64,
        unit: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapFieldType {
    pub key: TypeExpr,
    pub value: TypeExpr,
    pub exact: bool,
}

/// One signature of a `-spec`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunType {
    pub args: Vec<TypeExpr>,
    pub ret: TypeExpr,
    pub constraints: Vec<(String, TypeExpr)>,
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub default: Option<HostExpr>,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostDeclaration {
    Record {
        name: String,
        fields: Vec<RecordField>,
    },
    Type {
        name: String,
        params: Vec<String>,
        def: TypeExpr,
    },
    Opaque {
        name: String,
        params: Vec<String>,
        def: TypeExpr,
    },
    /// Older combined encoding: a record's field types carried by a type
    /// attribute instead of the record attribute.
    RecordType {
        name: String,
        fields: Vec<RecordField>,
    },
    Spec {
        name: String,
        arity: usize,
        clauses: Vec<FunType>,
    },
    Export(Vec<(String, usize)>),
    Import {
        module: String,
        funs: Vec<(String, usize)>,
    },
    Attribute {
        name: String,
        value: HostExpr,
    },
    Function {
        name: String,
        arity: usize,
        clauses: Vec<Clause>,
    },
    /// Valid in shape, but its body uses a construct the host grammar does
    /// not cover. Becomes a translation warning rather than an error.
    Unsupported {
        kind: DeclKind,
        name: String,
        arity: usize,
        reason: String,
    },
    ParseError(HostParseError),
    Eof,
    Warning(String),
}

/// Which kind of declaration an `Unsupported` one was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Record,
    Type,
    Opaque,
    Spec,
    Attribute,
}

/// A declaration with the header line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct HostForm {
    pub line: u32,
    pub decl: HostDeclaration,
}

// ============================================================================
// MACRO TABLE
// ============================================================================

/// Identifies one overload of a macro. `NoArgs` is the bare `?NAME` form and
/// is distinct from `Fixed(0)`, the `?NAME()` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MacroArity {
    Fixed(usize),
    NoArgs,
}

impl fmt::Display for MacroArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroArity::Fixed(n) => write!(f, "{}", n),
            MacroArity::NoArgs => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MacroDefinition {
    /// Removed with `-undef`.
    Absent,
    /// Built in to the host preprocessor; no translatable body.
    Predefined,
    Defined {
        params: Vec<String>,
        body: Vec<Token>,
    },
}

/// Macro definitions keyed by name, then arity, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroTable {
    macros: BTreeMap<String, Vec<(MacroArity, MacroDefinition)>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition. A definition with the same name and arity is
    /// shadowed in place; `Absent` markers for the name are dropped.
    pub fn define(&mut self, name: &str, arity: MacroArity, def: MacroDefinition) {
        let entries = self.macros.entry(name.to_string()).or_default();
        entries.retain(|(_, d)| *d != MacroDefinition::Absent);
        match entries.iter_mut().find(|(a, _)| *a == arity) {
            Some(slot) => slot.1 = def,
            None => entries.push((arity, def)),
        }
    }

    /// Marks every arity of `name` as undefined.
    pub fn undefine(&mut self, name: &str) {
        self.macros
            .insert(name.to_string(), vec![(MacroArity::NoArgs, MacroDefinition::Absent)]);
    }

    pub fn get(&self, name: &str, arity: MacroArity) -> Option<&MacroDefinition> {
        self.macros
            .get(name)?
            .iter()
            .find(|(a, _)| *a == arity)
            .map(|(_, d)| d)
    }

    pub fn entries(&self, name: &str) -> &[(MacroArity, MacroDefinition)] {
        self.macros.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(MacroArity, MacroDefinition)])> {
        self.macros.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// ============================================================================
// SUPPLIER SEAM
// ============================================================================

/// Everything the translators need from one header file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostFile {
    pub declarations: Vec<HostForm>,
    pub macros: MacroTable,
}

/// Reads a header file into declarations plus its raw, unexpanded macro
/// table.
pub trait HostFormSupplier {
    fn parse_host_file(&self, path: &Path) -> Result<HostFile, IncludeError>;
}
