//! Header reader: the default `HostFormSupplier`.
//!
//! A header is read one declaration at a time. Macro definitions go into the
//! table raw and unexpanded; every other declaration has its macro uses
//! expanded before it is parsed. A declaration that fails leaves a
//! `ParseError` or `Unsupported` behind and reading carries on with the next
//! one.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::parser::parse_declaration;
use super::token::{tokens_to_string, Token, TokenKind};
use super::{
    lexer, HostDeclaration, HostFile, HostForm, HostFormSupplier, MacroArity, MacroDefinition,
    MacroTable,
};
use crate::errors::{HostParseError, IncludeError};

/// Names the host preprocessor defines for every file.
pub const PREDEFINED_MACROS: &[&str] = &["MODULE", "MODULE_STRING", "LINE", "FILE", "MACHINE"];

/// Preprocessor directives that are recognised but not interpreted.
const IGNORED_DIRECTIVES: &[&str] = &[
    "ifdef", "ifndef", "if", "elif", "else", "endif", "include", "include_lib",
];

const MAX_EXPANSION_DEPTH: usize = 32;

/// Tokens one declaration may grow to through macro expansion.
const MAX_EXPANSION_TOKENS: usize = 100_000;

type PResult<T> = Result<T, HostParseError>;

/// Reads `.hrl`-style header files from disk.
#[derive(Debug, Clone, Default)]
pub struct HeaderReader {
    legacy_record_types: bool,
}

impl HeaderReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits typed records in the older combined encoding: an untyped
    /// `Record` followed by a `RecordType` carrying the field types.
    pub fn with_legacy_record_types(mut self, enabled: bool) -> Self {
        self.legacy_record_types = enabled;
        self
    }

    /// Reads header source text. `file` names the header for `?FILE` and
    /// `?MODULE`.
    pub fn read_header(&self, source: &str, file: &str) -> Result<HostFile, IncludeError> {
        let tokens = lexer::tokenize(source).map_err(IncludeError::HostParse)?;
        let context = FileContext::new(file);
        let mut macros = MacroTable::new();
        for name in PREDEFINED_MACROS {
            macros.define(name, MacroArity::NoArgs, MacroDefinition::Predefined);
        }

        let mut declarations = Vec::new();
        let mut rest = tokens.as_slice();
        while !rest.is_empty() {
            let end = rest
                .iter()
                .position(|t| t.kind == TokenKind::Dot)
                .map_or(rest.len(), |i| i + 1);
            let (chunk, tail) = rest.split_at(end);
            rest = tail;

            let line = chunk[0].line;
            if chunk.last().map(|t| &t.kind) != Some(&TokenKind::Dot) {
                let error = HostParseError::new(line, "declaration is missing its end marker");
                declarations.push(HostForm {
                    line,
                    decl: HostDeclaration::ParseError(error),
                });
                break;
            }

            for decl in self.read_chunk(chunk, &mut macros, &context) {
                debug!(line, ?decl, "read host declaration");
                declarations.push(HostForm { line, decl });
            }
        }

        let last_line = tokens.last().map_or(1, |t| t.line);
        declarations.push(HostForm {
            line: last_line,
            decl: HostDeclaration::Eof,
        });
        Ok(HostFile {
            declarations,
            macros,
        })
    }

    fn read_chunk(
        &self,
        chunk: &[Token],
        macros: &mut MacroTable,
        context: &FileContext,
    ) -> Vec<HostDeclaration> {
        let directive = match chunk {
            [first, second, ..] if first.is_punct("-") => match &second.kind {
                TokenKind::Atom(name) => Some(name.as_str()),
                TokenKind::Keyword(k) => Some(*k),
                _ => None,
            },
            _ => None,
        };

        let result = match directive {
            Some("define") => read_define(chunk).map(|(name, arity, def)| {
                macros.define(&name, arity, def);
                vec![]
            }),
            Some("undef") => read_undef(chunk).map(|name| {
                macros.undefine(&name);
                vec![]
            }),
            Some(name) if IGNORED_DIRECTIVES.contains(&name) => {
                warn!(line = chunk[0].line, directive = name, "ignoring preprocessor directive");
                Ok(vec![HostDeclaration::Warning(format!(
                    "ignored preprocessor directive -{}",
                    name
                ))])
            }
            _ => Expansion::new(macros, context)
                .expand(chunk, 0)
                .and_then(|tokens| parse_declaration(&tokens))
                .map(|decl| self.split_legacy_record(decl)),
        };

        result.unwrap_or_else(|error| vec![HostDeclaration::ParseError(error)])
    }

    fn split_legacy_record(&self, decl: HostDeclaration) -> Vec<HostDeclaration> {
        match decl {
            HostDeclaration::Record { name, fields }
                if self.legacy_record_types && fields.iter().any(|f| f.ty.is_some()) =>
            {
                let untyped = fields
                    .iter()
                    .cloned()
                    .map(|mut f| {
                        f.ty = None;
                        f
                    })
                    .collect();
                vec![
                    HostDeclaration::Record {
                        name: name.clone(),
                        fields: untyped,
                    },
                    HostDeclaration::RecordType { name, fields },
                ]
            }
            decl => vec![decl],
        }
    }
}

impl HostFormSupplier for HeaderReader {
    fn parse_host_file(&self, path: &Path) -> Result<HostFile, IncludeError> {
        let source = fs::read_to_string(path).map_err(|e| IncludeError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.read_header(&source, &path.to_string_lossy())
    }
}

// ============================================================================
// DIRECTIVES
// ============================================================================

/// `- define ( NAME [ ( P1 , ... ) ] [ , Body... ] ) .`
fn read_define(chunk: &[Token]) -> PResult<(String, MacroArity, MacroDefinition)> {
    let line = chunk[0].line;
    let inner = directive_body(chunk)?;
    let Some(name) = inner.first().and_then(Token::name) else {
        return Err(HostParseError::new(line, "bad macro name in define"));
    };

    let mut pos = 1;
    let mut params = None;
    if inner.get(pos).is_some_and(|t| t.is_punct("(")) {
        pos += 1;
        let mut names = Vec::new();
        if inner.get(pos).is_some_and(|t| t.is_punct(")")) {
            pos += 1;
        } else {
            loop {
                match inner.get(pos).map(|t| &t.kind) {
                    Some(TokenKind::Var(p)) => names.push(p.clone()),
                    _ => return Err(HostParseError::new(line, format!("bad parameter list for macro {}", name))),
                }
                pos += 1;
                match inner.get(pos) {
                    Some(t) if t.is_punct(",") => pos += 1,
                    Some(t) if t.is_punct(")") => {
                        pos += 1;
                        break;
                    }
                    _ => return Err(HostParseError::new(line, format!("bad parameter list for macro {}", name))),
                }
            }
        }
        params = Some(names);
    }

    let body = match inner.get(pos) {
        None => Vec::new(),
        Some(t) if t.is_punct(",") => inner[pos + 1..].to_vec(),
        Some(_) => return Err(HostParseError::new(line, format!("bad define for macro {}", name))),
    };

    let arity = params.as_ref().map_or(MacroArity::NoArgs, |p| MacroArity::Fixed(p.len()));
    Ok((
        name.to_string(),
        arity,
        MacroDefinition::Defined {
            params: params.unwrap_or_default(),
            body,
        },
    ))
}

/// `- undef ( NAME ) .`
fn read_undef(chunk: &[Token]) -> PResult<String> {
    match directive_body(chunk)? {
        [name] => name
            .name()
            .map(str::to_string)
            .ok_or_else(|| HostParseError::new(name.line, "bad macro name in undef")),
        _ => Err(HostParseError::new(chunk[0].line, "bad undef")),
    }
}

/// The tokens between `-name(` and the closing `).`.
fn directive_body(chunk: &[Token]) -> PResult<&[Token]> {
    let n = chunk.len();
    let well_formed = n >= 5
        && chunk[2].is_punct("(")
        && chunk[n - 2].is_punct(")")
        && chunk[n - 1].kind == TokenKind::Dot;
    if !well_formed {
        return Err(HostParseError::new(chunk[0].line, "malformed preprocessor directive"));
    }
    Ok(&chunk[3..n - 2])
}

// ============================================================================
// MACRO USE EXPANSION
// ============================================================================

struct FileContext {
    file: String,
    module: String,
}

impl FileContext {
    fn new(file: &str) -> Self {
        let module = Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file: file.to_string(),
            module,
        }
    }

    fn predefined(&self, name: &str, line: u32) -> Option<TokenKind> {
        Some(match name {
            "MODULE" => TokenKind::Atom(self.module.clone()),
            "MODULE_STRING" => TokenKind::String(self.module.clone()),
            "LINE" => TokenKind::Integer(i64::from(line)),
            "FILE" => TokenKind::String(self.file.clone()),
            "MACHINE" => TokenKind::Atom("BEAM".to_string()),
            _ => return None,
        })
    }
}

/// One declaration's macro expansion, with a shared token budget so that
/// nested uses cannot grow the output without bound.
struct Expansion<'a> {
    macros: &'a MacroTable,
    context: &'a FileContext,
    budget: usize,
}

impl<'a> Expansion<'a> {
    fn new(macros: &'a MacroTable, context: &'a FileContext) -> Self {
        Self {
            macros,
            context,
            budget: MAX_EXPANSION_TOKENS,
        }
    }

    fn emit(&mut self, out: &mut Vec<Token>, token: Token) -> PResult<()> {
        if self.budget == 0 {
            return Err(HostParseError::new(token.line, "macro expansion too large"));
        }
        self.budget -= 1;
        out.push(token);
        Ok(())
    }

    /// Replaces every `?NAME` and `?NAME(Args)` use with its definition.
    fn expand(&mut self, tokens: &[Token], depth: usize) -> PResult<Vec<Token>> {
        if depth > MAX_EXPANSION_DEPTH {
            let line = tokens.first().map_or(0, |t| t.line);
            return Err(HostParseError::new(line, "macro expansion too deep"));
        }

        let macros = self.macros;
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if !token.is_punct("?") {
                self.emit(&mut out, token.clone())?;
                i += 1;
                continue;
            }

            let line = token.line;
            let Some(name) = tokens.get(i + 1).and_then(Token::name) else {
                return Err(HostParseError::new(line, "'?' must be followed by a macro name"));
            };
            i += 2;

            let call_args = if tokens.get(i).is_some_and(|t| t.is_punct("(")) {
                match macros.get(name, MacroArity::Fixed(count_args(&tokens[i..])?)) {
                    Some(_) => Some(collect_args(&tokens[i..])?),
                    None => None,
                }
            } else {
                None
            };

            match call_args {
                Some((args, consumed)) => {
                    i += consumed;
                    let Some(MacroDefinition::Defined { params, body }) =
                        macros.get(name, MacroArity::Fixed(args.len()))
                    else {
                        return Err(undefined(name, line));
                    };
                    let substituted = substitute_params(body, params, &args, line);
                    out.extend(self.expand(&substituted, depth + 1)?);
                }
                None => match macros.get(name, MacroArity::NoArgs) {
                    Some(MacroDefinition::Defined { body, .. }) => {
                        out.extend(self.expand(body, depth + 1)?);
                    }
                    Some(MacroDefinition::Predefined) => match self.context.predefined(name, line) {
                        Some(kind) => self.emit(&mut out, Token::new(kind, line))?,
                        None => return Err(undefined(name, line)),
                    },
                    _ => return Err(undefined(name, line)),
                },
            }
        }
        Ok(out)
    }
}

fn undefined(name: &str, line: u32) -> HostParseError {
    HostParseError::new(line, format!("undefined macro '{}'", name))
}

/// Replaces parameter variables with argument tokens; `??P` becomes the
/// argument's source text as a string.
fn substitute_params(body: &[Token], params: &[String], args: &[Vec<Token>], line: u32) -> Vec<Token> {
    let arg_for = |token: &Token| match &token.kind {
        TokenKind::Var(v) => params.iter().position(|p| p == v).map(|i| &args[i]),
        _ => None,
    };

    let mut out = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let stringified = (body[i].is_punct("?") && body.get(i + 1).is_some_and(|t| t.is_punct("?")))
            .then(|| body.get(i + 2).and_then(arg_for))
            .flatten();
        if let Some(arg) = stringified {
            out.push(Token::new(TokenKind::String(tokens_to_string(arg)), line));
            i += 3;
            continue;
        }
        match arg_for(&body[i]) {
            Some(arg) => out.extend(arg.iter().cloned()),
            None => out.push(body[i].clone()),
        }
        i += 1;
    }
    out
}

/// Splits `( A , B , ... )` at top-level commas. Returns the argument token
/// runs and the number of tokens consumed including both parentheses.
fn collect_args(tokens: &[Token]) -> PResult<(Vec<Vec<Token>>, usize)> {
    let line = tokens.first().map_or(0, |t| t.line);
    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate().skip(1) {
        match &token.kind {
            TokenKind::Punct("(" | "[" | "{" | "<<") => depth += 1,
            TokenKind::Keyword("begin" | "case" | "if" | "receive" | "try") => depth += 1,
            TokenKind::Keyword("fun") if tokens.get(i + 1).is_some_and(|t| t.is_punct("(")) => {
                depth += 1
            }
            TokenKind::Keyword("end") => depth = depth.saturating_sub(1),
            TokenKind::Punct(")") if depth == 0 => {
                if !current.is_empty() || !args.is_empty() {
                    args.push(current);
                }
                return Ok((args, i + 1));
            }
            TokenKind::Punct(")" | "]" | "}" | ">>") => depth = depth.saturating_sub(1),
            TokenKind::Punct(",") if depth == 0 => {
                args.push(std::mem::take(&mut current));
                continue;
            }
            TokenKind::Dot => break,
            _ => {}
        }
        current.push(token.clone());
    }
    Err(HostParseError::new(line, "unterminated macro argument list"))
}

fn count_args(tokens: &[Token]) -> PResult<usize> {
    collect_args(tokens).map(|(args, _)| args.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> HostFile {
        HeaderReader::new().read_header(source, "test.hrl").unwrap()
    }

    #[test]
    fn defines_are_stored_raw() {
        let file = read("-define(FOO(X), X + ?BAR).\n");
        let Some(MacroDefinition::Defined { params, body }) = file.macros.get("FOO", MacroArity::Fixed(1))
        else {
            panic!("FOO/1 missing");
        };
        assert_eq!(params, &["X".to_string()]);
        assert_eq!(tokens_to_string(body), "X + ? BAR");
    }

    #[test]
    fn predefined_macros_are_seeded() {
        let file = read("");
        assert_eq!(file.macros.get("LINE", MacroArity::NoArgs), Some(&MacroDefinition::Predefined));
        assert_eq!(file.declarations.last().map(|f| &f.decl), Some(&HostDeclaration::Eof));
    }

    #[test]
    fn later_define_shadows_earlier() {
        let file = read("-define(A, 1).\n-define(A, 2).\n");
        assert_eq!(file.macros.entries("A").len(), 1);
        let Some(MacroDefinition::Defined { body, .. }) = file.macros.get("A", MacroArity::NoArgs) else {
            panic!("A missing");
        };
        assert_eq!(tokens_to_string(body), "2");
    }

    #[test]
    fn undef_marks_absent() {
        let file = read("-define(A, 1).\n-define(A(X), X).\n-undef(A).\n");
        assert_eq!(
            file.macros.entries("A"),
            &[(MacroArity::NoArgs, MacroDefinition::Absent)]
        );
    }

    #[test]
    fn expands_uses_in_declarations() {
        let file = read("-define(DEFAULT, 7).\n-define(SQ(X), X * X).\n-record(r, {a = ?DEFAULT, b = ?SQ(2)}).\n");
        let HostDeclaration::Record { fields, .. } = &file.declarations[0].decl else {
            panic!("expected a record");
        };
        assert_eq!(fields[0].default, Some(super::super::HostExpr::Integer(7)));
        assert!(fields[1].default.is_some());
    }

    #[test]
    fn undefined_macro_is_a_parse_error_and_reading_continues() {
        let file = read("-record(r, {a = ?NOPE}).\n-export([f/0]).\n");
        assert!(matches!(file.declarations[0].decl, HostDeclaration::ParseError(_)));
        assert_eq!(
            file.declarations[1].decl,
            HostDeclaration::Export(vec![("f".to_string(), 0)])
        );
    }

    #[test]
    fn conditional_directives_are_dropped() {
        let file = read("-ifdef(X).\n-export([f/0]).\n-endif.\n");
        let decls: Vec<&HostDeclaration> = file.declarations.iter().map(|f| &f.decl).collect();
        assert_eq!(
            decls,
            vec![
                &HostDeclaration::Warning("ignored preprocessor directive -ifdef".to_string()),
                &HostDeclaration::Export(vec![("f".to_string(), 0)]),
                &HostDeclaration::Warning("ignored preprocessor directive -endif".to_string()),
                &HostDeclaration::Eof,
            ]
        );
    }

    #[test]
    fn doubling_expansion_is_capped() {
        let mut source = String::from("-define(M0, x).\n");
        for level in 1..=20 {
            source.push_str(&format!("-define(M{}, ?M{} ?M{}).\n", level, level - 1, level - 1));
        }
        source.push_str("-attr(?M20).\n");
        let file = read(&source);
        let HostDeclaration::ParseError(error) = &file.declarations[0].decl else {
            panic!("expected the expansion to be refused");
        };
        assert_eq!(error.message, "macro expansion too large");
    }

    #[test]
    fn unsupported_function_is_kept_by_name() {
        let file = read("-record(r, {a}).\nf(X) -> receive X -> ok end.\n-define(ONE, 1).\n");
        assert!(matches!(file.declarations[0].decl, HostDeclaration::Record { .. }));
        assert!(matches!(
            &file.declarations[1].decl,
            HostDeclaration::Unsupported { name, arity: 1, .. } if name == "f"
        ));
        assert!(file.macros.get("ONE", MacroArity::NoArgs).is_some());
    }

    #[test]
    fn legacy_record_types_split_typed_records() {
        let file = HeaderReader::new()
            .with_legacy_record_types(true)
            .read_header("-record(r, {a :: integer()}).\n", "t.hrl")
            .unwrap();
        assert!(matches!(file.declarations[0].decl, HostDeclaration::Record { .. }));
        assert!(matches!(file.declarations[1].decl, HostDeclaration::RecordType { .. }));
    }

    #[test]
    fn stringify_argument_in_use() {
        let file = read("-define(S(X), ??X).\n-attr(?S(a + b)).\n");
        assert_eq!(
            file.declarations[0].decl,
            HostDeclaration::Attribute {
                name: "attr".to_string(),
                value: super::super::HostExpr::String("a + b".to_string()),
            }
        );
    }
}
