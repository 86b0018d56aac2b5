//! HostLang Parser
//!
//! Recursive descent over `Token`s. Covers expressions, patterns, guards,
//! types and declarations. The macro translator reaches the grammar only
//! through `parse_expr_tokens`.

use super::token::{Token, TokenKind};
use super::{
    BinElement, Clause, DeclKind, FunType, HostDeclaration, HostExpr, MapField, MapFieldType,
    Qualifier, RecordField, TypeExpr,
};
use crate::errors::HostParseError;

type PResult<T> = Result<T, HostParseError>;

const COMPARISON_OPS: &[&str] = &["==", "/=", "=<", "<", ">=", ">", "=:=", "=/="];
const ADD_PUNCT: &[&str] = &["+", "-"];
const ADD_KEYWORDS: &[&str] = &["bor", "bxor", "bsl", "bsr", "or", "xor"];
const MUL_PUNCT: &[&str] = &["*", "/"];
const MUL_KEYWORDS: &[&str] = &["div", "rem", "band", "and"];

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses exactly one expression from a token sequence terminated by an end
/// marker.
pub fn parse_expr_tokens(tokens: &[Token]) -> PResult<HostExpr> {
    let mut parser = Parser::new(tokens);
    let mut exprs = parser.exprs()?;
    parser.expect_dot()?;
    if exprs.len() != 1 {
        return Err(parser.error(format!("expected a single expression, found {}", exprs.len())));
    }
    Ok(exprs.remove(0))
}

/// Parses one declaration (everything up to and including its end marker).
/// `-define`/`-undef` and other preprocessor directives are handled by the
/// header reader before this is called.
///
/// A declaration whose head is recognisable but whose body is not comes back
/// as `HostDeclaration::Unsupported`. Only a declaration with no usable head
/// is an error.
pub fn parse_declaration(tokens: &[Token]) -> PResult<HostDeclaration> {
    let mut parser = Parser::new(tokens);
    let parsed = if parser.eat_punct("-") {
        parser.attribute()
    } else {
        parser.function()
    };
    let error = match parsed.and_then(|decl| parser.expect_dot().map(|()| decl)) {
        Ok(decl) => return Ok(decl),
        Err(error) => error,
    };
    match declaration_head(tokens) {
        Some((kind, name, arity)) => Ok(HostDeclaration::Unsupported {
            kind,
            name,
            arity,
            reason: error.to_string(),
        }),
        None => Err(error),
    }
}

/// Kind, name and arity read from the first few tokens of a declaration.
/// Export and import lists have no body worth skipping, so they never match.
fn declaration_head(tokens: &[Token]) -> Option<(DeclKind, String, usize)> {
    let name_at = |i: usize| match tokens.get(i).map(|t| &t.kind) {
        Some(TokenKind::Atom(name)) => Some(name.clone()),
        _ => None,
    };

    if !tokens.first()?.is_punct("-") {
        let name = name_at(0)?;
        return Some((DeclKind::Function, name, count_args(&tokens[1..])?));
    }

    let attribute = match tokens.get(1).map(|t| &t.kind) {
        Some(TokenKind::Atom(name)) => name.as_str(),
        Some(TokenKind::Keyword(k)) => *k,
        _ => return None,
    };
    // `-type(t() :: ...)` and `-record(r, ...)` keep the name after a paren.
    let mut at = 2 + usize::from(tokens.get(2).is_some_and(|t| t.is_punct("(")));
    match attribute {
        "export" | "import" => None,
        "record" => Some((DeclKind::Record, name_at(at)?, 0)),
        "type" => Some((DeclKind::Type, name_at(at)?, 0)),
        "opaque" => Some((DeclKind::Opaque, name_at(at)?, 0)),
        "spec" => {
            if tokens.get(at + 1).is_some_and(|t| t.is_punct(":")) {
                at += 2;
            }
            let name = name_at(at)?;
            Some((DeclKind::Spec, name, count_args(&tokens[at + 1..])?))
        }
        other => Some((DeclKind::Attribute, other.to_string(), 0)),
    }
}

/// Number of top-level arguments in a parenthesised list at the start of
/// `tokens`.
fn count_args(tokens: &[Token]) -> Option<usize> {
    if !tokens.first()?.is_punct("(") {
        return None;
    }
    let mut depth = 0usize;
    let mut commas = 0;
    for (i, token) in tokens.iter().enumerate().skip(1) {
        match &token.kind {
            TokenKind::Punct("(" | "[" | "{" | "<<") => depth += 1,
            TokenKind::Punct(")") if depth == 0 => return Some(if i == 1 { 0 } else { commas + 1 }),
            TokenKind::Punct(")" | "]" | "}" | ">>") => depth = depth.saturating_sub(1),
            TokenKind::Punct(",") if depth == 0 => commas += 1,
            TokenKind::Dot => return None,
            _ => {}
        }
    }
    None
}

// ============================================================================
// PARSER STATE
// ============================================================================

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'t TokenKind> {
        let kind = self.peek();
        if kind.is_some() {
            self.pos += 1;
        }
        kind
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line)
    }

    fn error(&self, message: impl Into<String>) -> HostParseError {
        HostParseError::new(self.line(), message)
    }

    fn unexpected(&self, expected: &str) -> HostParseError {
        match self.peek() {
            Some(kind) => self.error(format!("expected {}, found '{}'", expected, kind)),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Punct(q)) if *q == p)
    }

    fn at_keyword(&self, k: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Keyword(q)) if *q == k)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_keyword(&mut self, k: &str) -> bool {
        if self.at_keyword(k) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_punct_in(&mut self, set: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(TokenKind::Punct(p)) if set.contains(p) => {
                self.pos += 1;
                Some(*p)
            }
            _ => None,
        }
    }

    fn eat_keyword_in(&mut self, set: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(TokenKind::Keyword(k)) if set.contains(k) => {
                self.pos += 1;
                Some(*k)
            }
            _ => None,
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", p)))
    }

    fn expect_keyword(&mut self, k: &str) -> PResult<()> {
        if self.eat_keyword(k) {
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", k)))
    }

    fn expect_dot(&mut self) -> PResult<()> {
        match self.peek() {
            Some(TokenKind::Dot) => {
                self.pos += 1;
                if self.at_end() {
                    Ok(())
                } else {
                    Err(self.unexpected("end of form"))
                }
            }
            _ => Err(self.unexpected("'.'")),
        }
    }

    fn expect_atom(&mut self) -> PResult<String> {
        match self.peek() {
            Some(TokenKind::Atom(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected("an atom")),
        }
    }

    fn expect_var(&mut self) -> PResult<String> {
        match self.peek() {
            Some(TokenKind::Var(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected("a variable")),
        }
    }

    fn expect_integer(&mut self) -> PResult<i64> {
        let negative = self.eat_punct("-");
        match self.peek() {
            Some(TokenKind::Integer(n)) => {
                self.pos += 1;
                Ok(if negative { -n } else { *n })
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    /// Parses `item (sep item)*` until `close`, consuming `close`.
    fn delimited<T>(
        &mut self,
        close: &str,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        if self.eat_punct(close) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.eat_punct(",") {
                continue;
            }
            self.expect_punct(close)?;
            return Ok(items);
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

impl<'t> Parser<'t> {
    fn exprs(&mut self) -> PResult<Vec<HostExpr>> {
        let mut exprs = vec![self.expr()?];
        while self.eat_punct(",") {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> PResult<HostExpr> {
        if self.eat_keyword("catch") {
            return Ok(HostExpr::Catch(Box::new(self.expr()?)));
        }
        self.expr_match()
    }

    fn expr_match(&mut self) -> PResult<HostExpr> {
        let left = self.expr_orelse()?;
        if self.eat_punct("=") {
            let right = self.expr_match()?;
            return Ok(HostExpr::Match(Box::new(left), Box::new(right)));
        }
        if self.eat_punct("!") {
            let right = self.expr_match()?;
            return Ok(binary_op("!", left, right));
        }
        Ok(left)
    }

    fn expr_orelse(&mut self) -> PResult<HostExpr> {
        let left = self.expr_andalso()?;
        if self.eat_keyword("orelse") {
            let right = self.expr_orelse()?;
            return Ok(binary_op("orelse", left, right));
        }
        Ok(left)
    }

    fn expr_andalso(&mut self) -> PResult<HostExpr> {
        let left = self.expr_comparison()?;
        if self.eat_keyword("andalso") {
            let right = self.expr_andalso()?;
            return Ok(binary_op("andalso", left, right));
        }
        Ok(left)
    }

    fn expr_comparison(&mut self) -> PResult<HostExpr> {
        let left = self.expr_list_op()?;
        if let Some(op) = self.eat_punct_in(COMPARISON_OPS) {
            let right = self.expr_list_op()?;
            return Ok(binary_op(op, left, right));
        }
        Ok(left)
    }

    fn expr_list_op(&mut self) -> PResult<HostExpr> {
        let left = self.expr_additive()?;
        if let Some(op) = self.eat_punct_in(&["++", "--"]) {
            let right = self.expr_list_op()?;
            return Ok(binary_op(op, left, right));
        }
        Ok(left)
    }

    fn expr_additive(&mut self) -> PResult<HostExpr> {
        let mut left = self.expr_multiplicative()?;
        while let Some(op) = self
            .eat_punct_in(ADD_PUNCT)
            .or_else(|| self.eat_keyword_in(ADD_KEYWORDS))
        {
            let right = self.expr_multiplicative()?;
            left = binary_op(op, left, right);
        }
        Ok(left)
    }

    fn expr_multiplicative(&mut self) -> PResult<HostExpr> {
        let mut left = self.expr_prefix()?;
        while let Some(op) = self
            .eat_punct_in(MUL_PUNCT)
            .or_else(|| self.eat_keyword_in(MUL_KEYWORDS))
        {
            let right = self.expr_prefix()?;
            left = binary_op(op, left, right);
        }
        Ok(left)
    }

    fn expr_prefix(&mut self) -> PResult<HostExpr> {
        let Some(op) = self
            .eat_punct_in(&["+", "-"])
            .or_else(|| self.eat_keyword_in(&["not", "bnot"]))
        else {
            return self.expr_postfix();
        };
        let operand = self.expr_prefix()?;
        Ok(match (op, operand) {
            ("-", HostExpr::Integer(n)) => HostExpr::Integer(-n),
            ("-", HostExpr::Float(x)) => HostExpr::Float(-x),
            ("+", lit @ (HostExpr::Integer(_) | HostExpr::Float(_))) => lit,
            (op, operand) => HostExpr::UnaryOp {
                op: op.to_string(),
                operand: Box::new(operand),
            },
        })
    }

    /// Calls, remote calls and record/map postfix operations.
    fn expr_postfix(&mut self) -> PResult<HostExpr> {
        let mut expr = self.expr_max()?;
        loop {
            if self.eat_punct(":") {
                let fun = self.expr_max()?;
                let args = self.argument_list()?;
                expr = HostExpr::RemoteCall {
                    module: Box::new(expr),
                    fun: Box::new(fun),
                    args,
                };
            } else if self.at_punct("(") {
                let args = self.argument_list()?;
                expr = HostExpr::Call {
                    fun: Box::new(expr),
                    args,
                };
            } else if self.at_punct("#") {
                expr = self.record_or_map_postfix(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn argument_list(&mut self) -> PResult<Vec<HostExpr>> {
        self.expect_punct("(")?;
        self.delimited(")", Self::expr)
    }

    fn record_or_map_postfix(&mut self, base: HostExpr) -> PResult<HostExpr> {
        self.expect_punct("#")?;
        if self.eat_punct("{") {
            let fields = self.delimited("}", Self::map_field)?;
            return Ok(HostExpr::Map {
                base: Some(Box::new(base)),
                fields,
            });
        }
        let name = self.expect_atom()?;
        if self.eat_punct(".") {
            let field = self.expect_atom()?;
            return Ok(HostExpr::RecordField {
                expr: Box::new(base),
                name,
                field,
            });
        }
        self.expect_punct("{")?;
        let fields = self.delimited("}", Self::record_field_value)?;
        Ok(HostExpr::RecordUpdate {
            expr: Box::new(base),
            name,
            fields,
        })
    }

    fn map_field(&mut self) -> PResult<MapField> {
        let key = self.expr()?;
        let exact = match self.eat_punct_in(&["=>", ":="]) {
            Some(":=") => true,
            Some(_) => false,
            None => return Err(self.unexpected("'=>' or ':='")),
        };
        let value = self.expr()?;
        Ok(MapField { key, value, exact })
    }

    fn record_field_value(&mut self) -> PResult<(String, HostExpr)> {
        let name = match self.advance() {
            Some(TokenKind::Atom(name)) | Some(TokenKind::Var(name)) => name.clone(),
            _ => return Err(self.error("expected a record field name")),
        };
        self.expect_punct("=")?;
        Ok((name, self.expr()?))
    }

    fn expr_max(&mut self) -> PResult<HostExpr> {
        let Some(kind) = self.peek() else {
            return Err(self.unexpected("an expression"));
        };
        match kind {
            TokenKind::Atom(name) => {
                self.pos += 1;
                Ok(HostExpr::Atom(name.clone()))
            }
            TokenKind::Var(name) => {
                self.pos += 1;
                Ok(HostExpr::Var(name.clone()))
            }
            TokenKind::Integer(n) => {
                self.pos += 1;
                Ok(HostExpr::Integer(*n))
            }
            TokenKind::Float(x) => {
                self.pos += 1;
                Ok(HostExpr::Float(*x))
            }
            TokenKind::BigInteger(text) => {
                Err(self.error(format!("integer {} does not fit in 64 bits", text)))
            }
            TokenKind::Char(c) => {
                self.pos += 1;
                Ok(HostExpr::Char(*c))
            }
            TokenKind::String(_) => Ok(HostExpr::String(self.strings())),
            TokenKind::Punct("(") => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                self.list_tail_or_comprehension()
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                Ok(HostExpr::Tuple(self.delimited("}", Self::expr)?))
            }
            TokenKind::Punct("<<") => {
                self.pos += 1;
                self.binary()
            }
            TokenKind::Punct("#") => self.record_or_map_primary(),
            TokenKind::Keyword("begin") => {
                self.pos += 1;
                let body = self.exprs()?;
                self.expect_keyword("end")?;
                Ok(HostExpr::Block(body))
            }
            TokenKind::Keyword("case") => {
                self.pos += 1;
                let expr = self.expr()?;
                self.expect_keyword("of")?;
                let clauses = self.clauses(Self::case_clause)?;
                self.expect_keyword("end")?;
                Ok(HostExpr::Case {
                    expr: Box::new(expr),
                    clauses,
                })
            }
            TokenKind::Keyword("if") => {
                self.pos += 1;
                let clauses = self.clauses(Self::if_clause)?;
                self.expect_keyword("end")?;
                Ok(HostExpr::If(clauses))
            }
            TokenKind::Keyword("fun") => {
                self.pos += 1;
                self.fun_expr()
            }
            TokenKind::Keyword(k @ ("receive" | "try" | "cond" | "let")) => {
                Err(self.error(format!("unsupported expression '{}'", k)))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Adjacent string literals concatenate.
    fn strings(&mut self) -> String {
        let mut text = String::new();
        while let Some(TokenKind::String(s)) = self.peek() {
            text.push_str(s);
            self.pos += 1;
        }
        text
    }

    fn list_tail_or_comprehension(&mut self) -> PResult<HostExpr> {
        if self.eat_punct("]") {
            return Ok(HostExpr::Nil);
        }
        let head = self.expr()?;
        if self.eat_punct("||") {
            let qualifiers = self.delimited("]", Self::qualifier)?;
            return Ok(HostExpr::ListComp {
                expr: Box::new(head),
                qualifiers,
            });
        }
        let mut items = vec![head];
        while self.eat_punct(",") {
            items.push(self.expr()?);
        }
        let tail = if self.eat_punct("|") {
            self.expr()?
        } else {
            HostExpr::Nil
        };
        self.expect_punct("]")?;
        Ok(items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| HostExpr::Cons(Box::new(item), Box::new(acc))))
    }

    fn qualifier(&mut self) -> PResult<Qualifier> {
        let expr = self.expr()?;
        if self.eat_punct("<-") {
            return Ok(Qualifier::Generator(expr, self.expr()?));
        }
        if self.eat_punct("<=") {
            return Ok(Qualifier::BitGenerator(expr, self.expr()?));
        }
        Ok(Qualifier::Filter(expr))
    }

    fn binary(&mut self) -> PResult<HostExpr> {
        if self.eat_punct(">>") {
            return Ok(HostExpr::Binary(vec![]));
        }
        let mut elements = vec![self.bin_element()?];
        while self.eat_punct(",") {
            elements.push(self.bin_element()?);
        }
        self.expect_punct(">>")?;
        Ok(HostExpr::Binary(elements))
    }

    fn bin_element(&mut self) -> PResult<BinElement> {
        let value = match self.eat_punct_in(&["-", "+"]) {
            Some(op) => match (op, self.expr_max()?) {
                ("-", HostExpr::Integer(n)) => HostExpr::Integer(-n),
                ("-", HostExpr::Float(x)) => HostExpr::Float(-x),
                (op, operand) => HostExpr::UnaryOp {
                    op: op.to_string(),
                    operand: Box::new(operand),
                },
            },
            None => self.expr_max()?,
        };
        let size = if self.eat_punct(":") {
            Some(self.expr_max()?)
        } else {
            None
        };
        let mut specs = Vec::new();
        if self.eat_punct("/") {
            loop {
                let name = self.expect_atom()?;
                let unit = if self.eat_punct(":") {
                    Some(self.expect_integer()?)
                } else {
                    None
                };
                specs.push((name, unit));
                if !self.eat_punct("-") {
                    break;
                }
            }
        }
        Ok(BinElement { value, size, specs })
    }

    fn record_or_map_primary(&mut self) -> PResult<HostExpr> {
        self.expect_punct("#")?;
        if self.eat_punct("{") {
            let fields = self.delimited("}", Self::map_field)?;
            return Ok(HostExpr::Map { base: None, fields });
        }
        let name = self.expect_atom()?;
        if self.eat_punct(".") {
            let field = self.expect_atom()?;
            return Ok(HostExpr::RecordIndex { name, field });
        }
        self.expect_punct("{")?;
        let fields = self.delimited("}", Self::record_field_value)?;
        Ok(HostExpr::RecordNew { name, fields })
    }

    fn fun_expr(&mut self) -> PResult<HostExpr> {
        match (self.peek(), self.peek_at(1)) {
            (Some(TokenKind::Atom(name)), Some(TokenKind::Punct("/"))) => {
                let name = name.clone();
                self.pos += 2;
                let arity = self.arity()?;
                Ok(HostExpr::FunRef {
                    module: None,
                    name,
                    arity,
                })
            }
            (Some(TokenKind::Atom(module)), Some(TokenKind::Punct(":"))) => {
                let module = module.clone();
                self.pos += 2;
                let name = self.expect_atom()?;
                self.expect_punct("/")?;
                let arity = self.arity()?;
                Ok(HostExpr::FunRef {
                    module: Some(module),
                    name,
                    arity,
                })
            }
            (Some(TokenKind::Punct("(")), _) => {
                let clauses = self.clauses(Self::fun_clause)?;
                self.expect_keyword("end")?;
                Ok(HostExpr::Fun(clauses))
            }
            _ => Err(self.error("unsupported fun expression")),
        }
    }

    fn arity(&mut self) -> PResult<usize> {
        let n = self.expect_integer()?;
        usize::try_from(n).map_err(|_| self.error(format!("bad arity {}", n)))
    }
}

// ============================================================================
// CLAUSES AND GUARDS
// ============================================================================

impl<'t> Parser<'t> {
    fn clauses(&mut self, mut clause: impl FnMut(&mut Self) -> PResult<Clause>) -> PResult<Vec<Clause>> {
        let mut clauses = vec![clause(self)?];
        while self.eat_punct(";") {
            clauses.push(clause(self)?);
        }
        Ok(clauses)
    }

    fn case_clause(&mut self) -> PResult<Clause> {
        let pattern = self.expr()?;
        self.clause_rest(vec![pattern])
    }

    fn fun_clause(&mut self) -> PResult<Clause> {
        let patterns = self.argument_list()?;
        self.clause_rest(patterns)
    }

    fn if_clause(&mut self) -> PResult<Clause> {
        let guards = self.guard_sequence()?;
        self.expect_punct("->")?;
        let body = self.exprs()?;
        Ok(Clause {
            patterns: vec![],
            guards,
            body,
        })
    }

    fn clause_rest(&mut self, patterns: Vec<HostExpr>) -> PResult<Clause> {
        let guards = if self.eat_keyword("when") {
            self.guard_sequence()?
        } else {
            vec![]
        };
        self.expect_punct("->")?;
        let body = self.exprs()?;
        Ok(Clause {
            patterns,
            guards,
            body,
        })
    }

    fn guard_sequence(&mut self) -> PResult<Vec<Vec<HostExpr>>> {
        let mut alternatives = vec![self.exprs()?];
        while self.eat_punct(";") {
            alternatives.push(self.exprs()?);
        }
        Ok(alternatives)
    }
}

// ============================================================================
// TYPES
// ============================================================================

impl<'t> Parser<'t> {
    fn type_expr(&mut self) -> PResult<TypeExpr> {
        let mut alternatives = vec![self.type_annotated()?];
        while self.eat_punct("|") {
            alternatives.push(self.type_annotated()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            TypeExpr::Union(alternatives)
        })
    }

    fn type_annotated(&mut self) -> PResult<TypeExpr> {
        if let (Some(TokenKind::Var(name)), Some(TokenKind::Punct("::"))) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.pos += 2;
            let ty = self.type_expr()?;
            return Ok(TypeExpr::Annotated(name, Box::new(ty)));
        }
        let low = self.type_primary()?;
        if self.eat_punct("..") {
            let high = self.type_primary()?;
            return Ok(TypeExpr::Range(Box::new(low), Box::new(high)));
        }
        Ok(low)
    }

    fn type_primary(&mut self) -> PResult<TypeExpr> {
        let Some(kind) = self.peek() else {
            return Err(self.unexpected("a type"));
        };
        match kind {
            TokenKind::Var(name) => {
                self.pos += 1;
                Ok(TypeExpr::Var(name.clone()))
            }
            TokenKind::Integer(_) | TokenKind::Punct("-") => Ok(TypeExpr::Integer(self.expect_integer()?)),
            TokenKind::Char(c) => {
                self.pos += 1;
                Ok(TypeExpr::Integer(*c as i64))
            }
            TokenKind::Atom(name) => {
                let name = name.clone();
                self.pos += 1;
                if self.at_punct("(") {
                    let args = self.type_args()?;
                    return Ok(TypeExpr::Named {
                        module: None,
                        name,
                        args,
                    });
                }
                if self.eat_punct(":") {
                    let remote = self.expect_atom()?;
                    let args = self.type_args()?;
                    return Ok(TypeExpr::Named {
                        module: Some(name),
                        name: remote,
                        args,
                    });
                }
                Ok(TypeExpr::Atom(name))
            }
            TokenKind::Punct("(") => {
                self.pos += 1;
                let ty = self.type_expr()?;
                self.expect_punct(")")?;
                Ok(ty)
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                if self.eat_punct("]") {
                    return Ok(TypeExpr::Nil);
                }
                let elem = self.type_expr()?;
                if self.eat_punct(",") {
                    self.expect_punct("...")?;
                    self.expect_punct("]")?;
                    return Ok(TypeExpr::NonEmptyList(Box::new(elem)));
                }
                self.expect_punct("]")?;
                Ok(TypeExpr::List(Box::new(elem)))
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                Ok(TypeExpr::Tuple(self.delimited("}", Self::type_expr)?))
            }
            TokenKind::Punct("#") => {
                self.pos += 1;
                if self.eat_punct("{") {
                    return Ok(TypeExpr::Map(self.delimited("}", Self::map_field_type)?));
                }
                let name = self.expect_atom()?;
                self.expect_punct("{")?;
                let fields = self.delimited("}", |p| {
                    let field = p.expect_atom()?;
                    p.expect_punct("::")?;
                    Ok((field, p.type_expr()?))
                })?;
                Ok(TypeExpr::Record { name, fields })
            }
            TokenKind::Keyword("fun") => {
                self.pos += 1;
                self.fun_type()
            }
            TokenKind::Punct("<<") => {
                self.pos += 1;
                self.bitstring_type()
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    fn type_args(&mut self) -> PResult<Vec<TypeExpr>> {
        self.expect_punct("(")?;
        self.delimited(")", Self::type_expr)
    }

    fn map_field_type(&mut self) -> PResult<MapFieldType> {
        let key = self.type_expr()?;
        let exact = match self.eat_punct_in(&["=>", ":="]) {
            Some(":=") => true,
            Some(_) => false,
            None => return Err(self.unexpected("'=>' or ':='")),
        };
        let value = self.type_expr()?;
        Ok(MapFieldType { key, value, exact })
    }

    fn fun_type(&mut self) -> PResult<TypeExpr> {
        self.expect_punct("(")?;
        if self.eat_punct(")") {
            return Ok(TypeExpr::AnyFun);
        }
        self.expect_punct("(")?;
        let args = if self.eat_punct("...") {
            self.expect_punct(")")?;
            None
        } else {
            Some(self.delimited(")", Self::type_expr)?)
        };
        self.expect_punct("->")?;
        let ret = self.type_expr()?;
        self.expect_punct(")")?;
        Ok(TypeExpr::Fun {
            args,
            ret: Box::new(ret),
        })
    }

    /// `<<>>`, `<<_:M>>`, `<<_:_*N>>` or `<<_:M, _:_*N>>`.
    fn bitstring_type(&mut self) -> PResult<TypeExpr> {
        let (mut base, mut unit) = (0, 0);
        if self.eat_punct(">>") {
            return Ok(TypeExpr::Bitstring { base, unit });
        }
        loop {
            self.expect_var()?;
            self.expect_punct(":")?;
            if matches!(self.peek(), Some(TokenKind::Var(_))) {
                self.pos += 1;
                self.expect_punct("*")?;
                unit = self.expect_integer()?;
            } else {
                base = self.expect_integer()?;
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(">>")?;
        Ok(TypeExpr::Bitstring { base, unit })
    }

    fn fun_signature(&mut self) -> PResult<FunType> {
        self.expect_punct("(")?;
        let args = self.delimited(")", Self::type_expr)?;
        self.expect_punct("->")?;
        let ret = self.type_expr()?;
        let mut constraints = Vec::new();
        if self.eat_keyword("when") {
            loop {
                constraints.push(self.constraint()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        Ok(FunType {
            args,
            ret,
            constraints,
        })
    }

    fn constraint(&mut self) -> PResult<(String, TypeExpr)> {
        if let Some(TokenKind::Atom(name)) = self.peek() {
            if name == "is_subtype" {
                self.pos += 1;
                self.expect_punct("(")?;
                let var = self.expect_var()?;
                self.expect_punct(",")?;
                let ty = self.type_expr()?;
                self.expect_punct(")")?;
                return Ok((var, ty));
            }
        }
        let var = self.expect_var()?;
        self.expect_punct("::")?;
        Ok((var, self.type_expr()?))
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

impl<'t> Parser<'t> {
    fn attribute(&mut self) -> PResult<HostDeclaration> {
        let name = match self.advance() {
            Some(TokenKind::Atom(name)) => name.clone(),
            Some(TokenKind::Keyword(k)) => k.to_string(),
            _ => return Err(self.error("expected an attribute name")),
        };
        let wrapped = matches!(name.as_str(), "spec" | "type" | "opaque") && self.at_punct("(")
            && !matches!(self.peek_at(1), Some(TokenKind::Punct(")")));
        if wrapped {
            self.pos += 1;
        }
        let decl = match name.as_str() {
            "record" => self.record_decl()?,
            "type" => {
                let (name, params, def) = self.type_decl()?;
                HostDeclaration::Type { name, params, def }
            }
            "opaque" => {
                let (name, params, def) = self.type_decl()?;
                HostDeclaration::Opaque { name, params, def }
            }
            "spec" => self.spec_decl()?,
            "export" => {
                self.expect_punct("(")?;
                let funs = self.fun_arity_list()?;
                self.expect_punct(")")?;
                HostDeclaration::Export(funs)
            }
            "import" => {
                self.expect_punct("(")?;
                let module = self.expect_atom()?;
                self.expect_punct(",")?;
                let funs = self.fun_arity_list()?;
                self.expect_punct(")")?;
                HostDeclaration::Import { module, funs }
            }
            _ => {
                let value = if self.eat_punct("(") {
                    let value = self.expr()?;
                    self.expect_punct(")")?;
                    value
                } else {
                    self.expr()?
                };
                HostDeclaration::Attribute { name, value }
            }
        };
        if wrapped {
            self.expect_punct(")")?;
        }
        Ok(decl)
    }

    fn record_decl(&mut self) -> PResult<HostDeclaration> {
        self.expect_punct("(")?;
        let name = self.expect_atom()?;
        self.expect_punct(",")?;
        self.expect_punct("{")?;
        let fields = self.delimited("}", |p| {
            let name = p.expect_atom()?;
            let default = if p.eat_punct("=") { Some(p.expr()?) } else { None };
            let ty = if p.eat_punct("::") { Some(p.type_expr()?) } else { None };
            Ok(RecordField { name, default, ty })
        })?;
        self.expect_punct(")")?;
        Ok(HostDeclaration::Record { name, fields })
    }

    fn type_decl(&mut self) -> PResult<(String, Vec<String>, TypeExpr)> {
        let name = self.expect_atom()?;
        self.expect_punct("(")?;
        let params = self.delimited(")", Self::expect_var)?;
        self.expect_punct("::")?;
        let def = self.type_expr()?;
        Ok((name, params, def))
    }

    fn spec_decl(&mut self) -> PResult<HostDeclaration> {
        let mut name = self.expect_atom()?;
        if self.eat_punct(":") {
            name = self.expect_atom()?;
        }
        let mut clauses = vec![self.fun_signature()?];
        while self.eat_punct(";") {
            clauses.push(self.fun_signature()?);
        }
        let arity = clauses[0].args.len();
        if clauses.iter().any(|c| c.args.len() != arity) {
            return Err(self.error(format!("spec for {} mixes arities", name)));
        }
        Ok(HostDeclaration::Spec {
            name,
            arity,
            clauses,
        })
    }

    fn fun_arity_list(&mut self) -> PResult<Vec<(String, usize)>> {
        self.expect_punct("[")?;
        self.delimited("]", |p| {
            let name = p.expect_atom()?;
            p.expect_punct("/")?;
            Ok((name, p.arity()?))
        })
    }

    fn function(&mut self) -> PResult<HostDeclaration> {
        let name = match self.peek() {
            Some(TokenKind::Atom(name)) => name.clone(),
            _ => return Err(self.unexpected("a function or attribute")),
        };
        let mut clauses = Vec::new();
        loop {
            let clause_name = self.expect_atom()?;
            if clause_name != name {
                return Err(self.error(format!(
                    "head mismatch: clause for {} inside {}",
                    clause_name, name
                )));
            }
            clauses.push(self.fun_clause()?);
            if !self.eat_punct(";") {
                break;
            }
        }
        let arity = clauses[0].patterns.len();
        if clauses.iter().any(|c| c.patterns.len() != arity) {
            return Err(self.error(format!("clauses of {} differ in arity", name)));
        }
        Ok(HostDeclaration::Function {
            name,
            arity,
            clauses,
        })
    }
}

fn binary_op(op: &str, left: HostExpr, right: HostExpr) -> HostExpr {
    HostExpr::BinaryOp {
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}
