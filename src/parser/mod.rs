pub mod ast;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::lexer::lex;
use crate::lexer::token::Token;
use crate::registry::{FieldEntry, MethodBody, MethodEntry, ParamEntry, Registry, Ty, TypeKind, ENTRY_POINT};
use crate::span::{SourceMap, Span, Spanned};
use ast::*;

/// Token stream of one source file and the directory its includes are
/// resolved against.
struct Cursor {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    dir: PathBuf,
    eof: Spanned<Token>,
}

impl Cursor {
    fn new(tokens: Vec<Spanned<Token>>, dir: PathBuf) -> Self {
        let eof_span = tokens.last().map(|t| t.span).unwrap_or_else(Span::dummy);
        Self { tokens, pos: 0, dir, eof: Spanned::new(Token::Eof, eof_span) }
    }

    fn at(&self, i: usize) -> &Spanned<Token> {
        self.tokens.get(i).unwrap_or(&self.eof)
    }
}

/// Recursive-descent parser. Declarations are entered into the registry as
/// soon as their header is read, so later code (and the declaration's own
/// body) can refer to them.
pub struct Parser<'a> {
    registry: &'a mut Registry,
    sources: &'a mut SourceMap,
    include_dirs: Vec<PathBuf>,
    current: Cursor,
    included: HashSet<PathBuf>,
    next_node: NodeId,
    loop_depth: u32,
    /// Greater than zero inside `()`, `[]` and literal `{}`: newlines are
    /// insignificant there.
    loose: u32,
}

fn binary_op(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::Or | Token::PipePipe => BinOp::Or,
        Token::And | Token::AmpAmp => BinOp::And,
        Token::EqEq => BinOp::Eq,
        Token::BangEq => BinOp::Neq,
        Token::Lt => BinOp::Lt,
        Token::LtEq => BinOp::LtEq,
        Token::Gt => BinOp::Gt,
        Token::GtEq => BinOp::GtEq,
        Token::In => BinOp::In,
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Percent => BinOp::Mod,
        Token::StarStar => BinOp::Pow,
        Token::Amp => BinOp::BitAnd,
        Token::Pipe => BinOp::BitOr,
        Token::Caret => BinOp::BitXor,
        Token::Shl => BinOp::Shl,
        Token::Shr => BinOp::Shr,
        _ => return None,
    })
}

fn compound_op(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::PlusEq => BinOp::Add,
        Token::MinusEq => BinOp::Sub,
        Token::StarEq => BinOp::Mul,
        Token::SlashEq => BinOp::Div,
        Token::PercentEq => BinOp::Mod,
        Token::StarStarEq => BinOp::Pow,
        Token::AmpEq => BinOp::BitAnd,
        Token::PipeEq => BinOp::BitOr,
        Token::CaretEq => BinOp::BitXor,
        Token::ShlEq => BinOp::Shl,
        Token::ShrEq => BinOp::Shr,
        _ => return None,
    })
}

/// Binding powers, loosest first. `**` is right-associative.
fn infix_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or | BinOp::And => (1, 2),
        BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq | BinOp::In => (3, 4),
        BinOp::Add | BinOp::Sub => (5, 6),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (7, 8),
        BinOp::Pow => (9, 9),
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => (11, 12),
    }
}

const RANGE_BP: (u8, u8) = (13, 14);
/// Operand binding power of prefix `+ - ! not`: binds looser than `*`.
const PREFIX_BP: u8 = 7;

impl<'a> Parser<'a> {
    pub fn new(registry: &'a mut Registry, sources: &'a mut SourceMap, include_dirs: Vec<PathBuf>) -> Self {
        Self {
            registry,
            sources,
            include_dirs,
            current: Cursor::new(Vec::new(), PathBuf::from(".")),
            included: HashSet::new(),
            next_node: 0,
            loop_depth: 0,
            loose: 0,
        }
    }

    /// Parse an entry file from disk. Its includes resolve relative to it.
    pub fn parse_file(&mut self, path: &Path) -> Result<Program, CompileError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| CompileError::io(format!("could not read source: {e}"), path))?;
        let canonical = std::fs::canonicalize(path)
            .map_err(|e| CompileError::io(format!("could not resolve path: {e}"), path))?;
        self.included.insert(canonical);
        self.parse_str(path, &source)
    }

    /// Parse source text registered under `name`.
    pub fn parse_str(&mut self, name: &Path, source: &str) -> Result<Program, CompileError> {
        let file_id = self.sources.add(name, source);
        let tokens = lex(source, file_id)?;
        let dir = name.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        self.current = Cursor::new(tokens, dir);
        let mut program = Program::default();
        self.parse_items(&mut program)?;
        Ok(program)
    }

    // ---- token access ----

    fn peek_raw(&self) -> &Spanned<Token> {
        self.current.at(self.current.pos)
    }

    fn peek(&self) -> &Spanned<Token> {
        let mut i = self.current.pos;
        while matches!(self.current.at(i).node, Token::Newline) {
            i += 1;
        }
        self.current.at(i)
    }

    /// Next token where a binary or postfix operator may appear.
    fn peek_op(&self) -> &Spanned<Token> {
        if self.loose > 0 { self.peek() } else { self.peek_raw() }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_raw().node, Token::Newline) {
            self.current.pos += 1;
        }
    }

    fn advance(&mut self) -> Spanned<Token> {
        self.skip_newlines();
        let tok = self.peek_raw().clone();
        if self.current.pos < self.current.tokens.len() {
            self.current.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Token) -> bool {
        std::mem::discriminant(&self.peek().node) == std::mem::discriminant(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Spanned<Token>, CompileError> {
        if self.check(expected) {
            return Ok(self.advance());
        }
        let found = self.peek();
        Err(CompileError::syntax(format!("expected {expected}, found {}", found.node), found.span))
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, CompileError> {
        let tok = self.peek();
        match &tok.node {
            Token::Ident(name) => {
                let ident = Spanned::new(name.clone(), tok.span);
                self.advance();
                Ok(ident)
            }
            other => Err(CompileError::syntax(format!("expected identifier, found {other}"), tok.span)),
        }
    }

    /// A statement ends at a newline, a closing brace or the end of file.
    fn end_statement(&mut self) -> Result<(), CompileError> {
        if matches!(self.peek_raw().node, Token::Newline) {
            self.skip_newlines();
            return Ok(());
        }
        let tok = self.peek_raw();
        if matches!(tok.node, Token::RBrace | Token::Eof) {
            return Ok(());
        }
        Err(CompileError::syntax(format!("expected end of statement, found {}", tok.node), tok.span))
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek_raw().node, Token::Newline | Token::RBrace | Token::Eof)
    }

    /// Run `f`; on failure rewind to where it started and return `None`.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, CompileError>) -> Option<T> {
        let pos = self.current.pos;
        let next_node = self.next_node;
        match f(self) {
            Ok(v) => Some(v),
            Err(_) => {
                self.current.pos = pos;
                self.next_node = next_node;
                None
            }
        }
    }

    fn node(&mut self, kind: ExprKind, span: Span) -> Spanned<Expr> {
        let id = self.next_node;
        self.next_node += 1;
        Spanned::new(Expr { id, kind }, span)
    }

    // ---- top level ----

    fn parse_items(&mut self, program: &mut Program) -> Result<(), CompileError> {
        loop {
            self.skip_newlines();
            match self.peek().node {
                Token::Eof => return Ok(()),
                Token::Use => {
                    let kw = self.advance();
                    let name = self.expect_ident()?;
                    let span = kw.span.to(name.span);
                    program.uses.push(Spanned::new(name.node, span));
                    self.end_statement()?;
                }
                Token::Include => self.parse_include(program)?,
                Token::Type | Token::Autoconstruct => {
                    let decl = self.parse_type_decl()?;
                    program.types.push(decl);
                }
                Token::Enum => {
                    let decl = self.parse_enum_decl()?;
                    program.enums.push(decl);
                }
                _ => {
                    if let Some((ret, name)) = self.attempt(Self::parse_method_header) {
                        let func = self.parse_function(ret, name)?;
                        program.functions.push(func);
                    } else {
                        let stmt = self.parse_stmt()?;
                        program.main.push(stmt);
                    }
                }
            }
        }
    }

    fn resolve_include(&self, rel: &str, span: Span) -> Result<PathBuf, CompileError> {
        std::iter::once(&self.current.dir)
            .chain(self.include_dirs.iter())
            .map(|dir| dir.join(rel))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| CompileError::semantic(format!("cannot find included file '{rel}'"), span))
    }

    fn parse_include(&mut self, program: &mut Program) -> Result<(), CompileError> {
        let kw = self.advance();
        let tok = self.advance();
        let rel = match tok.node {
            Token::StringLit(rel) => rel,
            other => {
                return Err(CompileError::syntax(format!("expected file name after 'include', found {other}"), tok.span));
            }
        };
        let span = kw.span.to(tok.span);
        let path = self.resolve_include(&rel, span)?;
        let canonical = std::fs::canonicalize(&path)
            .map_err(|e| CompileError::io(format!("could not resolve path: {e}"), &path))?;
        if !self.included.insert(canonical) {
            return Err(CompileError::semantic(format!("file '{rel}' is already included"), span));
        }
        let source = std::fs::read_to_string(&path)
            .map_err(|e| CompileError::io(format!("could not read source: {e}"), &path))?;
        debug!(path = %path.display(), "including file");

        let file_id = self.sources.add(path.clone(), source.as_str());
        let tokens = lex(&source, file_id)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let outer = std::mem::replace(&mut self.current, Cursor::new(tokens, dir));
        let result = self.parse_items(program);
        self.current = outer;
        result?;

        program.includes.push(Spanned::new(rel, span));
        self.end_statement()
    }

    // ---- declarations ----

    fn parse_type(&mut self) -> Result<Spanned<Ty>, CompileError> {
        let mut ty = self.parse_base_type()?;
        while matches!(self.peek_raw().node, Token::LBracket)
            && matches!(self.current.at(self.current.pos + 1).node, Token::RBracket)
        {
            self.current.pos += 1;
            let close = self.advance();
            ty = Spanned::new(Ty::array_of(ty.node), ty.span.to(close.span));
        }
        Ok(ty)
    }

    /// A type name or `{K:V}`, without array suffixes.
    fn parse_base_type(&mut self) -> Result<Spanned<Ty>, CompileError> {
        let tok = self.peek().clone();
        match tok.node {
            Token::Ident(name) => {
                self.advance();
                Ok(Spanned::new(Ty::from_name(&name), tok.span))
            }
            Token::LBrace => {
                self.advance();
                let key = self.parse_type()?;
                self.expect(&Token::Colon)?;
                let value = self.parse_type()?;
                let close = self.expect(&Token::RBrace)?;
                Ok(Spanned::new(Ty::dict_of(key.node, value.node), tok.span.to(close.span)))
            }
            other => Err(CompileError::syntax(format!("expected type, found {other}"), tok.span)),
        }
    }

    /// `TYPE name (` with the parenthesis left unconsumed.
    fn parse_method_header(&mut self) -> Result<(Spanned<Ty>, Spanned<String>), CompileError> {
        let ret = self.parse_type()?;
        let name = self.expect_ident()?;
        let tok = self.peek_raw();
        if !matches!(tok.node, Token::LParen) {
            return Err(CompileError::syntax(format!("expected '(', found {}", tok.node), tok.span));
        }
        Ok((ret, name))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(&Token::LParen)?;
        self.loose += 1;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            if !params.is_empty() {
                self.expect(&Token::Comma)?;
            }
            let ty = self.parse_type()?;
            let name = self.expect_ident()?;
            params.push(Param { name, ty });
        }
        self.loose -= 1;
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    /// Method body with a fresh loop counter.
    fn parse_body(&mut self) -> Result<Spanned<Block>, CompileError> {
        let saved = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_block();
        self.loop_depth = saved;
        body
    }

    fn method_entry(decl: &MethodDecl) -> MethodEntry {
        let params = decl
            .params
            .iter()
            .map(|p| ParamEntry { name: p.name.node.clone(), ty: p.ty.node.clone() })
            .collect();
        let body = MethodBody::User(Rc::clone(&decl.body));
        let mut entry = if decl.is_ctor {
            MethodEntry::constructor(params, body)
        } else {
            MethodEntry::new(decl.name.node.clone(), params, decl.ret.node.clone(), body)
        };
        entry.is_static = decl.is_static;
        entry.is_private = decl.is_private;
        entry.is_virtual = !decl.is_static && !decl.is_ctor;
        entry.span = Some(decl.name.span);
        entry
    }

    /// Top-level function: a static method of the program type.
    fn parse_function(&mut self, ret: Spanned<Ty>, name: Spanned<String>) -> Result<Spanned<MethodDecl>, CompileError> {
        let params = self.parse_params()?;
        if name.node == ENTRY_POINT && params.is_empty() {
            return Err(CompileError::semantic(
                format!("'{ENTRY_POINT}()' is reserved for the program entry point"),
                name.span,
            ));
        }
        let body = self.parse_body()?;
        let span = ret.span.to(body.span);
        let decl = MethodDecl {
            name,
            params,
            ret,
            is_static: true,
            is_private: false,
            is_ctor: false,
            body: Rc::new(body),
        };
        let program = self.registry.program_type();
        self.registry
            .add_method(program, Self::method_entry(&decl))
            .map_err(|e| e.with_span_if_missing(decl.name.span))?;
        Ok(Spanned::new(decl, span))
    }

    fn parse_type_decl(&mut self) -> Result<Spanned<TypeDecl>, CompileError> {
        let start = self.peek().span;
        let autoconstruct = self.eat(&Token::Autoconstruct);
        self.expect(&Token::Type)?;
        let name = self.expect_ident()?;
        let parent = if self.eat(&Token::Colon) { Some(self.expect_ident()?) } else { None };

        let id = self.registry.declare_type(
            &name.node,
            parent.as_ref().map(|p| p.node.as_str()),
            TypeKind::User,
            Some(name.span),
        )?;
        self.registry.set_autoconstruct(id, autoconstruct);

        self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::RBrace) {
                break;
            }
            let member_start = self.peek().span;
            let mut is_static = false;
            let mut is_private = false;
            loop {
                if self.eat(&Token::Static) {
                    is_static = true;
                } else if self.eat(&Token::Private) {
                    is_private = true;
                } else {
                    break;
                }
            }

            if self.check(&Token::New) {
                let kw = self.advance();
                let params = self.parse_params()?;
                let body = self.parse_body()?;
                let decl = MethodDecl {
                    name: Spanned::new("new".to_string(), kw.span),
                    params,
                    ret: Spanned::new(Ty::Void, kw.span),
                    is_static: false,
                    is_private,
                    is_ctor: true,
                    body: Rc::new(body),
                };
                self.registry
                    .add_method(id, Self::method_entry(&decl))
                    .map_err(|e| e.with_span_if_missing(kw.span))?;
                let span = member_start.to(decl.body.span);
                methods.push(Spanned::new(decl, span));
            } else if let Some((ret, mname)) = self.attempt(Self::parse_method_header) {
                let params = self.parse_params()?;
                let body = self.parse_body()?;
                let span = member_start.to(body.span);
                let decl = MethodDecl {
                    name: mname,
                    params,
                    ret,
                    is_static,
                    is_private,
                    is_ctor: false,
                    body: Rc::new(body),
                };
                self.registry
                    .add_method(id, Self::method_entry(&decl))
                    .map_err(|e| e.with_span_if_missing(decl.name.span))?;
                methods.push(Spanned::new(decl, span));
            } else {
                let ty = self.parse_type()?;
                let tok = self.advance();
                let fname = match tok.node {
                    Token::Ident(n) | Token::FieldIdent(n) => Spanned::new(n, tok.span),
                    other => {
                        return Err(CompileError::syntax(format!("expected field name, found {other}"), tok.span));
                    }
                };
                let mut entry = FieldEntry::new(fname.node.clone(), ty.node.clone());
                entry.is_static = is_static;
                entry.is_private = is_private;
                entry.span = Some(fname.span);
                self.registry
                    .add_field(id, entry)
                    .map_err(|e| e.with_span_if_missing(fname.span))?;
                fields.push(FieldDecl { name: fname, ty, is_static, is_private });
                self.end_statement()?;
            }
        }
        let close = self.expect(&Token::RBrace)?;
        self.end_statement()?;

        let decl = TypeDecl { name, parent, autoconstruct, fields, methods };
        Ok(Spanned::new(decl, start.to(close.span)))
    }

    fn parse_enum_decl(&mut self) -> Result<Spanned<EnumDecl>, CompileError> {
        let kw = self.expect(&Token::Enum)?;
        let name = self.expect_ident()?;
        let id = self.registry.declare_type(&name.node, None, TypeKind::Enum, Some(name.span))?;
        self.expect(&Token::LBrace)?;
        let mut values = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::RBrace) {
                break;
            }
            let value = self.expect_ident()?;
            self.registry
                .add_enum_value(id, &value.node)
                .map_err(|e| e.with_span_if_missing(value.span))?;
            values.push(value);
            if !self.eat(&Token::Comma) && !matches!(self.peek_raw().node, Token::Newline | Token::RBrace) {
                let tok = self.peek_raw();
                return Err(CompileError::syntax(format!("expected ',' or '}}', found {}", tok.node), tok.span));
            }
        }
        let close = self.expect(&Token::RBrace)?;
        self.end_statement()?;
        Ok(Spanned::new(EnumDecl { name, values }, kw.span.to(close.span)))
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Result<Spanned<Block>, CompileError> {
        let saved_loose = std::mem::replace(&mut self.loose, 0);
        let open = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::RBrace) || self.check(&Token::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        let close = self.expect(&Token::RBrace)?;
        self.loose = saved_loose;
        Ok(Spanned::new(Block { stmts }, open.span.to(close.span)))
    }

    fn parse_loop_body(&mut self) -> Result<Spanned<Block>, CompileError> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let tok = self.peek().clone();
        let stmt = match tok.node {
            Token::Var => self.parse_var()?,
            Token::If => self.parse_if()?,
            Token::While => {
                self.advance();
                let condition = self.parse_expr(0)?;
                let body = self.parse_loop_body()?;
                let span = tok.span.to(body.span);
                Spanned::new(Stmt::While { condition, body }, span)
            }
            Token::For => self.parse_for()?,
            Token::Break | Token::Redo => {
                self.advance();
                if self.loop_depth == 0 {
                    let word = if matches!(tok.node, Token::Break) { "break" } else { "redo" };
                    return Err(CompileError::syntax(
                        format!("'{word}' is only allowed inside a loop body"),
                        tok.span,
                    ));
                }
                let stmt = if matches!(tok.node, Token::Break) { Stmt::Break } else { Stmt::Redo };
                Spanned::new(stmt, tok.span)
            }
            Token::Return => {
                self.advance();
                if self.at_statement_end() {
                    Spanned::new(Stmt::Return(None), tok.span)
                } else {
                    let value = self.parse_expr(0)?;
                    let span = tok.span.to(value.span);
                    Spanned::new(Stmt::Return(Some(value)), span)
                }
            }
            Token::Emit => self.parse_emit()?,
            Token::Simulate => self.parse_simulate()?,
            Token::Use | Token::Include | Token::Type | Token::Enum | Token::Autoconstruct => {
                return Err(CompileError::syntax(format!("{} is only allowed at the top level", tok.node), tok.span));
            }
            _ => self.parse_expr_stmt()?,
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn parse_var(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let kw = self.advance();
        if self.eat(&Token::LBracket) {
            self.loose += 1;
            let mut items = Vec::new();
            while !self.check(&Token::RBracket) {
                if !items.is_empty() {
                    self.expect(&Token::Comma)?;
                }
                let name = self.expect_ident()?;
                let default = if self.eat(&Token::Eq) { Some(self.parse_expr(0)?) } else { None };
                items.push(SplatItem { name, default });
            }
            self.loose -= 1;
            self.expect(&Token::RBracket)?;
            self.expect(&Token::Eq)?;
            let value = self.parse_expr(0)?;
            let span = kw.span.to(value.span);
            return Ok(Spanned::new(Stmt::Splat { items, value }, span));
        }

        let name = self.expect_ident()?;
        let ty = if matches!(self.peek_raw().node, Token::Colon) {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        let value = if matches!(self.peek_raw().node, Token::Eq) {
            self.advance();
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        if ty.is_none() && value.is_none() {
            return Err(CompileError::syntax(
                format!("variable '{}' needs a type or an initial value", name.node),
                name.span,
            ));
        }
        let end = value.as_ref().map(|v| v.span).or(ty.as_ref().map(|t| t.span)).unwrap_or(name.span);
        Ok(Spanned::new(Stmt::Var { name, ty, value }, kw.span.to(end)))
    }

    fn parse_if(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let kw = self.expect(&Token::If)?;
        let condition = self.parse_expr(0)?;
        let then_block = self.parse_block()?;
        let mut span = kw.span.to(then_block.span);
        let else_block = if self.check(&Token::Else) {
            self.advance();
            let block = if self.check(&Token::If) {
                let nested = self.parse_if()?;
                let span = nested.span;
                Spanned::new(Block { stmts: vec![nested] }, span)
            } else {
                self.parse_block()?
            };
            span = span.to(block.span);
            Some(block)
        } else {
            None
        };
        Ok(Spanned::new(Stmt::If { condition, then_block, else_block }, span))
    }

    fn parse_for(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let kw = self.advance();
        let first = self.expect_ident()?;
        let (key, var) = if self.eat(&Token::Comma) {
            (Some(first), self.expect_ident()?)
        } else {
            (None, first)
        };
        self.expect(&Token::In)?;
        let iterable = self.parse_expr(0)?;
        let body = self.parse_loop_body()?;
        let span = kw.span.to(body.span);
        Ok(Spanned::new(Stmt::For { key, var, iterable, body }, span))
    }

    /// `emit E` followed by its clauses in any order, each at most once. A
    /// clause keyword may start a continuation line.
    fn parse_emit(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let kw = self.advance();
        let action = self.parse_expr(0)?;
        let mut span = kw.span.to(action.span);
        let (mut every, mut distribution, mut limit, mut until) = (None, None, None, None);
        loop {
            let clause = self.peek().clone();
            let slot = match clause.node {
                Token::Every => &mut every,
                Token::With => &mut distribution,
                Token::Limit => &mut limit,
                Token::Until => &mut until,
                _ => break,
            };
            if slot.is_some() {
                return Err(CompileError::syntax(
                    format!("duplicate {} clause in 'emit'", clause.node),
                    clause.span,
                ));
            }
            self.advance();
            let expr = self.parse_expr(0)?;
            span = span.to(expr.span);
            *slot = Some(expr);
        }
        if every.is_none() && distribution.is_none() {
            return Err(CompileError::syntax("'emit' needs an 'every' period or a 'with' distribution", kw.span));
        }
        let emit = EmitStmt { action, every, distribution, limit, until };
        Ok(Spanned::new(Stmt::Emit(emit), span))
    }

    fn parse_simulate(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let kw = self.advance();
        let mut span = kw.span;
        let duration = if matches!(self.peek_raw().node, Token::For) {
            self.advance();
            let d = self.parse_expr(0)?;
            span = span.to(d.span);
            Some(d)
        } else {
            None
        };
        let planner = if matches!(self.peek_raw().node, Token::Planner) {
            self.advance();
            let block = self.parse_body()?;
            span = span.to(block.span);
            Some(block)
        } else {
            None
        };
        Ok(Spanned::new(Stmt::Simulate { duration, planner }, span))
    }

    fn parse_expr_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let target = self.parse_expr(0)?;
        let tok = self.peek_raw().clone();

        let (op, value) = if matches!(tok.node, Token::Eq) {
            self.advance();
            (None, self.parse_expr(0)?)
        } else if let Some(op) = compound_op(&tok.node) {
            self.advance();
            (Some(op), self.parse_expr(0)?)
        } else if matches!(tok.node, Token::PlusPlus | Token::MinusMinus) {
            self.advance();
            let op = if matches!(tok.node, Token::PlusPlus) { BinOp::Add } else { BinOp::Sub };
            (Some(op), self.node(ExprKind::IntLit(1), tok.span))
        } else {
            let span = target.span;
            return Ok(Spanned::new(Stmt::Expr(target), span));
        };

        let assignable = matches!(
            target.node.kind,
            ExprKind::Ident(_) | ExprKind::Field(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        );
        if !assignable {
            return Err(CompileError::syntax("invalid assignment target", target.span));
        }
        let span = target.span.to(value.span);
        Ok(Spanned::new(Stmt::Assign { target, op, value }, span))
    }

    // ---- expressions ----

    fn parse_expr(&mut self, min_bp: u8) -> Result<Spanned<Expr>, CompileError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let tok = self.peek_op().clone();
            match tok.node {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    if matches!(self.peek_raw().node, Token::LParen) {
                        let (args, close) = self.parse_args()?;
                        let span = lhs.span.to(close);
                        lhs = self.node(ExprKind::MethodCall { object: Box::new(lhs), method: name, args }, span);
                    } else {
                        let span = lhs.span.to(name.span);
                        lhs = self.node(ExprKind::Member { object: Box::new(lhs), name }, span);
                    }
                }
                Token::LBracket => {
                    self.advance();
                    self.loose += 1;
                    let index = self.parse_expr(0)?;
                    self.loose -= 1;
                    let close = self.expect(&Token::RBracket)?;
                    let span = lhs.span.to(close.span);
                    lhs = self.node(ExprKind::Index { object: Box::new(lhs), index: Box::new(index) }, span);
                }
                Token::DotDot => {
                    let (l_bp, r_bp) = RANGE_BP;
                    if l_bp < min_bp {
                        break;
                    }
                    self.advance();
                    let to = self.parse_expr(r_bp)?;
                    let span = lhs.span.to(to.span);
                    lhs = self.node(ExprKind::Range { from: Box::new(lhs), to: Box::new(to) }, span);
                }
                ref other => {
                    let Some(op) = binary_op(other) else { break };
                    let (l_bp, r_bp) = infix_binding_power(op);
                    if l_bp < min_bp {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(r_bp)?;
                    let span = lhs.span.to(rhs.span);
                    lhs = self.node(ExprKind::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
                }
            }
        }

        Ok(lhs)
    }

    /// `( args )`, returning the span of the closing parenthesis.
    fn parse_args(&mut self) -> Result<(Vec<Spanned<Expr>>, Span), CompileError> {
        self.expect(&Token::LParen)?;
        self.loose += 1;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if !args.is_empty() {
                self.expect(&Token::Comma)?;
            }
            args.push(self.parse_expr(0)?);
        }
        self.loose -= 1;
        let close = self.expect(&Token::RParen)?;
        Ok((args, close.span))
    }

    fn parse_prefix(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let tok = self.advance();
        let span = tok.span;
        let kind = match tok.node {
            Token::IntLit(n) => ExprKind::IntLit(n),
            Token::LongLit(n) => ExprKind::LongLit(n),
            Token::FloatLit(n) => ExprKind::FloatLit(n),
            Token::ImaginaryLit(n) => ExprKind::ImaginaryLit(n),
            Token::StringLit(s) => ExprKind::StringLit(s),
            Token::True => ExprKind::BoolLit(true),
            Token::False => ExprKind::BoolLit(false),
            Token::Null => ExprKind::Null,
            Token::This => ExprKind::This,
            Token::FieldIdent(name) => ExprKind::Field(name),
            Token::Ident(name) => {
                if matches!(self.peek_raw().node, Token::LParen) {
                    let (args, close) = self.parse_args()?;
                    let name = Spanned::new(name, span);
                    return Ok(self.node(ExprKind::Call { name, args }, span.to(close)));
                }
                ExprKind::Ident(name)
            }
            Token::Minus | Token::Plus | Token::Bang | Token::Not => {
                let op = match tok.node {
                    Token::Minus => UnaryOp::Neg,
                    Token::Plus => UnaryOp::Plus,
                    _ => UnaryOp::Not,
                };
                let operand = self.parse_expr(PREFIX_BP)?;
                let span = span.to(operand.span);
                return Ok(self.node(ExprKind::UnaryOp { op, operand: Box::new(operand) }, span));
            }
            Token::LParen => {
                self.loose += 1;
                let inner = self.parse_expr(0)?;
                self.loose -= 1;
                let close = self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, span.to(close.span)));
            }
            Token::LBracket => {
                self.loose += 1;
                let mut items = Vec::new();
                while !self.check(&Token::RBracket) {
                    if !items.is_empty() {
                        self.expect(&Token::Comma)?;
                    }
                    items.push(self.parse_expr(0)?);
                }
                self.loose -= 1;
                let close = self.expect(&Token::RBracket)?;
                return Ok(self.node(ExprKind::ArrayLit(items), span.to(close.span)));
            }
            Token::LBrace => {
                self.loose += 1;
                let mut pairs = Vec::new();
                while !self.check(&Token::RBrace) {
                    if !pairs.is_empty() {
                        self.expect(&Token::Comma)?;
                    }
                    let key = self.parse_expr(0)?;
                    self.expect(&Token::Colon)?;
                    let value = self.parse_expr(0)?;
                    pairs.push((key, value));
                }
                self.loose -= 1;
                let close = self.expect(&Token::RBrace)?;
                return Ok(self.node(ExprKind::DictLit(pairs), span.to(close.span)));
            }
            Token::New => return self.parse_new(span),
            Token::Eof => {
                return Err(CompileError::syntax("unexpected end of file in expression", span));
            }
            other => {
                return Err(CompileError::syntax(format!("expected expression, found {other}"), span));
            }
        };
        Ok(self.node(kind, span))
    }

    /// After `new`: `T(args)`, `T[size]` or `{K:V}`.
    fn parse_new(&mut self, kw: Span) -> Result<Spanned<Expr>, CompileError> {
        if self.check(&Token::LBrace) {
            let ty = self.parse_base_type()?;
            let span = kw.to(ty.span);
            return Ok(self.node(ExprKind::NewDict { ty }, span));
        }
        let base = self.parse_base_type()?;
        let mut elem = base.clone();
        while matches!(self.peek_raw().node, Token::LBracket) {
            if matches!(self.current.at(self.current.pos + 1).node, Token::RBracket) {
                self.current.pos += 1;
                let close = self.advance();
                elem = Spanned::new(Ty::array_of(elem.node), elem.span.to(close.span));
                continue;
            }
            self.advance();
            self.loose += 1;
            let size = self.parse_expr(0)?;
            self.loose -= 1;
            let close = self.expect(&Token::RBracket)?;
            let span = kw.to(close.span);
            return Ok(self.node(ExprKind::NewArray { elem, size: Box::new(size) }, span));
        }
        let Some(name) = base.node.type_name() else {
            return Err(CompileError::syntax(format!("type '{}' cannot be constructed with 'new'", base.node), base.span));
        };
        let ty = Spanned::new(name.to_string(), base.span);
        let (args, close) = self.parse_args()?;
        Ok(self.node(ExprKind::New { ty, args }, kw.to(close)))
    }
}
