use rustc_hash::FxHashSet;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::registry::{Registry, Scope, Ty, TypeId, PROGRAM_TYPE};
use crate::span::{Span, Spanned};
use crate::visit::{walk_block, walk_expr, walk_stmt, Visitor};

/// A local of the enclosing method referenced by a deferred body.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    pub ty: Ty,
}

/// What the deferred body can see of the method it is written in.
#[derive(Clone, Copy)]
pub struct CaptureContext<'a> {
    pub registry: &'a Registry,
    pub scope: &'a Scope,
    pub enclosing: TypeId,
}

/// Free locals of an `emit`: its action and its `until` condition. The
/// period, distribution and limit are evaluated eagerly and never captured.
pub fn captures_in_emit(ctx: CaptureContext<'_>, emit: &EmitStmt) -> Result<Vec<Capture>, CompileError> {
    let mut c = CaptureCollector::new(ctx);
    c.visit_expr(&emit.action);
    if let Some(until) = &emit.until {
        c.visit_expr(until);
    }
    c.finish()
}

/// Free locals of a `simulate … planner { }` body.
pub fn captures_in_block(ctx: CaptureContext<'_>, block: &Spanned<Block>) -> Result<Vec<Capture>, CompileError> {
    let mut c = CaptureCollector::new(ctx);
    c.visit_block(block);
    c.finish()
}

pub fn closured_member(what: &str, span: Span) -> CompileError {
    CompileError::semantic(format!("closured member '{what}' cannot be used inside a deferred block"), span)
}

struct CaptureCollector<'a> {
    ctx: CaptureContext<'a>,
    /// Names declared inside the deferred body, innermost block last.
    inner: Vec<FxHashSet<String>>,
    captures: Vec<Capture>,
    error: Option<CompileError>,
}

impl<'a> CaptureCollector<'a> {
    fn new(ctx: CaptureContext<'a>) -> Self {
        Self { ctx, inner: vec![FxHashSet::default()], captures: Vec::new(), error: None }
    }

    fn finish(self) -> Result<Vec<Capture>, CompileError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.captures),
        }
    }

    fn fail(&mut self, err: CompileError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn declare(&mut self, name: &str) {
        if let Some(frame) = self.inner.last_mut() {
            frame.insert(name.to_string());
        }
    }

    fn is_inner(&self, name: &str) -> bool {
        self.inner.iter().any(|f| f.contains(name))
    }

    /// Static members of the program type are reachable from anywhere.
    fn enclosing_is_program(&self) -> bool {
        self.ctx.registry.ty(self.ctx.enclosing).name == PROGRAM_TYPE
    }

    fn ident(&mut self, name: &str, span: Span) {
        if self.is_inner(name) || self.captures.iter().any(|c| c.name == name) {
            return;
        }
        if let Some(binding) = self.ctx.scope.lookup(name) {
            self.captures.push(Capture { name: name.to_string(), ty: binding.ty.clone() });
            return;
        }
        let reg = self.ctx.registry;
        if let Some(field) = reg.find_field(self.ctx.enclosing, name) {
            if !(self.enclosing_is_program() && reg.field(field).is_static) {
                self.fail(closured_member(name, span));
            }
        }
    }

    fn call(&mut self, name: &str, span: Span) {
        if self.enclosing_is_program() {
            return;
        }
        if self.ctx.registry.has_method_named(self.ctx.enclosing, name) {
            self.fail(closured_member(name, span));
        }
    }
}

impl Visitor for CaptureCollector<'_> {
    fn visit_block(&mut self, block: &Spanned<Block>) {
        self.inner.push(FxHashSet::default());
        walk_block(self, block);
        self.inner.pop();
    }

    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        match &stmt.node {
            Stmt::Var { name, .. } => {
                walk_stmt(self, stmt);
                self.declare(&name.node);
            }
            Stmt::Splat { items, .. } => {
                walk_stmt(self, stmt);
                for item in items {
                    self.declare(&item.name.node);
                }
            }
            Stmt::For { key, var, iterable, body } => {
                self.visit_expr(iterable);
                self.inner.push(FxHashSet::default());
                if let Some(key) = key {
                    self.declare(&key.node);
                }
                self.declare(&var.node);
                self.visit_block(body);
                self.inner.pop();
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        match &expr.node.kind {
            ExprKind::This => self.fail(closured_member("this", expr.span)),
            ExprKind::Field(name) => self.fail(closured_member(&format!("@{name}"), expr.span)),
            ExprKind::Ident(name) => self.ident(name, expr.span),
            ExprKind::Call { name, .. } => {
                if !self.is_inner(&name.node) && self.ctx.scope.lookup(&name.node).is_none() {
                    self.call(&name.node, name.span);
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}
