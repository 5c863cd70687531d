//! Read-only AST traversal.
//!
//! Implement [`Visitor`] for an analysis pass, overriding only the methods
//! you need. Call the matching `walk_*` function inside an override to keep
//! the default recursion; omit it to prune traversal at that node.
//!
//! Use a visitor for passes where most match arms would be pure recursion
//! (capture collection, name scans). Code generation matches by hand.

use crate::parser::ast::*;
use crate::span::Spanned;

pub trait Visitor: Sized {
    fn visit_block(&mut self, block: &Spanned<Block>) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        walk_expr(self, expr);
    }
}

pub fn walk_block<V: Visitor>(v: &mut V, block: &Spanned<Block>) {
    for stmt in &block.node.stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Spanned<Stmt>) {
    match &stmt.node {
        Stmt::Var { value, .. } => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        Stmt::Splat { items, value } => {
            v.visit_expr(value);
            for item in items {
                if let Some(default) = &item.default {
                    v.visit_expr(default);
                }
            }
        }
        Stmt::Assign { target, value, .. } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Stmt::If { condition, then_block, else_block } => {
            v.visit_expr(condition);
            v.visit_block(then_block);
            if let Some(else_block) = else_block {
                v.visit_block(else_block);
            }
        }
        Stmt::While { condition, body } => {
            v.visit_expr(condition);
            v.visit_block(body);
        }
        Stmt::For { iterable, body, .. } => {
            v.visit_expr(iterable);
            v.visit_block(body);
        }
        Stmt::Break | Stmt::Redo => {}
        Stmt::Return(value) => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        Stmt::Expr(expr) => v.visit_expr(expr),
        Stmt::Emit(emit) => {
            v.visit_expr(&emit.action);
            for part in [&emit.every, &emit.distribution, &emit.limit, &emit.until].into_iter().flatten() {
                v.visit_expr(part);
            }
        }
        Stmt::Simulate { duration, planner } => {
            if let Some(duration) = duration {
                v.visit_expr(duration);
            }
            if let Some(planner) = planner {
                v.visit_block(planner);
            }
        }
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Spanned<Expr>) {
    match &expr.node.kind {
        ExprKind::IntLit(_)
        | ExprKind::LongLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::ImaginaryLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Null
        | ExprKind::This
        | ExprKind::Ident(_)
        | ExprKind::Field(_)
        | ExprKind::NewDict { .. } => {}
        ExprKind::BinOp { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        ExprKind::UnaryOp { operand, .. } => v.visit_expr(operand),
        ExprKind::Member { object, .. } => v.visit_expr(object),
        ExprKind::Call { args, .. } | ExprKind::New { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::MethodCall { object, args, .. } => {
            v.visit_expr(object);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::Index { object, index } => {
            v.visit_expr(object);
            v.visit_expr(index);
        }
        ExprKind::Range { from, to } => {
            v.visit_expr(from);
            v.visit_expr(to);
        }
        ExprKind::NewArray { size, .. } => v.visit_expr(size),
        ExprKind::ArrayLit(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        ExprKind::DictLit(pairs) => {
            for (k, value) in pairs {
                v.visit_expr(k);
                v.visit_expr(value);
            }
        }
    }
}
