//! Statements and control flow.
//!
//! Every `compile_*` function here returns whether all paths through the
//! statement end in `return`.

use super::expr::{MemberRef, NameRef};
use super::ops::Operand;
use super::{CodeGen, LoopLabels};
use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::registry::{Lookup, MethodId, Slot, StaticFilter, Ty};
use crate::span::Spanned;
use crate::stdlib::handles;
use crate::target::{FieldRef, Instr, MethodRef};

/// A storage location whose address operands (if any) are already on the
/// stack or spilled to temporaries.
enum Place {
    Slot(Slot),
    /// Instance field; the object is on the stack.
    Field(FieldRef),
    Static(FieldRef),
    Elem { array: u16, index: u16 },
    Entry { dict: u16, key: u16 },
}

fn external(handle: &str) -> Instr {
    Instr::Call(MethodRef::External(handle.to_string()))
}

impl CodeGen<'_> {
    pub(super) fn compile_block(&mut self, block: &Spanned<Block>) -> Result<bool, CompileError> {
        self.ctx.scope.push();
        let result = self.compile_stmts(&block.node.stmts);
        self.ctx.scope.pop();
        result
    }

    fn compile_stmts(&mut self, stmts: &[Spanned<Stmt>]) -> Result<bool, CompileError> {
        let mut returns = false;
        for stmt in stmts {
            returns |= self.compile_stmt(stmt)?;
        }
        Ok(returns)
    }

    pub(super) fn compile_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<bool, CompileError> {
        self.stmt_inner(stmt).map_err(|err| err.with_span_if_missing(stmt.span))
    }

    fn stmt_inner(&mut self, stmt: &Spanned<Stmt>) -> Result<bool, CompileError> {
        match &stmt.node {
            Stmt::Var { name, ty, value } => self.compile_var(name, ty.as_ref(), value.as_ref())?,
            Stmt::Splat { items, value } => self.compile_splat(items, value)?,
            Stmt::Assign { target, op, value } => self.compile_assign(target, *op, value)?,
            Stmt::If { condition, then_block, else_block } => {
                self.emit_condition(condition)?;
                let otherwise = self.new_label();
                let end = self.new_label();
                self.emit(Instr::BrFalse(otherwise));
                let then_returns = self.compile_block(then_block)?;
                self.emit(Instr::Br(end));
                self.emit(Instr::Mark(otherwise));
                let else_returns = match else_block {
                    Some(block) => self.compile_block(block)?,
                    None => false,
                };
                self.emit(Instr::Mark(end));
                return Ok(then_returns && else_returns);
            }
            Stmt::While { condition, body } => {
                let check = self.new_label();
                let start = self.new_label();
                let exit = self.new_label();
                self.emit(Instr::Mark(check));
                self.emit_condition(condition)?;
                self.emit(Instr::BrFalse(exit));
                self.emit(Instr::Mark(start));
                self.loop_body(LoopLabels { exit, body: start }, body)?;
                self.emit(Instr::Br(check));
                self.emit(Instr::Mark(exit));
            }
            Stmt::For { key, var, iterable, body } => self.compile_for(key.as_ref(), var, iterable, body)?,
            Stmt::Break | Stmt::Redo => {
                let is_break = matches!(stmt.node, Stmt::Break);
                let labels = self.ctx.loops.last().copied().ok_or_else(|| {
                    let word = if is_break { "break" } else { "redo" };
                    CompileError::semantic(format!("'{word}' is only allowed inside a loop body"), stmt.span)
                })?;
                self.emit(Instr::Br(if is_break { labels.exit } else { labels.body }));
            }
            Stmt::Return(value) => {
                self.compile_return(value.as_ref())?;
                return Ok(true);
            }
            Stmt::Expr(e) => {
                if self.emit_expr(e)? != Ty::Void {
                    self.emit(Instr::Pop);
                }
            }
            Stmt::Emit(emit) => self.compile_emit(emit, stmt.span)?,
            Stmt::Simulate { duration, planner } => self.compile_simulate(duration.as_ref(), planner.as_ref(), stmt.span)?,
        }
        Ok(false)
    }

    fn emit_condition(&mut self, condition: &Spanned<Expr>) -> Result<(), CompileError> {
        let t = self.infer(condition)?;
        if t != Ty::Bool {
            return Err(CompileError::semantic(format!("condition must be 'bool', found '{t}'"), condition.span));
        }
        self.emit_expr(condition)?;
        Ok(())
    }

    fn loop_body(&mut self, labels: LoopLabels, body: &Spanned<Block>) -> Result<(), CompileError> {
        self.ctx.loops.push(labels);
        let result = self.compile_block(body);
        self.ctx.loops.pop();
        result.map(|_| ())
    }

    /// Emit `value` for storage into a `to`-typed location. Literal arrays
    /// and dictionaries take their element types from `to`, so `[]` and
    /// `{}` need no elements to be typed.
    fn emit_value_for(
        &mut self,
        value: &Spanned<Expr>,
        to: &Ty,
        mismatch: &dyn Fn(&Ty) -> String,
    ) -> Result<(), CompileError> {
        match (&value.node.kind, to) {
            (ExprKind::ArrayLit(items), Ty::Array(elem)) => {
                for item in items {
                    let t = self.infer(item)?;
                    if !self.reg.assignable(elem, &t) {
                        return Err(CompileError::semantic(mismatch(&Ty::array_of(t)), item.span));
                    }
                }
                self.emit_array_literal(elem, items)
            }
            (ExprKind::DictLit(pairs), Ty::Dict(..)) if pairs.is_empty() => {
                self.emit(Instr::NewObj(MethodRef::External(handles::DICT_NEW.into())));
                Ok(())
            }
            _ => {
                let t = self.infer(value)?;
                if !self.reg.assignable(to, &t) {
                    return Err(CompileError::semantic(mismatch(&t), value.span));
                }
                self.emit_expr_as(value, to)
            }
        }
    }

    fn compile_var(
        &mut self,
        name: &Spanned<String>,
        declared: Option<&Spanned<Ty>>,
        value: Option<&Spanned<Expr>>,
    ) -> Result<(), CompileError> {
        let ty = match (declared, value) {
            (Some(ty), value) => {
                self.reg.require_known(&ty.node, ty.span)?;
                if let Some(value) = value {
                    let mismatch = |t: &Ty| format!("cannot assign '{t}' to variable '{}' of type '{}'", name.node, ty.node);
                    self.emit_value_for(value, &ty.node, &mismatch)?;
                }
                ty.node.clone()
            }
            (None, Some(value)) => {
                let t = self.emit_expr(value)?;
                if t == Ty::Void || t == Ty::Null {
                    return Err(CompileError::semantic(
                        format!("cannot infer the type of '{}' from '{t}'", name.node),
                        value.span,
                    ));
                }
                t
            }
            (None, None) => {
                return Err(CompileError::semantic(
                    format!("variable '{}' needs a type or an initial value", name.node),
                    name.span,
                ))
            }
        };
        let index = self.declare_local(name, ty)?;
        if value.is_some() {
            self.emit(Instr::StLoc(index));
        }
        Ok(())
    }

    /// `var [a, b = d] = xs`: missing trailing elements take their default.
    fn compile_splat(&mut self, items: &[SplatItem], value: &Spanned<Expr>) -> Result<(), CompileError> {
        let source = self.emit_expr(value)?;
        let Ty::Array(elem) = &source else {
            return Err(CompileError::semantic(format!("cannot destructure a value of type '{source}'"), value.span));
        };
        let elem = (**elem).clone();
        let array = self.temp(&source);
        self.emit(Instr::StLoc(array));

        for (i, item) in items.iter().enumerate() {
            let i = i as i32;
            match &item.default {
                Some(default) => {
                    let fallback = self.new_label();
                    let end = self.new_label();
                    self.emit(Instr::LdLoc(array));
                    self.emit(Instr::LdLen);
                    self.emit(Instr::LdcI4(i));
                    self.emit(Instr::Cgt);
                    self.emit(Instr::BrFalse(fallback));
                    self.emit(Instr::LdLoc(array));
                    self.emit(Instr::LdcI4(i));
                    self.emit(Instr::LdElem);
                    self.emit(Instr::Br(end));
                    self.emit(Instr::Mark(fallback));
                    let mismatch = |t: &Ty| format!("default '{t}' does not match element type '{elem}'");
                    self.emit_value_for(default, &elem, &mismatch)?;
                    self.emit(Instr::Mark(end));
                }
                None => {
                    self.emit(Instr::LdLoc(array));
                    self.emit(Instr::LdcI4(i));
                    self.emit(Instr::LdElem);
                }
            }
            let local = self.declare_local(&item.name, elem.clone())?;
            self.emit(Instr::StLoc(local));
        }
        Ok(())
    }

    // ---- assignment ----

    /// Emit the address operands of `target` and describe where it lives.
    fn place_of(&mut self, target: &Spanned<Expr>) -> Result<(Place, Ty), CompileError> {
        let name_place = |cg: &mut Self, r: NameRef| -> Result<(Place, Ty), CompileError> {
            let ty = cg.name_ty(&r);
            let place = match r {
                NameRef::Slot(slot, _) => Place::Slot(slot),
                NameRef::Field(f) => {
                    cg.emit(Instr::LdArg(0));
                    Place::Field(cg.field_ref(f)?)
                }
                NameRef::StaticField(f) => Place::Static(cg.field_ref(f)?),
            };
            Ok((place, ty))
        };
        match &target.node.kind {
            ExprKind::Ident(name) => {
                let r = self.resolve_name(name)?;
                name_place(self, r)
            }
            ExprKind::Field(name) => {
                let r = self.resolve_at_field(name)?;
                name_place(self, r)
            }
            ExprKind::Member { object, name } => {
                let (member, ty) = self.resolve_member(object, name)?;
                match member {
                    MemberRef::StaticField(f) => Ok((Place::Static(self.field_ref(f)?), ty)),
                    MemberRef::Field(f) => {
                        self.emit_expr(object)?;
                        Ok((Place::Field(self.field_ref(f)?), ty))
                    }
                    _ => Err(CompileError::semantic(format!("cannot assign to '{}'", name.node), name.span)),
                }
            }
            ExprKind::Index { object, index } => {
                let obj = self.infer(object)?;
                let ty = self.infer(target)?;
                match &obj {
                    Ty::Array(_) => {
                        self.emit_expr(object)?;
                        let array = self.temp(&obj);
                        self.emit(Instr::StLoc(array));
                        self.emit_expr(index)?;
                        let idx = self.temp(&Ty::Int);
                        self.emit(Instr::StLoc(idx));
                        self.emit(Instr::LdLoc(array));
                        self.emit(Instr::LdLoc(idx));
                        Ok((Place::Elem { array, index: idx }, ty))
                    }
                    Ty::Dict(key_ty, _) => {
                        let key_ty = (**key_ty).clone();
                        self.emit_expr(object)?;
                        let dict = self.temp(&obj);
                        self.emit(Instr::StLoc(dict));
                        self.emit_expr_as(index, &key_ty)?;
                        let key = self.temp(&key_ty);
                        self.emit(Instr::StLoc(key));
                        self.emit(Instr::LdLoc(dict));
                        self.emit(Instr::LdLoc(key));
                        Ok((Place::Entry { dict, key }, ty))
                    }
                    other => Err(CompileError::semantic(format!("type '{other}' cannot be indexed"), object.span)),
                }
            }
            _ => Err(CompileError::semantic("invalid assignment target", target.span)),
        }
    }

    /// Instructions that load the current value of `place`, assuming its
    /// address operands are on the stack.
    fn place_load(place: &Place) -> Vec<Instr> {
        match place {
            Place::Slot(Slot::Arg(i)) => vec![Instr::LdArg(*i)],
            Place::Slot(Slot::Local(i)) => vec![Instr::LdLoc(*i)],
            Place::Field(f) => vec![Instr::Dup, Instr::LdFld(f.clone())],
            Place::Static(f) => vec![Instr::LdSFld(f.clone())],
            Place::Elem { array, index } => vec![Instr::LdLoc(*array), Instr::LdLoc(*index), Instr::LdElem],
            Place::Entry { dict, key } => vec![Instr::LdLoc(*dict), Instr::LdLoc(*key), external(handles::DICT_GET)],
        }
    }

    fn place_store(&mut self, place: Place) {
        match place {
            Place::Slot(slot) => self.store_slot(slot),
            Place::Field(f) => self.emit(Instr::StFld(f)),
            Place::Static(f) => self.emit(Instr::StSFld(f)),
            Place::Elem { .. } => self.emit(Instr::StElem),
            Place::Entry { .. } => self.emit(external(handles::DICT_SET)),
        }
    }

    fn compile_assign(&mut self, target: &Spanned<Expr>, op: Option<BinOp>, value: &Spanned<Expr>) -> Result<(), CompileError> {
        let (place, ty) = self.place_of(target)?;
        match op {
            None => {
                let mismatch = |t: &Ty| format!("cannot assign '{t}' to '{ty}'");
                self.emit_value_for(value, &ty, &mismatch)?;
            }
            Some(op) => {
                let v = self.infer(value)?;
                if matches!(op, BinOp::And | BinOp::Or) {
                    return Err(CompileError::semantic(
                        format!("operator '{}' has no compound assignment form", op.symbol()),
                        target.span,
                    ));
                }
                let plan = self.plan_binary(op, &ty, &v)?;
                if !self.reg.assignable(&ty, &plan.result) {
                    return Err(CompileError::semantic(
                        format!("operator '{}=' produces '{}', which cannot be stored in '{ty}'", op.symbol(), plan.result),
                        target.span,
                    ));
                }
                let load = Self::place_load(&place);
                self.emit_plan(&plan, Operand::Loaded(load, ty.clone()), Operand::Expr(value))?;
                self.convert(&plan.result, &ty)?;
            }
        }
        self.place_store(place);
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&Spanned<Expr>>) -> Result<(), CompileError> {
        let ret = self.ctx.ret.clone();
        match (value, &ret) {
            (None, Ty::Void) => {}
            (Some(v), Ty::Void) => {
                return Err(CompileError::semantic(
                    format!("'{}' returns no value", self.ctx.label),
                    v.span,
                ))
            }
            (None, t) => {
                return Err(CompileError::unlocated(format!(
                    "'{}' must return a value of type '{t}'",
                    self.ctx.label
                )))
            }
            (Some(v), t) => {
                let label = self.ctx.label.clone();
                let mismatch = |found: &Ty| format!("cannot return '{found}' from '{label}', which returns '{t}'");
                self.emit_value_for(v, t, &mismatch)?;
            }
        }
        self.emit(Instr::Ret);
        Ok(())
    }

    // ---- for ----

    fn compile_for(
        &mut self,
        key: Option<&Spanned<String>>,
        var: &Spanned<String>,
        iterable: &Spanned<Expr>,
        body: &Spanned<Block>,
    ) -> Result<(), CompileError> {
        let source = self.infer(iterable)?;
        self.ctx.scope.push();
        let result = match &source {
            Ty::Array(elem) => {
                let elem = (**elem).clone();
                self.for_array(&source, elem, key, var, iterable, body)
            }
            Ty::Dict(k, v) => {
                let (k, v) = ((**k).clone(), (**v).clone());
                self.for_dict(k, v, key, var, iterable, body)
            }
            other => match self.iterator_protocol(other) {
                Some(protocol) => self.for_protocol(protocol, key, var, iterable, body),
                None => Err(CompileError::semantic(format!("type '{other}' cannot be iterated"), iterable.span)),
            },
        };
        self.ctx.scope.pop();
        result
    }

    fn for_array(
        &mut self,
        source: &Ty,
        elem: Ty,
        key: Option<&Spanned<String>>,
        var: &Spanned<String>,
        iterable: &Spanned<Expr>,
        body: &Spanned<Block>,
    ) -> Result<(), CompileError> {
        self.emit_expr(iterable)?;
        let array = self.temp(source);
        self.emit(Instr::StLoc(array));
        let index = self.temp(&Ty::Int);
        self.emit(Instr::LdcI4(0));
        self.emit(Instr::StLoc(index));
        let key_local = key.map(|k| self.declare_local(k, Ty::Int)).transpose()?;
        let var_local = self.declare_local(var, elem)?;

        let check = self.new_label();
        let start = self.new_label();
        let exit = self.new_label();
        self.emit(Instr::Mark(check));
        self.emit(Instr::LdLoc(index));
        self.emit(Instr::LdLoc(array));
        self.emit(Instr::LdLen);
        self.emit(Instr::Clt);
        self.emit(Instr::BrFalse(exit));
        if let Some(k) = key_local {
            self.emit(Instr::LdLoc(index));
            self.emit(Instr::StLoc(k));
        }
        self.emit(Instr::LdLoc(array));
        self.emit(Instr::LdLoc(index));
        self.emit(Instr::LdElem);
        self.emit(Instr::StLoc(var_local));
        self.emit(Instr::Mark(start));
        self.loop_body(LoopLabels { exit, body: start }, body)?;
        self.emit(Instr::LdLoc(index));
        self.emit(Instr::LdcI4(1));
        self.emit(Instr::Add);
        self.emit(Instr::StLoc(index));
        self.emit(Instr::Br(check));
        self.emit(Instr::Mark(exit));
        Ok(())
    }

    fn for_dict(
        &mut self,
        key_ty: Ty,
        value_ty: Ty,
        key: Option<&Spanned<String>>,
        var: &Spanned<String>,
        iterable: &Spanned<Expr>,
        body: &Spanned<Block>,
    ) -> Result<(), CompileError> {
        let key = key.ok_or_else(|| {
            CompileError::semantic("iterating a dictionary requires a key binding", iterable.span)
        })?;
        let source = self.emit_expr(iterable)?;
        let dict = self.temp(&source);
        self.emit(Instr::StLoc(dict));
        self.emit(Instr::LdLoc(dict));
        self.emit(external(handles::DICT_RESET));
        let key_local = self.declare_local(key, key_ty)?;
        let var_local = self.declare_local(var, value_ty)?;

        let check = self.new_label();
        let start = self.new_label();
        let exit = self.new_label();
        self.emit(Instr::Mark(check));
        self.emit(Instr::LdLoc(dict));
        self.emit(external(handles::DICT_NEXT));
        self.emit(Instr::BrFalse(exit));
        self.emit(Instr::LdLoc(dict));
        self.emit(external(handles::DICT_CURRENT_KEY));
        self.emit(Instr::StLoc(key_local));
        self.emit(Instr::LdLoc(dict));
        self.emit(external(handles::DICT_CURRENT));
        self.emit(Instr::StLoc(var_local));
        self.emit(Instr::Mark(start));
        self.loop_body(LoopLabels { exit, body: start }, body)?;
        self.emit(Instr::Br(check));
        self.emit(Instr::Mark(exit));
        Ok(())
    }

    /// `next() bool` and `current()` (plus an optional `reset()`) on the
    /// iterated type, as provided by `range`.
    fn iterator_protocol(&self, ty: &Ty) -> Option<IterProtocol> {
        let tid = self.reg.entry_of(ty)?;
        let from = Some(self.ctx.ty);
        let find = |name: &str| {
            self.reg
                .find_method(tid, &Lookup::new(name, &[], from).statics(StaticFilter::InstanceOnly))
                .found()
        };
        let next = find("next").filter(|m| self.reg.method(*m).ret == Ty::Bool)?;
        let current = find("current").filter(|m| self.reg.method(*m).ret != Ty::Void)?;
        Some(IterProtocol { reset: find("reset"), next, current })
    }

    fn for_protocol(
        &mut self,
        protocol: IterProtocol,
        key: Option<&Spanned<String>>,
        var: &Spanned<String>,
        iterable: &Spanned<Expr>,
        body: &Spanned<Block>,
    ) -> Result<(), CompileError> {
        let source = self.emit_expr(iterable)?;
        if let Some(key) = key {
            return Err(CompileError::semantic(format!("iterating '{source}' does not provide a key"), key.span));
        }
        let iter = self.temp(&source);
        self.emit(Instr::StLoc(iter));
        if let Some(reset) = protocol.reset {
            self.emit(Instr::LdLoc(iter));
            let instr = self.call_instr(reset)?;
            self.emit(instr);
        }
        let elem = self.reg.method(protocol.current).ret.clone();
        let var_local = self.declare_local(var, elem)?;

        let check = self.new_label();
        let start = self.new_label();
        let exit = self.new_label();
        self.emit(Instr::Mark(check));
        self.emit(Instr::LdLoc(iter));
        let next = self.call_instr(protocol.next)?;
        self.emit(next);
        self.emit(Instr::BrFalse(exit));
        self.emit(Instr::LdLoc(iter));
        let current = self.call_instr(protocol.current)?;
        self.emit(current);
        self.emit(Instr::StLoc(var_local));
        self.emit(Instr::Mark(start));
        self.loop_body(LoopLabels { exit, body: start }, body)?;
        self.emit(Instr::Br(check));
        self.emit(Instr::Mark(exit));
        Ok(())
    }
}

struct IterProtocol {
    reset: Option<MethodId>,
    next: MethodId,
    current: MethodId,
}
