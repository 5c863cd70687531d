//! Expression typing and emission.
//!
//! `infer` is pure with respect to the output: it only fills the type and
//! call side tables. `emit_expr` infers first, then emits children before
//! their parent and leaves exactly one value on the stack (none for
//! `void`).

use super::ops::Operand;
use super::CodeGen;
use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::registry::{FieldId, Lookup, MethodId, Resolution, Slot, StaticFilter, Ty, TypeId, TypeKind, PROGRAM_TYPE};
use crate::span::Spanned;
use crate::stdlib::{handles, RANGE, STRING_HELPERS};
use crate::target::{Instr, MethodRef};

/// What a bare identifier or `@name` denotes.
#[derive(Debug, Clone)]
pub(super) enum NameRef {
    Slot(Slot, Ty),
    /// Instance field of `this`.
    Field(FieldId),
    StaticField(FieldId),
}

/// What `object.name` denotes.
#[derive(Debug, Clone)]
pub(super) enum MemberRef {
    StaticField(FieldId),
    EnumValue(MethodId),
    Field(FieldId),
    ArrayLength,
    DictLength,
    StringLength(MethodId),
}

/// Who receives an instance call.
pub(super) enum Receiver<'e> {
    Static,
    This,
    Expr(&'e Spanned<Expr>),
}

impl CodeGen<'_> {
    pub(super) fn infer(&mut self, e: &Spanned<Expr>) -> Result<Ty, CompileError> {
        if let Some(ty) = self.types.get(&e.node.id) {
            return Ok(ty.clone());
        }
        let ty = self.infer_uncached(e).map_err(|err| err.with_span_if_missing(e.span))?;
        self.types.insert(e.node.id, ty.clone());
        Ok(ty)
    }

    fn infer_all(&mut self, exprs: &[Spanned<Expr>]) -> Result<Vec<Ty>, CompileError> {
        exprs.iter().map(|e| self.infer(e)).collect()
    }

    fn infer_uncached(&mut self, e: &Spanned<Expr>) -> Result<Ty, CompileError> {
        Ok(match &e.node.kind {
            ExprKind::IntLit(_) => Ty::Int,
            ExprKind::LongLit(_) => Ty::Long,
            ExprKind::FloatLit(_) => Ty::Float,
            ExprKind::ImaginaryLit(_) => Ty::Complex,
            ExprKind::StringLit(_) => Ty::String,
            ExprKind::BoolLit(_) => Ty::Bool,
            ExprKind::Null => Ty::Null,
            ExprKind::This => {
                if self.ctx.is_static {
                    return Err(CompileError::unlocated("'this' is not available in a static method"));
                }
                Ty::named(self.reg.ty(self.ctx.ty).name.clone())
            }
            ExprKind::Ident(name) => {
                let r = self.resolve_name(name)?;
                self.name_ty(&r)
            }
            ExprKind::Field(name) => {
                let r = self.resolve_at_field(name)?;
                self.name_ty(&r)
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                let l = self.infer(lhs)?;
                let r = self.infer(rhs)?;
                match op {
                    BinOp::And | BinOp::Or => {
                        if l != Ty::Bool || r != Ty::Bool {
                            return Err(operator_error(*op, &l, &r));
                        }
                        Ty::Bool
                    }
                    _ => self.plan_binary(*op, &l, &r)?.result,
                }
            }
            ExprKind::UnaryOp { op, operand } => {
                let t = self.infer(operand)?;
                match op {
                    UnaryOp::Neg | UnaryOp::Plus if t.is_numeric() => t,
                    UnaryOp::Not if t == Ty::Bool => t,
                    _ => {
                        let symbol = match op {
                            UnaryOp::Neg => "-",
                            UnaryOp::Plus => "+",
                            UnaryOp::Not => "not",
                        };
                        return Err(CompileError::unlocated(format!("operator '{symbol}' cannot be applied to '{t}'")));
                    }
                }
            }
            ExprKind::Member { object, name } => self.resolve_member(object, name)?.1,
            ExprKind::Call { name, args } => {
                let arg_tys = self.infer_all(args)?;
                let id = self.resolve_call(&name.node, &arg_tys).map_err(|err| err.with_span_if_missing(name.span))?;
                self.calls.insert(e.node.id, id);
                self.reg.method(id).ret.clone()
            }
            ExprKind::MethodCall { object, method, args } => {
                let arg_tys = self.infer_all(args)?;
                let id = self
                    .resolve_method_call(object, &method.node, &arg_tys)
                    .map_err(|err| err.with_span_if_missing(method.span))?;
                self.calls.insert(e.node.id, id);
                self.reg.method(id).ret.clone()
            }
            ExprKind::Index { object, index } => {
                let obj = self.infer(object)?;
                let idx = self.infer(index)?;
                match obj {
                    Ty::Array(elem) => {
                        if idx != Ty::Int {
                            return Err(CompileError::unlocated(format!("array index must be 'int', found '{idx}'")));
                        }
                        *elem
                    }
                    Ty::Dict(key, value) => {
                        if !self.reg.assignable(&key, &idx) {
                            return Err(CompileError::unlocated(format!(
                                "dictionary key must be '{key}', found '{idx}'"
                            )));
                        }
                        *value
                    }
                    other => return Err(CompileError::unlocated(format!("type '{other}' cannot be indexed"))),
                }
            }
            ExprKind::Range { from, to } => {
                let a = self.infer(from)?;
                let b = self.infer(to)?;
                if a != Ty::Int || b != Ty::Int {
                    return Err(CompileError::unlocated(format!("range bounds must be 'int', found '{a}' and '{b}'")));
                }
                Ty::named(RANGE)
            }
            ExprKind::New { ty, args } => {
                let tid = self
                    .reg
                    .lookup(&ty.node)
                    .ok_or_else(|| CompileError::semantic(format!("unknown type '{}'", ty.node), ty.span))?;
                if self.reg.ty(tid).kind == TypeKind::Enum {
                    return Err(CompileError::semantic(
                        format!("enum '{}' cannot be constructed with 'new'", ty.node),
                        ty.span,
                    ));
                }
                let arg_tys = self.infer_all(args)?;
                let ctor = self.reg.resolve_ctor(tid, &arg_tys, Some(self.ctx.ty))?;
                self.calls.insert(e.node.id, ctor);
                Ty::from_name(&ty.node)
            }
            ExprKind::NewArray { elem, size } => {
                self.reg.require_known(&elem.node, elem.span)?;
                let n = self.infer(size)?;
                if n != Ty::Int {
                    return Err(CompileError::semantic(format!("array size must be 'int', found '{n}'"), size.span));
                }
                Ty::array_of(elem.node.clone())
            }
            ExprKind::NewDict { ty } => {
                self.reg.require_known(&ty.node, ty.span)?;
                if !matches!(ty.node, Ty::Dict(..)) {
                    return Err(CompileError::semantic(format!("'{}' is not a dictionary type", ty.node), ty.span));
                }
                ty.node.clone()
            }
            ExprKind::ArrayLit(items) => {
                let elem = self.unify_all(items, "array literal")?;
                Ty::array_of(elem)
            }
            ExprKind::DictLit(pairs) => {
                let keys: Vec<Spanned<Expr>> = pairs.iter().map(|(k, _)| k.clone()).collect();
                let values: Vec<Spanned<Expr>> = pairs.iter().map(|(_, v)| v.clone()).collect();
                let k = self.unify_all(&keys, "dictionary keys")?;
                let v = self.unify_all(&values, "dictionary values")?;
                Ty::dict_of(k, v)
            }
        })
    }

    /// Common type of a non-empty list of expressions.
    fn unify_all(&mut self, items: &[Spanned<Expr>], what: &str) -> Result<Ty, CompileError> {
        let mut common: Option<Ty> = None;
        for item in items {
            let t = self.infer(item)?;
            common = Some(match common {
                None => t,
                Some(c) => self.unify(&c, &t).ok_or_else(|| {
                    CompileError::semantic(format!("{what} mixes '{c}' and '{t}'"), item.span)
                })?,
            });
        }
        match common {
            Some(Ty::Null) | None => Err(CompileError::unlocated(format!("cannot infer the element type of empty or null {what}"))),
            Some(t) => Ok(t),
        }
    }

    fn unify(&self, a: &Ty, b: &Ty) -> Option<Ty> {
        if a == b {
            return Some(a.clone());
        }
        if let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) {
            if mixes_long_and_complex(a, b) {
                return None;
            }
            return Some(if ra >= rb { a.clone() } else { b.clone() });
        }
        if self.reg.assignable(a, b) {
            Some(a.clone())
        } else if self.reg.assignable(b, a) {
            Some(b.clone())
        } else {
            None
        }
    }

    // ---- names ----

    pub(super) fn resolve_name(&self, name: &str) -> Result<NameRef, CompileError> {
        if let Some(b) = self.ctx.scope.lookup(name) {
            return Ok(NameRef::Slot(b.slot, b.ty.clone()));
        }
        if let Some(f) = self.reg.find_field(self.ctx.ty, name) {
            return self.own_field(f);
        }
        if let Some(f) = self.program_static_field(name) {
            return Ok(NameRef::StaticField(f));
        }
        Err(CompileError::unlocated(format!("unknown identifier '{name}'")))
    }

    pub(super) fn resolve_at_field(&self, name: &str) -> Result<NameRef, CompileError> {
        match self.reg.find_field(self.ctx.ty, name) {
            Some(f) => self.own_field(f),
            None => Err(CompileError::unlocated(format!(
                "type '{}' has no field '{name}'",
                self.reg.ty(self.ctx.ty).name
            ))),
        }
    }

    fn own_field(&self, f: FieldId) -> Result<NameRef, CompileError> {
        let field = self.reg.field(f);
        if field.is_private && field.owner != self.ctx.ty {
            return Err(CompileError::unlocated(format!(
                "field '{}.{}' is private",
                self.reg.ty(field.owner).name,
                field.name
            )));
        }
        if field.is_static {
            Ok(NameRef::StaticField(f))
        } else if self.ctx.is_static {
            Err(CompileError::unlocated(format!(
                "instance field '{}' cannot be used in a static method",
                field.name
            )))
        } else {
            Ok(NameRef::Field(f))
        }
    }

    /// Static fields of `$Program` are visible from every type.
    fn program_static_field(&self, name: &str) -> Option<FieldId> {
        let program = self.reg.lookup(PROGRAM_TYPE)?;
        if program == self.ctx.ty {
            return None;
        }
        self.reg.find_field(program, name).filter(|f| self.reg.field(*f).is_static)
    }

    pub(super) fn name_ty(&self, r: &NameRef) -> Ty {
        match r {
            NameRef::Slot(_, ty) => ty.clone(),
            NameRef::Field(f) | NameRef::StaticField(f) => self.reg.field(*f).ty.clone(),
        }
    }

    /// `object` names a type rather than a value: `Color.Red`, `Math.sqrt(x)`.
    pub(super) fn type_operand(&self, object: &Spanned<Expr>) -> Option<TypeId> {
        let ExprKind::Ident(name) = &object.node.kind else {
            return None;
        };
        let bound = self.ctx.scope.contains(name)
            || self.reg.find_field(self.ctx.ty, name).is_some()
            || self.program_static_field(name).is_some();
        if bound {
            return None;
        }
        self.reg.lookup(name)
    }

    pub(super) fn resolve_member(
        &mut self,
        object: &Spanned<Expr>,
        name: &Spanned<String>,
    ) -> Result<(MemberRef, Ty), CompileError> {
        let cur = self.ctx.ty;
        let at = |err: CompileError| err.with_span_if_missing(name.span);

        if let Some(tid) = self.type_operand(object) {
            let entry = self.reg.ty(tid);
            if entry.enum_values.contains(&name.node) {
                let ty = Ty::named(entry.name.clone());
                let q = Lookup::new(&name.node, &[], Some(cur)).statics(StaticFilter::StaticOnly);
                let factory = self.reg.resolve_method(tid, &q).map_err(at)?;
                return Ok((MemberRef::EnumValue(factory), ty));
            }
            let f = self.reg.resolve_field(tid, &name.node, Some(cur)).map_err(at)?;
            let field = self.reg.field(f);
            if !field.is_static {
                return Err(at(CompileError::unlocated(format!(
                    "field '{}.{}' is not static",
                    self.reg.ty(tid).name,
                    name.node
                ))));
            }
            return Ok((MemberRef::StaticField(f), field.ty.clone()));
        }

        let obj_ty = self.infer(object)?;
        match &obj_ty {
            Ty::Array(_) if name.node == "length" => return Ok((MemberRef::ArrayLength, Ty::Int)),
            Ty::Dict(..) if name.node == "length" => return Ok((MemberRef::DictLength, Ty::Int)),
            _ => {}
        }
        let tid = self.reg.entry_of(&obj_ty).ok_or_else(|| {
            at(CompileError::unlocated(format!("type '{obj_ty}' has no member '{}'", name.node)))
        })?;
        if self.reg.find_field(tid, &name.node).is_some() {
            let f = self.reg.resolve_field(tid, &name.node, Some(cur)).map_err(at)?;
            let field = self.reg.field(f);
            if field.is_static {
                return Err(at(CompileError::unlocated(format!(
                    "static field '{}.{}' must be accessed through its type",
                    self.reg.ty(field.owner).name,
                    name.node
                ))));
            }
            return Ok((MemberRef::Field(f), field.ty.clone()));
        }
        if obj_ty == Ty::String && name.node == "length" {
            let length = self.helper(STRING_HELPERS, "length", &[])?;
            return Ok((MemberRef::StringLength(length), Ty::Int));
        }
        Err(at(CompileError::unlocated(format!("type '{obj_ty}' has no field '{}'", name.node))))
    }

    // ---- calls ----

    /// Unqualified call: the current type and its ancestors, then the
    /// program's functions, then the static methods of used types.
    fn resolve_call(&self, name: &str, args: &[Ty]) -> Result<MethodId, CompileError> {
        let cur = self.ctx.ty;
        let q = Lookup::new(name, args, Some(cur));
        let mut res = self.reg.find_method(cur, &q);
        if res == Resolution::NotFound {
            if let Some(program) = self.reg.lookup(PROGRAM_TYPE).filter(|p| *p != cur) {
                res = self.reg.find_method(program, &q.statics(StaticFilter::StaticOnly));
            }
        }
        if res == Resolution::NotFound {
            res = self.reg.find_in_used(&q);
        }
        match res {
            Resolution::Found(id) => {
                if !self.reg.method(id).is_static && self.ctx.is_static {
                    return Err(CompileError::unlocated(format!(
                        "instance method '{}' cannot be called from a static method",
                        self.reg.describe_method(id)
                    )));
                }
                Ok(id)
            }
            Resolution::Ambiguous(a, b) => Err(CompileError::unlocated(format!(
                "ambiguous call to '{name}': {} and {}",
                self.reg.describe_method(a),
                self.reg.describe_method(b)
            ))),
            Resolution::NotFound => Err(CompileError::unlocated(format!(
                "no function '{name}' accepting ({})",
                crate::registry::ty::format_params(args)
            ))),
        }
    }

    fn resolve_method_call(&mut self, object: &Spanned<Expr>, name: &str, args: &[Ty]) -> Result<MethodId, CompileError> {
        let cur = Some(self.ctx.ty);
        if let Some(tid) = self.type_operand(object) {
            let q = Lookup::new(name, args, cur).statics(StaticFilter::StaticOnly);
            return self.reg.resolve_method(tid, &q);
        }
        let obj_ty = self.infer(object)?;
        let tid = self
            .reg
            .entry_of(&obj_ty)
            .ok_or_else(|| CompileError::unlocated(format!("type '{obj_ty}' has no method '{name}'")))?;
        let q = Lookup::new(name, args, cur).statics(StaticFilter::InstanceOnly);
        self.reg.resolve_method(tid, &q)
    }

    fn resolved_call(&self, e: &Spanned<Expr>) -> Result<MethodId, CompileError> {
        self.calls
            .get(&e.node.id)
            .copied()
            .ok_or_else(|| CompileError::semantic("call was not resolved before emission", e.span))
    }

    /// Receiver (for instance methods), converted arguments, then the call.
    pub(super) fn emit_invoke(
        &mut self,
        mid: MethodId,
        receiver: Receiver<'_>,
        args: &[Spanned<Expr>],
    ) -> Result<(), CompileError> {
        let is_static = self.reg.method(mid).is_static;
        if !is_static && !self.reg.method(mid).is_ctor() {
            match receiver {
                Receiver::Static => {}
                Receiver::This => self.emit(Instr::LdArg(0)),
                Receiver::Expr(object) => {
                    self.emit_expr(object)?;
                }
            }
        }
        let params = self.reg.method(mid).param_types();
        for (arg, param) in args.iter().zip(&params) {
            let t = self.emit_expr(arg)?;
            self.convert(&t, param).map_err(|err| err.with_span_if_missing(arg.span))?;
        }
        let instr = self.call_instr(mid)?;
        self.emit(instr);
        Ok(())
    }

    // ---- emission ----

    pub(super) fn emit_expr(&mut self, e: &Spanned<Expr>) -> Result<Ty, CompileError> {
        let ty = self.infer(e)?;
        self.emit_kind(e, &ty).map_err(|err| err.with_span_if_missing(e.span))?;
        Ok(ty)
    }

    /// Emit `e` and widen it to `to`.
    pub(super) fn emit_expr_as(&mut self, e: &Spanned<Expr>, to: &Ty) -> Result<(), CompileError> {
        let from = self.emit_expr(e)?;
        self.convert(&from, to).map_err(|err| err.with_span_if_missing(e.span))
    }

    pub(super) fn load_name(&mut self, r: &NameRef) -> Result<(), CompileError> {
        match r {
            NameRef::Slot(slot, _) => self.load_slot(*slot),
            NameRef::Field(f) => {
                let fr = self.field_ref(*f)?;
                self.emit(Instr::LdArg(0));
                self.emit(Instr::LdFld(fr));
            }
            NameRef::StaticField(f) => {
                let fr = self.field_ref(*f)?;
                self.emit(Instr::LdSFld(fr));
            }
        }
        Ok(())
    }

    fn emit_kind(&mut self, e: &Spanned<Expr>, ty: &Ty) -> Result<(), CompileError> {
        match &e.node.kind {
            ExprKind::IntLit(v) => self.emit(Instr::LdcI4(*v)),
            ExprKind::LongLit(v) => self.emit(Instr::LdcI8(*v)),
            ExprKind::FloatLit(v) => self.emit(Instr::LdcR8(*v)),
            ExprKind::ImaginaryLit(v) => {
                let ctor = self.complex_ctor()?;
                self.emit(Instr::LdcR8(0.0));
                self.emit(Instr::LdcR8(*v));
                self.emit(Instr::NewObj(ctor));
            }
            ExprKind::StringLit(s) => self.emit(Instr::LdStr(s.clone())),
            ExprKind::BoolLit(b) => self.emit(Instr::LdcI4(i32::from(*b))),
            ExprKind::Null => self.emit(Instr::LdNull),
            ExprKind::This => self.emit(Instr::LdArg(0)),
            ExprKind::Ident(name) => {
                let r = self.resolve_name(name)?;
                self.load_name(&r)?;
            }
            ExprKind::Field(name) => {
                let r = self.resolve_at_field(name)?;
                self.load_name(&r)?;
            }
            ExprKind::BinOp { op: BinOp::And, lhs, rhs } => self.emit_logical(true, lhs, rhs)?,
            ExprKind::BinOp { op: BinOp::Or, lhs, rhs } => self.emit_logical(false, lhs, rhs)?,
            ExprKind::BinOp { op, lhs, rhs } => {
                let l = self.infer(lhs)?;
                let r = self.infer(rhs)?;
                let plan = self.plan_binary(*op, &l, &r)?;
                self.emit_plan(&plan, Operand::Expr(lhs), Operand::Expr(rhs))?;
            }
            ExprKind::UnaryOp { op, operand } => {
                self.emit_expr(operand)?;
                match op {
                    UnaryOp::Plus => {}
                    UnaryOp::Neg if *ty == Ty::Complex => {
                        let neg = self.helper(crate::stdlib::COMPLEX_HELPERS, "op_neg", &[Ty::Complex])?;
                        let instr = self.call_instr(neg)?;
                        self.emit(instr);
                    }
                    UnaryOp::Neg => self.emit(Instr::Neg),
                    UnaryOp::Not => {
                        self.emit(Instr::LdcI4(0));
                        self.emit(Instr::Ceq);
                    }
                }
            }
            ExprKind::Member { object, name } => {
                let (member, _) = self.resolve_member(object, name)?;
                match member {
                    MemberRef::StaticField(f) => {
                        let fr = self.field_ref(f)?;
                        self.emit(Instr::LdSFld(fr));
                    }
                    MemberRef::EnumValue(factory) => {
                        let instr = self.call_instr(factory)?;
                        self.emit(instr);
                    }
                    MemberRef::Field(f) => {
                        self.emit_expr(object)?;
                        let fr = self.field_ref(f)?;
                        self.emit(Instr::LdFld(fr));
                    }
                    MemberRef::ArrayLength => {
                        self.emit_expr(object)?;
                        self.emit(Instr::LdLen);
                    }
                    MemberRef::DictLength => {
                        self.emit_expr(object)?;
                        self.emit(Instr::Call(MethodRef::External(handles::DICT_COUNT.into())));
                    }
                    MemberRef::StringLength(length) => {
                        self.emit_expr(object)?;
                        let instr = self.call_instr(length)?;
                        self.emit(instr);
                    }
                }
            }
            ExprKind::Call { args, .. } => {
                let mid = self.resolved_call(e)?;
                self.emit_invoke(mid, Receiver::This, args)?;
            }
            ExprKind::MethodCall { object, args, .. } => {
                let mid = self.resolved_call(e)?;
                let receiver = if self.type_operand(object).is_some() { Receiver::Static } else { Receiver::Expr(object) };
                self.emit_invoke(mid, receiver, args)?;
            }
            ExprKind::Index { object, index } => {
                let obj = self.emit_expr(object)?;
                match obj {
                    Ty::Dict(key, _) => {
                        self.emit_expr_as(index, &key)?;
                        self.emit(Instr::Call(MethodRef::External(handles::DICT_GET.into())));
                    }
                    _ => {
                        self.emit_expr(index)?;
                        self.emit(Instr::LdElem);
                    }
                }
            }
            ExprKind::Range { from, to } => {
                self.emit_expr(from)?;
                self.emit_expr(to)?;
                let range = self
                    .reg
                    .lookup(RANGE)
                    .ok_or_else(|| CompileError::unlocated("runtime type 'range' is not installed"))?;
                let ctor = self.reg.resolve_ctor(range, &[Ty::Int, Ty::Int], None)?;
                let r = self.method_ref(ctor)?;
                self.emit(Instr::NewObj(r));
            }
            ExprKind::New { args, .. } => {
                let ctor = self.resolved_call(e)?;
                self.emit_invoke(ctor, Receiver::Static, args)?;
            }
            ExprKind::NewArray { elem, size } => {
                self.emit_expr(size)?;
                self.emit(Instr::NewArr(elem.node.to_string()));
            }
            ExprKind::NewDict { .. } => {
                self.emit(Instr::NewObj(MethodRef::External(handles::DICT_NEW.into())));
            }
            ExprKind::ArrayLit(items) => {
                let Ty::Array(elem) = ty else {
                    return Err(CompileError::unlocated(format!("array literal typed as '{ty}'")));
                };
                self.emit_array_literal(elem, items)?;
            }
            ExprKind::DictLit(pairs) => {
                let Ty::Dict(key, value) = ty else {
                    return Err(CompileError::unlocated(format!("dictionary literal typed as '{ty}'")));
                };
                self.emit(Instr::NewObj(MethodRef::External(handles::DICT_NEW.into())));
                for (k, v) in pairs {
                    self.emit(Instr::Dup);
                    self.emit_expr_as(k, key)?;
                    self.emit_expr_as(v, value)?;
                    self.emit(Instr::Call(MethodRef::External(handles::DICT_SET.into())));
                }
            }
        }
        Ok(())
    }

    pub(super) fn emit_array_literal(&mut self, elem: &Ty, items: &[Spanned<Expr>]) -> Result<(), CompileError> {
        self.emit(Instr::LdcI4(items.len() as i32));
        self.emit(Instr::NewArr(elem.to_string()));
        for (i, item) in items.iter().enumerate() {
            self.emit(Instr::Dup);
            self.emit(Instr::LdcI4(i as i32));
            self.emit_expr_as(item, elem)?;
            self.emit(Instr::StElem);
        }
        Ok(())
    }

    fn complex_ctor(&self) -> Result<MethodRef, CompileError> {
        let complex = self
            .reg
            .lookup(crate::stdlib::COMPLEX_HELPERS)
            .ok_or_else(|| CompileError::unlocated("runtime type 'complex' is not installed"))?;
        let ctor = self.reg.resolve_ctor(complex, &[Ty::Float, Ty::Float], None)?;
        self.method_ref(ctor)
    }

    /// Short-circuit `and` (`is_and`) or `or`.
    fn emit_logical(&mut self, is_and: bool, lhs: &Spanned<Expr>, rhs: &Spanned<Expr>) -> Result<(), CompileError> {
        let short = self.new_label();
        let end = self.new_label();
        self.emit_expr(lhs)?;
        self.emit(if is_and { Instr::BrFalse(short) } else { Instr::BrTrue(short) });
        self.emit_expr(rhs)?;
        self.emit(Instr::Br(end));
        self.emit(Instr::Mark(short));
        self.emit(Instr::LdcI4(i32::from(!is_and)));
        self.emit(Instr::Mark(end));
        Ok(())
    }
}

pub(super) fn mixes_long_and_complex(a: &Ty, b: &Ty) -> bool {
    matches!((a, b), (Ty::Long, Ty::Complex) | (Ty::Complex, Ty::Long))
}

pub(super) fn operator_error(op: BinOp, l: &Ty, r: &Ty) -> CompileError {
    CompileError::unlocated(format!("operator '{}' cannot be applied to '{l}' and '{r}'", op.symbol()))
}
