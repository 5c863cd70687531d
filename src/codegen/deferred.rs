//! Lowering of deferred code: `emit` and `simulate … planner`.
//!
//! A deferred body runs later, on the simulation's schedule, so it is
//! lifted into a carrier type deriving from `Emitter` or `Planner`. Each
//! captured local becomes a `$cap<i>` field, filled in right after the
//! carrier is constructed and copied back into a local of the same name
//! at the start of every lifted method.

use tracing::debug;

use super::CodeGen;
use crate::closures::{captures_in_block, captures_in_emit, Capture, CaptureContext};
use crate::diagnostics::CompileError;
use crate::parser::ast::{Block, EmitStmt, Expr};
use crate::registry::{
    FieldEntry, FieldId, Lookup, MethodBody, MethodEntry, MethodId, StaticFilter, Synth, Ty, TypeId, TypeKind,
    ROOT_TYPE,
};
use crate::span::{Span, Spanned};
use crate::stdlib::{DISTRIBUTION, EMITTER, PLANNER, SIMULATION};
use crate::target::Instr;

/// A carrier type and the members the enclosing method needs.
struct Carrier {
    id: TypeId,
    ctor: MethodId,
    fields: Vec<FieldId>,
}

impl CodeGen<'_> {
    fn capture_context(&self) -> CaptureContext<'_> {
        CaptureContext { registry: &*self.reg, scope: &self.ctx.scope, enclosing: self.ctx.ty }
    }

    /// Declare `$<Kind><n>` with one field per capture and a default
    /// constructor.
    fn declare_carrier(&mut self, kind: &str, parent: &str, captures: &[Capture], span: Span) -> Result<Carrier, CompileError> {
        let name = format!("${kind}{}", self.carriers);
        self.carriers += 1;
        let id = self.reg.declare_type(&name, Some(parent), TypeKind::Closure, Some(span))?;
        let mut fields = Vec::with_capacity(captures.len());
        for (i, cap) in captures.iter().enumerate() {
            let mut field = FieldEntry::new(format!("$cap{i}"), cap.ty.clone());
            field.span = Some(span);
            fields.push(self.reg.add_field(id, field)?);
        }
        let mut ctor = MethodEntry::constructor(vec![], MethodBody::Synthesized(Synth::DefaultCtor));
        ctor.span = Some(span);
        let ctor = self.reg.add_method(id, ctor)?;
        debug!(carrier = %name, parent, captures = captures.len(), "lifted deferred block");
        Ok(Carrier { id, ctor, fields })
    }

    fn add_deferred_method(&mut self, carrier: &Carrier, name: &str, ret: Ty, span: Span) -> Result<MethodId, CompileError> {
        let mut method = MethodEntry::new(name, vec![], ret, MethodBody::Deferred);
        method.is_virtual = true;
        method.span = Some(span);
        self.reg.add_method(carrier.id, method)
    }

    /// Compile one lifted method: the capture prologue, then `body`, which
    /// reports whether it always returns.
    fn compile_deferred<F>(&mut self, mid: MethodId, carrier: &Carrier, captures: &[Capture], span: Span, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<bool, CompileError>,
    {
        let outer = self.enter_method(mid)?;
        let result = self.deferred_body(carrier, captures, span, body);
        let left = self.leave_method(mid, outer);
        result.and(left)
    }

    fn deferred_body<F>(&mut self, carrier: &Carrier, captures: &[Capture], span: Span, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<bool, CompileError>,
    {
        for (cap, field) in captures.iter().zip(&carrier.fields) {
            let local = self.declare_local(&Spanned::new(cap.name.clone(), span), cap.ty.clone())?;
            let fr = self.field_ref(*field)?;
            self.emit(Instr::LdArg(0));
            self.emit(Instr::LdFld(fr));
            self.emit(Instr::StLoc(local));
        }
        if !body(self)? {
            if self.ctx.ret == Ty::Void {
                self.emit(Instr::Ret);
            } else {
                return Err(CompileError::semantic(
                    format!("not all code paths return a value in '{}'", self.ctx.label),
                    span,
                ));
            }
        }
        Ok(())
    }

    /// `newobj`, then `dup; ldloc; stfld` per capture: captured values are
    /// copied at construction time. Leaves the carrier on the stack.
    fn construct_carrier(&mut self, carrier: &Carrier, captures: &[Capture]) -> Result<(), CompileError> {
        let ctor = self.method_ref(carrier.ctor)?;
        self.emit(Instr::NewObj(ctor));
        for (cap, field) in captures.iter().zip(&carrier.fields) {
            let slot = self
                .ctx
                .scope
                .lookup(&cap.name)
                .map(|b| b.slot)
                .ok_or_else(|| CompileError::unlocated(format!("captured variable '{}' is not in scope", cap.name)))?;
            let fr = self.field_ref(*field)?;
            self.emit(Instr::Dup);
            self.load_slot(slot);
            self.emit(Instr::StFld(fr));
        }
        Ok(())
    }

    fn runtime_type(&self, name: &str) -> Result<TypeId, CompileError> {
        self.reg
            .lookup(name)
            .ok_or_else(|| CompileError::unlocated(format!("runtime type '{name}' is not installed")))
    }

    fn runtime_call(&mut self, owner: &str, name: &str, args: &[Ty], statics: StaticFilter) -> Result<(), CompileError> {
        let tid = self.runtime_type(owner)?;
        let mid = self.reg.resolve_method(tid, &Lookup::new(name, args, None).statics(statics))?;
        let instr = self.call_instr(mid)?;
        self.emit(instr);
        Ok(())
    }

    /// Emit `value` as a `float`, accepting any non-complex numeric.
    fn emit_float_operand(&mut self, value: &Spanned<Expr>, what: &str) -> Result<(), CompileError> {
        let t = self.infer(value)?;
        if !t.is_numeric() || t == Ty::Complex {
            return Err(CompileError::semantic(format!("{what} must be numeric, found '{t}'"), value.span));
        }
        self.emit_expr_as(value, &Ty::Float)
    }

    pub(super) fn compile_emit(&mut self, emit: &EmitStmt, span: Span) -> Result<(), CompileError> {
        let captures = captures_in_emit(self.capture_context(), emit)?;
        let carrier = self.declare_carrier("Emitter", EMITTER, &captures, span)?;
        let create = self.add_deferred_method(&carrier, "create", Ty::named(ROOT_TYPE), span)?;
        let condition = match &emit.until {
            Some(_) => Some(self.add_deferred_method(&carrier, "condition", Ty::Bool, span)?),
            None => None,
        };
        self.prepare_type(carrier.id);
        self.compile_method(carrier.ctor)?;

        let action = &emit.action;
        self.compile_deferred(create, &carrier, &captures, span, |cg| {
            let t = cg.emit_expr(action)?;
            if t == Ty::Void {
                return Err(CompileError::semantic("an emitted expression must produce a value", action.span));
            }
            cg.convert(&t, &Ty::named(ROOT_TYPE))?;
            cg.emit(Instr::Ret);
            Ok(true)
        })?;
        if let (Some(mid), Some(until)) = (condition, &emit.until) {
            self.compile_deferred(mid, &carrier, &captures, span, |cg| {
                let t = cg.infer(until)?;
                if t != Ty::Bool {
                    return Err(CompileError::semantic(format!("'until' condition must be 'bool', found '{t}'"), until.span));
                }
                cg.emit_expr(until)?;
                cg.emit(Instr::Ret);
                Ok(true)
            })?;
        }

        self.construct_carrier(&carrier, &captures)?;
        if let Some(every) = &emit.every {
            self.emit(Instr::Dup);
            self.emit_float_operand(every, "emit period")?;
            self.runtime_call(EMITTER, "set_period", &[Ty::Float], StaticFilter::InstanceOnly)?;
        }
        if let Some(dist) = &emit.distribution {
            let t = self.infer(dist)?;
            let expected = Ty::named(DISTRIBUTION);
            if !self.reg.assignable(&expected, &t) {
                return Err(CompileError::semantic(format!("emit distribution must be a '{expected}', found '{t}'"), dist.span));
            }
            self.emit(Instr::Dup);
            self.emit_expr_as(dist, &expected)?;
            self.runtime_call(EMITTER, "set_distribution", &[expected], StaticFilter::InstanceOnly)?;
        }
        if let Some(limit) = &emit.limit {
            let t = self.infer(limit)?;
            if t != Ty::Int {
                return Err(CompileError::semantic(format!("emit limit must be 'int', found '{t}'"), limit.span));
            }
            self.emit(Instr::Dup);
            self.emit_expr(limit)?;
            self.runtime_call(EMITTER, "set_limit", &[Ty::Int], StaticFilter::InstanceOnly)?;
        }
        self.runtime_call(SIMULATION, "register", &[Ty::named(EMITTER)], StaticFilter::StaticOnly)
    }

    pub(super) fn compile_simulate(
        &mut self,
        duration: Option<&Spanned<Expr>>,
        planner: Option<&Spanned<Block>>,
        span: Span,
    ) -> Result<(), CompileError> {
        let mut args = Vec::new();
        if let Some(duration) = duration {
            self.emit_float_operand(duration, "simulation duration")?;
            args.push(Ty::Float);
        }
        if let Some(block) = planner {
            let captures = captures_in_block(self.capture_context(), block)?;
            let carrier = self.declare_carrier("Planner", PLANNER, &captures, span)?;
            let plan = self.add_deferred_method(&carrier, "plan", Ty::Void, span)?;
            self.prepare_type(carrier.id);
            self.compile_method(carrier.ctor)?;
            self.compile_deferred(plan, &carrier, &captures, span, |cg| cg.compile_block(block))?;
            self.construct_carrier(&carrier, &captures)?;
            args.push(Ty::named(PLANNER));
        }
        self.runtime_call(SIMULATION, "run", &args, StaticFilter::StaticOnly)
    }
}
