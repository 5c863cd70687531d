//! Code generation: lowers every user type in the registry to a
//! [`TargetModule`].
//!
//! Generation runs in two passes. `prepare_type` lays out each type's
//! fields and method shells so that every member has a stable reference
//! before any body is compiled; bodies are then compiled one method at a
//! time inside a [`MethodContext`]. Closure carriers are created on demand
//! while their enclosing method is being compiled.

mod deferred;
mod expr;
mod ops;
mod stmt;
mod synth;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::diagnostics::CompileError;
use crate::parser::ast::NodeId;
use crate::registry::{
    Binding, FieldId, MethodBody, MethodId, Registry, Scope, Slot, Ty, TypeId, TypeKind, ARGS_FIELD,
    ENTRY_POINT, PROGRAM_TYPE,
};
use crate::span::{Span, Spanned};
use crate::target::{FieldDef, FieldRef, Instr, Label, LocalDef, MethodDef, MethodRef, ParamDef, TargetModule, TypeDef};

/// Compile every user type, enum and `$Program` member in `registry`.
pub fn generate(registry: &mut Registry, module_name: &str) -> Result<TargetModule, CompileError> {
    generate_counted(registry, module_name).map(|(module, _)| module)
}

/// Scope frames opened and closed across every compiled method body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeTally {
    pub entered: usize,
    pub left: usize,
}

fn generate_counted(registry: &mut Registry, module_name: &str) -> Result<(TargetModule, ScopeTally), CompileError> {
    let mut cg = CodeGen::new(registry, module_name);
    let ids: Vec<TypeId> = cg
        .reg
        .type_ids()
        .filter(|id| matches!(cg.reg.ty(*id).kind, TypeKind::User | TypeKind::Enum))
        .collect();

    for id in &ids {
        cg.check_declared_types(*id)?;
        cg.prepare_type(*id);
    }
    for id in &ids {
        let methods = cg.reg.ty(*id).methods.clone();
        for mid in methods {
            cg.compile_method(mid)?;
        }
    }

    if let Some(program) = cg.reg.lookup(PROGRAM_TYPE) {
        let main = cg
            .reg
            .ty(program)
            .methods_named(ENTRY_POINT)
            .iter()
            .copied()
            .find(|m| cg.reg.method(*m).is_static && cg.reg.method(*m).params.is_empty());
        if let Some(main) = main {
            cg.module.entry_point = Some(cg.method_ref(main)?);
        }
        if let Some(args) = cg.reg.find_field(program, ARGS_FIELD) {
            cg.module.args_field = Some(cg.field_ref(args)?);
        }
    }

    let methods: usize = cg.module.types.iter().map(|t| t.methods.len()).sum();
    info!(
        module = module_name,
        types = cg.module.types.len(),
        methods,
        carriers = cg.carriers,
        scopes = cg.scopes.entered,
        "generated module"
    );
    Ok((cg.module, cg.scopes))
}

#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    /// Target of `break`.
    exit: Label,
    /// Target of `redo`: the start of the body, after the element fetch.
    body: Label,
}

/// State of the method currently being compiled.
struct MethodContext {
    ty: TypeId,
    /// `Type.method`, for diagnostics.
    label: String,
    is_static: bool,
    ret: Ty,
    scope: Scope,
    locals: Vec<LocalDef>,
    body: Vec<Instr>,
    next_label: u32,
    loops: Vec<LoopLabels>,
}

impl MethodContext {
    fn new(ty: TypeId, label: String, is_static: bool, ret: Ty) -> Self {
        Self {
            ty,
            label,
            is_static,
            ret,
            scope: Scope::new(),
            locals: Vec::new(),
            body: Vec::new(),
            next_label: 0,
            loops: Vec::new(),
        }
    }
}

pub(crate) struct CodeGen<'r> {
    reg: &'r mut Registry,
    module: TargetModule,
    /// Inferred expression types.
    types: FxHashMap<NodeId, Ty>,
    /// Resolved targets of calls and `new` expressions.
    calls: FxHashMap<NodeId, MethodId>,
    method_refs: FxHashMap<MethodId, MethodRef>,
    field_refs: FxHashMap<FieldId, FieldRef>,
    carriers: u32,
    scopes: ScopeTally,
    ctx: MethodContext,
}

impl<'r> CodeGen<'r> {
    fn new(reg: &'r mut Registry, module_name: &str) -> Self {
        let ctx = MethodContext::new(TypeId(0), String::new(), true, Ty::Void);
        Self {
            reg,
            module: TargetModule::new(module_name),
            types: FxHashMap::default(),
            calls: FxHashMap::default(),
            method_refs: FxHashMap::default(),
            field_refs: FxHashMap::default(),
            carriers: 0,
            scopes: ScopeTally::default(),
            ctx,
        }
    }

    /// Every field, parameter and return type named in a declaration exists.
    fn check_declared_types(&self, id: TypeId) -> Result<(), CompileError> {
        let entry = self.reg.ty(id);
        let fallback = entry.span.unwrap_or_else(Span::dummy);
        for f in &entry.fields {
            let field = self.reg.field(*f);
            self.reg.require_known(&field.ty, field.span.unwrap_or(fallback))?;
        }
        for m in &entry.methods {
            let method = self.reg.method(*m);
            let span = method.span.unwrap_or(fallback);
            self.reg.require_known(&method.ret, span)?;
            for p in &method.params {
                self.reg.require_known(&p.ty, span)?;
            }
        }
        Ok(())
    }

    /// Lay out `id` in the module and assign references to its members.
    fn prepare_type(&mut self, id: TypeId) -> usize {
        let slot = self.module.types.len();
        let entry = self.reg.ty(id);
        let mut def = TypeDef { name: entry.name.clone(), parent: entry.parent.clone(), fields: Vec::new(), methods: Vec::new() };

        for (i, fid) in entry.fields.iter().enumerate() {
            let f = self.reg.field(*fid);
            def.fields.push(FieldDef {
                name: f.name.clone(),
                ty: f.ty.to_string(),
                is_static: f.is_static,
                is_private: f.is_private,
            });
            self.field_refs.insert(*fid, FieldRef::Defined { ty: slot, field: i });
        }
        for (i, mid) in entry.methods.iter().enumerate() {
            let m = self.reg.method(*mid);
            def.methods.push(MethodDef {
                name: m.name.clone(),
                params: m.params.iter().map(|p| ParamDef { name: p.name.clone(), ty: p.ty.to_string() }).collect(),
                ret: m.ret.to_string(),
                is_static: m.is_static,
                is_ctor: m.is_ctor(),
                is_virtual: m.is_virtual,
                is_private: m.is_private,
                locals: Vec::new(),
                body: Vec::new(),
            });
            self.method_refs.insert(*mid, MethodRef::Defined { ty: slot, method: i });
        }
        debug!(ty = %def.name, fields = def.fields.len(), methods = def.methods.len(), "prepared type");
        self.module.add_type(def)
    }

    fn compile_method(&mut self, mid: MethodId) -> Result<(), CompileError> {
        let body = self.reg.method(mid).body.clone();
        match body {
            MethodBody::User(block) => self.compile_user_method(mid, &block),
            MethodBody::Synthesized(kind) => self.compile_synthesized(mid, kind),
            MethodBody::Deferred | MethodBody::External => Ok(()),
        }
    }

    /// Swap in a fresh context for `mid`, with its parameters in scope.
    fn enter_method(&mut self, mid: MethodId) -> Result<MethodContext, CompileError> {
        let m = self.reg.method(mid);
        let label = format!("{}.{}", self.reg.ty(m.owner).name, m.name);
        let mut ctx = MethodContext::new(m.owner, label, m.is_static, m.ret.clone());
        ctx.scope.push();
        let offset = if m.is_static { 0 } else { 1 };
        for (i, p) in m.params.iter().enumerate() {
            let binding = Binding { ty: p.ty.clone(), slot: Slot::Arg((i + offset) as u16) };
            ctx.scope.declare(&p.name, binding).map_err(|e| match m.span {
                Some(span) => e.with_span_if_missing(span),
                None => e,
            })?;
        }
        Ok(std::mem::replace(&mut self.ctx, ctx))
    }

    /// Store the finished body of `mid` and restore the outer context.
    /// Every block scope opened while compiling the body must be closed.
    fn leave_method(&mut self, mid: MethodId, outer: MethodContext) -> Result<(), CompileError> {
        let mut done = std::mem::replace(&mut self.ctx, outer);
        done.scope.pop();
        let (pushed, popped) = done.scope.tally();
        self.scopes.entered += pushed;
        self.scopes.left += popped;
        if !done.scope.is_balanced() {
            return Err(CompileError::unlocated(format!(
                "internal error: unbalanced scopes in '{}' ({pushed} opened, {popped} closed)",
                done.label
            )));
        }
        if let Some(MethodRef::Defined { ty, method }) = self.method_refs.get(&mid) {
            let def = &mut self.module.types[*ty].methods[*method];
            def.locals = done.locals;
            def.body = done.body;
        }
        Ok(())
    }

    fn compile_user_method(&mut self, mid: MethodId, block: &Spanned<crate::parser::ast::Block>) -> Result<(), CompileError> {
        let outer = self.enter_method(mid)?;
        let result = self.user_method_body(mid, block);
        let left = self.leave_method(mid, outer);
        result.and(left)
    }

    fn user_method_body(&mut self, mid: MethodId, block: &Spanned<crate::parser::ast::Block>) -> Result<(), CompileError> {
        let (is_ctor, span) = {
            let m = self.reg.method(mid);
            (m.is_ctor(), m.span.unwrap_or(block.span))
        };
        if is_ctor {
            self.emit_parent_ctor_call(span)?;
        }
        let returns = self.compile_block(block)?;
        if !returns {
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

    /// `ldarg 0; call Parent::new()` at the start of a constructor.
    fn emit_parent_ctor_call(&mut self, span: Span) -> Result<(), CompileError> {
        let Some(parent) = self.reg.parent_of(self.ctx.ty) else {
            return Ok(());
        };
        let ctor = self.reg.find_ctor(parent, &[], Some(self.ctx.ty)).found().ok_or_else(|| {
            CompileError::semantic(
                format!(
                    "parent type '{}' of '{}' has no accessible constructor without arguments",
                    self.reg.ty(parent).name,
                    self.reg.ty(self.ctx.ty).name
                ),
                span,
            )
        })?;
        self.emit(Instr::LdArg(0));
        let r = self.method_ref(ctor)?;
        self.emit(Instr::Call(r));
        Ok(())
    }

    // ---- emission helpers ----

    fn emit(&mut self, instr: Instr) {
        self.ctx.body.push(instr);
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.ctx.next_label);
        self.ctx.next_label += 1;
        label
    }

    /// An unnamed local for intermediate values.
    fn temp(&mut self, ty: &Ty) -> u16 {
        self.ctx.locals.push(LocalDef { name: None, ty: ty.to_string() });
        (self.ctx.locals.len() - 1) as u16
    }

    fn declare_local(&mut self, name: &Spanned<String>, ty: Ty) -> Result<u16, CompileError> {
        let index = self.ctx.locals.len() as u16;
        self.ctx
            .scope
            .declare(&name.node, Binding { ty: ty.clone(), slot: Slot::Local(index) })
            .map_err(|e| e.with_span_if_missing(name.span))?;
        self.ctx.locals.push(LocalDef { name: Some(name.node.clone()), ty: ty.to_string() });
        Ok(index)
    }

    fn load_slot(&mut self, slot: Slot) {
        match slot {
            Slot::Arg(i) => self.emit(Instr::LdArg(i)),
            Slot::Local(i) => self.emit(Instr::LdLoc(i)),
        }
    }

    fn store_slot(&mut self, slot: Slot) {
        match slot {
            Slot::Arg(i) => self.emit(Instr::StArg(i)),
            Slot::Local(i) => self.emit(Instr::StLoc(i)),
        }
    }

    fn method_ref(&self, mid: MethodId) -> Result<MethodRef, CompileError> {
        if let Some(r) = self.method_refs.get(&mid) {
            return Ok(r.clone());
        }
        match &self.reg.method(mid).handle {
            Some(handle) => Ok(MethodRef::External(handle.clone())),
            None => Err(CompileError::unlocated(format!(
                "method '{}' has no compiled form",
                self.reg.describe_method(mid)
            ))),
        }
    }

    fn field_ref(&self, fid: FieldId) -> Result<FieldRef, CompileError> {
        if let Some(r) = self.field_refs.get(&fid) {
            return Ok(r.clone());
        }
        let f = self.reg.field(fid);
        match &f.handle {
            Some(handle) => Ok(FieldRef::External(handle.clone())),
            None => Err(CompileError::unlocated(format!(
                "field '{}.{}' has no compiled form",
                self.reg.ty(f.owner).name,
                f.name
            ))),
        }
    }

    /// `call` for static and non-virtual methods, `callvirt` otherwise,
    /// `newobj` for constructors.
    fn call_instr(&self, mid: MethodId) -> Result<Instr, CompileError> {
        let m = self.reg.method(mid);
        let r = self.method_ref(mid)?;
        Ok(if m.is_ctor() {
            Instr::NewObj(r)
        } else if m.is_virtual && !m.is_static {
            Instr::CallVirt(r)
        } else {
            Instr::Call(r)
        })
    }

    /// A runtime helper that must exist because the runtime library is
    /// installed before parsing.
    fn helper(&self, owner: &str, name: &str, args: &[Ty]) -> Result<MethodId, CompileError> {
        let id = self
            .reg
            .lookup(owner)
            .ok_or_else(|| CompileError::unlocated(format!("runtime type '{owner}' is not installed")))?;
        self.reg.resolve_method(id, &crate::registry::Lookup::new(name, args, None))
    }

    fn is_value_type(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Named(_) => self.reg.entry_of(ty).is_some_and(|id| self.reg.ty(id).is_value),
            other => other.is_value(),
        }
    }

    /// Widen the value on top of the stack from `from` to `to`.
    ///
    /// Operator plans widen along the full `int < long < float < complex`
    /// rank, so `long` reaches `float` here. Arguments and assignments are
    /// checked with [`Registry::assignable`] before they get this far.
    fn convert(&mut self, from: &Ty, to: &Ty) -> Result<(), CompileError> {
        if from == to {
            return Ok(());
        }
        match (from, to) {
            (Ty::Int, Ty::Long) => self.emit(Instr::ConvI8),
            (Ty::Int | Ty::Long, Ty::Float) => self.emit(Instr::ConvR8),
            (Ty::Int | Ty::Long, Ty::Complex) => {
                self.emit(Instr::ConvR8);
                self.promote_complex()?;
            }
            (Ty::Float, Ty::Complex) => self.promote_complex()?,
            _ if self.reg.assignable(to, from) => {}
            _ => return Err(CompileError::unlocated(format!("cannot convert '{from}' to '{to}'"))),
        }
        Ok(())
    }

    fn promote_complex(&mut self) -> Result<(), CompileError> {
        let from_float = self.helper(crate::stdlib::COMPLEX_HELPERS, "from_float", &[Ty::Float])?;
        let instr = self.call_instr(from_float)?;
        self.emit(instr);
        Ok(())
    }
}
