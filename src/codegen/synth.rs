//! Bodies of members the registry synthesized from a type's shape.

use super::ops::Operand;
use super::CodeGen;
use crate::diagnostics::CompileError;
use crate::registry::synth::{NAME_FIELD, ORDINAL_FIELD};
use crate::registry::{FieldId, Lookup, MethodId, StaticFilter, Synth, TypeId, TypeKind};
use crate::span::Span;
use crate::target::Instr;

impl CodeGen<'_> {
    pub(super) fn compile_synthesized(&mut self, mid: MethodId, kind: Synth) -> Result<(), CompileError> {
        let outer = self.enter_method(mid)?;
        let span = self.reg.method(mid).span.unwrap_or_else(Span::dummy);
        let result = self.synth_body(kind, span);
        let left = self.leave_method(mid, outer);
        result.and(left).map_err(|err| err.with_span_if_missing(span))
    }

    fn synth_body(&mut self, kind: Synth, span: Span) -> Result<(), CompileError> {
        let owner = self.ctx.ty;
        match kind {
            Synth::DefaultCtor | Synth::EnumCtor => {
                self.emit_parent_ctor_call(span)?;
            }
            Synth::AutoCtor => {
                self.emit_parent_ctor_call(span)?;
                let own: Vec<FieldId> = self
                    .reg
                    .ty(owner)
                    .fields
                    .iter()
                    .copied()
                    .filter(|f| !self.reg.field(*f).is_static)
                    .collect();
                for (i, f) in own.into_iter().enumerate() {
                    let fr = self.field_ref(f)?;
                    self.emit(Instr::LdArg(0));
                    self.emit(Instr::LdArg((i + 1) as u16));
                    self.emit(Instr::StFld(fr));
                }
            }
            Synth::ToString => {
                if self.reg.ty(owner).kind == TypeKind::Enum {
                    let name = self.enum_field(owner, NAME_FIELD)?;
                    self.emit(Instr::LdArg(0));
                    self.emit(Instr::LdFld(name));
                } else {
                    self.emit(Instr::LdStr(self.reg.ty(owner).name.clone()));
                }
            }
            Synth::Equal => self.structural_equal(owner)?,
            Synth::EnumFactory(ordinal) => {
                let ctor = self.reg.resolve_ctor(owner, &[], Some(owner))?;
                let ctor = self.method_ref(ctor)?;
                let ordinal_field = self.enum_field(owner, ORDINAL_FIELD)?;
                let name_field = self.enum_field(owner, NAME_FIELD)?;
                let value = self
                    .reg
                    .ty(owner)
                    .enum_values
                    .get(ordinal as usize)
                    .cloned()
                    .ok_or_else(|| CompileError::unlocated(format!("enum value {ordinal} is out of range")))?;
                self.emit(Instr::NewObj(ctor));
                self.emit(Instr::Dup);
                self.emit(Instr::LdcI4(ordinal as i32));
                self.emit(Instr::StFld(ordinal_field));
                self.emit(Instr::Dup);
                self.emit(Instr::LdStr(value));
                self.emit(Instr::StFld(name_field));
            }
            Synth::EnumToArray => {
                let values = self.reg.ty(owner).enum_values.clone();
                self.emit(Instr::LdcI4(values.len() as i32));
                self.emit(Instr::NewArr(self.reg.ty(owner).name.clone()));
                for (i, value) in values.iter().enumerate() {
                    let q = Lookup::new(value, &[], Some(owner)).statics(StaticFilter::StaticOnly);
                    let factory = self.reg.resolve_method(owner, &q)?;
                    let call = self.call_instr(factory)?;
                    self.emit(Instr::Dup);
                    self.emit(Instr::LdcI4(i as i32));
                    self.emit(call);
                    self.emit(Instr::StElem);
                }
            }
        }
        self.emit(Instr::Ret);
        Ok(())
    }

    fn enum_field(&self, owner: TypeId, name: &str) -> Result<crate::target::FieldRef, CompileError> {
        let f = self
            .reg
            .find_field(owner, name)
            .ok_or_else(|| CompileError::unlocated(format!("enum '{}' has no '{name}' field", self.reg.ty(owner).name)))?;
        self.field_ref(f)
    }

    /// `false` for `null`, otherwise every user-declared instance field
    /// compared with the field type's own equality. Enums compare ordinals.
    fn structural_equal(&mut self, owner: TypeId) -> Result<(), CompileError> {
        let differ = self.new_label();
        self.emit(Instr::LdArg(1));
        self.emit(Instr::LdNull);
        self.emit(Instr::Ceq);
        self.emit(Instr::BrTrue(differ));

        let fields: Vec<FieldId> = if self.reg.ty(owner).kind == TypeKind::Enum {
            self.reg.find_field(owner, ORDINAL_FIELD).into_iter().collect()
        } else {
            self.reg
                .instance_fields(owner)
                .into_iter()
                .filter(|f| matches!(self.reg.ty(self.reg.field(*f).owner).kind, TypeKind::User))
                .collect()
        };
        for f in fields {
            let ty = self.reg.field(f).ty.clone();
            let fr = self.field_ref(f)?;
            let plan = self.plan_binary(crate::parser::ast::BinOp::Eq, &ty, &ty)?;
            let mine = Operand::Loaded(vec![Instr::LdArg(0), Instr::LdFld(fr.clone())], ty.clone());
            let theirs = Operand::Loaded(vec![Instr::LdArg(1), Instr::LdFld(fr)], ty);
            self.emit_plan(&plan, mine, theirs)?;
            self.emit(Instr::BrFalse(differ));
        }
        self.emit(Instr::LdcI4(1));
        self.emit(Instr::Ret);
        self.emit(Instr::Mark(differ));
        self.emit(Instr::LdcI4(0));
        Ok(())
    }
}
