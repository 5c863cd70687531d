//! Default members added to source-level types once parsing is done.

use tracing::debug;

use super::{
    FieldEntry, MethodBody, MethodEntry, MethodKind, ParamEntry, Registry, Synth, Ty, TypeId, TypeKind,
    PROGRAM_TYPE,
};
use crate::diagnostics::CompileError;

pub const TO_STRING: &str = "to_s";
pub const EQUAL: &str = "equal";
pub const TO_ARRAY: &str = "to_array";
pub const ORDINAL_FIELD: &str = "ordinal";
pub const NAME_FIELD: &str = "name";

impl Registry {
    /// Add constructors, `to_s`, `equal` and enum members to every user type
    /// and enum. Idempotent: members that already exist are left alone.
    pub fn synthesize_members(&mut self) -> Result<(), CompileError> {
        self.validate_hierarchy()?;
        for id in self.type_ids() {
            let entry = self.ty(id);
            match entry.kind {
                TypeKind::User if entry.name != PROGRAM_TYPE => self.synthesize_user(id)?,
                TypeKind::Enum => self.synthesize_enum(id)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn synth_method(&mut self, owner: TypeId, mut method: MethodEntry) -> Result<(), CompileError> {
        method.span = self.ty(owner).span;
        debug!(ty = %self.ty(owner).name, member = %method.signature(), "synthesized member");
        self.add_method(owner, method)?;
        Ok(())
    }

    fn has_ctor_with(&self, id: TypeId, params: &[Ty]) -> bool {
        self.ty(id).methods.iter().any(|m| {
            let m = self.method(*m);
            m.kind == MethodKind::Constructor && m.has_params(params)
        })
    }

    fn synthesize_user(&mut self, id: TypeId) -> Result<(), CompileError> {
        let self_ty = Ty::named(self.ty(id).name.clone());
        let has_any_ctor = self.ty(id).methods.iter().any(|m| self.method(*m).is_ctor());
        if !has_any_ctor {
            self.synth_method(id, MethodEntry::constructor(vec![], MethodBody::Synthesized(Synth::DefaultCtor)))?;
        }

        if self.ty(id).autoconstruct {
            let params: Vec<ParamEntry> = self
                .ty(id)
                .fields
                .iter()
                .map(|f| self.field(*f))
                .filter(|f| !f.is_static)
                .map(|f| ParamEntry { name: f.name.clone(), ty: f.ty.clone() })
                .collect();
            let types: Vec<Ty> = params.iter().map(|p| p.ty.clone()).collect();
            if !self.has_ctor_with(id, &types) {
                self.synth_method(id, MethodEntry::constructor(params, MethodBody::Synthesized(Synth::AutoCtor)))?;
            }
        }

        if self.declared_in_user_chain(id, TO_STRING, &[]).is_none() {
            let mut to_s = MethodEntry::new(TO_STRING, vec![], Ty::String, MethodBody::Synthesized(Synth::ToString));
            to_s.is_virtual = true;
            self.synth_method(id, to_s)?;
        }

        let declares_equal = self
            .ty(id)
            .methods_named(EQUAL)
            .iter()
            .any(|m| self.method(*m).params.len() == 1 && !self.method(*m).is_static);
        if !declares_equal {
            let other = vec![ParamEntry { name: "other".to_string(), ty: self_ty }];
            self.synth_method(id, MethodEntry::new(EQUAL, other, Ty::Bool, MethodBody::Synthesized(Synth::Equal)))?;
        }
        Ok(())
    }

    fn synthesize_enum(&mut self, id: TypeId) -> Result<(), CompileError> {
        if self.find_field(id, ORDINAL_FIELD).is_some_and(|f| self.field(f).owner == id) {
            return Ok(());
        }
        let self_ty = Ty::named(self.ty(id).name.clone());
        self.add_field(id, FieldEntry::new(ORDINAL_FIELD, Ty::Int))?;
        self.add_field(id, FieldEntry::new(NAME_FIELD, Ty::String))?;

        let mut ctor = MethodEntry::constructor(vec![], MethodBody::Synthesized(Synth::EnumCtor));
        ctor.is_private = true;
        self.synth_method(id, ctor)?;

        let values = self.ty(id).enum_values.clone();
        for (ordinal, value) in values.iter().enumerate() {
            let mut factory = MethodEntry::new(
                value.clone(),
                vec![],
                self_ty.clone(),
                MethodBody::Synthesized(Synth::EnumFactory(ordinal as u32)),
            );
            factory.is_static = true;
            self.synth_method(id, factory)?;
        }

        let mut to_s = MethodEntry::new(TO_STRING, vec![], Ty::String, MethodBody::Synthesized(Synth::ToString));
        to_s.is_virtual = true;
        self.synth_method(id, to_s)?;

        let other = vec![ParamEntry { name: "other".to_string(), ty: self_ty.clone() }];
        self.synth_method(id, MethodEntry::new(EQUAL, other, Ty::Bool, MethodBody::Synthesized(Synth::Equal)))?;

        let mut to_array = MethodEntry::new(
            TO_ARRAY,
            vec![],
            Ty::array_of(self_ty),
            MethodBody::Synthesized(Synth::EnumToArray),
        );
        to_array.is_static = true;
        self.synth_method(id, to_array)
    }
}
