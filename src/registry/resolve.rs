//! Type distance and overload resolution.

use tracing::trace;

use super::{FieldId, MethodId, MethodKind, Registry, Ty, TypeId, TypeKind};
use super::ty::format_params;
use crate::diagnostics::CompileError;

/// Outcome of an overload lookup. Absence is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(MethodId),
    NotFound,
    Ambiguous(MethodId, MethodId),
}

impl Resolution {
    pub fn found(self) -> Option<MethodId> {
        match self {
            Resolution::Found(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticFilter {
    Any,
    StaticOnly,
    InstanceOnly,
}

/// One method lookup: name, argument types, and the type whose code is
/// asking (private members are only visible from their owner).
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub name: &'a str,
    pub args: &'a [Ty],
    pub from: Option<TypeId>,
    pub statics: StaticFilter,
}

impl<'a> Lookup<'a> {
    pub fn new(name: &'a str, args: &'a [Ty], from: Option<TypeId>) -> Self {
        Self { name, args, from, statics: StaticFilter::Any }
    }

    pub fn statics(mut self, statics: StaticFilter) -> Self {
        self.statics = statics;
        self
    }
}

/// Distance on the numeric ladder, `None` when `arg` cannot widen to `param`.
fn numeric_distance(param: &Ty, arg: &Ty) -> Option<u32> {
    match (arg, param) {
        (Ty::Int, Ty::Int)
        | (Ty::Long, Ty::Long)
        | (Ty::Float, Ty::Float)
        | (Ty::Complex, Ty::Complex)
        | (Ty::Bool, Ty::Bool) => Some(0),
        (Ty::Int, Ty::Long) | (Ty::Int, Ty::Float) | (Ty::Float, Ty::Complex) => Some(1),
        (Ty::Int, Ty::Complex) => Some(2),
        _ => None,
    }
}

impl Registry {
    /// How far `arg` is from `param`: 0 for an exact match, larger for
    /// widening or upcasting, `None` when incompatible.
    pub fn distance(&self, param: &Ty, arg: &Ty) -> Option<u32> {
        if param == arg {
            return if *param == Ty::Null { None } else { Some(0) };
        }
        match (param, arg) {
            (Ty::Null, _) | (Ty::Void, _) | (_, Ty::Void) => None,
            (_, Ty::Null) => {
                let value = match param {
                    Ty::Named(name) => self.lookup(name).is_some_and(|id| self.ty(id).is_value),
                    other => other.is_value(),
                };
                if value { None } else { Some(0) }
            }
            (Ty::Array(_) | Ty::Dict(..), _) | (_, Ty::Array(_) | Ty::Dict(..)) => None,
            (Ty::Bool | Ty::Int | Ty::Long | Ty::Float | Ty::Complex, _) => numeric_distance(param, arg),
            (Ty::String | Ty::Named(_), _) => {
                let target = param.type_name()?;
                let start = self.entry_of(arg)?;
                self.ancestry(start)
                    .iter()
                    .position(|t| self.ty(*t).name == target)
                    .map(|hops| hops as u32)
            }
        }
    }

    /// True if a value of type `from` may be stored where `to` is expected.
    pub fn assignable(&self, to: &Ty, from: &Ty) -> bool {
        self.distance(to, from).is_some()
    }

    fn visible(&self, id: MethodId, from: Option<TypeId>) -> bool {
        let m = self.method(id);
        !m.is_private || from == Some(m.owner)
    }

    /// Pick the minimum-distance candidate. With `hide_shadowed`, candidates
    /// must be ordered from the most derived declaring type outward: a
    /// derived method hides an ancestor's method with the same parameters.
    fn select(&self, candidates: Vec<MethodId>, q: &Lookup, hide_shadowed: bool) -> Resolution {
        let mut seen: Vec<Vec<Ty>> = Vec::new();
        let mut best: Option<(u32, MethodId)> = None;
        let mut tie: Option<MethodId> = None;

        for id in candidates {
            let m = self.method(id);
            if hide_shadowed {
                let params = m.param_types();
                if seen.contains(&params) {
                    continue;
                }
                seen.push(params);
            }

            if m.params.len() != q.args.len() || !self.visible(id, q.from) {
                continue;
            }
            let statics_ok = match q.statics {
                StaticFilter::Any => true,
                StaticFilter::StaticOnly => m.is_static,
                StaticFilter::InstanceOnly => !m.is_static,
            };
            if !statics_ok {
                continue;
            }
            let total = m
                .params
                .iter()
                .zip(q.args)
                .map(|(p, a)| self.distance(&p.ty, a))
                .try_fold(0u32, |acc, d| d.map(|d| acc + d));
            let Some(total) = total else { continue };

            match best {
                None => best = Some((total, id)),
                Some((b, _)) if total < b => {
                    best = Some((total, id));
                    tie = None;
                }
                Some((b, _)) if total == b => {
                    if tie.is_none() {
                        tie = Some(id);
                    }
                }
                Some(_) => {}
            }
        }

        let result = match (best, tie) {
            (Some((_, a)), Some(b)) => Resolution::Ambiguous(a, b),
            (Some((_, a)), None) => Resolution::Found(a),
            (None, _) => Resolution::NotFound,
        };
        trace!(name = q.name, args = %format_params(q.args), ?result, "overload resolution");
        result
    }

    /// Methods named `q.name` on `ty` and its ancestors.
    pub fn find_method(&self, ty: TypeId, q: &Lookup) -> Resolution {
        let candidates: Vec<MethodId> = self
            .ancestry(ty)
            .into_iter()
            .flat_map(|t| self.ty(t).methods_named(q.name).to_vec())
            .filter(|id| self.method(*id).kind == MethodKind::Method)
            .collect();
        self.select(candidates, q, true)
    }

    /// Static methods of every `use`d type, resolved as one overload set.
    pub fn find_in_used(&self, q: &Lookup) -> Resolution {
        let candidates: Vec<MethodId> = self
            .used_types()
            .iter()
            .flat_map(|t| self.ty(*t).methods_named(q.name).to_vec())
            .filter(|id| self.method(*id).is_static && self.method(*id).kind == MethodKind::Method)
            .collect();
        self.select(candidates, &q.statics(StaticFilter::StaticOnly), false)
    }

    /// Constructors are looked up on the declaring type only.
    pub fn find_ctor(&self, ty: TypeId, args: &[Ty], from: Option<TypeId>) -> Resolution {
        let candidates: Vec<MethodId> = self
            .ty(ty)
            .methods
            .iter()
            .copied()
            .filter(|id| self.method(*id).kind == MethodKind::Constructor)
            .collect();
        self.select(candidates, &Lookup::new("new", args, from), false)
    }

    pub fn find_field(&self, ty: TypeId, name: &str) -> Option<FieldId> {
        self.ancestry(ty)
            .into_iter()
            .find_map(|t| self.ty(t).fields.iter().copied().find(|f| self.field(*f).name == name))
    }

    /// True if `ty` or an ancestor declares any method called `name`.
    pub fn has_method_named(&self, ty: TypeId, name: &str) -> bool {
        self.ancestry(ty).into_iter().any(|t| !self.ty(t).methods_named(name).is_empty())
    }

    /// Nearest declaration of `name(params)` in a user-written ancestor
    /// (including `ty` itself).
    pub fn declared_in_user_chain(&self, ty: TypeId, name: &str, params: &[Ty]) -> Option<MethodId> {
        self.ancestry(ty)
            .into_iter()
            .filter(|t| matches!(self.ty(*t).kind, TypeKind::User | TypeKind::Enum))
            .flat_map(|t| self.ty(t).methods_named(name).to_vec())
            .find(|id| self.method(*id).has_params(params))
    }

    fn resolution_error(&self, res: Resolution, what: &str, owner: &str, args: &[Ty]) -> CompileError {
        match res {
            Resolution::Ambiguous(a, b) => CompileError::unlocated(format!(
                "ambiguous call to '{what}': {} and {}",
                self.describe_method(a),
                self.describe_method(b)
            )),
            _ => CompileError::unlocated(format!(
                "type '{owner}' has no method '{what}' accepting ({})",
                format_params(args)
            )),
        }
    }

    pub fn resolve_method(&self, ty: TypeId, q: &Lookup) -> Result<MethodId, CompileError> {
        match self.find_method(ty, q) {
            Resolution::Found(id) => Ok(id),
            other => Err(self.resolution_error(other, q.name, &self.ty(ty).name, q.args)),
        }
    }

    pub fn resolve_ctor(&self, ty: TypeId, args: &[Ty], from: Option<TypeId>) -> Result<MethodId, CompileError> {
        match self.find_ctor(ty, args, from) {
            Resolution::Found(id) => Ok(id),
            Resolution::Ambiguous(a, b) => Err(self.resolution_error(
                Resolution::Ambiguous(a, b),
                &format!("new {}", self.ty(ty).name),
                &self.ty(ty).name,
                args,
            )),
            Resolution::NotFound => Err(CompileError::unlocated(format!(
                "type '{}' has no accessible constructor accepting ({})",
                self.ty(ty).name,
                format_params(args)
            ))),
        }
    }

    pub fn resolve_field(&self, ty: TypeId, name: &str, from: Option<TypeId>) -> Result<FieldId, CompileError> {
        let id = self.find_field(ty, name).ok_or_else(|| {
            CompileError::unlocated(format!("type '{}' has no field '{name}'", self.ty(ty).name))
        })?;
        let field = self.field(id);
        if field.is_private && from != Some(field.owner) {
            return Err(CompileError::unlocated(format!(
                "field '{}.{name}' is private",
                self.ty(field.owner).name
            )));
        }
        Ok(id)
    }
}
