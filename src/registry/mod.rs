//! Global table of types, fields and methods.
//!
//! Entries live in arenas addressed by `TypeId`, `FieldId` and `MethodId`.
//! A type refers to its parent by name; the parent is looked up on demand,
//! so a type may name a parent declared later in the source.

pub mod resolve;
pub mod scope;
pub mod synth;
pub mod ty;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::diagnostics::CompileError;
use crate::parser::ast::Block;
use crate::span::{Span, Spanned};

pub use resolve::{Lookup, Resolution, StaticFilter};
pub use scope::{Binding, Scope, Slot};
pub use ty::Ty;

/// Root of every reference type hierarchy.
pub const ROOT_TYPE: &str = "object";
/// Implicit type holding top-level functions, the entry point and `args`.
pub const PROGRAM_TYPE: &str = "$Program";
pub const ENTRY_POINT: &str = "main";
pub const ARGS_FIELD: &str = "args";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Imported through the import API; cannot be extended by user code.
    Builtin,
    User,
    Enum,
    /// Carrier synthesized for an `emit` or `planner` body.
    Closure,
}

#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub name: String,
    pub parent: Option<String>,
    pub kind: TypeKind,
    pub autoconstruct: bool,
    pub is_value: bool,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    method_index: FxHashMap<String, Vec<MethodId>>,
    pub enum_values: Vec<String>,
    pub handle: Option<String>,
    pub span: Option<Span>,
}

impl TypeEntry {
    pub fn methods_named(&self, name: &str) -> &[MethodId] {
        self.method_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_extensible(&self) -> bool {
        self.kind != TypeKind::Builtin
    }
}

#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
    pub is_private: bool,
    pub owner: TypeId,
    pub handle: Option<String>,
    pub span: Option<Span>,
}

impl FieldEntry {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static: false,
            is_private: false,
            owner: TypeId(0),
            handle: None,
            span: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
}

/// Member bodies generated from the type's shape rather than from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synth {
    DefaultCtor,
    /// One parameter per own instance field, stored in declaration order.
    AutoCtor,
    ToString,
    Equal,
    EnumCtor,
    EnumFactory(u32),
    EnumToArray,
}

#[derive(Debug, Clone)]
pub enum MethodBody {
    User(Rc<Spanned<Block>>),
    Synthesized(Synth),
    /// Carrier methods, generated while the enclosing method is compiled.
    Deferred,
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub name: String,
    pub ty: Ty,
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub params: Vec<ParamEntry>,
    pub ret: Ty,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_private: bool,
    pub is_virtual: bool,
    pub owner: TypeId,
    pub body: MethodBody,
    pub handle: Option<String>,
    pub span: Option<Span>,
}

impl MethodEntry {
    pub fn new(name: impl Into<String>, params: Vec<ParamEntry>, ret: Ty, body: MethodBody) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            kind: MethodKind::Method,
            is_static: false,
            is_private: false,
            is_virtual: false,
            owner: TypeId(0),
            body,
            handle: None,
            span: None,
        }
    }

    pub fn constructor(params: Vec<ParamEntry>, body: MethodBody) -> Self {
        Self { kind: MethodKind::Constructor, ..Self::new("new", params, Ty::Void, body) }
    }

    pub fn param_types(&self) -> Vec<Ty> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn has_params(&self, types: &[Ty]) -> bool {
        self.params.len() == types.len() && self.params.iter().zip(types).all(|(p, t)| &p.ty == t)
    }

    pub fn is_ctor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    /// `name(int, float[])`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, ty::format_params(&self.param_types()))
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<TypeEntry>,
    fields: Vec<FieldEntry>,
    methods: Vec<MethodEntry>,
    by_name: FxHashMap<String, TypeId>,
    used: Vec<TypeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- access ----

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + use<> {
        (0..self.types.len() as u32).map(TypeId)
    }

    pub fn ty(&self, id: TypeId) -> &TypeEntry {
        &self.types[id.0 as usize]
    }

    pub fn field(&self, id: FieldId) -> &FieldEntry {
        &self.fields[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &MethodEntry {
        &self.methods[id.0 as usize]
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Static type denoted by a type name. `""` is "no type" (`void`) and
    /// `"null"` the null literal type; both always succeed.
    pub fn type_of_name(&self, name: &str) -> Option<Ty> {
        match name {
            "" | "void" => Some(Ty::Void),
            "null" => Some(Ty::Null),
            _ => self.lookup(name).map(|_| Ty::from_name(name)),
        }
    }

    /// True if every named type inside `ty` is registered.
    pub fn is_known(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Array(elem) => self.is_known(elem),
            Ty::Dict(k, v) => self.is_known(k) && self.is_known(v),
            Ty::Named(name) => self.lookup(name).is_some(),
            _ => true,
        }
    }

    pub fn require_known(&self, ty: &Ty, span: Span) -> Result<(), CompileError> {
        if self.is_known(ty) {
            return Ok(());
        }
        Err(CompileError::semantic(format!("unknown type '{ty}'"), span))
    }

    /// Id of the registry entry that carries `ty`'s members.
    pub fn entry_of(&self, ty: &Ty) -> Option<TypeId> {
        ty.type_name().and_then(|n| self.lookup(n))
    }

    pub fn parent_of(&self, id: TypeId) -> Option<TypeId> {
        self.ty(id).parent.as_deref().and_then(|p| self.lookup(p))
    }

    /// `id` followed by its ancestors, nearest first.
    pub fn ancestry(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn is_subtype(&self, derived: TypeId, base: TypeId) -> bool {
        self.ancestry(derived).contains(&base)
    }

    /// Instance fields of `id` and its ancestors, root-most first.
    pub fn instance_fields(&self, id: TypeId) -> Vec<FieldId> {
        let mut out = Vec::new();
        for t in self.ancestry(id).into_iter().rev() {
            out.extend(self.ty(t).fields.iter().copied().filter(|f| !self.field(*f).is_static));
        }
        out
    }

    pub fn describe_method(&self, id: MethodId) -> String {
        let m = self.method(id);
        format!("{}.{}", self.ty(m.owner).name, m.signature())
    }

    /// Re-resolve a `name(int, float)` signature against the methods
    /// declared on `owner` itself.
    pub fn find_method_by_signature(&self, owner: TypeId, signature: &str) -> Option<MethodId> {
        let open = signature.find('(')?;
        let inner = signature[open + 1..].strip_suffix(')')?;
        let name = signature[..open].trim();
        let mut params = Vec::new();
        for part in split_params(inner) {
            params.push(Ty::parse(part)?);
        }
        let entry = self.ty(owner);
        let pool: &[MethodId] = if name == "new" { &entry.methods } else { entry.methods_named(name) };
        pool.iter()
            .copied()
            .find(|id| {
                let m = self.method(*id);
                m.name == name && m.has_params(&params)
            })
    }

    // ---- declaration ----

    fn push_type(&mut self, entry: TypeEntry) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        debug!(name = %entry.name, kind = ?entry.kind, "declared type");
        self.by_name.insert(entry.name.clone(), id);
        self.types.push(entry);
        id
    }

    /// Declare a source-level type. The parent (if any) is checked later by
    /// `validate_hierarchy`.
    pub fn declare_type(
        &mut self,
        name: &str,
        parent: Option<&str>,
        kind: TypeKind,
        span: Option<Span>,
    ) -> Result<TypeId, CompileError> {
        if self.by_name.contains_key(name) {
            let msg = format!("type '{name}' is already defined");
            return Err(match span {
                Some(span) => CompileError::semantic(msg, span),
                None => CompileError::unlocated(msg),
            });
        }
        Ok(self.push_type(new_entry(name, parent, kind, span)))
    }

    pub fn set_autoconstruct(&mut self, id: TypeId, on: bool) {
        self.types[id.0 as usize].autoconstruct = on;
    }

    /// `$Program`, created on first use.
    pub fn program_type(&mut self) -> TypeId {
        match self.lookup(PROGRAM_TYPE) {
            Some(id) => id,
            None => self.push_type(new_entry(PROGRAM_TYPE, None, TypeKind::User, None)),
        }
    }

    fn check_extensible(&self, owner: TypeId) -> Result<(), CompileError> {
        let entry = self.ty(owner);
        if entry.is_extensible() {
            Ok(())
        } else {
            Err(CompileError::unlocated(format!(
                "type '{}' is imported and cannot be extended",
                entry.name
            )))
        }
    }

    fn insert_field(&mut self, owner: TypeId, mut field: FieldEntry) -> Result<FieldId, CompileError> {
        let clash = self.ty(owner).fields.iter().any(|f| self.field(*f).name == field.name);
        if clash {
            return Err(CompileError::unlocated(format!(
                "field '{}' is already defined in type '{}'",
                field.name,
                self.ty(owner).name
            )));
        }
        field.owner = owner;
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(field);
        self.types[owner.0 as usize].fields.push(id);
        Ok(id)
    }

    fn insert_method(&mut self, owner: TypeId, mut method: MethodEntry) -> Result<MethodId, CompileError> {
        let params = method.param_types();
        let clash = self.ty(owner).methods.iter().any(|m| {
            let existing = self.method(*m);
            existing.name == method.name && existing.kind == method.kind && existing.has_params(&params)
        });
        if clash {
            return Err(CompileError::unlocated(format!(
                "method '{}.{}' is already defined",
                self.ty(owner).name,
                method.signature()
            )));
        }
        method.owner = owner;
        let id = MethodId(self.methods.len() as u32);
        let entry = &mut self.types[owner.0 as usize];
        entry.methods.push(id);
        entry.method_index.entry(method.name.clone()).or_default().push(id);
        self.methods.push(method);
        Ok(id)
    }

    pub fn add_field(&mut self, owner: TypeId, field: FieldEntry) -> Result<FieldId, CompileError> {
        self.check_extensible(owner)?;
        self.insert_field(owner, field)
    }

    pub fn add_method(&mut self, owner: TypeId, method: MethodEntry) -> Result<MethodId, CompileError> {
        self.check_extensible(owner)?;
        self.insert_method(owner, method)
    }

    pub fn add_enum_value(&mut self, owner: TypeId, name: &str) -> Result<(), CompileError> {
        let entry = &mut self.types[owner.0 as usize];
        if entry.enum_values.iter().any(|v| v == name) {
            return Err(CompileError::unlocated(format!(
                "enum value '{name}' is already defined in '{}'",
                entry.name
            )));
        }
        entry.enum_values.push(name.to_string());
        Ok(())
    }

    /// Make the static methods of `name` callable without qualification.
    pub fn use_type(&mut self, name: &str) -> Result<(), CompileError> {
        let id = self
            .lookup(name)
            .ok_or_else(|| CompileError::unlocated(format!("cannot use unknown type '{name}'")))?;
        if !self.used.contains(&id) {
            self.used.push(id);
        }
        Ok(())
    }

    pub fn used_types(&self) -> &[TypeId] {
        &self.used
    }

    /// Every declared parent must exist, be a reference type and not be an
    /// enum, and the parent chain must be acyclic.
    pub fn validate_hierarchy(&self) -> Result<(), CompileError> {
        for id in self.type_ids() {
            let entry = self.ty(id);
            let Some(parent) = &entry.parent else { continue };
            let at = |msg: String| match entry.span {
                Some(span) => CompileError::semantic(msg, span),
                None => CompileError::unlocated(msg),
            };
            let Some(pid) = self.lookup(parent) else {
                return Err(at(format!("parent type '{parent}' of '{}' is not defined", entry.name)));
            };
            let p = self.ty(pid);
            if p.is_value || p.kind == TypeKind::Enum {
                return Err(at(format!("type '{}' cannot inherit from '{parent}'", entry.name)));
            }
            let mut seen = vec![id];
            let mut current = pid;
            loop {
                if seen.contains(&current) {
                    return Err(at(format!("inheritance cycle involving '{}'", entry.name)));
                }
                seen.push(current);
                match self.parent_of(current) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        Ok(())
    }

    // ---- import API ----

    pub fn import_type(&mut self, handle: &str, name: &str, parent: Option<&str>) -> Result<TypeId, CompileError> {
        if let Some(p) = parent {
            if self.lookup(p).is_none() {
                return Err(CompileError::unlocated(format!(
                    "cannot import '{name}': parent type '{p}' is not defined"
                )));
            }
        }
        let id = self.declare_type(name, parent, TypeKind::Builtin, None)?;
        let entry = &mut self.types[id.0 as usize];
        entry.is_value = Ty::from_name(name).is_value();
        entry.handle = Some(handle.to_string());
        Ok(id)
    }

    fn imported_owner(&self, owner: &str) -> Result<TypeId, CompileError> {
        self.lookup(owner)
            .ok_or_else(|| CompileError::unlocated(format!("cannot import into unknown type '{owner}'")))
    }

    pub fn import_method(
        &mut self,
        handle: &str,
        owner: &str,
        name: &str,
        ret: Ty,
        is_static: bool,
        params: &[Ty],
    ) -> Result<MethodId, CompileError> {
        let owner = self.imported_owner(owner)?;
        let params = params
            .iter()
            .enumerate()
            .map(|(i, ty)| ParamEntry { name: format!("p{i}"), ty: ty.clone() })
            .collect();
        let mut method = MethodEntry::new(name, params, ret, MethodBody::External);
        method.is_static = is_static;
        method.is_virtual = !is_static;
        method.handle = Some(handle.to_string());
        self.insert_method(owner, method)
    }

    pub fn import_ctor(&mut self, handle: &str, owner: &str, params: &[Ty]) -> Result<MethodId, CompileError> {
        let owner = self.imported_owner(owner)?;
        let params = params
            .iter()
            .enumerate()
            .map(|(i, ty)| ParamEntry { name: format!("p{i}"), ty: ty.clone() })
            .collect();
        let mut ctor = MethodEntry::constructor(params, MethodBody::External);
        ctor.handle = Some(handle.to_string());
        self.insert_method(owner, ctor)
    }

    pub fn import_field(
        &mut self,
        handle: &str,
        owner: &str,
        name: &str,
        ty: Ty,
        is_static: bool,
    ) -> Result<FieldId, CompileError> {
        let owner = self.imported_owner(owner)?;
        let mut field = FieldEntry::new(name, ty);
        field.is_static = is_static;
        field.handle = Some(handle.to_string());
        self.insert_field(owner, field)
    }

    /// Register an enum value of an imported type, reachable as a static
    /// factory `Owner.name()`.
    pub fn import_enum_value(&mut self, owner: &str, name: &str) -> Result<MethodId, CompileError> {
        let owner_id = self.imported_owner(owner)?;
        self.add_enum_value(owner_id, name)?;
        let handle = format!("{}::{name}", self.ty(owner_id).handle.as_deref().unwrap_or(owner));
        self.import_method(&handle, owner, name, Ty::named(owner), true, &[])
    }
}

fn new_entry(name: &str, parent: Option<&str>, kind: TypeKind, span: Option<Span>) -> TypeEntry {
    let parent = match parent {
        Some(p) => Some(p.to_string()),
        None if name == ROOT_TYPE => None,
        None => Some(ROOT_TYPE.to_string()),
    };
    TypeEntry {
        name: name.to_string(),
        parent,
        kind,
        autoconstruct: false,
        is_value: false,
        fields: Vec::new(),
        methods: Vec::new(),
        method_index: FxHashMap::default(),
        enum_values: Vec::new(),
        handle: None,
        span,
    }
}

fn split_params(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}
