//! The compiled form of a program: a set of class-like type definitions
//! whose methods hold stack-machine instruction lists.
//!
//! The module is plain data. It can be serialized to JSON for an external
//! assembler, or rendered as text by [`TargetModule::disassemble`].

use std::fmt::{self, Write as _};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A method is either defined in this module (type index, method index) or
/// provided by the runtime under a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodRef {
    Defined { ty: usize, method: usize },
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    Defined { ty: usize, field: usize },
    External(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Instr {
    LdcI4(i32),
    LdcI8(i64),
    LdcR8(f64),
    LdStr(String),
    LdNull,

    LdArg(u16),
    StArg(u16),
    LdLoc(u16),
    StLoc(u16),

    LdFld(FieldRef),
    StFld(FieldRef),
    LdSFld(FieldRef),
    StSFld(FieldRef),

    NewObj(MethodRef),
    Call(MethodRef),
    CallVirt(MethodRef),

    /// Element type name.
    NewArr(String),
    LdLen,
    LdElem,
    StElem,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,

    Ceq,
    Cgt,
    Clt,

    ConvI4,
    ConvI8,
    ConvR8,

    Br(Label),
    BrTrue(Label),
    BrFalse(Label),
    Mark(Label),

    Ret,
    Pop,
    Dup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: String,
    pub is_static: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalDef {
    /// `None` for compiler temporaries.
    pub name: Option<String>,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub ret: String,
    pub is_static: bool,
    pub is_ctor: bool,
    pub is_virtual: bool,
    pub is_private: bool,
    pub locals: Vec<LocalDef>,
    pub body: Vec<Instr>,
}

impl MethodDef {
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.ty.as_str()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetModule {
    pub name: String,
    pub types: Vec<TypeDef>,
    pub entry_point: Option<MethodRef>,
    pub args_field: Option<FieldRef>,
}

impl TargetModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn add_type(&mut self, def: TypeDef) -> usize {
        self.types.push(def);
        self.types.len() - 1
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// First method on `ty` matching `signature`, e.g. `"new(int, int)"`.
    pub fn method(&self, ty: &str, signature: &str) -> Option<&MethodDef> {
        self.type_named(ty)?.methods.iter().find(|m| m.signature() == signature)
    }

    pub fn resolve_method(&self, r: &MethodRef) -> Option<&MethodDef> {
        match r {
            MethodRef::Defined { ty, method } => self.types.get(*ty)?.methods.get(*method),
            MethodRef::External(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn method_name(&self, r: &MethodRef) -> String {
        match r {
            MethodRef::Defined { ty, method } => match self.types.get(*ty) {
                Some(t) => match t.methods.get(*method) {
                    Some(m) => format!("{}::{}", t.name, m.signature()),
                    None => format!("{}::<method {method}>", t.name),
                },
                None => format!("<type {ty}>::<method {method}>"),
            },
            MethodRef::External(handle) => format!("[{handle}]"),
        }
    }

    pub fn field_name(&self, r: &FieldRef) -> String {
        match r {
            FieldRef::Defined { ty, field } => match self.types.get(*ty) {
                Some(t) => match t.fields.get(*field) {
                    Some(f) => format!("{}::{}", t.name, f.name),
                    None => format!("{}::<field {field}>", t.name),
                },
                None => format!("<type {ty}>::<field {field}>"),
            },
            FieldRef::External(handle) => format!("[{handle}]"),
        }
    }

    pub fn render_instr(&self, instr: &Instr) -> String {
        match instr {
            Instr::LdcI4(v) => format!("ldc.i4 {v}"),
            Instr::LdcI8(v) => format!("ldc.i8 {v}"),
            Instr::LdcR8(v) => format!("ldc.r8 {v:?}"),
            Instr::LdStr(s) => format!("ldstr {s:?}"),
            Instr::LdNull => "ldnull".into(),
            Instr::LdArg(i) => format!("ldarg {i}"),
            Instr::StArg(i) => format!("starg {i}"),
            Instr::LdLoc(i) => format!("ldloc {i}"),
            Instr::StLoc(i) => format!("stloc {i}"),
            Instr::LdFld(f) => format!("ldfld {}", self.field_name(f)),
            Instr::StFld(f) => format!("stfld {}", self.field_name(f)),
            Instr::LdSFld(f) => format!("ldsfld {}", self.field_name(f)),
            Instr::StSFld(f) => format!("stsfld {}", self.field_name(f)),
            Instr::NewObj(m) => format!("newobj {}", self.method_name(m)),
            Instr::Call(m) => format!("call {}", self.method_name(m)),
            Instr::CallVirt(m) => format!("callvirt {}", self.method_name(m)),
            Instr::NewArr(t) => format!("newarr {t}"),
            Instr::LdLen => "ldlen".into(),
            Instr::LdElem => "ldelem".into(),
            Instr::StElem => "stelem".into(),
            Instr::Add => "add".into(),
            Instr::Sub => "sub".into(),
            Instr::Mul => "mul".into(),
            Instr::Div => "div".into(),
            Instr::Rem => "rem".into(),
            Instr::Neg => "neg".into(),
            Instr::And => "and".into(),
            Instr::Or => "or".into(),
            Instr::Xor => "xor".into(),
            Instr::Not => "not".into(),
            Instr::Shl => "shl".into(),
            Instr::Shr => "shr".into(),
            Instr::Ceq => "ceq".into(),
            Instr::Cgt => "cgt".into(),
            Instr::Clt => "clt".into(),
            Instr::ConvI4 => "conv.i4".into(),
            Instr::ConvI8 => "conv.i8".into(),
            Instr::ConvR8 => "conv.r8".into(),
            Instr::Br(l) => format!("br {l}"),
            Instr::BrTrue(l) => format!("brtrue {l}"),
            Instr::BrFalse(l) => format!("brfalse {l}"),
            Instr::Mark(l) => format!("{l}:"),
            Instr::Ret => "ret".into(),
            Instr::Pop => "pop".into(),
            Instr::Dup => "dup".into(),
        }
    }

    /// Body of one method, one instruction per line. Labels are flush left,
    /// instructions indented by two spaces.
    pub fn disassemble_body(&self, method: &MethodDef) -> String {
        let mut out = String::new();
        for instr in &method.body {
            let line = self.render_instr(instr);
            if matches!(instr, Instr::Mark(_)) {
                out.push_str(&line);
            } else {
                out.push_str("  ");
                out.push_str(&line);
            }
            out.push('\n');
        }
        out
    }

    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, ".module {}", self.name);
        if let Some(entry) = &self.entry_point {
            let _ = writeln!(out, ".entrypoint {}", self.method_name(entry));
        }
        if let Some(args) = &self.args_field {
            let _ = writeln!(out, ".args {}", self.field_name(args));
        }
        for ty in &self.types {
            let _ = writeln!(out);
            match &ty.parent {
                Some(p) => {
                    let _ = writeln!(out, ".type {} : {p}", ty.name);
                }
                None => {
                    let _ = writeln!(out, ".type {}", ty.name);
                }
            }
            for f in &ty.fields {
                let mut flags = String::new();
                if f.is_static {
                    flags.push_str("static ");
                }
                if f.is_private {
                    flags.push_str("private ");
                }
                let _ = writeln!(out, "  .field {flags}{} {}", f.ty, f.name);
            }
            for m in &ty.methods {
                let mut flags = String::new();
                for (on, word) in [
                    (m.is_static, "static "),
                    (m.is_private, "private "),
                    (m.is_virtual, "virtual "),
                    (m.is_ctor, "ctor "),
                ] {
                    if on {
                        flags.push_str(word);
                    }
                }
                let _ = writeln!(out, "  .method {flags}{} {}", m.ret, m.signature());
                for (i, local) in m.locals.iter().enumerate() {
                    let name = local.name.as_deref().unwrap_or("$tmp");
                    let _ = writeln!(out, "    .local {i} {} {name}", local.ty);
                }
                for line in self.disassemble_body(m).lines() {
                    let _ = writeln!(out, "  {line}");
                }
            }
        }
        out
    }
}
