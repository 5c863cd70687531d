use std::fmt;

use serde::Serialize;

/// Static type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    Void,
    /// Type of the `null` literal.
    Null,
    Bool,
    Int,
    Long,
    Float,
    Complex,
    String,
    Named(String),
    Array(Box<Ty>),
    Dict(Box<Ty>, Box<Ty>),
}

impl Ty {
    pub fn named(name: impl Into<String>) -> Self {
        Ty::Named(name.into())
    }

    pub fn array_of(elem: Ty) -> Self {
        Ty::Array(Box::new(elem))
    }

    pub fn dict_of(key: Ty, value: Ty) -> Self {
        Ty::Dict(Box::new(key), Box::new(value))
    }

    /// Position on the numeric ladder `int < long < float < complex`.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            Ty::Int => Some(0),
            Ty::Long => Some(1),
            Ty::Float => Some(2),
            Ty::Complex => Some(3),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    /// Value types never hold `null`.
    pub fn is_value(&self) -> bool {
        matches!(self, Ty::Bool | Ty::Int | Ty::Long | Ty::Float | Ty::Complex)
    }

    pub fn is_reference(&self) -> bool {
        !self.is_value() && !matches!(self, Ty::Void | Ty::Null)
    }

    /// Registry name of the type that carries this type's methods, if any.
    /// Arrays and dictionaries have no registry entry.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Ty::Bool => Some("bool"),
            Ty::Int => Some("int"),
            Ty::Long => Some("long"),
            Ty::Float => Some("float"),
            Ty::Complex => Some("complex"),
            Ty::String => Some("string"),
            Ty::Named(name) => Some(name),
            Ty::Void | Ty::Null | Ty::Array(_) | Ty::Dict(..) => None,
        }
    }

    /// Inverse of `Display`: `int`, `Pt`, `int[][]`, `{string:int[]}`, `null`.
    pub fn parse(text: &str) -> Option<Ty> {
        let text = text.trim();
        if let Some(inner) = text.strip_suffix("[]") {
            return Ty::parse(inner).map(Ty::array_of);
        }
        if let Some(body) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            let split = top_level_colon(body)?;
            let key = Ty::parse(&body[..split])?;
            let value = Ty::parse(&body[split + 1..])?;
            return Some(Ty::dict_of(key, value));
        }
        let valid_ident = text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid_ident {
            return None;
        }
        Some(Ty::from_name(text))
    }

    /// Primitive for a built-in name, `Named` otherwise.
    pub fn from_name(name: &str) -> Ty {
        match name {
            "void" => Ty::Void,
            "null" => Ty::Null,
            "bool" => Ty::Bool,
            "int" => Ty::Int,
            "long" => Ty::Long,
            "float" => Ty::Float,
            "complex" => Ty::Complex,
            "string" => Ty::String,
            other => Ty::Named(other.to_string()),
        }
    }
}

fn top_level_colon(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1)?,
            ':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int => write!(f, "int"),
            Ty::Long => write!(f, "long"),
            Ty::Float => write!(f, "float"),
            Ty::Complex => write!(f, "complex"),
            Ty::String => write!(f, "string"),
            Ty::Named(name) => write!(f, "{name}"),
            Ty::Array(elem) => write!(f, "{elem}[]"),
            Ty::Dict(k, v) => write!(f, "{{{k}:{v}}}"),
        }
    }
}

/// Render a parameter list the way signatures print it: `int, float[]`.
pub fn format_params(params: &[Ty]) -> String {
    params.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}
