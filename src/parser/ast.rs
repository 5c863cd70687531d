use std::rc::Rc;

use crate::registry::Ty;
use crate::span::Spanned;

/// Parser-assigned identity of an expression node. Inferred types are kept
/// in side tables keyed by it.
pub type NodeId = u32;

/// Everything the parser produced for an entry file and its includes.
/// Type and method declarations are also recorded in the registry.
#[derive(Debug, Default)]
pub struct Program {
    pub uses: Vec<Spanned<String>>,
    pub includes: Vec<Spanned<String>>,
    pub types: Vec<Spanned<TypeDecl>>,
    pub enums: Vec<Spanned<EnumDecl>>,
    pub functions: Vec<Spanned<MethodDecl>>,
    /// Top-level statements, in inclusion order.
    pub main: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Spanned<String>,
    pub parent: Option<Spanned<String>>,
    pub autoconstruct: bool,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<Spanned<MethodDecl>>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Spanned<String>,
    pub ty: Spanned<Ty>,
    pub is_static: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub ret: Spanned<Ty>,
    pub is_static: bool,
    pub is_private: bool,
    pub is_ctor: bool,
    pub body: Rc<Spanned<Block>>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Spanned<Ty>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Spanned<String>,
    pub values: Vec<Spanned<String>>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        name: Spanned<String>,
        ty: Option<Spanned<Ty>>,
        value: Option<Spanned<Expr>>,
    },
    /// `var [a, b = 2] = expr`
    Splat {
        items: Vec<SplatItem>,
        value: Spanned<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        target: Spanned<Expr>,
        op: Option<BinOp>,
        value: Spanned<Expr>,
    },
    If {
        condition: Spanned<Expr>,
        then_block: Spanned<Block>,
        else_block: Option<Spanned<Block>>,
    },
    While {
        condition: Spanned<Expr>,
        body: Spanned<Block>,
    },
    For {
        key: Option<Spanned<String>>,
        var: Spanned<String>,
        iterable: Spanned<Expr>,
        body: Spanned<Block>,
    },
    Break,
    Redo,
    Return(Option<Spanned<Expr>>),
    Expr(Spanned<Expr>),
    Emit(EmitStmt),
    Simulate {
        duration: Option<Spanned<Expr>>,
        planner: Option<Spanned<Block>>,
    },
}

#[derive(Debug, Clone)]
pub struct SplatItem {
    pub name: Spanned<String>,
    pub default: Option<Spanned<Expr>>,
}

/// `emit ACTION [every PERIOD] [with DISTRIBUTION] [limit N] [until CONDITION]`
#[derive(Debug, Clone)]
pub struct EmitStmt {
    pub action: Spanned<Expr>,
    pub every: Option<Spanned<Expr>>,
    pub distribution: Option<Spanned<Expr>>,
    pub limit: Option<Spanned<Expr>>,
    pub until: Option<Spanned<Expr>>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(i32),
    LongLit(i64),
    FloatLit(f64),
    ImaginaryLit(f64),
    StringLit(String),
    BoolLit(bool),
    Null,
    This,
    Ident(String),
    /// `@name`
    Field(String),
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    /// `object.name` (also `Type.static_field` and `Enum.Value`)
    Member {
        object: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },
    /// Unqualified call `name(args)`
    Call {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    MethodCall {
        object: Box<Spanned<Expr>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    Index {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Range {
        from: Box<Spanned<Expr>>,
        to: Box<Spanned<Expr>>,
    },
    New {
        ty: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    NewArray {
        elem: Spanned<Ty>,
        size: Box<Spanned<Expr>>,
    },
    NewDict {
        ty: Spanned<Ty>,
    },
    ArrayLit(Vec<Spanned<Expr>>),
    DictLit(Vec<(Spanned<Expr>, Spanned<Expr>)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}
