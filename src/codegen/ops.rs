//! Binary operators.
//!
//! Every operator (except the short-circuit `and`/`or`) is first turned
//! into a [`BinaryPlan`]: the types both operands are widened to, the
//! instruction or helper that combines them, and the result type. Typing
//! reads only `result`; emission follows the whole plan.

use super::expr::{mixes_long_and_complex, operator_error};
use super::CodeGen;
use crate::diagnostics::CompileError;
use crate::parser::ast::{BinOp, Expr};
use crate::registry::synth::EQUAL;
use crate::registry::{Lookup, MethodId, StaticFilter, Ty};
use crate::span::Spanned;
use crate::stdlib::{handles, COMPLEX_HELPERS, MATH, MATRIX, STRING_HELPERS};
use crate::target::{Instr, MethodRef};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum OpAction {
    Instrs(Vec<Instr>),
    /// Registry method, called with `call` or `callvirt`.
    Method(MethodId),
    /// Runtime entry point without a registry type.
    External(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct BinaryPlan {
    pub lhs_to: Ty,
    pub rhs_to: Ty,
    /// Push the right operand below the left one. The left operand is
    /// still evaluated first.
    pub swap: bool,
    pub action: OpAction,
    /// Instructions applied to the action's result.
    pub post: Vec<Instr>,
    pub result: Ty,
}

impl BinaryPlan {
    fn new(lhs_to: Ty, rhs_to: Ty, action: OpAction, result: Ty) -> Self {
        Self { lhs_to, rhs_to, swap: false, action, post: Vec::new(), result }
    }

    fn uniform(operand: Ty, action: OpAction, result: Ty) -> Self {
        Self::new(operand.clone(), operand, action, result)
    }

    fn swapped(mut self) -> Self {
        self.swap = true;
        self
    }

    fn then(mut self, post: Vec<Instr>) -> Self {
        self.post = post;
        self
    }
}

/// An operand that is either still an expression or already a sequence of
/// loads (compound assignment, synthesized equality).
pub(super) enum Operand<'e> {
    Expr(&'e Spanned<Expr>),
    Loaded(Vec<Instr>, Ty),
}

fn arith_instr(op: BinOp) -> Instr {
    match op {
        BinOp::Add => Instr::Add,
        BinOp::Sub => Instr::Sub,
        BinOp::Mul => Instr::Mul,
        BinOp::Div => Instr::Div,
        _ => Instr::Rem,
    }
}

fn complex_helper_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "op_add",
        BinOp::Sub => "op_sub",
        BinOp::Mul => "op_mul",
        _ => "op_div",
    }
}

fn wider(a: &Ty, b: &Ty) -> Ty {
    match (a.numeric_rank(), b.numeric_rank()) {
        (Some(ra), Some(rb)) if rb > ra => b.clone(),
        _ => a.clone(),
    }
}

impl CodeGen<'_> {
    pub(super) fn plan_binary(&self, op: BinOp, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => self.plan_arith(op, l, r),
            BinOp::Pow => self.plan_pow(l, r),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => plan_bitwise(op, l, r),
            BinOp::Eq => self.plan_equality(l, r),
            BinOp::Neq => Ok(self.plan_equality(l, r)?.then(vec![Instr::LdcI4(0), Instr::Ceq])),
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => self.plan_relational(op, l, r),
            BinOp::In => self.plan_in(l, r),
            BinOp::And | BinOp::Or => {
                if *l == Ty::Bool && *r == Ty::Bool {
                    Ok(BinaryPlan::uniform(Ty::Bool, OpAction::Instrs(vec![]), Ty::Bool))
                } else {
                    Err(operator_error(op, l, r))
                }
            }
        }
    }

    fn plan_arith(&self, op: BinOp, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        if l.is_numeric() && r.is_numeric() {
            if mixes_long_and_complex(l, r) {
                return Err(operator_error(op, l, r));
            }
            let common = wider(l, r);
            if common == Ty::Complex {
                if op == BinOp::Mod {
                    return Err(operator_error(op, l, r));
                }
                let helper = self.helper(COMPLEX_HELPERS, complex_helper_name(op), &[Ty::Complex, Ty::Complex])?;
                return Ok(BinaryPlan::uniform(common.clone(), OpAction::Method(helper), common));
            }
            return Ok(BinaryPlan::uniform(common.clone(), OpAction::Instrs(vec![arith_instr(op)]), common));
        }

        let matrix = Ty::named(MATRIX);
        let scalar = |t: &Ty| matches!(t, Ty::Int | Ty::Float);
        let plan = match (op, l, r) {
            (BinOp::Add, Ty::String, Ty::String) => {
                let m = self.helper(STRING_HELPERS, "op_add", &[Ty::String, Ty::String])?;
                BinaryPlan::uniform(Ty::String, OpAction::Method(m), Ty::String)
            }
            (BinOp::Mul, Ty::String, Ty::Int) => {
                let m = self.helper(STRING_HELPERS, "op_repeat", &[Ty::String, Ty::Int])?;
                BinaryPlan::new(Ty::String, Ty::Int, OpAction::Method(m), Ty::String)
            }
            (BinOp::Mul, Ty::Int, Ty::String) => {
                let m = self.helper(STRING_HELPERS, "op_repeat", &[Ty::String, Ty::Int])?;
                BinaryPlan::new(Ty::Int, Ty::String, OpAction::Method(m), Ty::String).swapped()
            }
            (BinOp::Add, Ty::Array(a), Ty::Array(b)) if a == b => {
                BinaryPlan::uniform(l.clone(), OpAction::External(handles::ARRAY_CONCAT), l.clone())
            }
            (BinOp::Mul, Ty::Array(_), Ty::Int) => {
                BinaryPlan::new(l.clone(), Ty::Int, OpAction::External(handles::ARRAY_REPEAT), l.clone())
            }
            (BinOp::Add | BinOp::Sub | BinOp::Mul, _, _) if *l == matrix && *r == matrix => {
                let m = self.helper(MATRIX, complex_helper_name(op), &[matrix.clone(), matrix.clone()])?;
                BinaryPlan::uniform(matrix.clone(), OpAction::Method(m), matrix)
            }
            (BinOp::Mul | BinOp::Div, _, _) if *l == matrix && scalar(r) => {
                let name = if op == BinOp::Mul { "op_scale" } else { "op_divide" };
                let m = self.helper(MATRIX, name, &[matrix.clone(), Ty::Float])?;
                BinaryPlan::new(matrix.clone(), Ty::Float, OpAction::Method(m), matrix)
            }
            (BinOp::Mul, _, _) if scalar(l) && *r == matrix => {
                let m = self.helper(MATRIX, "op_scale", &[matrix.clone(), Ty::Float])?;
                BinaryPlan::new(Ty::Float, matrix.clone(), OpAction::Method(m), matrix).swapped()
            }
            (BinOp::Add, Ty::Dict(..), Ty::Dict(..)) if l == r => {
                BinaryPlan::uniform(l.clone(), OpAction::External(handles::DICT_MERGE), l.clone())
            }
            _ => return Err(operator_error(op, l, r)),
        };
        Ok(plan)
    }

    fn plan_pow(&self, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        if !l.is_numeric() || !r.is_numeric() || mixes_long_and_complex(l, r) {
            return Err(operator_error(BinOp::Pow, l, r));
        }
        if *l == Ty::Complex || *r == Ty::Complex {
            let m = self.helper(COMPLEX_HELPERS, "pow", &[Ty::Complex, Ty::Complex])?;
            return Ok(BinaryPlan::uniform(Ty::Complex, OpAction::Method(m), Ty::Complex));
        }
        let m = self.helper(MATH, "pow", &[Ty::Float, Ty::Float])?;
        Ok(BinaryPlan::uniform(Ty::Float, OpAction::Method(m), Ty::Float))
    }

    fn plan_equality(&self, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        let ceq = || OpAction::Instrs(vec![Instr::Ceq]);
        let nullable = |t: &Ty| *t == Ty::Null || (t.is_reference() && !self.is_value_type(t));

        if (*l == Ty::Null && nullable(r)) || (*r == Ty::Null && nullable(l)) {
            return Ok(BinaryPlan::new(l.clone(), r.clone(), ceq(), Ty::Bool));
        }
        if l.is_numeric() && r.is_numeric() {
            if mixes_long_and_complex(l, r) {
                return Err(equality_error(l, r));
            }
            let common = wider(l, r);
            if common == Ty::Complex {
                let m = self.helper(COMPLEX_HELPERS, "op_equal", &[Ty::Complex, Ty::Complex])?;
                return Ok(BinaryPlan::uniform(common, OpAction::Method(m), Ty::Bool));
            }
            return Ok(BinaryPlan::uniform(common, ceq(), Ty::Bool));
        }
        match (l, r) {
            (Ty::Bool, Ty::Bool) => return Ok(BinaryPlan::uniform(Ty::Bool, ceq(), Ty::Bool)),
            (Ty::String, Ty::String) => {
                let m = self.helper(STRING_HELPERS, "op_equal", &[Ty::String, Ty::String])?;
                return Ok(BinaryPlan::uniform(Ty::String, OpAction::Method(m), Ty::Bool));
            }
            _ => {}
        }
        if let Some(m) = self.equal_method(l, r) {
            let param = self.reg.method(m).params[0].ty.clone();
            return Ok(BinaryPlan::new(l.clone(), param, OpAction::Method(m), Ty::Bool));
        }
        if let Some(m) = self.equal_method(r, l) {
            let param = self.reg.method(m).params[0].ty.clone();
            return Ok(BinaryPlan::new(param, r.clone(), OpAction::Method(m), Ty::Bool).swapped());
        }
        if l == r && l.is_reference() {
            return Ok(BinaryPlan::uniform(l.clone(), ceq(), Ty::Bool));
        }
        Err(equality_error(l, r))
    }

    /// `receiver.equal(arg)` as an instance method returning `bool`.
    fn equal_method(&self, receiver: &Ty, arg: &Ty) -> Option<MethodId> {
        let tid = self.reg.entry_of(receiver)?;
        let args = [arg.clone()];
        let q = Lookup::new(EQUAL, &args, Some(self.ctx.ty)).statics(StaticFilter::InstanceOnly);
        self.reg.find_method(tid, &q).found().filter(|m| self.reg.method(*m).ret == Ty::Bool)
    }

    fn plan_relational(&self, op: BinOp, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        let compare = match op {
            BinOp::Lt => vec![Instr::Clt],
            BinOp::Gt => vec![Instr::Cgt],
            BinOp::LtEq => vec![Instr::Cgt, Instr::LdcI4(0), Instr::Ceq],
            _ => vec![Instr::Clt, Instr::LdcI4(0), Instr::Ceq],
        };
        let comparable = |t: &Ty| t.is_numeric() && *t != Ty::Complex;
        if comparable(l) && comparable(r) {
            return Ok(BinaryPlan::uniform(wider(l, r), OpAction::Instrs(compare), Ty::Bool));
        }
        if *l == Ty::String && *r == Ty::String {
            let m = self.helper(STRING_HELPERS, "op_compare", &[Ty::String, Ty::String])?;
            let mut post = vec![Instr::LdcI4(0)];
            post.extend(compare);
            return Ok(BinaryPlan::uniform(Ty::String, OpAction::Method(m), Ty::Bool).then(post));
        }
        Err(operator_error(op, l, r))
    }

    /// `needle in haystack`; the haystack is the receiver of the helper.
    fn plan_in(&self, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
        let plan = match r {
            Ty::Array(elem) if self.reg.assignable(elem, l) => {
                BinaryPlan::new((**elem).clone(), r.clone(), OpAction::External(handles::ARRAY_CONTAINS), Ty::Bool)
            }
            Ty::Dict(key, _) if self.reg.assignable(key, l) => {
                BinaryPlan::new((**key).clone(), r.clone(), OpAction::External(handles::DICT_HAS_KEY), Ty::Bool)
            }
            Ty::String if *l == Ty::String => {
                let m = self.helper(STRING_HELPERS, "contains", &[Ty::String])?;
                BinaryPlan::uniform(Ty::String, OpAction::Method(m), Ty::Bool)
            }
            _ => return Err(operator_error(BinOp::In, l, r)),
        };
        Ok(plan.swapped())
    }

    fn emit_operand(&mut self, operand: Operand<'_>, to: &Ty) -> Result<(), CompileError> {
        match operand {
            Operand::Expr(e) => self.emit_expr_as(e, to),
            Operand::Loaded(instrs, from) => {
                for i in instrs {
                    self.emit(i);
                }
                self.convert(&from, to)
            }
        }
    }

    pub(super) fn emit_plan(&mut self, plan: &BinaryPlan, lhs: Operand<'_>, rhs: Operand<'_>) -> Result<(), CompileError> {
        if plan.swap {
            self.emit_operand(lhs, &plan.lhs_to)?;
            let tmp = self.temp(&plan.lhs_to);
            self.emit(Instr::StLoc(tmp));
            self.emit_operand(rhs, &plan.rhs_to)?;
            self.emit(Instr::LdLoc(tmp));
        } else {
            self.emit_operand(lhs, &plan.lhs_to)?;
            self.emit_operand(rhs, &plan.rhs_to)?;
        }
        match &plan.action {
            OpAction::Instrs(instrs) => {
                for i in instrs {
                    self.emit(i.clone());
                }
            }
            OpAction::Method(m) => {
                let instr = self.call_instr(*m)?;
                self.emit(instr);
            }
            OpAction::External(handle) => self.emit(Instr::Call(MethodRef::External((*handle).to_string()))),
        }
        for i in &plan.post {
            self.emit(i.clone());
        }
        Ok(())
    }
}

fn plan_bitwise(op: BinOp, l: &Ty, r: &Ty) -> Result<BinaryPlan, CompileError> {
    let instr = match op {
        BinOp::BitAnd => Instr::And,
        BinOp::BitOr => Instr::Or,
        BinOp::BitXor => Instr::Xor,
        BinOp::Shl => Instr::Shl,
        _ => Instr::Shr,
    };
    let integral = |t: &Ty| matches!(t, Ty::Int | Ty::Long);
    match (l, r) {
        (Ty::Bool, Ty::Bool) if !matches!(op, BinOp::Shl | BinOp::Shr) => {
            Ok(BinaryPlan::uniform(Ty::Bool, OpAction::Instrs(vec![instr]), Ty::Bool))
        }
        _ if matches!(op, BinOp::Shl | BinOp::Shr) && integral(l) && *r == Ty::Int => {
            Ok(BinaryPlan::new(l.clone(), Ty::Int, OpAction::Instrs(vec![instr]), l.clone()))
        }
        _ if !matches!(op, BinOp::Shl | BinOp::Shr) && integral(l) && integral(r) => {
            let common = wider(l, r);
            Ok(BinaryPlan::uniform(common.clone(), OpAction::Instrs(vec![instr]), common))
        }
        _ => Err(operator_error(op, l, r)),
    }
}

fn equality_error(l: &Ty, r: &Ty) -> CompileError {
    CompileError::unlocated(format!("cannot compare '{l}' and '{r}' for equality"))
}
