//! Signatures of the runtime library, registered through the import API.
//!
//! Only the shapes live here; the implementations belong to the runtime the
//! target module is linked against.

use crate::diagnostics::CompileError;
use crate::registry::{Registry, Ty, ROOT_TYPE};

/// Runtime entry points for arrays and dictionaries, which have no registry
/// type of their own.
pub mod handles {
    pub const ARRAY_CONCAT: &str = "runtime:array::concat";
    pub const ARRAY_REPEAT: &str = "runtime:array::repeat";
    pub const ARRAY_CONTAINS: &str = "runtime:array::contains";
    pub const DICT_NEW: &str = "runtime:dict::.ctor";
    pub const DICT_GET: &str = "runtime:dict::get";
    pub const DICT_SET: &str = "runtime:dict::set";
    pub const DICT_HAS_KEY: &str = "runtime:dict::has_key";
    pub const DICT_MERGE: &str = "runtime:dict::merge";
    pub const DICT_COUNT: &str = "runtime:dict::count";
    pub const DICT_RESET: &str = "runtime:dict::reset";
    pub const DICT_NEXT: &str = "runtime:dict::next";
    pub const DICT_CURRENT: &str = "runtime:dict::current";
    pub const DICT_CURRENT_KEY: &str = "runtime:dict::current_key";
}

pub const STRING_HELPERS: &str = "string";
pub const COMPLEX_HELPERS: &str = "complex";
pub const MATRIX: &str = "matrix";
pub const RANGE: &str = "range";
pub const MATH: &str = "Math";
pub const IO: &str = "io";
pub const DISTRIBUTION: &str = "Distribution";
pub const EMITTER: &str = "Emitter";
pub const PLANNER: &str = "Planner";
pub const SIMULATION: &str = "Simulation";

struct Importer<'r> {
    reg: &'r mut Registry,
}

impl Importer<'_> {
    fn ty(&mut self, name: &str, parent: Option<&str>) -> Result<(), CompileError> {
        self.reg.import_type(&format!("runtime:{name}"), name, parent)?;
        Ok(())
    }

    fn handle(owner: &str, name: &str, params: &[Ty]) -> String {
        let params = params.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",");
        format!("runtime:{owner}::{name}({params})")
    }

    fn method(&mut self, owner: &str, name: &str, ret: Ty, params: &[Ty]) -> Result<(), CompileError> {
        let handle = Self::handle(owner, name, params);
        self.reg.import_method(&handle, owner, name, ret, false, params)?;
        Ok(())
    }

    fn static_method(&mut self, owner: &str, name: &str, ret: Ty, params: &[Ty]) -> Result<(), CompileError> {
        let handle = Self::handle(owner, name, params);
        self.reg.import_method(&handle, owner, name, ret, true, params)?;
        Ok(())
    }

    fn ctor(&mut self, owner: &str, params: &[Ty]) -> Result<(), CompileError> {
        let handle = Self::handle(owner, ".ctor", params);
        self.reg.import_ctor(&handle, owner, params)?;
        Ok(())
    }
}

/// Register every runtime type and member. Must run before parsing.
pub fn install(reg: &mut Registry) -> Result<(), CompileError> {
    let mut im = Importer { reg };
    let root = Some(ROOT_TYPE);
    let matrix = || Ty::named(MATRIX);

    im.ty(ROOT_TYPE, None)?;
    im.ctor(ROOT_TYPE, &[])?;
    im.method(ROOT_TYPE, "to_s", Ty::String, &[])?;

    for prim in ["bool", "int", "long", "float", "complex", "string"] {
        im.ty(prim, root)?;
        im.method(prim, "to_s", Ty::String, &[])?;
    }

    // string
    let s = STRING_HELPERS;
    im.method(s, "length", Ty::Int, &[])?;
    im.method(s, "substr", Ty::String, &[Ty::Int, Ty::Int])?;
    im.method(s, "contains", Ty::Bool, &[Ty::String])?;
    im.method(s, "index_of", Ty::Int, &[Ty::String])?;
    im.method(s, "upper", Ty::String, &[])?;
    im.method(s, "lower", Ty::String, &[])?;
    im.method(s, "trim", Ty::String, &[])?;
    im.method(s, "split", Ty::array_of(Ty::String), &[Ty::String])?;
    im.method(s, "to_i", Ty::Int, &[])?;
    im.method(s, "to_f", Ty::Float, &[])?;
    im.static_method(s, "op_add", Ty::String, &[Ty::String, Ty::String])?;
    im.static_method(s, "op_repeat", Ty::String, &[Ty::String, Ty::Int])?;
    im.static_method(s, "op_equal", Ty::Bool, &[Ty::String, Ty::String])?;
    im.static_method(s, "op_compare", Ty::Int, &[Ty::String, Ty::String])?;

    // complex
    let c = COMPLEX_HELPERS;
    im.ctor(c, &[Ty::Float, Ty::Float])?;
    im.method(c, "real", Ty::Float, &[])?;
    im.method(c, "imaginary", Ty::Float, &[])?;
    im.method(c, "abs", Ty::Float, &[])?;
    im.method(c, "conjugate", Ty::Complex, &[])?;
    im.static_method(c, "from_float", Ty::Complex, &[Ty::Float])?;
    for op in ["op_add", "op_sub", "op_mul", "op_div", "pow"] {
        im.static_method(c, op, Ty::Complex, &[Ty::Complex, Ty::Complex])?;
    }
    im.static_method(c, "op_neg", Ty::Complex, &[Ty::Complex])?;
    im.static_method(c, "op_equal", Ty::Bool, &[Ty::Complex, Ty::Complex])?;

    // matrix
    im.ty(MATRIX, root)?;
    im.ctor(MATRIX, &[Ty::Int, Ty::Int])?;
    im.method(MATRIX, "rows", Ty::Int, &[])?;
    im.method(MATRIX, "cols", Ty::Int, &[])?;
    im.method(MATRIX, "get", Ty::Float, &[Ty::Int, Ty::Int])?;
    im.method(MATRIX, "set", Ty::Void, &[Ty::Int, Ty::Int, Ty::Float])?;
    im.method(MATRIX, "transpose", matrix(), &[])?;
    im.method(MATRIX, "to_s", Ty::String, &[])?;
    for op in ["op_add", "op_sub", "op_mul"] {
        im.static_method(MATRIX, op, matrix(), &[matrix(), matrix()])?;
    }
    im.static_method(MATRIX, "op_scale", matrix(), &[matrix(), Ty::Float])?;
    im.static_method(MATRIX, "op_divide", matrix(), &[matrix(), Ty::Float])?;

    // range
    im.ty(RANGE, root)?;
    im.ctor(RANGE, &[Ty::Int, Ty::Int])?;
    im.method(RANGE, "reset", Ty::Void, &[])?;
    im.method(RANGE, "next", Ty::Bool, &[])?;
    im.method(RANGE, "current", Ty::Int, &[])?;
    im.method(RANGE, "to_array", Ty::array_of(Ty::Int), &[])?;

    // Math
    im.ty(MATH, root)?;
    for f in ["sqrt", "sin", "cos", "tan", "exp", "log"] {
        im.static_method(MATH, f, Ty::Float, &[Ty::Float])?;
    }
    for f in ["floor", "ceil", "round"] {
        im.static_method(MATH, f, Ty::Int, &[Ty::Float])?;
    }
    im.static_method(MATH, "pow", Ty::Float, &[Ty::Float, Ty::Float])?;
    for t in [Ty::Int, Ty::Float] {
        im.static_method(MATH, "abs", t.clone(), &[t.clone()])?;
        im.static_method(MATH, "min", t.clone(), &[t.clone(), t.clone()])?;
        im.static_method(MATH, "max", t.clone(), &[t.clone(), t.clone()])?;
    }
    im.static_method(MATH, "random", Ty::Float, &[])?;

    // io
    im.ty(IO, root)?;
    for t in [Ty::String, Ty::Int, Ty::Long, Ty::Float, Ty::Bool, Ty::Complex, Ty::named(ROOT_TYPE)] {
        im.static_method(IO, "print", Ty::Void, &[t.clone()])?;
        im.static_method(IO, "println", Ty::Void, &[t])?;
    }
    im.static_method(IO, "println", Ty::Void, &[])?;
    im.static_method(IO, "read", Ty::String, &[])?;

    // distributions
    im.ty(DISTRIBUTION, root)?;
    im.ctor(DISTRIBUTION, &[])?;
    im.method(DISTRIBUTION, "next", Ty::Float, &[])?;
    for (name, params) in [
        ("UniformDistribution", vec![Ty::Float, Ty::Float]),
        ("ExponentialDistribution", vec![Ty::Float]),
        ("NormalDistribution", vec![Ty::Float, Ty::Float]),
    ] {
        im.ty(name, Some(DISTRIBUTION))?;
        im.ctor(name, &params)?;
    }

    // simulation
    im.ty(EMITTER, root)?;
    im.ctor(EMITTER, &[])?;
    im.method(EMITTER, "set_period", Ty::Void, &[Ty::Float])?;
    im.method(EMITTER, "set_distribution", Ty::Void, &[Ty::named(DISTRIBUTION)])?;
    im.method(EMITTER, "set_limit", Ty::Void, &[Ty::Int])?;
    im.method(EMITTER, "create", Ty::named(ROOT_TYPE), &[])?;
    im.method(EMITTER, "condition", Ty::Bool, &[])?;

    im.ty(PLANNER, root)?;
    im.ctor(PLANNER, &[])?;
    im.method(PLANNER, "plan", Ty::Void, &[])?;

    im.ty(SIMULATION, root)?;
    let planner = Ty::named(PLANNER);
    im.static_method(SIMULATION, "register", Ty::Void, &[Ty::named(EMITTER)])?;
    im.static_method(SIMULATION, "run", Ty::Void, &[])?;
    im.static_method(SIMULATION, "run", Ty::Void, &[Ty::Float])?;
    im.static_method(SIMULATION, "run", Ty::Void, &[planner.clone()])?;
    im.static_method(SIMULATION, "run", Ty::Void, &[Ty::Float, planner])?;
    im.static_method(SIMULATION, "time", Ty::Float, &[])?;
    im.static_method(SIMULATION, "stop", Ty::Void, &[])?;

    tracing::debug!(types = im.reg.type_count(), methods = im.reg.method_count(), "runtime library installed");
    Ok(())
}
