// Property tests for typing: the numeric ladder, subtype distance and
// lexical scope bookkeeping.

use proptest::prelude::*;
use quill::registry::{Binding, Scope, Slot, Ty};

// =============================================================================
// Generators
// =============================================================================

/// A literal of the given numeric type and the type's name.
fn numeric_literal() -> impl Strategy<Value = (String, Ty)> {
    prop_oneof![
        (0i32..1000).prop_map(|n| (n.to_string(), Ty::Int)),
        (0i32..1000).prop_map(|n| (format!("{n}L"), Ty::Long)),
        (0u32..1000, 0u32..100).prop_map(|(a, b)| (format!("{a}.{b}"), Ty::Float)),
        (1u32..1000).prop_map(|n| (format!("{n}i"), Ty::Complex)),
    ]
}

fn arith_op() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("+"), Just("-"), Just("*"), Just("/")]
}

fn rank(ty: &Ty) -> u8 {
    ty.numeric_rank().unwrap_or(0)
}

fn local_type(source: &str, name: &str) -> Option<String> {
    let module = quill::compile_source(source).ok()?;
    let main = module.method("$Program", "main()")?;
    main.locals.iter().find(|l| l.name.as_deref() == Some(name)).map(|l| l.ty.clone())
}

/// `type T0 {}`, `type T1 : T0 {}`, ... `type T{n-1} : T{n-2} {}`.
fn chain(len: usize) -> String {
    (0..len)
        .map(|i| if i == 0 { "type T0 {\n}\n".to_string() } else { format!("type T{i} : T{} {{\n}}\n", i - 1) })
        .collect()
}

// =============================================================================
// Numeric ladder
// =============================================================================

/// Mixed arithmetic yields the wider operand type, except that `long` and
/// `complex` never mix.
#[test]
fn prop_arithmetic_takes_the_wider_type() {
    proptest!(|((a, ta) in numeric_literal(), (b, tb) in numeric_literal(), op in arith_op())| {
        let source = format!("var r = {a} {op} {b}");
        let mixed = matches!((&ta, &tb), (Ty::Long, Ty::Complex) | (Ty::Complex, Ty::Long));
        let found = local_type(&source, "r");
        if mixed {
            prop_assert!(found.is_none(), "{source} should be rejected");
        } else {
            let expected = if rank(&tb) > rank(&ta) { tb } else { ta };
            prop_assert_eq!(found, Some(expected.to_string()), "{}", source);
        }
    });
}

/// Assigning a narrower numeric literal to a declared variable compiles;
/// assigning a wider one does not.
#[test]
fn prop_declared_numeric_accepts_only_widening() {
    proptest!(|((value, from) in numeric_literal(), (_, to) in numeric_literal())| {
        let source = format!("var v: {to} = {value}");
        let ok = quill::compile_source(&source).is_ok();
        let registry = quill::parse_source("").unwrap().registry;
        prop_assert_eq!(ok, registry.assignable(&to, &from), "{}", source);
    });
}

#[test]
fn prop_numeric_distance_follows_rank() {
    let ladder = [Ty::Int, Ty::Long, Ty::Float, Ty::Complex];
    let registry = quill::parse_source("").unwrap().registry;
    proptest!(|(p in 0usize..4, a in 0usize..4)| {
        let (param, arg) = (&ladder[p], &ladder[a]);
        match registry.distance(param, arg) {
            Some(d) => {
                prop_assert!(a <= p);
                prop_assert_eq!(d == 0, a == p);
            }
            None => prop_assert!(a > p || (*arg == Ty::Long && p >= 2)),
        }
    });
}

// =============================================================================
// Subtype distance
// =============================================================================

#[test]
fn prop_chain_distance_counts_hops() {
    proptest!(ProptestConfig::with_cases(48), |(len in 1usize..8, i in 0usize..8, j in 0usize..8)| {
        prop_assume!(i < len && j < len);
        let registry = quill::parse_source(&chain(len)).unwrap().registry;
        let base = Ty::named(format!("T{i}"));
        let derived = Ty::named(format!("T{j}"));
        let expected = if j >= i { Some((j - i) as u32) } else { None };
        prop_assert_eq!(registry.distance(&base, &derived), expected);
    });
}

#[test]
fn prop_null_fits_every_reference_type() {
    proptest!(ProptestConfig::with_cases(32), |(len in 1usize..6, i in 0usize..6)| {
        prop_assume!(i < len);
        let registry = quill::parse_source(&chain(len)).unwrap().registry;
        prop_assert_eq!(registry.distance(&Ty::named(format!("T{i}")), &Ty::Null), Some(0));
        prop_assert_eq!(registry.distance(&Ty::array_of(Ty::named(format!("T{i}"))), &Ty::Null), Some(0));
        prop_assert_eq!(registry.distance(&Ty::Float, &Ty::Null), None);
    });
}

// =============================================================================
// Scopes
// =============================================================================

#[derive(Debug, Clone)]
enum ScopeOp {
    Push,
    Pop,
    Declare(u8),
}

fn scope_op() -> impl Strategy<Value = ScopeOp> {
    prop_oneof![Just(ScopeOp::Push), Just(ScopeOp::Pop), (0u8..6).prop_map(ScopeOp::Declare)]
}

/// Replaying push/pop/declare against a plain model: a name is visible iff
/// some open frame declared it, and redeclaring a visible name fails.
#[test]
fn prop_scope_matches_frame_model() {
    proptest!(|(ops in prop::collection::vec(scope_op(), 0..60))| {
        let mut scope = Scope::new();
        let mut model: Vec<Vec<String>> = Vec::new();
        let mut next_slot = 0u16;

        for op in ops {
            match op {
                ScopeOp::Push => {
                    scope.push();
                    model.push(Vec::new());
                }
                ScopeOp::Pop => {
                    if model.pop().is_some() {
                        scope.pop();
                    }
                }
                ScopeOp::Declare(n) => {
                    let name = format!("v{n}");
                    let visible = model.iter().any(|f| f.contains(&name));
                    let result = scope.declare(&name, Binding { ty: Ty::Int, slot: Slot::Local(next_slot) });
                    if visible || model.is_empty() {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        if let Some(frame) = model.last_mut() {
                            frame.push(name);
                        }
                        next_slot += 1;
                    }
                }
            }
            prop_assert_eq!(scope.depth(), model.len());
            for n in 0u8..6 {
                let name = format!("v{n}");
                prop_assert_eq!(scope.contains(&name), model.iter().any(|f| f.contains(&name)));
            }
        }

        while model.pop().is_some() {
            scope.pop();
        }
        prop_assert!(scope.is_balanced());
    });
}
