mod common;

use common::{body, compile_ok, compile_should_fail_with, main_body};
use quill::registry::{Lookup, Registry, Resolution, Ty};

fn registry_of(src: &str) -> Registry {
    quill::parse_source(src).unwrap().registry
}

#[test]
fn exact_overload_beats_widening() {
    let src = "void f(int a) {\n}\nvoid f(float a) {\n}\nf(1)\nf(1.5)";
    let main = main_body(src);
    assert!(main.contains("call $Program::f(int)"), "{main}");
    assert!(main.contains("call $Program::f(float)"), "{main}");
}

#[test]
fn int_widens_to_long_before_complex() {
    let src = "void g(long a) {\n}\nvoid g(complex a) {\n}\ng(3)";
    let main = main_body(src);
    assert!(main.contains("ldc.i4 3\n  conv.i8\n  call $Program::g(long)"), "{main}");
}

#[test]
fn minimum_total_distance_wins() {
    let src = "void h(float a, float b) {\n}\nvoid h(int a, float b) {\n}\nh(1, 2)";
    let main = main_body(src);
    assert!(main.contains("call $Program::h(int, float)"), "{main}");
}

#[test]
fn equal_distance_is_ambiguous() {
    compile_should_fail_with(
        "void k(long a, int b) {\n}\nvoid k(int a, long b) {\n}\nk(1, 1)",
        "ambiguous call to 'k': $Program.k(long, int) and $Program.k(int, long)",
    );
}

#[test]
fn no_candidate_lists_argument_types() {
    compile_should_fail_with(
        "void k(int a) {\n}\nk(\"x\")",
        "no function 'k' accepting (string)",
    );
}

#[test]
fn subtype_argument_counts_hops() {
    let reg = registry_of(
        "type A {\n}\ntype B : A {\n}\ntype C : B {\n}\ntype Z {\n}",
    );
    let c = Ty::named("C");
    assert_eq!(reg.distance(&Ty::named("A"), &c), Some(2));
    assert_eq!(reg.distance(&Ty::named("B"), &c), Some(1));
    assert_eq!(reg.distance(&Ty::named("C"), &c), Some(0));
    assert_eq!(reg.distance(&Ty::named("Z"), &c), None);
    assert_eq!(reg.distance(&Ty::named("C"), &Ty::named("A")), None);
}

#[test]
fn null_matches_reference_parameters_only() {
    let reg = registry_of("type A {\n}");
    assert_eq!(reg.distance(&Ty::named("A"), &Ty::Null), Some(0));
    assert_eq!(reg.distance(&Ty::String, &Ty::Null), Some(0));
    assert_eq!(reg.distance(&Ty::Int, &Ty::Null), None);
    assert_eq!(reg.distance(&Ty::Null, &Ty::named("A")), None);
}

#[test]
fn arrays_match_exactly() {
    let reg = registry_of("type A {\n}\ntype B : A {\n}");
    let a = Ty::array_of(Ty::named("A"));
    assert_eq!(reg.distance(&a, &a), Some(0));
    assert_eq!(reg.distance(&a, &Ty::array_of(Ty::named("B"))), None);
    assert_eq!(reg.distance(&Ty::array_of(Ty::Float), &Ty::array_of(Ty::Int)), None);
}

#[test]
fn derived_method_hides_ancestor_with_same_signature() {
    let src = "type A {\n string who() {\n return \"A\"\n }\n}\n\
               type B : A {\n string who() {\n return \"B\"\n }\n}\n\
               var b = new B()\nprintln(b.who())";
    let main = main_body(src);
    assert!(main.contains("callvirt B::who()"), "{main}");
}

#[test]
fn inherited_method_is_found_through_parent() {
    let src = "type A {\n int one() {\n return 1\n }\n}\ntype B : A {\n}\nvar n = new B().one()";
    let main = main_body(src);
    assert!(main.contains("callvirt A::one()"), "{main}");
}

#[test]
fn constructors_are_not_inherited() {
    compile_should_fail_with(
        "type A {\n int x\n new(int x) {\n @x = x\n }\n new() {\n }\n}\ntype B : A {\n}\nvar b = new B(1)",
        "type 'B' has no accessible constructor accepting (int)",
    );
}

#[test]
fn used_type_statics_are_callable_unqualified() {
    let main = main_body("use Math\nvar r = sqrt(2.0)");
    assert!(main.contains("call [runtime:Math::sqrt(float)]"), "{main}");
}

#[test]
fn unused_type_statics_are_not_visible() {
    compile_should_fail_with("var r = sqrt(2.0)", "no function 'sqrt' accepting (float)");
}

#[test]
fn qualified_static_call_needs_no_use() {
    let main = main_body("var r = Math.max(1, 2)");
    assert!(main.contains("call [runtime:Math::max(int,int)]"), "{main}");
}

#[test]
fn own_methods_shadow_used_types() {
    let src = "use Math\nfloat sqrt(float x) {\n return x\n}\nvar r = sqrt(4.0)";
    let main = main_body(src);
    assert!(main.contains("call $Program::sqrt(float)"), "{main}");
}

#[test]
fn private_method_hidden_from_other_types() {
    compile_should_fail_with(
        "type Vault {\n private int code() {\n return 1\n }\n}\nvar n = new Vault().code()",
        "type 'Vault' has no method 'code' accepting ()",
    );
}

#[test]
fn private_method_visible_to_owner() {
    let module = compile_ok(
        "type Vault {\n private int code() {\n return 1\n }\n int peek() {\n return code()\n }\n}",
    );
    let peek = body(&module, "Vault", "peek()");
    assert!(peek.contains("ldarg 0\n  callvirt Vault::code()"), "{peek}");
}

#[test]
fn private_field_hidden_from_other_types() {
    compile_should_fail_with(
        "type Vault {\n private int secret\n}\nvar v = new Vault()\nvar s = v.secret",
        "field 'Vault.secret' is private",
    );
}

#[test]
fn static_method_cannot_call_instance_method_unqualified() {
    compile_should_fail_with(
        "type T {\n void inst() {\n }\n static void st() {\n inst()\n }\n}",
        "instance method 'T.inst()' cannot be called from a static method",
    );
}

#[test]
fn signature_round_trips_through_registry() {
    let reg = registry_of(
        "type Shape {\n float area(int[] sides, {string:float} w) {\n return 0.0\n }\n new(int n) {\n }\n}",
    );
    let shape = reg.lookup("Shape").unwrap();
    for id in reg.ty(shape).methods.clone() {
        let sig = reg.method(id).signature();
        assert_eq!(reg.find_method_by_signature(shape, &sig), Some(id), "{sig}");
    }
}

#[test]
fn lookup_reports_ambiguity_as_value() {
    let reg = registry_of("type T {\n void m(long a, int b) {\n }\n void m(int a, long b) {\n }\n}");
    let t = reg.lookup("T").unwrap();
    let args = [Ty::Int, Ty::Int];
    assert!(matches!(reg.find_method(t, &Lookup::new("m", &args, Some(t))), Resolution::Ambiguous(..)));
    let none = [Ty::String];
    assert_eq!(reg.find_method(t, &Lookup::new("m", &none, Some(t))), Resolution::NotFound);
}
