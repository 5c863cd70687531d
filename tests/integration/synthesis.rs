mod common;

use common::{body, compile_ok, compile_should_fail_with, lines, main_body};

#[test]
fn default_ctor_calls_parent() {
    let module = compile_ok("type Pt {\n int x\n}");
    let ctor = body(&module, "Pt", "new()");
    assert_eq!(lines(&ctor), vec!["ldarg 0", "call [runtime:object::.ctor()]", "ret"]);
}

#[test]
fn declared_ctor_suppresses_default() {
    let module = compile_ok("type Pt {\n int x\n new(int x) {\n @x = x\n }\n}");
    assert!(module.method("Pt", "new()").is_none());
    assert!(module.method("Pt", "new(int)").is_some());
}

#[test]
fn derived_ctor_chains_to_user_parent() {
    let module = compile_ok("type A {\n}\ntype B : A {\n}");
    let ctor = body(&module, "B", "new()");
    assert_eq!(lines(&ctor), vec!["ldarg 0", "call A::new()", "ret"]);
}

#[test]
fn parent_without_default_ctor_is_rejected() {
    compile_should_fail_with(
        "type A {\n new(int x) {\n }\n}\ntype B : A {\n}",
        "parent type 'A' of 'B' has no accessible constructor without arguments",
    );
}

#[test]
fn autoconstruct_assigns_fields_in_order() {
    let module = compile_ok("autoconstruct type Pt {\n int x\n float y\n}");
    let ctor = body(&module, "Pt", "new(int, float)");
    assert_eq!(lines(&ctor), vec![
        "ldarg 0",
        "call [runtime:object::.ctor()]",
        "ldarg 0",
        "ldarg 1",
        "stfld Pt::x",
        "ldarg 0",
        "ldarg 2",
        "stfld Pt::y",
        "ret",
    ]);
    // Autoconstruct types still get the parameterless form.
    assert!(module.method("Pt", "new()").is_some());
}

#[test]
fn autoconstruct_call_widens_arguments() {
    let main = main_body("autoconstruct type Pt {\n int x\n float y\n}\nvar p = new Pt(1, 2)");
    assert!(main.contains("ldc.i4 1\n  ldc.i4 2\n  conv.r8\n  newobj Pt::new(int, float)"), "{main}");
}

#[test]
fn to_s_returns_type_name() {
    let module = compile_ok("type Pt {\n}");
    assert_eq!(lines(&body(&module, "Pt", "to_s()")), vec!["ldstr \"Pt\"", "ret"]);
}

#[test]
fn to_s_inherited_from_user_ancestor() {
    let module = compile_ok(
        "type Base {\n string to_s() {\n return \"base\"\n }\n}\ntype Child : Base {\n}",
    );
    assert!(module.method("Child", "to_s()").is_none());
    let main = main_body(
        "type Base {\n string to_s() {\n return \"base\"\n }\n}\ntype Child : Base {\n}\nvar s = new Child().to_s()",
    );
    assert!(main.contains("callvirt Base::to_s()"), "{main}");
}

#[test]
fn equal_compares_fields() {
    let module = compile_ok("type Pt {\n int x\n}");
    let eq = body(&module, "Pt", "equal(Pt)");
    assert_eq!(lines(&eq), vec![
        "ldarg 1",
        "ldnull",
        "ceq",
        "brtrue L0",
        "ldarg 0",
        "ldfld Pt::x",
        "ldarg 1",
        "ldfld Pt::x",
        "ceq",
        "brfalse L0",
        "ldc.i4 1",
        "ret",
        "L0:",
        "ldc.i4 0",
        "ret",
    ]);
}

#[test]
fn equal_covers_inherited_fields() {
    let module = compile_ok("type A {\n int a\n}\ntype B : A {\n string b\n}");
    let eq = body(&module, "B", "equal(B)");
    assert!(eq.contains("ldfld A::a"), "{eq}");
    assert!(eq.contains("ldfld B::b"), "{eq}");
    assert!(eq.contains("call [runtime:string::op_equal(string,string)]"), "{eq}");
}

#[test]
fn double_equals_uses_equal_method() {
    let main = main_body("type Pt {\n int x\n}\nvar same = new Pt() == new Pt()");
    assert!(main.contains("Pt::equal(Pt)"), "{main}");
}

#[test]
fn enum_factory_sets_ordinal_and_name() {
    let module = compile_ok("enum Color { Red, Green }");
    assert_eq!(lines(&body(&module, "Color", "Green()")), vec![
        "newobj Color::new()",
        "dup",
        "ldc.i4 1",
        "stfld Color::ordinal",
        "dup",
        "ldstr \"Green\"",
        "stfld Color::name",
        "ret",
    ]);
}

#[test]
fn enum_to_s_reads_name() {
    let module = compile_ok("enum Color { Red }");
    assert_eq!(lines(&body(&module, "Color", "to_s()")), vec!["ldarg 0", "ldfld Color::name", "ret"]);
}

#[test]
fn enum_to_array_lists_every_value() {
    let module = compile_ok("enum Color { Red, Green, Blue }");
    let all = body(&module, "Color", "to_array()");
    let all = lines(&all);
    assert_eq!(&all[..2], &["ldc.i4 3", "newarr Color"]);
    assert_eq!(all.iter().filter(|l| **l == "stelem").count(), 3);
    assert!(all.contains(&"call Color::Blue()"));
}

#[test]
fn enum_value_access() {
    let main = main_body("enum Color { Red, Green }\nvar c = Color.Green\nvar all = Color.to_array()");
    assert!(main.contains("call Color::Green()\n  stloc 0"), "{main}");
    assert!(main.contains("call Color::to_array()"), "{main}");
}

#[test]
fn enum_cannot_be_constructed() {
    compile_should_fail_with("enum Color { Red }\nvar c = new Color()", "enum 'Color' cannot be constructed with 'new'");
}

#[test]
fn unknown_enum_value() {
    compile_should_fail_with("enum Color { Red }\nvar c = Color.Purple", "type 'Color' has no field 'Purple'");
}
