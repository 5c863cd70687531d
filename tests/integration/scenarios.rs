//! Whole programs compiled end to end.

mod common;

use common::{body, compile_ok, compile_should_fail_with, lines, main_body, method};

#[test]
fn mixed_addition_is_float() {
    let module = compile_ok("var a = 1\nvar b = 2.0\nvar c = a + b");
    let main = method(&module, "$Program", "main()");
    let c = main.locals.iter().find(|l| l.name.as_deref() == Some("c")).unwrap();
    assert_eq!(c.ty, "float");
}

#[test]
fn autoconstruct_point() {
    let module = compile_ok("autoconstruct type Pt {\n int x\n int y\n}\nvar p = new Pt(1, 2)\nvar same = p == new Pt(1, 2)");

    let ctor = method(&module, "Pt", "new(int, int)");
    let params: Vec<_> = ctor.params.iter().map(|p| (p.name.as_str(), p.ty.as_str())).collect();
    assert_eq!(params, vec![("x", "int"), ("y", "int")]);
    let ctor_body = body(&module, "Pt", "new(int, int)");
    assert!(ctor_body.contains("ldarg 1\n  stfld Pt::x"), "{ctor_body}");
    assert!(ctor_body.contains("ldarg 2\n  stfld Pt::y"), "{ctor_body}");

    let eq = body(&module, "Pt", "equal(Pt)");
    assert_eq!(lines(&eq).iter().filter(|l| l.starts_with("ldfld")).count(), 4);
    assert!(eq.contains("ldfld Pt::x"), "{eq}");
    assert!(eq.contains("ldfld Pt::y"), "{eq}");
}

#[test]
fn exact_match_overload() {
    let main = main_body("void foo(int n) {\n}\nvoid foo(float n) {\n}\nfoo(1)");
    assert!(main.contains("ldc.i4 1\n  call $Program::foo(int)"), "{main}");
}

#[test]
fn nearest_widening_overload() {
    let main = main_body("void foo(float n) {\n}\nvoid foo(complex n) {\n}\nfoo(1)");
    assert!(main.contains("ldc.i4 1\n  conv.r8\n  call $Program::foo(float)"), "{main}");
}

#[test]
fn break_outside_loop() {
    compile_should_fail_with("break", "'break' is only allowed inside a loop body");
    compile_should_fail_with(
        "void f() {\n if true {\n break\n }\n}",
        "'break' is only allowed inside a loop body",
    );
}

#[test]
fn emit_captures_outer_local() {
    let module = compile_ok(
        "type Job {\n int size\n new(int s) {\n @size = s\n }\n}\nvar n = 5\nemit new Job(n) every 1.0",
    );
    let carrier = module.type_named("$Emitter0").unwrap();
    assert_eq!(carrier.fields.len(), 1);
    assert_eq!(carrier.fields[0].ty, "int");

    let main = body(&module, "$Program", "main()");
    assert!(
        main.contains("newobj $Emitter0::new()\n  dup\n  ldloc 0\n  stfld $Emitter0::$cap0"),
        "{main}"
    );
}

#[test]
fn queue_simulation() {
    let src = r#"use Math

autoconstruct type Customer {
    float arrived
}

type Counter {
    static int served
}

Customer arrive() {
    return new Customer(Simulation.time())
}

emit arrive() every 1.5 with new ExponentialDistribution(0.5) limit 100

simulate for 60.0 planner {
    if Simulation.time() > 30.0 {
        Counter.served += 1
    }
}
println("done")
"#;
    let module = compile_ok(src);
    assert!(module.type_named("$Emitter0").is_some());
    assert!(module.type_named("$Planner0").is_some());
    assert_eq!(module.entry_point.as_ref().map(|e| module.method_name(e)).as_deref(), Some("$Program::main()"));
    let plan = body(&module, "$Planner0", "plan()");
    assert!(plan.contains("ldsfld Counter::served"), "{plan}");
}

#[test]
fn inheritance_and_dispatch() {
    let src = "type Shape {\n float area() {\n return 0.0\n }\n}\n\
               type Square : Shape {\n float side\n new(float s) {\n @side = s\n }\n float area() {\n return side * side\n }\n}\n\
               var shapes: Shape[] = [new Square(2.0), new Shape()]\n\
               var total = 0.0\n\
               for s in shapes {\n total += s.area()\n}\n\
               println(total)";
    let module = compile_ok(src);
    let main = body(&module, "$Program", "main()");
    assert!(main.contains("callvirt Shape::area()"), "{main}");
    assert!(main.contains("call [runtime:io::println(float)]"), "{main}");
    let square = method(&module, "Square", "area()");
    assert!(square.is_virtual);
}
