mod common;

use common::{body, compile_ok, compile_should_fail_with, lines, main_body};

const CAR: &str = "type Car {\n int speed\n new() {\n }\n new(int s) {\n @speed = s\n }\n}\n";

fn with_car(rest: &str) -> String {
    format!("{CAR}{rest}")
}

#[test]
fn emit_registers_a_carrier() {
    let main = main_body(&with_car("emit new Car() every 2.5"));
    assert_eq!(lines(&main), vec![
        "newobj $Emitter0::new()",
        "dup",
        "ldc.r8 2.5",
        "callvirt [runtime:Emitter::set_period(float)]",
        "call [runtime:Simulation::register(Emitter)]",
        "ret",
    ]);
}

#[test]
fn carrier_derives_from_emitter() {
    let module = compile_ok(&with_car("emit new Car() every 2.5"));
    let carrier = module.type_named("$Emitter0").unwrap();
    assert_eq!(carrier.parent.as_deref(), Some("Emitter"));
    assert_eq!(
        lines(&body(&module, "$Emitter0", "new()")),
        vec!["ldarg 0", "call [runtime:Emitter::.ctor()]", "ret"]
    );
    assert_eq!(lines(&body(&module, "$Emitter0", "create()")), vec!["newobj Car::new()", "ret"]);
    assert!(module.method("$Emitter0", "condition()").is_none());
}

#[test]
fn captured_locals_are_copied_at_construction() {
    let module = compile_ok(&with_car("var s = 3\nemit new Car(s) every 1\ns = 4"));
    let main = body(&module, "$Program", "main()");
    assert_eq!(lines(&main), vec![
        "ldc.i4 3",
        "stloc 0",
        "newobj $Emitter0::new()",
        "dup",
        "ldloc 0",
        "stfld $Emitter0::$cap0",
        "dup",
        "ldc.i4 1",
        "conv.r8",
        "callvirt [runtime:Emitter::set_period(float)]",
        "call [runtime:Simulation::register(Emitter)]",
        "ldc.i4 4",
        "stloc 0",
        "ret",
    ]);
    assert_eq!(lines(&body(&module, "$Emitter0", "create()")), vec![
        "ldarg 0",
        "ldfld $Emitter0::$cap0",
        "stloc 0",
        "ldloc 0",
        "newobj Car::new(int)",
        "ret",
    ]);
}

#[test]
fn until_condition_becomes_a_method() {
    let module = compile_ok(&with_car("var n = 0\nemit new Car() every 1.0 until n > 5"));
    let condition = body(&module, "$Emitter0", "condition()");
    assert_eq!(lines(&condition), vec![
        "ldarg 0",
        "ldfld $Emitter0::$cap0",
        "stloc 0",
        "ldloc 0",
        "ldc.i4 5",
        "cgt",
        "ret",
    ]);
}

#[test]
fn distribution_and_limit_are_set_eagerly() {
    let main = main_body(&with_car(
        "emit new Car() every 1.0 with new ExponentialDistribution(2.0) limit 10",
    ));
    assert!(
        main.contains(
            "newobj [runtime:ExponentialDistribution::.ctor(float)]\n  callvirt [runtime:Emitter::set_distribution(Distribution)]"
        ),
        "{main}"
    );
    assert!(main.contains("ldc.i4 10\n  callvirt [runtime:Emitter::set_limit(int)]"), "{main}");
}

#[test]
fn each_emit_gets_its_own_carrier() {
    let module = compile_ok(&with_car("emit new Car() every 1.0\nemit new Car(2) every 3.0"));
    assert!(module.type_named("$Emitter0").is_some());
    assert!(module.type_named("$Emitter1").is_some());
}

#[test]
fn program_functions_are_callable_from_deferred_code() {
    let module = compile_ok(&with_car("Car make() {\n return new Car()\n}\nemit make() every 1.0"));
    let create = body(&module, "$Emitter0", "create()");
    assert!(create.contains("call $Program::make()"), "{create}");
}

#[test]
fn emitted_expression_needs_a_value() {
    compile_should_fail_with("emit println(1) every 1.0", "an emitted expression must produce a value");
}

#[test]
fn period_must_be_numeric() {
    compile_should_fail_with(&with_car("emit new Car() every \"soon\""), "emit period must be numeric, found 'string'");
}

#[test]
fn limit_must_be_int() {
    compile_should_fail_with(&with_car("emit new Car() every 1.0 limit 2.5"), "emit limit must be 'int', found 'float'");
}

#[test]
fn distribution_must_be_a_distribution() {
    compile_should_fail_with(
        &with_car("emit new Car() every 1.0 with 3"),
        "emit distribution must be a 'Distribution', found 'int'",
    );
}

#[test]
fn until_must_be_bool() {
    compile_should_fail_with(&with_car("emit new Car() every 1.0 until 1"), "'until' condition must be 'bool', found 'int'");
}

#[test]
fn fields_cannot_be_closured() {
    compile_should_fail_with(
        &with_car("type Shop {\n int stock\n void open() {\n emit new Car(@stock) every 1.0\n }\n}"),
        "closured member '@stock' cannot be used inside a deferred block",
    );
    compile_should_fail_with(
        &with_car("type Shop {\n int stock\n void open() {\n emit new Car(stock) every 1.0\n }\n}"),
        "closured member 'stock' cannot be used inside a deferred block",
    );
}

#[test]
fn methods_and_this_cannot_be_closured() {
    compile_should_fail_with(
        &with_car("type Shop {\n Car make() {\n return new Car()\n }\n void open() {\n emit make() every 1.0\n }\n}"),
        "closured member 'make' cannot be used inside a deferred block",
    );
    compile_should_fail_with(
        "type Shop {\n void open() {\n emit this every 1.0\n }\n}",
        "closured member 'this' cannot be used inside a deferred block",
    );
}

#[test]
fn method_parameters_are_captured() {
    let module = compile_ok(&with_car("type Shop {\n void open(int rate) {\n emit new Car(rate) every 1.0\n }\n}"));
    let open = body(&module, "Shop", "open(int)");
    assert!(open.contains("dup\n  ldarg 1\n  stfld $Emitter0::$cap0"), "{open}");
}

#[test]
fn simulate_forms() {
    assert!(main_body("simulate").contains("call [runtime:Simulation::run()]"));
    let timed = main_body("simulate for 100");
    assert!(timed.contains("ldc.i4 100\n  conv.r8\n  call [runtime:Simulation::run(float)]"), "{timed}");
}

#[test]
fn simulate_duration_must_be_numeric() {
    compile_should_fail_with("simulate for \"long\"", "simulation duration must be numeric, found 'string'");
}

#[test]
fn planner_is_lifted() {
    let module = compile_ok("var rounds = 3\nsimulate for 10.0 planner {\n for i in 0..rounds {\n println(i)\n }\n}");
    let main = body(&module, "$Program", "main()");
    assert!(
        main.contains("ldc.r8 10.0\n  newobj $Planner0::new()\n  dup\n  ldloc 0\n  stfld $Planner0::$cap0\n  call [runtime:Simulation::run(float,Planner)]"),
        "{main}"
    );
    let carrier = module.type_named("$Planner0").unwrap();
    assert_eq!(carrier.parent.as_deref(), Some("Planner"));
    assert_eq!(carrier.fields.len(), 1);
    let plan = body(&module, "$Planner0", "plan()");
    assert!(plan.contains("callvirt [runtime:range::next()]"), "{plan}");
}

#[test]
fn planner_locals_shadow_nothing_outside() {
    let module = compile_ok("simulate planner {\n var t = Simulation.time()\n println(t)\n}");
    assert!(module.type_named("$Planner0").unwrap().fields.is_empty());
    let plan = body(&module, "$Planner0", "plan()");
    assert!(plan.contains("call [runtime:Simulation::time()]"), "{plan}");
}
