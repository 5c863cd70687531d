mod common;

use std::fs;

use common::quillc;

#[test]
fn compile_prints_listing_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("hello.ql");
    fs::write(&src, "println(\"hello\")\n").unwrap();

    let out = quillc().arg("compile").arg(&src).output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let listing = String::from_utf8(out.stdout).unwrap();
    assert!(listing.starts_with(".module program\n"), "{listing}");
    assert!(listing.contains(".entrypoint $Program::main()"), "{listing}");
    assert!(listing.contains("call [runtime:io::println(string)]"), "{listing}");
}

#[test]
fn compile_writes_json_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("app.ql");
    let out_path = dir.path().join("app.json");
    fs::write(&src, "type Pt {\n int x\n}\n").unwrap();

    let out = quillc()
        .args(["compile", "--emit", "json", "--module-name", "geometry", "-o"])
        .arg(&out_path)
        .arg(&src)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(json["name"], "geometry");
    let names: Vec<&str> = json["types"].as_array().unwrap().iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"Pt"), "{names:?}");
    assert!(names.contains(&"$Program"), "{names:?}");
}

#[test]
fn check_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("ok.ql");
    fs::write(&src, "var a = 1\n").unwrap();

    let out = quillc().arg("check").arg(&src).output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("ok.ql: ok"));
}

#[test]
fn plain_errors_are_single_lines() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.ql");
    fs::write(&src, "var a = 1\nvar b = a + \"x\"\n").unwrap();

    let out = quillc().args(["--plain", "check"]).arg(&src).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("bad.ql:2:9: semantic error: operator '+' cannot be applied to 'int' and 'string'"),
        "{stderr}"
    );
}

#[test]
fn rendered_errors_show_the_message() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("bad.ql");
    fs::write(&src, "var a = b\n").unwrap();

    let out = quillc().arg("compile").arg(&src).output().unwrap();
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown identifier 'b'"));
}

#[test]
fn include_flag_extends_search_path() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir(&lib).unwrap();
    fs::write(lib.join("util.ql"), "int twice(int n) {\n return n * 2\n}\n").unwrap();
    let src = dir.path().join("main.ql");
    fs::write(&src, "include \"util.ql\"\nprintln(twice(2))\n").unwrap();

    let without = quillc().args(["--plain", "check"]).arg(&src).output().unwrap();
    assert!(!without.status.success());

    let with = quillc().arg("-I").arg(&lib).arg("check").arg(&src).output().unwrap();
    assert!(with.status.success(), "stderr: {}", String::from_utf8_lossy(&with.stderr));
}

#[test]
fn missing_file_fails() {
    let out = quillc().args(["check", "does/not/exist.ql"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("io error"));
}
