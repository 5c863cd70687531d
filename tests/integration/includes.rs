use std::fs;
use std::path::Path;

use quill::config::CompilerOptions;
use quill::target::TargetModule;
use quill::Compiler;

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn compile(entry: &Path, options: CompilerOptions) -> Result<TargetModule, String> {
    let mut compiler = Compiler::new(options).unwrap();
    compiler.compile_file(entry).map_err(|e| e.located(compiler.sources()))
}

#[test]
fn included_types_are_usable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shapes.ql", "autoconstruct type Pt {\n int x\n int y\n}\n");
    write(dir.path(), "main.ql", "include \"shapes.ql\"\nvar p = new Pt(1, 2)\nprintln(p.x)\n");

    let module = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap();
    assert!(module.type_named("Pt").is_some());
}

#[test]
fn nested_includes_resolve_relative_to_includer() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib/base.ql", "type Base {\n}\n");
    write(dir.path(), "lib/derived.ql", "include \"base.ql\"\ntype Derived : Base {\n}\n");
    write(dir.path(), "main.ql", "include \"lib/derived.ql\"\nvar d = new Derived()\n");

    let module = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap();
    assert_eq!(module.type_named("Derived").unwrap().parent.as_deref(), Some("Base"));
}

#[test]
fn including_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "util.ql", "int one() {\n return 1\n}\n");
    write(dir.path(), "main.ql", "include \"util.ql\"\ninclude \"util.ql\"\n");

    let err = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap_err();
    assert!(err.ends_with("semantic error: file 'util.ql' is already included"), "{err}");
}

#[test]
fn including_the_entry_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.ql", "include \"main.ql\"\n");

    let err = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap_err();
    assert!(err.contains("file 'main.ql' is already included"), "{err}");
}

#[test]
fn missing_include_is_reported_at_the_statement() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.ql", "var a = 1\ninclude \"nope.ql\"\n");

    let err = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap_err();
    assert!(err.contains("main.ql:2:1: semantic error: cannot find included file 'nope.ql'"), "{err}");
}

#[test]
fn errors_in_included_files_name_that_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bad.ql", "type Broken {\n int x\n int x\n}\n");
    write(dir.path(), "main.ql", "include \"bad.ql\"\n");

    let err = compile(&dir.path().join("main.ql"), CompilerOptions::default()).unwrap_err();
    assert!(err.contains("bad.ql:3:"), "{err}");
    assert!(err.contains("field 'x' is already defined in type 'Broken'"), "{err}");
}

#[test]
fn include_dirs_are_searched_after_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "vendor/queue.ql", "type Queue {\n}\n");
    write(dir.path(), "app/main.ql", "include \"queue.ql\"\nvar q = new Queue()\n");

    let options = CompilerOptions { include_dirs: vec![dir.path().join("vendor")], ..CompilerOptions::default() };
    let module = compile(&dir.path().join("app/main.ql"), options).unwrap();
    assert!(module.type_named("Queue").is_some());
}

#[test]
fn config_file_beside_entry_is_discovered() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "quill.toml",
        "module_name = \"bank\"\ninclude_dirs = [\"shared\"]\nimplicit_uses = [\"io\", \"Math\"]\n",
    );
    write(dir.path(), "shared/account.ql", "type Account {\n float balance\n}\n");
    write(dir.path(), "main.ql", "include \"account.ql\"\nvar r = sqrt(4.0)\n");

    let entry = dir.path().join("main.ql");
    let options = CompilerOptions::discover(&entry).unwrap();
    assert_eq!(options.module_name, "bank");

    let module = compile(&entry, options).unwrap();
    assert_eq!(module.name, "bank");
    assert!(module.type_named("Account").is_some());
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "quill.toml", "optimize = true\n");
    write(dir.path(), "main.ql", "println(1)\n");

    let err = CompilerOptions::discover(&dir.path().join("main.ql")).unwrap_err();
    assert!(err.located(&quill::span::SourceMap::new()).contains("config error"), "{err}");
}

#[test]
fn missing_entry_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile(&dir.path().join("absent.ql"), CompilerOptions::default()).unwrap_err();
    assert!(err.contains("io error: could not read source"), "{err}");
}
