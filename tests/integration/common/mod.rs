#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use quill::config::CompilerOptions;
use quill::target::{MethodDef, TargetModule};
use quill::{Compiler, MAIN_FILE};

pub fn quillc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quillc"))
}

pub fn compile_ok(source: &str) -> TargetModule {
    match quill::compile_source(source) {
        Ok(module) => module,
        Err(err) => panic!("compilation failed: {err}\n--- source ---\n{source}"),
    }
}

/// `file:line:col: kind error: message` of the failed compilation.
pub fn compile_err(source: &str) -> String {
    let mut compiler = Compiler::new(CompilerOptions::default()).unwrap();
    match compiler.compile_str(Path::new(MAIN_FILE), source) {
        Ok(_) => panic!("compilation should have failed\n--- source ---\n{source}"),
        Err(err) => err.located(compiler.sources()),
    }
}

pub fn compile_should_fail_with(source: &str, expected_msg: &str) {
    let err = compile_err(source);
    assert!(
        err.contains(expected_msg),
        "expected error containing '{expected_msg}', got: {err}"
    );
}

pub fn method<'m>(module: &'m TargetModule, ty: &str, signature: &str) -> &'m MethodDef {
    module
        .method(ty, signature)
        .unwrap_or_else(|| panic!("no method {ty}::{signature} in\n{}", module.disassemble()))
}

/// Disassembled body of `ty::signature`.
pub fn body(module: &TargetModule, ty: &str, signature: &str) -> String {
    module.disassemble_body(method(module, ty, signature))
}

/// Disassembled body of the entry point.
pub fn main_body(source: &str) -> String {
    let module = compile_ok(source);
    body(&module, "$Program", "main()")
}

/// Instruction lines without the two-space indent.
pub fn lines(body: &str) -> Vec<&str> {
    body.lines().map(str::trim).collect()
}
