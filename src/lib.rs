pub mod closures;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod span;
pub mod stdlib;
pub mod target;
pub mod visit;

use std::path::Path;
use std::rc::Rc;

use config::CompilerOptions;
use diagnostics::CompileError;
use parser::ast::{Block, Program};
use registry::{FieldEntry, MethodBody, MethodEntry, Registry, Ty, ARGS_FIELD, ENTRY_POINT};
use span::{Span, SourceMap, Spanned};
use target::TargetModule;
use tracing::info;

/// Name under which in-memory sources are registered.
pub const MAIN_FILE: &str = "main.ql";

/// One compilation: the registry, the sources it was built from, and the
/// options shaping it. Single use; build a new one per program.
///
/// The registry starts out holding the runtime library, the `$Program` type
/// and the configured implicit `use`s.
pub struct Compiler {
    options: CompilerOptions,
    registry: Registry,
    sources: SourceMap,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Result<Self, CompileError> {
        let mut registry = Registry::new();
        stdlib::install(&mut registry)?;
        for name in &options.implicit_uses {
            registry.use_type(name)?;
        }
        registry.program_type();
        Ok(Self { options, registry, sources: SourceMap::new() })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every file read so far, for rendering diagnostics.
    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    pub fn parse_file(&mut self, path: &Path) -> Result<Program, CompileError> {
        let mut parser = parser::Parser::new(&mut self.registry, &mut self.sources, self.options.include_dirs.clone());
        parser.parse_file(path)
    }

    pub fn parse_str(&mut self, name: &Path, source: &str) -> Result<Program, CompileError> {
        let mut parser = parser::Parser::new(&mut self.registry, &mut self.sources, self.options.include_dirs.clone());
        parser.parse_str(name, source)
    }

    pub fn compile_file(&mut self, path: &Path) -> Result<TargetModule, CompileError> {
        info!(file = %path.display(), "compiling");
        let program = self.parse_file(path)?;
        self.generate(&program)
    }

    pub fn compile_str(&mut self, name: &Path, source: &str) -> Result<TargetModule, CompileError> {
        info!(file = %name.display(), "compiling");
        let program = self.parse_str(name, source)?;
        self.generate(&program)
    }

    /// Resolve `use`s, synthesize default members, wrap the top-level
    /// statements into `$Program.main()` and generate the module.
    pub fn generate(&mut self, program: &Program) -> Result<TargetModule, CompileError> {
        for used in &program.uses {
            self.registry.use_type(&used.node).map_err(|e| e.with_span_if_missing(used.span))?;
        }
        self.registry.synthesize_members()?;

        let program_ty = self.registry.program_type();
        let span = program.main.first().map(|s| s.span).unwrap_or_else(Span::dummy);
        let body = Spanned::new(Block { stmts: program.main.clone() }, span);
        let mut main = MethodEntry::new(ENTRY_POINT, vec![], Ty::Void, MethodBody::User(Rc::new(body)));
        main.is_static = true;
        main.span = Some(span);
        self.registry.add_method(program_ty, main)?;

        let mut args = FieldEntry::new(ARGS_FIELD, Ty::array_of(Ty::String));
        args.is_static = true;
        self.registry.add_field(program_ty, args)?;

        codegen::generate(&mut self.registry, &self.options.module_name)
    }
}

/// Compile in-memory source with default options.
pub fn compile_source(source: &str) -> Result<TargetModule, CompileError> {
    Compiler::new(CompilerOptions::default())?.compile_str(Path::new(MAIN_FILE), source)
}

/// The front half of a compilation: parsed, registered, not yet generated.
pub struct Parsed {
    pub registry: Registry,
    pub program: Program,
    pub sources: SourceMap,
}

/// Parse in-memory source with default options, without synthesis or code
/// generation.
pub fn parse_source(source: &str) -> Result<Parsed, CompileError> {
    let mut compiler = Compiler::new(CompilerOptions::default())?;
    let program = compiler.parse_str(Path::new(MAIN_FILE), source)?;
    Ok(Parsed { registry: compiler.registry, program, sources: compiler.sources })
}
