use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use quill::config::CompilerOptions;
use quill::diagnostics::{render_error, CompileError};
use quill::target::TargetModule;
use quill::Compiler;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quillc", version, about = "The Quill simulation language compiler")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print errors as single `file:line:col` lines instead of rendered reports
    #[arg(long, global = true)]
    plain: bool,

    /// Extra directory searched by `include` (repeatable)
    #[arg(short = 'I', long = "include", global = true)]
    include: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .ql source file to a target module
    Compile {
        /// Source file path
        file: PathBuf,
        /// Output path. If omitted, prints to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = Emit::Asm)]
        emit: Emit,
        /// Name recorded on the module, overriding quill.toml
        #[arg(long)]
        module_name: Option<String>,
    },
    /// Type-check a .ql source file without writing anything
    Check {
        /// Source file path
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    /// Human-readable listing
    Asm,
    /// Serialized module
    Json,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn options_for(file: &Path, include: &[PathBuf], module_name: Option<String>) -> Result<CompilerOptions, CompileError> {
    let mut options = CompilerOptions::discover(file)?;
    options.include_dirs.extend(include.iter().cloned());
    if let Some(name) = module_name {
        options.module_name = name;
    }
    Ok(options)
}

/// Compile `file`, reporting any error against the sources read so far.
fn build(cli: &Cli, file: &Path, module_name: Option<String>) -> Result<TargetModule, ()> {
    let report = |compiler: Option<&Compiler>, err: CompileError| {
        let empty = quill::span::SourceMap::new();
        let sources = compiler.map(|c| c.sources()).unwrap_or(&empty);
        if cli.plain {
            eprintln!("{}", err.located(sources));
        } else if let Err(io) = render_error(sources, &err) {
            eprintln!("error: {} (could not render report: {io})", err.located(sources));
        }
    };
    let options = options_for(file, &cli.include, module_name).map_err(|err| report(None, err))?;
    let mut compiler = Compiler::new(options).map_err(|err| report(None, err))?;
    match compiler.compile_file(file) {
        Ok(module) => Ok(module),
        Err(err) => {
            report(Some(&compiler), err);
            Err(())
        }
    }
}

fn render(module: &TargetModule, emit: Emit) -> Result<String, String> {
    match emit {
        Emit::Asm => Ok(module.disassemble()),
        Emit::Json => module.to_json().map_err(|e| format!("could not serialize module: {e}")),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Compile { file, output, emit, module_name } => {
            let Ok(module) = build(&cli, file, module_name.clone()) else {
                std::process::exit(1);
            };
            let text = match render(&module, *emit) {
                Ok(text) => text,
                Err(msg) => {
                    eprintln!("error: {msg}");
                    std::process::exit(1);
                }
            };
            match output {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, text) {
                        eprintln!("error: could not write {}: {e}", path.display());
                        std::process::exit(1);
                    }
                }
                None => print!("{text}"),
            }
        }
        Commands::Check { file } => {
            if build(&cli, file, None).is_err() {
                std::process::exit(1);
            }
            eprintln!("{}: ok", file.display());
        }
    }
}
