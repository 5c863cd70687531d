use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diagnostics::CompileError;

/// File looked up next to the entry source file.
pub const CONFIG_FILE: &str = "quill.toml";

/// Options that shape one compilation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    /// Name recorded on the produced target module.
    pub module_name: String,
    /// Extra directories searched by `include` after the including file's own directory.
    pub include_dirs: Vec<PathBuf>,
    /// Types whose static methods are callable unqualified without a `use`.
    pub implicit_uses: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            module_name: "program".to_string(),
            include_dirs: Vec::new(),
            implicit_uses: vec!["io".to_string()],
        }
    }
}

impl CompilerOptions {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, CompileError> {
        toml::from_str(text).map_err(|e| CompileError::config(e.to_string(), path))
    }

    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::io(format!("could not read config: {e}"), path))?;
        let mut options = Self::from_toml_str(&text, path)?;
        // Relative include dirs are relative to the config file.
        if let Some(base) = path.parent() {
            for dir in &mut options.include_dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(options)
    }

    /// Options from `quill.toml` beside `entry`, or the defaults when there is none.
    pub fn discover(entry: &Path) -> Result<Self, CompileError> {
        let dir = entry.parent().unwrap_or_else(|| Path::new("."));
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading compiler options");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
