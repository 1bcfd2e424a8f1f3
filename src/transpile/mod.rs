//! TypeScript to JavaScript.
//!
//! The run pipeline only talks to a [`Compiler`]. [`TypeStripper`] is the
//! built-in service: it erases type syntax in place so diagnostics and
//! runtime errors keep their line and column.

mod stripper;

use serde::Deserialize;
use thiserror::Error;

pub use stripper::TypeStripper;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum Target {
    ES2015,
    ES2017,
    ES2020,
    ESNext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum ModuleKind {
    None,
    CommonJs,
    EsNext,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    pub target: Target,
    pub module: ModuleKind,
    pub strict: bool,
    pub es_module_interop: bool,
    pub skip_lib_check: bool,
}

impl CompilerOptions {
    /// The fixed configuration every playground run compiles with.
    pub fn playground() -> Self {
        Self {
            target: Target::ES2020,
            module: ModuleKind::None,
            strict: true,
            es_module_interop: true,
            skip_lib_check: true,
        }
    }
}

/// A compiler message, 1-based position when it can be located.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn unlocated(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "({}:{}): {}", line, column, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub output_text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// The service itself failed, as opposed to finding problems in the source.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("unsupported compiler option: {0}")]
    UnsupportedOption(String),
    #[error("compiler service failed: {0}")]
    Internal(String),
}

pub trait Compiler: Send + Sync {
    fn transpile(&self, source: &str, options: &CompilerOptions) -> Result<CompileOutput, CompilerError>;
}

/// Compiles with the playground options. Any diagnostic aborts the run.
pub fn compile(compiler: &dyn Compiler, source: &str) -> Result<Result<String, Vec<Diagnostic>>, CompilerError> {
    let output = compiler.transpile(source, &CompilerOptions::playground())?;
    if output.diagnostics.is_empty() {
        Ok(Ok(output.output_text))
    } else {
        tracing::debug!(count = output.diagnostics.len(), "compile produced diagnostics");
        Ok(Err(output.diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(CompileOutput);

    impl Compiler for Fixed {
        fn transpile(&self, _: &str, options: &CompilerOptions) -> Result<CompileOutput, CompilerError> {
            assert_eq!(options, &CompilerOptions::playground());
            Ok(self.0.clone())
        }
    }

    #[test]
    fn clean_output_is_forwarded_verbatim() {
        let service = Fixed(CompileOutput {
            output_text: "  let x = 1;\n".into(),
            diagnostics: vec![],
        });
        assert_eq!(compile(&service, "").unwrap(), Ok("  let x = 1;\n".to_string()));
    }

    #[test]
    fn diagnostics_abort() {
        let service = Fixed(CompileOutput {
            output_text: "let x = 1;".into(),
            diagnostics: vec![Diagnostic::unlocated("bad"), Diagnostic::at("worse", 2, 5)],
        });
        let diagnostics = compile(&service, "").unwrap().unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[1].to_string(), "(2:5): worse");
    }

    #[test]
    fn stripper_rejects_module_output() {
        let mut options = CompilerOptions::playground();
        options.module = ModuleKind::CommonJs;
        let err = TypeStripper.transpile("let a = 1;", &options).unwrap_err();
        assert!(err.to_string().contains("module"));
    }
}
