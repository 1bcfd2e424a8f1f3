use thiserror::Error;

use super::value::Value;

/// A parse-time failure with its 1-based location.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Failures surfaced by [`super::Interpreter::run`].
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// A value was thrown and never caught; carries its rendered message.
    #[error("{0}")]
    Uncaught(String),
    /// Execution was stopped by a resource limit.
    #[error("{0}")]
    Halted(String),
}

/// Non-local exits inside the interpreter.
#[derive(Clone, Debug)]
pub enum Abort {
    Throw(Value),
    Halt(String),
    /// An `await` whose promise can never settle; unwinds to the enclosing
    /// async function, which stays pending.
    Suspend,
}

pub type Flow<T> = Result<T, Abort>;
