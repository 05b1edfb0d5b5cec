//! Error taxonomies for the compiler and VM (§7 of the design doc).
//!
//! `CompileError` and `RuntimeError` are kept distinct because they map to different
//! process exit codes and because a compile error never touches runtime state.

use thiserror::Error;

/// A single compiler diagnostic, carrying the source line it was raised on.
#[derive(Debug, Clone, Error)]
#[error("[line {line}] Error: {message}")]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Everything that can go wrong once the VM starts executing a chunk.
///
/// The `Display` impl produces exactly the message text the VM writes to the
/// diagnostic stream before it prints the stack trace (§4.8).
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Can only call functions.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Only lists can be subscripted.")]
    NotSubscriptable,
    #[error("List index must be an integer.")]
    IndexNotInteger,
    #[error("List index out of bounds.")]
    IndexOutOfBounds,
    #[error("Native error: {0}")]
    Native(String),
}

/// I/O failure while the CLI driver tries to open/read a script file.
#[derive(Debug, Error)]
#[error("could not read '{path}': {source}")]
pub struct IoError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// What `Vm::interpret` can fail with (§7): a compile error never touches runtime
/// state, a runtime error has already been reported and the VM's stacks reset by
/// the time this reaches the caller.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Process exit code per §6: 65 for a compile error, 70 for a runtime error.
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpretError::Compile(_) => 65,
            InterpretError::Runtime(_) => 70,
        }
    }
}
