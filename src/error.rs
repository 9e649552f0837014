//! The unified error surface (`spec.md` §4.8 "Errors").
//!
//! Three distinct failure families never get conflated: a [`SyntaxError`]
//! happens before any script code runs, an [`EvalError`] carries a script
//! call stack at the moment a thrown value escaped uncaught, and a
//! [`LimitsError`] is uncatchable and unwinds past every script `try`
//! (`spec.md` §7). [`Error`] is the embedder-facing enum that unifies all
//! three behind one `?`-friendly type.

use std::rc::Rc;

pub use crate::lexer::SyntaxError;
pub use crate::resource::LimitsError;

/// One script call-stack frame, captured at the point a value was thrown
/// (`spec.md` §4.8, §8 scenario "uncaught TypeError carries a stack trace").
///
/// `text` is the source of the statement that was executing in this frame —
/// for the innermost frame, the statement that actually faulted; for every
/// frame above it, the statement that called into the next frame down
/// (`spec.md` §6 "EvalError runtime stack line format").
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub text: Rc<str>,
    pub filename: Rc<str>,
    pub line: u32,
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.text, self.filename, self.line)
    }
}

/// A script-thrown value that escaped every `try`/`catch` in the program
/// (`spec.md` §4.8).
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub stack: Vec<StackFrame>,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.message)?;
        for frame in &self.stack {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}
impl std::error::Error for EvalError {}

/// Top-level error type returned by [`crate::run::eval`] and
/// [`crate::run::parse`] (`spec.md` §6).
#[derive(Debug)]
pub enum Error {
    Syntax(SyntaxError),
    Eval(EvalError),
    Limits(LimitsError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "{e}"),
            Error::Eval(e) => write!(f, "{e}"),
            Error::Limits(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for Error {}

impl From<SyntaxError> for Error {
    fn from(e: SyntaxError) -> Self {
        Error::Syntax(e)
    }
}
impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}
impl From<LimitsError> for Error {
    fn from(e: LimitsError) -> Self {
        Error::Limits(e)
    }
}
