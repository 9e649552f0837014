//! Source/position tracking shared by the lexer, parser and interpreter.
//!
//! Every token and AST node carries a [`CodeLoc`] so that `SyntaxError` and
//! the script-level call stack on `EvalError` can report exact positions
//! (`spec.md` §4.8, §6).

use std::fmt;

/// A 1-based (line, column) position plus the script's filename.
///
/// Cheap to copy; filenames are shared via `Rc<str>` so cloning a location
/// for every AST node does not allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLoc {
    pub filename: std::rc::Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    pub fn new(filename: std::rc::Rc<str>, line: u32, column: u32) -> Self {
        Self { filename, line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

/// Tracks line/column while scanning UTF-8 source.
///
/// Lines and columns are both 1-based, matching the `"[line: L, column: C]"`
/// `SyntaxError` format mandated by `spec.md` §6.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    filename: std::rc::Rc<str>,
    line: u32,
    column: u32,
}

impl PositionTracker {
    pub fn new(filename: std::rc::Rc<str>) -> Self {
        Self { filename, line: 1, column: 1 }
    }

    pub fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.filename.clone(), self.line, self.column)
    }

    /// Advances the tracker past a single character, updating line/column.
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}
