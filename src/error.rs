use std::fmt;

//===----------------------------------------------------------------------===//
// Error
//===----------------------------------------------------------------------===//

/// Every failure class the interpreter can report. One variant per category
/// so the driver and the tests can match on the kind without string parsing.
#[derive(Debug, Clone)]
pub enum Error {
    Syntax(String),
    Name(String),
    Type(String),
    Index(String),
    Arity(String),
    Ffi(String),
    Io(String),
    Runtime(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Error::Name(msg) => write!(f, "Name error: {}", msg),
            Error::Type(msg) => write!(f, "Type error: {}", msg),
            Error::Index(msg) => write!(f, "Index error: {}", msg),
            Error::Arity(msg) => write!(f, "Arity error: {}", msg),
            Error::Ffi(msg) => write!(f, "FFI error: {}", msg),
            Error::Io(msg) => write!(f, "IO error: {}", msg),
            Error::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

//===----------------------------------------------------------------------===//
// RuntimeError
//===----------------------------------------------------------------------===//

/// An error raised during evaluation, pinned to the source line of the
/// offending node.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub error: Error,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(error: Error, line: u32) -> Self {
        Self { error, line }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.error)
    }
}

//===----------------------------------------------------------------------===//
// ParseError
//===----------------------------------------------------------------------===//

/// A parser diagnostic. The parser synchronizes after each one, so a single
/// pass can report several.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[line {}, col {}] Syntax error: {}",
            self.line, self.column, self.message
        )
    }
}
