use crate::ast::{NodeKind, NodeRef};
use crate::error::{ParseError, RuntimeError};
use crate::interp::Interp;
use crate::parser;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Runtime
//
// The source → tokens → AST → execution pipeline shared by the CLI, the
// REPL, and the test suites.
//===----------------------------------------------------------------------===//

#[derive(Debug)]
pub enum RunError {
    Parse(Vec<ParseError>),
    Runtime(RuntimeError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RunError::Parse(errors) => {
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            RunError::Runtime(error) => write!(f, "{}", error),
        }
    }
}

pub struct Runtime {
    pub interp: Interp,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime { interp: Interp::new() }
    }

    pub fn parse(&self, source: &str) -> Result<NodeRef, RunError> {
        parser::parse(source).map_err(RunError::Parse)
    }

    /// Parses and executes `source`, returning the value of the last
    /// expression statement.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, RunError> {
        let program = self.parse(source)?;
        self.exec_program(&program)?;
        Ok(self.interp.last_value.clone())
    }

    pub fn exec_program(&mut self, program: &NodeRef) -> Result<(), RunError> {
        let global = self.interp.global.clone();
        self.interp
            .exec(program, &global)
            .map(|_| ())
            .map_err(RunError::Runtime)
    }

    /// Whether `source` is a single expression statement; the REPL echoes
    /// the result for those.
    pub fn is_single_expression(program: &NodeRef) -> bool {
        match &program.kind {
            NodeKind::Program(statements) => {
                statements.len() == 1
                    && matches!(statements[0].kind, NodeKind::ExprStmt(_))
            }
            _ => false,
        }
    }

    /// Runs a whole script: execute, then unwind any top-level defers.
    /// Returns the process exit code.
    pub fn run_script(&mut self, source: &str) -> Result<(), RunError> {
        let result = self.eval_source(source).map(|_| ());
        self.interp.unwind_all_defers();
        result
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
