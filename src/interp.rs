use std::path::PathBuf;
use std::rc::Rc;

use crate::ast::{BinOp, Node, NodeKind, NodeRef, UnOp};
use crate::builtins;
use crate::cffi::{self, CFunctionDesc, CFunctionObj};
use crate::cheader::{self, HeaderParser, MacroValue};
use crate::ctype::CType;
use crate::dynload;
use crate::env::{Env, EnvRef, SetOutcome};
use crate::error::{Error, RuntimeError};
use crate::interner::intern;
use crate::parser;
use crate::value::{ArrayObj, Function, Obj, PointerObj, TableObj, Value};

//===----------------------------------------------------------------------===//
// Evaluator
//
// Walks the AST against an environment chain. A statement's outcome is a
// Flow value: loops absorb Break/Continue, calls absorb Return, blocks
// forward everything outward, and errors propagate as Results straight to
// the driver.
//===----------------------------------------------------------------------===//

/// Outcome of executing one statement.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type EvalResult = Result<Value, RuntimeError>;
type ExecResult = Result<Flow, RuntimeError>;

/// A pending deferred statement with the environment it was pushed in.
struct DeferEntry {
    statement: NodeRef,
    env: EnvRef,
}

pub struct Interp {
    pub global: EnvRef,
    /// Most recent expression-statement value; the implicit return.
    pub last_value: Value,
    defers: Vec<DeferEntry>,
}

fn raise(error: Error, node: &Node) -> RuntimeError {
    RuntimeError::new(error, node.line)
}

impl Interp {
    pub fn new() -> Self {
        let global = Env::new();
        builtins::register_all(&global);
        builtins::init_clock();
        Interp { global, last_value: Value::Nil, defers: Vec::new() }
    }

    //===------------------------------------------------------------------===//
    // Expressions
    //===------------------------------------------------------------------===//

    pub fn eval(&mut self, node: &NodeRef, env: &EnvRef) -> EvalResult {
        match &node.kind {
            NodeKind::IntLit(value) => Ok(Value::Int(*value)),
            NodeKind::FloatLit(value) => Ok(Value::Float(*value)),
            NodeKind::StrLit(value) => Ok(Value::str(intern(value))),
            NodeKind::BoolLit(value) => Ok(Value::Bool(*value)),
            NodeKind::NilLit => Ok(Value::Nil),

            NodeKind::Ident(name) => match env.get(&intern(name)) {
                Some(value) => Ok(value),
                None => Err(raise(
                    Error::Name(format!("Undefined variable '{}'", name)),
                    node,
                )),
            },

            NodeKind::Binary { op, left, right } => {
                self.eval_binary(node, *op, left, right, env)
            }
            NodeKind::Unary { op, operand } => {
                let value = self.eval(operand, env)?;
                match op {
                    UnOp::Neg => match value {
                        Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
                        Value::Float(v) => Ok(Value::Float(-v)),
                        _ => Err(raise(
                            Error::Type("Operand must be a number".to_string()),
                            node,
                        )),
                    },
                    UnOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }

            NodeKind::Call { callee, args } => self.eval_call(node, callee, args, env),

            NodeKind::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                self.eval_index(node, &object, &index)
            }

            NodeKind::Field { object, name } => {
                let object = self.eval(object, env)?;
                match object {
                    Value::Obj(Obj::Table(table)) => {
                        Ok(table.table.borrow().get(&intern(name)).unwrap_or(Value::Nil))
                    }
                    other => Err(raise(
                        Error::Type(format!(
                            "Cannot access field on type {}",
                            other.type_name()
                        )),
                        node,
                    )),
                }
            }

            NodeKind::ArrayLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element, env)?);
                }
                Ok(Value::Obj(Obj::Array(ArrayObj::new(values))))
            }

            NodeKind::TableLit(entries) => {
                let table = TableObj::new();
                for (key, value_node) in entries {
                    let value = self.eval(value_node, env)?;
                    table.table.borrow_mut().set(intern(key), value, false);
                }
                Ok(Value::Obj(Obj::Table(table)))
            }

            NodeKind::Range { start, end } => {
                let start = self.eval(start, env)?;
                let end = self.eval(end, env)?;
                let (Value::Int(start), Value::Int(end)) = (start, end) else {
                    return Err(raise(
                        Error::Type("Range bounds must be integers".to_string()),
                        node,
                    ));
                };
                let values: Vec<Value> = if start <= end {
                    (start..end).map(Value::Int).collect()
                } else {
                    ((end + 1)..=start).rev().map(Value::Int).collect()
                };
                Ok(Value::Obj(Obj::Array(ArrayObj::new(values))))
            }

            NodeKind::Lambda { params, body } => Ok(Value::Obj(Obj::Function(
                Function::new(None, params.clone(), body.clone(), env.clone()),
            ))),

            NodeKind::AddressOf(operand) => {
                let value = self.eval(operand, env)?;
                match value {
                    Value::Obj(Obj::CStruct(cs)) => Ok(Value::Obj(Obj::Pointer(
                        PointerObj::new(cs.data_ptr() as usize, "void*"),
                    ))),
                    _ => Err(raise(
                        Error::Type("Cannot take address of this value".to_string()),
                        node,
                    )),
                }
            }

            _ => Err(raise(
                Error::Runtime("Expected an expression".to_string()),
                node,
            )),
        }
    }

    fn eval_binary(
        &mut self,
        node: &Node,
        op: BinOp,
        left: &NodeRef,
        right: &NodeRef,
        env: &EnvRef,
    ) -> EvalResult {
        let lhs = self.eval(left, env)?;

        // Short-circuit forms return the deciding operand itself.
        if op == BinOp::And {
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            return self.eval(right, env);
        }
        if op == BinOp::Or {
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            return self.eval(right, env);
        }

        let rhs = self.eval(right, env)?;

        if op == BinOp::Eq {
            return Ok(Value::Bool(lhs.equals(&rhs)));
        }
        if op == BinOp::NotEq {
            return Ok(Value::Bool(!lhs.equals(&rhs)));
        }

        // String concatenation; a non-string right operand is coerced.
        if op == BinOp::Add {
            if let Some(left_str) = lhs.as_str() {
                let mut combined = left_str.as_str().to_string();
                match rhs.as_str() {
                    Some(right_str) => combined.push_str(right_str.as_str()),
                    None => combined.push_str(&rhs.to_display_string()),
                }
                return Ok(Value::str(intern(&combined)));
            }
        }

        if !lhs.is_number() || !rhs.is_number() {
            return Err(raise(
                Error::Type("Operands must be numbers".to_string()),
                node,
            ));
        }

        let use_float = matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_));
        if use_float {
            let l = lhs.as_number().unwrap();
            let r = rhs.as_number().unwrap();
            match op {
                BinOp::Add => Ok(Value::Float(l + r)),
                BinOp::Sub => Ok(Value::Float(l - r)),
                BinOp::Mul => Ok(Value::Float(l * r)),
                BinOp::Div => {
                    if r == 0.0 {
                        return Err(raise(
                            Error::Runtime("Division by zero".to_string()),
                            node,
                        ));
                    }
                    Ok(Value::Float(l / r))
                }
                BinOp::Rem => {
                    if r == 0.0 {
                        return Err(raise(
                            Error::Runtime("Modulo by zero".to_string()),
                            node,
                        ));
                    }
                    Ok(Value::Float(l % r))
                }
                BinOp::Lt => Ok(Value::Bool(l < r)),
                BinOp::Gt => Ok(Value::Bool(l > r)),
                BinOp::LtEq => Ok(Value::Bool(l <= r)),
                BinOp::GtEq => Ok(Value::Bool(l >= r)),
                _ => unreachable!("handled above"),
            }
        } else {
            let (Value::Int(l), Value::Int(r)) = (&lhs, &rhs) else {
                unreachable!("both operands are integers");
            };
            let (l, r) = (*l, *r);
            match op {
                BinOp::Add => Ok(Value::Int(l.wrapping_add(r))),
                BinOp::Sub => Ok(Value::Int(l.wrapping_sub(r))),
                BinOp::Mul => Ok(Value::Int(l.wrapping_mul(r))),
                BinOp::Div => {
                    if r == 0 {
                        return Err(raise(
                            Error::Runtime("Division by zero".to_string()),
                            node,
                        ));
                    }
                    Ok(Value::Int(l.wrapping_div(r)))
                }
                BinOp::Rem => {
                    if r == 0 {
                        return Err(raise(
                            Error::Runtime("Modulo by zero".to_string()),
                            node,
                        ));
                    }
                    Ok(Value::Int(l.wrapping_rem(r)))
                }
                BinOp::Lt => Ok(Value::Bool(l < r)),
                BinOp::Gt => Ok(Value::Bool(l > r)),
                BinOp::LtEq => Ok(Value::Bool(l <= r)),
                BinOp::GtEq => Ok(Value::Bool(l >= r)),
                _ => unreachable!("handled above"),
            }
        }
    }

    fn eval_index(&mut self, node: &Node, object: &Value, index: &Value) -> EvalResult {
        match object {
            Value::Obj(Obj::Array(arr)) => {
                let Value::Int(i) = index else {
                    return Err(raise(
                        Error::Type("Array index must be integer".to_string()),
                        node,
                    ));
                };
                let elements = arr.elements.borrow();
                if *i < 0 || *i as usize >= elements.len() {
                    return Err(raise(
                        Error::Index("Array index out of bounds".to_string()),
                        node,
                    ));
                }
                Ok(elements[*i as usize].clone())
            }
            Value::Obj(Obj::Table(table)) => {
                let Some(key) = index.as_str() else {
                    return Err(raise(
                        Error::Type("Table key must be string".to_string()),
                        node,
                    ));
                };
                Ok(table.table.borrow().get(key).unwrap_or(Value::Nil))
            }
            Value::Obj(Obj::Str(s)) => {
                let Value::Int(i) = index else {
                    return Err(raise(
                        Error::Type("String index must be integer".to_string()),
                        node,
                    ));
                };
                let text = s.as_str();
                if *i < 0 || *i as usize >= text.len() {
                    return Err(raise(
                        Error::Index("String index out of bounds".to_string()),
                        node,
                    ));
                }
                let i = *i as usize;
                match text.get(i..i + 1) {
                    Some(ch) => Ok(Value::str(intern(ch))),
                    None => Err(raise(
                        Error::Index("String index out of bounds".to_string()),
                        node,
                    )),
                }
            }
            other => Err(raise(
                Error::Type(format!("Cannot index type {}", other.type_name())),
                node,
            )),
        }
    }

    //===------------------------------------------------------------------===//
    // Calls
    //===------------------------------------------------------------------===//

    fn eval_call(
        &mut self,
        node: &Node,
        callee: &NodeRef,
        args: &[NodeRef],
        env: &EnvRef,
    ) -> EvalResult {
        let callee = self.eval(callee, env)?;

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg, env)?);
        }

        match callee {
            Value::Obj(Obj::Native(native)) => {
                if native.arity >= 0 && arg_values.len() != native.arity as usize {
                    return Err(raise(
                        Error::Arity(format!(
                            "Expected {} arguments but got {}",
                            native.arity,
                            arg_values.len()
                        )),
                        node,
                    ));
                }
                (native.function)(&arg_values).map_err(|error| raise(error, node))
            }
            Value::Obj(Obj::CFunction(cfn)) => cffi::call(&cfn.desc, &arg_values)
                .map_err(|error| raise(error, node)),
            Value::Obj(Obj::Function(func)) => {
                self.call_function(node, &func, &arg_values)
            }
            _ => Err(raise(
                Error::Type("Can only call functions".to_string()),
                node,
            )),
        }
    }

    fn call_function(
        &mut self,
        node: &Node,
        func: &Rc<Function>,
        args: &[Value],
    ) -> EvalResult {
        if args.len() != func.arity() {
            return Err(raise(
                Error::Arity(format!(
                    "Expected {} arguments but got {}",
                    func.arity(),
                    args.len()
                )),
                node,
            ));
        }

        // Lexical scoping: the call frame chains to the captured
        // environment, not the caller's.
        let fn_env = Env::with_enclosing(func.env.clone());
        for (param, arg) in func.params.iter().zip(args) {
            fn_env.define(&intern(param), arg.clone(), false);
        }

        let marker = self.defers.len();
        self.last_value = Value::Nil;

        let result = self.exec(&func.body, &fn_env);
        let result = self.unwind_defers(marker, result);

        match result? {
            Flow::Return(value) => Ok(value),
            // Implicit return: the last expression-statement value.
            _ => Ok(self.last_value.clone()),
        }
    }

    //===------------------------------------------------------------------===//
    // Statements
    //===------------------------------------------------------------------===//

    pub fn exec(&mut self, node: &NodeRef, env: &EnvRef) -> ExecResult {
        match &node.kind {
            NodeKind::VarDecl { name, init, is_const } => {
                let value = self.eval(init, env)?;
                if !env.define(&intern(name), value, *is_const) {
                    return Err(raise(
                        Error::Name(format!("Variable '{}' already defined", name)),
                        node,
                    ));
                }
                Ok(Flow::Normal)
            }

            NodeKind::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.exec_assign(node, target, value, env)?;
                Ok(Flow::Normal)
            }

            NodeKind::ExprStmt(expr) => {
                self.last_value = self.eval(expr, env)?;
                Ok(Flow::Normal)
            }

            NodeKind::Block(statements) => self.exec_block(statements, env),

            NodeKind::Program(statements) => {
                for statement in statements {
                    match self.exec(statement, env)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            NodeKind::If { cond, then_branch, else_branch } => {
                let cond = self.eval(cond, env)?;
                if cond.is_truthy() {
                    self.exec(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }

            NodeKind::While { cond, body } => {
                loop {
                    let value = self.eval(cond, env)?;
                    if !value.is_truthy() {
                        break;
                    }
                    match self.exec(body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }

            NodeKind::For { iterator, iterable, body } => {
                self.exec_for(node, iterator, iterable, body, env)
            }

            NodeKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, env)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }

            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),

            NodeKind::FnDecl { name, params, body } => {
                let func = Function::new(
                    Some(name.clone()),
                    params.clone(),
                    body.clone(),
                    env.clone(),
                );
                // First definition wins.
                env.define(&intern(name), Value::Obj(Obj::Function(func)), false);
                Ok(Flow::Normal)
            }

            NodeKind::Match { scrutinee, arms } => {
                let value = self.eval(scrutinee, env)?;
                for arm in arms {
                    if !self.pattern_matches(&arm.pattern, &value, env)? {
                        continue;
                    }
                    if matches!(arm.body.kind, NodeKind::Block(_)) {
                        return self.exec(&arm.body, env);
                    }
                    // Expression arm: the result feeds implicit return.
                    self.last_value = self.eval(&arm.body, env)?;
                    return Ok(Flow::Normal);
                }
                Ok(Flow::Normal)
            }

            NodeKind::Defer(statement) => {
                self.defers.push(DeferEntry {
                    statement: statement.clone(),
                    env: env.clone(),
                });
                Ok(Flow::Normal)
            }

            NodeKind::Import(path) => {
                self.exec_import(node, path)?;
                Ok(Flow::Normal)
            }

            NodeKind::CBlock(_) => Err(raise(
                Error::Runtime("@c blocks not yet implemented".to_string()),
                node,
            )),

            // An expression in statement position arrives wrapped in
            // ExprStmt; anything else here is a parser invariant breach.
            _ => Err(raise(
                Error::Runtime("Expected a statement".to_string()),
                node,
            )),
        }
    }

    fn exec_assign(
        &mut self,
        node: &Node,
        target: &NodeRef,
        value: Value,
        env: &EnvRef,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            NodeKind::Ident(name) => match env.set(&intern(name), value) {
                SetOutcome::Assigned => Ok(()),
                SetOutcome::ReadOnly => Err(raise(
                    Error::Name(format!("Cannot assign to constant '{}'", name)),
                    node,
                )),
                SetOutcome::Undefined => Err(raise(
                    Error::Name(format!("Undefined variable '{}'", name)),
                    node,
                )),
            },

            NodeKind::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                match object {
                    Value::Obj(Obj::Array(arr)) => {
                        let Value::Int(i) = index else {
                            return Err(raise(
                                Error::Type("Array index must be integer".to_string()),
                                node,
                            ));
                        };
                        let mut elements = arr.elements.borrow_mut();
                        if i >= 0 && (i as usize) < elements.len() {
                            elements[i as usize] = value;
                        }
                        Ok(())
                    }
                    Value::Obj(Obj::Table(table)) => {
                        let Some(key) = index.as_str() else {
                            return Err(raise(
                                Error::Type("Table key must be string".to_string()),
                                node,
                            ));
                        };
                        table.table.borrow_mut().set(key.clone(), value, false);
                        Ok(())
                    }
                    other => Err(raise(
                        Error::Type(format!(
                            "Cannot index type {}",
                            other.type_name()
                        )),
                        node,
                    )),
                }
            }

            NodeKind::Field { object, name } => {
                let object = self.eval(object, env)?;
                match object {
                    Value::Obj(Obj::Table(table)) => {
                        table.table.borrow_mut().set(intern(name), value, false);
                        Ok(())
                    }
                    other => Err(raise(
                        Error::Type(format!(
                            "Cannot set field on type {}",
                            other.type_name()
                        )),
                        node,
                    )),
                }
            }

            _ => Err(raise(
                Error::Type("Invalid assignment target".to_string()),
                node,
            )),
        }
    }

    fn exec_block(&mut self, statements: &[NodeRef], env: &EnvRef) -> ExecResult {
        let block_env = Env::with_enclosing(env.clone());
        let marker = self.defers.len();

        let mut result = Ok(Flow::Normal);
        for statement in statements {
            match self.exec(statement, &block_env) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.unwind_defers(marker, result)
    }

    fn exec_for(
        &mut self,
        node: &Node,
        iterator: &str,
        iterable: &NodeRef,
        body: &NodeRef,
        env: &EnvRef,
    ) -> ExecResult {
        let iterable = self.eval(iterable, env)?;
        let Value::Obj(Obj::Array(arr)) = iterable else {
            return Err(raise(
                Error::Type("Can only iterate over arrays".to_string()),
                node,
            ));
        };

        let loop_env = Env::with_enclosing(env.clone());
        let name = intern(iterator);
        loop_env.define(&name, Value::Nil, false);

        let mut i = 0;
        loop {
            // Length is re-read so the body may grow or shrink the array.
            let element = {
                let elements = arr.elements.borrow();
                if i >= elements.len() {
                    break;
                }
                elements[i].clone()
            };
            loop_env.set(&name, element);

            match self.exec(body, &loop_env)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
            i += 1;
        }

        Ok(Flow::Normal)
    }

    fn pattern_matches(
        &mut self,
        pattern: &NodeRef,
        value: &Value,
        env: &EnvRef,
    ) -> Result<bool, RuntimeError> {
        // The wildcard `_` matches anything.
        if let NodeKind::Ident(name) = &pattern.kind {
            if name == "_" {
                return Ok(true);
            }
        }

        // Range patterns test integer membership: start <= v < end.
        if let NodeKind::Range { start, end } = &pattern.kind {
            if let Value::Int(v) = value {
                let start = self.eval(start, env)?;
                let end = self.eval(end, env)?;
                if let (Value::Int(s), Value::Int(e)) = (start, end) {
                    return Ok(*v >= s && *v < e);
                }
            }
            return Ok(false);
        }

        let pattern_value = self.eval(pattern, env)?;
        Ok(value.equals(&pattern_value))
    }

    //===------------------------------------------------------------------===//
    // Defers
    //===------------------------------------------------------------------===//

    /// Runs defers pushed since `marker`, newest first. A deferred
    /// statement's own Return/Break/Continue outcome is masked so it cannot
    /// hijack the unwind; the first error wins.
    fn unwind_defers(&mut self, marker: usize, result: ExecResult) -> ExecResult {
        let mut result = result;
        while self.defers.len() > marker {
            let entry = self.defers.pop().unwrap();
            match self.exec(&entry.statement, &entry.env) {
                Ok(_) => {}
                Err(error) => {
                    if result.is_ok() {
                        result = Err(error);
                    }
                }
            }
        }
        result
    }

    /// Runs every remaining defer, top-level ones included. Called by the
    /// driver when a program finishes.
    pub fn unwind_all_defers(&mut self) {
        let _ = self.unwind_defers(0, Ok(Flow::Normal));
    }

    //===------------------------------------------------------------------===//
    // Imports
    //===------------------------------------------------------------------===//

    fn exec_import(&mut self, node: &Node, path: &str) -> Result<(), RuntimeError> {
        if path.ends_with(".brisk") {
            return self.import_module(node, path);
        }
        self.import_header(node, path)
    }

    /// A Brisk module executes in the global environment, so its top-level
    /// definitions become visible to the importer. The module's AST is
    /// co-owned by any functions it defines.
    fn import_module(&mut self, node: &Node, path: &str) -> Result<(), RuntimeError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if path.starts_with('/') || path.starts_with('.') {
            candidates.push(PathBuf::from(path));
        } else {
            candidates.push(PathBuf::from(format!("./{}", path)));
            candidates.push(PathBuf::from(format!("lib/{}", path)));
        }

        let source = candidates
            .iter()
            .find_map(|candidate| std::fs::read_to_string(candidate).ok())
            .ok_or_else(|| {
                raise(Error::Io(format!("Cannot find module '{}'", path)), node)
            })?;

        let module = parser::parse(&source).map_err(|_| {
            raise(
                Error::Syntax(format!("Failed to parse module '{}'", path)),
                node,
            )
        })?;

        let global = self.global.clone();
        self.exec(&module, &global)?;
        Ok(())
    }

    fn import_header(&mut self, node: &Node, path: &str) -> Result<(), RuntimeError> {
        let full_path = cheader::find_include(path).ok_or_else(|| {
            raise(Error::Io(format!("Cannot find header '{}'", path)), node)
        })?;

        let mut header = HeaderParser::new();
        header.load(&full_path).map_err(|error| {
            raise(
                Error::Io(format!("Failed to read header '{}': {}", path, error)),
                node,
            )
        })?;

        // Symbols resolve against the process image unless the header has a
        // known companion library.
        let mut lib = dynload::open(None);
        if path.contains("math.h") {
            if let Some(libm) = dynload::open(Some("m")) {
                lib = Some(libm);
            }
        }
        if path.contains("raylib") {
            let candidates = [
                "raylib",
                "./experiments/raylib_lib/libraylib.so",
                "experiments/raylib_lib/libraylib.so",
                "./experiments/raylib/src/libraylib.so",
                "./libraylib.so",
            ];
            for candidate in candidates {
                if let Some(handle) = dynload::open(Some(candidate)) {
                    lib = Some(handle);
                    break;
                }
            }
        }

        let lib = lib.ok_or_else(|| {
            raise(
                Error::Ffi(format!(
                    "Cannot open a library for header '{}'",
                    path
                )),
                node,
            )
        })?;

        // Functions whose symbols resolve register as const callables,
        // shadowing earlier same-named bindings.
        for function in &header.functions {
            let Some(address) = dynload::symbol(lib, &function.name) else {
                continue;
            };
            if address.is_null() {
                continue;
            }
            let desc = CFunctionDesc::new(
                &function.name,
                function.return_type,
                function.param_types.clone(),
                function.is_variadic,
                address,
            );
            if !desc.prepare() {
                continue;
            }
            self.global.define_or_replace(
                &intern(&function.name),
                Value::Obj(Obj::CFunction(CFunctionObj::new(desc))),
                true,
            );
        }

        for parsed_enum in &header.enums {
            for (name, value) in &parsed_enum.values {
                self.global.define_or_replace(
                    &intern(name),
                    Value::Int(*value),
                    true,
                );
            }
        }

        for macro_def in &header.macros {
            let value = match &macro_def.value {
                MacroValue::Int(v) => Value::Int(*v),
                MacroValue::Float(v) => Value::Float(*v),
                MacroValue::Str(s) => Value::str(intern(s)),
            };
            self.global.define_or_replace(&intern(&macro_def.name), value, true);
        }

        // Many libm functions are declared through macros the header parser
        // cannot see; resolve the common ones by symbol.
        if path.contains("math.h") {
            self.inject_math_functions(lib);
        }

        Ok(())
    }

    fn inject_math_functions(&mut self, lib: dynload::LibHandle) {
        const UNARY: &[&str] = &[
            "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh",
            "asinh", "acosh", "atanh", "exp", "exp2", "log", "log10", "log2",
            "sqrt", "cbrt", "fabs", "floor", "ceil", "round", "trunc",
        ];
        const BINARY: &[&str] = &[
            "atan2", "pow", "fmod", "hypot", "remainder", "copysign", "fmin",
            "fmax", "fdim",
        ];

        for (names, params) in [
            (UNARY, vec![CType::Double]),
            (BINARY, vec![CType::Double, CType::Double]),
        ] {
            for name in names {
                let key = intern(name);
                if self.global.get(&key).is_some() {
                    continue;
                }
                let Some(address) = dynload::symbol(lib, name) else { continue };
                if address.is_null() {
                    continue;
                }
                let desc = CFunctionDesc::new(
                    name,
                    CType::Double,
                    params.clone(),
                    false,
                    address,
                );
                if !desc.prepare() {
                    continue;
                }
                self.global.define(
                    &key,
                    Value::Obj(Obj::CFunction(CFunctionObj::new(desc))),
                    false,
                );
            }
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
