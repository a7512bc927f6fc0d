use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::NodeRef;
use crate::cffi::{CFunctionObj, CStructObj};
use crate::env::EnvRef;
use crate::error::Error;
use crate::interner::{str_eq, RStr};
use crate::memory;
use crate::table::Table;

//===----------------------------------------------------------------------===//
// Value
//
// A tagged sum of the primitives plus a handle on a heap object. Cloning a
// Value that carries an Obj shares ownership; the Rc count is the object's
// reference count.
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Obj(Obj),
}

#[derive(Debug, Clone)]
pub enum Obj {
    Str(RStr),
    Array(Rc<ArrayObj>),
    Table(Rc<TableObj>),
    Function(Rc<Function>),
    Native(Rc<Native>),
    Pointer(Rc<PointerObj>),
    CStruct(Rc<CStructObj>),
    CFunction(Rc<CFunctionObj>),
}

//===----------------------------------------------------------------------===//
// Heap object kinds
//===----------------------------------------------------------------------===//

/// Dynamically-grown sequence of values.
#[derive(Debug)]
pub struct ArrayObj {
    pub elements: RefCell<Vec<Value>>,
}

impl ArrayObj {
    pub fn new(elements: Vec<Value>) -> Rc<Self> {
        memory::track(std::mem::size_of::<ArrayObj>());
        Rc::new(ArrayObj { elements: RefCell::new(elements) })
    }
}

impl Drop for ArrayObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<ArrayObj>());
    }
}

/// Hash table object wrapping the open-addressed map.
#[derive(Debug)]
pub struct TableObj {
    pub table: RefCell<Table>,
}

impl TableObj {
    pub fn new() -> Rc<Self> {
        memory::track(std::mem::size_of::<TableObj>());
        Rc::new(TableObj { table: RefCell::new(Table::new()) })
    }
}

impl Drop for TableObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<TableObj>());
    }
}

/// A user function: shared parameter list, co-owned AST body, and the
/// environment captured at creation.
pub struct Function {
    pub name: Option<String>,
    pub params: Rc<[String]>,
    pub body: NodeRef,
    pub env: EnvRef,
}

/// The captured environment can reach back to this function, so Debug
/// stays shallow.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Function({})", name),
            None => write!(f, "Function(<anonymous>)"),
        }
    }
}

impl Function {
    pub fn new(
        name: Option<String>,
        params: Rc<[String]>,
        body: NodeRef,
        env: EnvRef,
    ) -> Rc<Self> {
        memory::track(std::mem::size_of::<Function>());
        Rc::new(Function { name, params, body, env })
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Drop for Function {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<Function>());
    }
}

/// Adapter signature every builtin conforms to.
pub type NativeFn = fn(&[Value]) -> Result<Value, Error>;

/// A builtin function. Arity -1 means variadic.
#[derive(Debug)]
pub struct Native {
    pub name: &'static str,
    pub arity: i32,
    pub function: NativeFn,
}

impl Native {
    pub fn new(name: &'static str, arity: i32, function: NativeFn) -> Rc<Self> {
        Rc::new(Native { name, arity, function })
    }
}

/// An opaque C pointer surfaced to the scripting level.
#[derive(Debug)]
pub struct PointerObj {
    pub addr: usize,
    pub type_name: String,
}

impl PointerObj {
    pub fn new(addr: usize, type_name: &str) -> Rc<Self> {
        memory::track(std::mem::size_of::<PointerObj>());
        Rc::new(PointerObj { addr, type_name: type_name.to_string() })
    }
}

impl Drop for PointerObj {
    fn drop(&mut self) {
        memory::release(std::mem::size_of::<PointerObj>());
    }
}

//===----------------------------------------------------------------------===//
// Value operations
//===----------------------------------------------------------------------===//

impl Value {
    pub fn str(s: RStr) -> Value {
        Value::Obj(Obj::Str(s))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric payload promoted to float; None for non-numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&RStr> {
        match self {
            Value::Obj(Obj::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Nil, false, numeric zero and the empty string are falsy; every other
    /// live object is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Obj(Obj::Str(s)) => !s.is_empty(),
            Value::Obj(_) => true,
        }
    }

    /// Structural equality. Int/float mixes promote to float; strings
    /// compare canonically with a byte fallback; other objects by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Obj(a), Value::Obj(b)) => match (a, b) {
                (Obj::Str(a), Obj::Str(b)) => str_eq(a, b),
                (Obj::Array(a), Obj::Array(b)) => Rc::ptr_eq(a, b),
                (Obj::Table(a), Obj::Table(b)) => Rc::ptr_eq(a, b),
                (Obj::Function(a), Obj::Function(b)) => Rc::ptr_eq(a, b),
                (Obj::Native(a), Obj::Native(b)) => Rc::ptr_eq(a, b),
                (Obj::Pointer(a), Obj::Pointer(b)) => Rc::ptr_eq(a, b),
                (Obj::CStruct(a), Obj::CStruct(b)) => Rc::ptr_eq(a, b),
                (Obj::CFunction(a), Obj::CFunction(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Obj(obj) => match obj {
                Obj::Str(_) => "string",
                Obj::Array(_) => "array",
                Obj::Table(_) => "table",
                Obj::Function(_) => "function",
                Obj::Native(_) => "native",
                Obj::Pointer(_) => "pointer",
                Obj::CStruct(_) => "cstruct",
                Obj::CFunction(_) => "cfunction",
            },
        }
    }

    /// Plain-text coercion used by string concatenation and `str()`:
    /// strings pass through, every other object renders as `<typename>`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Obj(Obj::Str(s)) => s.as_str().to_string(),
            Value::Obj(_) => format!("<{}>", self.type_name()),
            other => other.to_string(),
        }
    }
}

/// `%g`-style float rendering: six significant digits, trailing zeros
/// trimmed, exponent form outside the 1e-4..1e6 window.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }

    // {:e} always produces an exact decimal exponent.
    let exp: i32 = format!("{:e}", v)
        .rsplit('e')
        .next()
        .and_then(|e| e.parse().ok())
        .unwrap_or(0);

    if exp < -4 || exp >= 6 {
        let mantissa = v / 10f64.powi(exp);
        let mut body = format!("{:.5}", mantissa);
        trim_fraction(&mut body);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", body, sign, exp.abs())
    } else {
        let precision = (5 - exp).max(0) as usize;
        let mut body = format!("{:.*}", precision, v);
        trim_fraction(&mut body);
        body
    }
}

fn trim_fraction(s: &mut String) {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Obj(obj) => match obj {
                Obj::Str(s) => write!(f, "{}", s.as_str()),
                Obj::Array(arr) => {
                    write!(f, "[")?;
                    for (i, element) in arr.elements.borrow().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", element)?;
                    }
                    write!(f, "]")
                }
                Obj::Table(_) => write!(f, "<table>"),
                Obj::Function(func) => match &func.name {
                    Some(name) => write!(f, "<fn {}>", name),
                    None => write!(f, "<fn>"),
                },
                Obj::Native(_) => write!(f, "<native fn>"),
                Obj::Pointer(ptr) => write!(f, "<ptr {:#x}>", ptr.addr),
                Obj::CStruct(_) => write!(f, "<cstruct>"),
                Obj::CFunction(_) => write!(f, "<cfn>"),
            },
        }
    }
}
