use std::fmt::Write;
use std::rc::Rc;

//===----------------------------------------------------------------------===//
// AST
//
// Nodes are reference counted so function objects and deferred statements
// can co-own the subtrees they execute; a module's tree stays alive exactly
// as long as something still points into it.
//===----------------------------------------------------------------------===//

pub type NodeRef = Rc<Node>;

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub column: u32,
}

impl Node {
    pub fn new(kind: NodeKind, line: u32, column: u32) -> NodeRef {
        Rc::new(Node { kind, line, column })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug)]
pub enum NodeKind {
    // Literals
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    BoolLit(bool),
    NilLit,

    // Expressions
    Ident(String),
    Binary { op: BinOp, left: NodeRef, right: NodeRef },
    Unary { op: UnOp, operand: NodeRef },
    Call { callee: NodeRef, args: Vec<NodeRef> },
    Index { object: NodeRef, index: NodeRef },
    Field { object: NodeRef, name: String },
    ArrayLit(Vec<NodeRef>),
    TableLit(Vec<(String, NodeRef)>),
    Range { start: NodeRef, end: NodeRef },
    Lambda { params: Rc<[String]>, body: NodeRef },
    AddressOf(NodeRef),

    // Statements
    VarDecl { name: String, init: NodeRef, is_const: bool },
    Assign { target: NodeRef, value: NodeRef },
    ExprStmt(NodeRef),
    Block(Vec<NodeRef>),
    If { cond: NodeRef, then_branch: NodeRef, else_branch: Option<NodeRef> },
    While { cond: NodeRef, body: NodeRef },
    For { iterator: String, iterable: NodeRef, body: NodeRef },
    Return(Option<NodeRef>),
    Break,
    Continue,
    FnDecl { name: String, params: Rc<[String]>, body: NodeRef },
    Match { scrutinee: NodeRef, arms: Vec<MatchArm> },
    Defer(NodeRef),

    // Special
    Import(String),
    CBlock(String),
    Program(Vec<NodeRef>),
}

#[derive(Debug)]
pub struct MatchArm {
    pub pattern: NodeRef,
    pub body: NodeRef,
}

//===----------------------------------------------------------------------===//
// Printer
//
// Emits parseable source text; reparsing the output yields the same tree
// shape (positions aside). Used by tests and the REPL's AST echo.
//===----------------------------------------------------------------------===//

pub fn print(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn write_stmt(out: &mut String, node: &Node, depth: usize) {
    indent(out, depth);
    write_node(out, node, depth);
    out.push('\n');
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    match &node.kind {
        NodeKind::IntLit(v) => {
            let _ = write!(out, "{}", v);
        }
        NodeKind::FloatLit(v) => {
            // Keep a decimal point so the literal lexes back as a float.
            if v.fract() == 0.0 && v.is_finite() {
                let _ = write!(out, "{:.1}", v);
            } else {
                let _ = write!(out, "{}", v);
            }
        }
        NodeKind::StrLit(s) => {
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\0' => out.push_str("\\0"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
        NodeKind::BoolLit(v) => {
            out.push_str(if *v { "true" } else { "false" });
        }
        NodeKind::NilLit => out.push_str("nil"),
        NodeKind::Ident(name) => out.push_str(name),
        NodeKind::Binary { op, left, right } => {
            out.push('(');
            write_node(out, left, depth);
            let _ = write!(out, " {} ", op.symbol());
            write_node(out, right, depth);
            out.push(')');
        }
        NodeKind::Unary { op, operand } => {
            out.push('(');
            out.push_str(match op {
                UnOp::Neg => "-",
                UnOp::Not => "not ",
            });
            write_node(out, operand, depth);
            out.push(')');
        }
        NodeKind::Call { callee, args } => {
            write_node(out, callee, depth);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_node(out, arg, depth);
            }
            out.push(')');
        }
        NodeKind::Index { object, index } => {
            write_node(out, object, depth);
            out.push('[');
            write_node(out, index, depth);
            out.push(']');
        }
        NodeKind::Field { object, name } => {
            write_node(out, object, depth);
            out.push('.');
            out.push_str(name);
        }
        NodeKind::ArrayLit(elements) => {
            out.push('[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_node(out, element, depth);
            }
            out.push(']');
        }
        NodeKind::TableLit(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}: ", key);
                write_node(out, value, depth);
            }
            out.push('}');
        }
        NodeKind::Range { start, end } => {
            out.push('(');
            write_node(out, start, depth);
            out.push_str("..");
            write_node(out, end, depth);
            out.push(')');
        }
        NodeKind::Lambda { params, body } => {
            out.push_str("fn(");
            out.push_str(&params.join(", "));
            out.push_str(") ");
            write_node(out, body, depth);
        }
        NodeKind::AddressOf(operand) => {
            out.push('&');
            write_node(out, operand, depth);
        }
        NodeKind::VarDecl { name, init, is_const } => {
            let _ = write!(out, "{} {} ", name, if *is_const { "::" } else { ":=" });
            write_node(out, init, depth);
        }
        NodeKind::Assign { target, value } => {
            write_node(out, target, depth);
            out.push_str(" = ");
            write_node(out, value, depth);
        }
        NodeKind::ExprStmt(expr) => write_node(out, expr, depth),
        NodeKind::Block(statements) => {
            out.push_str("{\n");
            for statement in statements {
                write_stmt(out, statement, depth + 1);
            }
            indent(out, depth);
            out.push('}');
        }
        NodeKind::If { cond, then_branch, else_branch } => {
            out.push_str("if ");
            write_node(out, cond, depth);
            out.push(' ');
            write_node(out, then_branch, depth);
            if let Some(else_branch) = else_branch {
                if matches!(else_branch.kind, NodeKind::If { .. }) {
                    out.push_str(" el");
                    write_node(out, else_branch, depth);
                } else {
                    out.push_str(" else ");
                    write_node(out, else_branch, depth);
                }
            }
        }
        NodeKind::While { cond, body } => {
            out.push_str("while ");
            write_node(out, cond, depth);
            out.push(' ');
            write_node(out, body, depth);
        }
        NodeKind::For { iterator, iterable, body } => {
            let _ = write!(out, "for {} in ", iterator);
            write_node(out, iterable, depth);
            out.push(' ');
            write_node(out, body, depth);
        }
        NodeKind::Return(value) => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_node(out, value, depth);
            }
        }
        NodeKind::Break => out.push_str("break"),
        NodeKind::Continue => out.push_str("continue"),
        NodeKind::FnDecl { name, params, body } => {
            let _ = write!(out, "fn {}(", name);
            out.push_str(&params.join(", "));
            out.push_str(") ");
            write_node(out, body, depth);
        }
        NodeKind::Match { scrutinee, arms } => {
            out.push_str("match ");
            write_node(out, scrutinee, depth);
            out.push_str(" {\n");
            for arm in arms {
                indent(out, depth + 1);
                write_node(out, &arm.pattern, depth + 1);
                out.push_str(" => ");
                write_node(out, &arm.body, depth + 1);
                out.push_str(",\n");
            }
            indent(out, depth);
            out.push('}');
        }
        NodeKind::Defer(statement) => {
            out.push_str("defer ");
            write_node(out, statement, depth);
        }
        NodeKind::Import(path) => {
            let _ = write!(out, "@import \"{}\"", path);
        }
        NodeKind::CBlock(code) => {
            let _ = write!(out, "@c {{{}}}", code);
        }
        NodeKind::Program(statements) => {
            for statement in statements {
                write_stmt(out, statement, depth);
            }
        }
    }
}
