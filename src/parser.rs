use std::mem;
use std::rc::Rc;

use crate::ast::{BinOp, MatchArm, Node, NodeKind, NodeRef, UnOp};
use crate::error::ParseError;
use crate::token::{self, Spanned, Token};

//===----------------------------------------------------------------------===//
// Parser
//
// Pratt parser (recursive descent with precedence climbing) over the token
// vector. Newlines and semicolons act as statement separators only; the
// parser records where they occurred and otherwise ignores them. On an
// error it synchronizes to the next statement boundary, so several
// diagnostics can come out of one pass.
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Range,
    Term,
    Factor,
    Unary,
    Call,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::None => Prec::Assignment,
            Prec::Assignment => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Equality,
            Prec::Equality => Prec::Comparison,
            Prec::Comparison => Prec::Range,
            Prec::Range => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Unary,
            Prec::Unary => Prec::Call,
            Prec::Call => Prec::Call,
        }
    }
}

fn infix_precedence(token: &Token) -> Prec {
    match token {
        Token::Or => Prec::Or,
        Token::And => Prec::And,
        Token::EqEq | Token::NotEq => Prec::Equality,
        Token::Lt | Token::Gt | Token::LtEq | Token::GtEq => Prec::Comparison,
        Token::DotDot => Prec::Range,
        Token::Plus | Token::Minus => Prec::Term,
        Token::Star | Token::Slash | Token::Percent => Prec::Factor,
        Token::LParen | Token::LBracket | Token::Dot => Prec::Call,
        _ => Prec::None,
    }
}

fn binop_of(token: &Token) -> BinOp {
    match token {
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Percent => BinOp::Rem,
        Token::EqEq => BinOp::Eq,
        Token::NotEq => BinOp::NotEq,
        Token::Lt => BinOp::Lt,
        Token::Gt => BinOp::Gt,
        Token::LtEq => BinOp::LtEq,
        Token::GtEq => BinOp::GtEq,
        Token::And => BinOp::And,
        Token::Or => BinOp::Or,
        other => unreachable!("not a binary operator: {}", other),
    }
}

type PResult = Result<NodeRef, ParseError>;

pub struct Parser {
    tokens: Vec<Spanned>,
    /// Whether a newline or semicolon separated this token from the one
    /// before it.
    sep_before: Vec<bool>,
    pos: usize,
    errors: Vec<ParseError>,
}

/// Parses a whole source text into a Program node, or the list of every
/// diagnostic found.
pub fn parse(source: &str) -> Result<NodeRef, Vec<ParseError>> {
    let (raw, lex_errors) = token::tokenize(source);

    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|(line, column)| ParseError {
            message: "Unexpected character".to_string(),
            line,
            column,
        })
        .collect();

    let mut tokens = Vec::with_capacity(raw.len());
    let mut sep_before = Vec::with_capacity(raw.len());
    let mut pending_sep = false;
    for spanned in raw {
        if matches!(spanned.token, Token::Newline | Token::Semicolon) {
            pending_sep = true;
            continue;
        }
        tokens.push(spanned);
        sep_before.push(pending_sep);
        pending_sep = false;
    }

    let mut parser = Parser { tokens, sep_before, pos: 0, errors: Vec::new() };
    let program = parser.parse_program();
    errors.append(&mut parser.errors);

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

impl Parser {
    //===------------------------------------------------------------------===//
    // Token plumbing
    //===------------------------------------------------------------------===//

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_second(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos + 1)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Whether a statement separator preceded the current token.
    fn sep_before_current(&self) -> bool {
        self.sep_before.get(self.pos).copied().unwrap_or(false)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn check(&self, expected: &Token) -> bool {
        match self.peek() {
            Some(spanned) => {
                mem::discriminant(&spanned.token) == mem::discriminant(expected)
            }
            None => false,
        }
    }

    fn matches(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> Result<Spanned, ParseError> {
        if self.check(expected) {
            Ok(self.advance().unwrap())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<(String, u32, u32), ParseError> {
        match self.peek() {
            Some(Spanned { token: Token::Ident(name), line, column }) => {
                let result = (name.clone(), *line, *column);
                self.pos += 1;
                Ok(result)
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(spanned) => ParseError {
                message: format!("{} (found '{}')", message, spanned.token),
                line: spanned.line,
                column: spanned.column,
            },
            None => {
                let (line, column) = self
                    .tokens
                    .last()
                    .map(|t| (t.line, t.column))
                    .unwrap_or((1, 1));
                ParseError {
                    message: format!("{} (found end of input)", message),
                    line,
                    column,
                }
            }
        }
    }

    /// Skips forward to a likely statement boundary after an error.
    fn synchronize(&mut self) {
        while let Some(spanned) = self.peek() {
            if self.sep_before_current() {
                return;
            }
            if matches!(
                spanned.token,
                Token::Fn
                    | Token::If
                    | Token::While
                    | Token::For
                    | Token::Return
                    | Token::Match
                    | Token::Defer
            ) {
                return;
            }
            self.pos += 1;
        }
    }

    //===------------------------------------------------------------------===//
    // Expressions
    //===------------------------------------------------------------------===//

    fn parse_expression(&mut self) -> PResult {
        self.parse_precedence(Prec::Assignment)
    }

    fn parse_precedence(&mut self, prec: Prec) -> PResult {
        let spanned = match self.advance() {
            Some(spanned) => spanned,
            None => return Err(self.error_here("Expected expression")),
        };

        let mut left = self.parse_prefix(spanned)?;

        while let Some(next) = self.peek() {
            if infix_precedence(&next.token) < prec {
                break;
            }
            let op = self.advance().unwrap();
            left = self.parse_infix(op, left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self, spanned: Spanned) -> PResult {
        let (line, column) = (spanned.line, spanned.column);
        match spanned.token {
            Token::Int(value) => Ok(Node::new(NodeKind::IntLit(value), line, column)),
            Token::Float(value) => {
                Ok(Node::new(NodeKind::FloatLit(value), line, column))
            }
            Token::Str(value) => Ok(Node::new(NodeKind::StrLit(value), line, column)),
            Token::True => Ok(Node::new(NodeKind::BoolLit(true), line, column)),
            Token::False => Ok(Node::new(NodeKind::BoolLit(false), line, column)),
            Token::Nil => Ok(Node::new(NodeKind::NilLit, line, column)),
            Token::Ident(name) => Ok(Node::new(NodeKind::Ident(name), line, column)),
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array(line, column),
            Token::LBrace => self.parse_table(line, column),
            Token::Minus => {
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(Node::new(
                    NodeKind::Unary { op: UnOp::Neg, operand },
                    line,
                    column,
                ))
            }
            Token::Not | Token::Bang => {
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(Node::new(
                    NodeKind::Unary { op: UnOp::Not, operand },
                    line,
                    column,
                ))
            }
            Token::Ampersand => {
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(Node::new(NodeKind::AddressOf(operand), line, column))
            }
            Token::Fn => self.parse_fn_expr(line, column),
            other => {
                Err(ParseError {
                    message: format!("Expected expression (found '{}')", other),
                    line,
                    column,
                })
            }
        }
    }

    fn parse_infix(&mut self, op: Spanned, left: NodeRef) -> PResult {
        let (line, column) = (op.line, op.column);
        match op.token {
            Token::LParen => self.parse_call(left, line, column),
            Token::LBracket => {
                let index = self.parse_expression()?;
                self.expect(&Token::RBracket, "Expected ']' after index")?;
                Ok(Node::new(
                    NodeKind::Index { object: left, index },
                    line,
                    column,
                ))
            }
            Token::Dot => {
                let (name, ..) = self.expect_ident("Expected field name after '.'")?;
                Ok(Node::new(
                    NodeKind::Field { object: left, name },
                    line,
                    column,
                ))
            }
            Token::DotDot => {
                let end = self.parse_precedence(Prec::Range.next())?;
                Ok(Node::new(NodeKind::Range { start: left, end }, line, column))
            }
            ref token => {
                let op_kind = binop_of(token);
                let right =
                    self.parse_precedence(infix_precedence(token).next())?;
                Ok(Node::new(
                    NodeKind::Binary { op: op_kind, left, right },
                    line,
                    column,
                ))
            }
        }
    }

    fn parse_call(&mut self, callee: NodeRef, line: u32, column: u32) -> PResult {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "Expected ')' after arguments")?;
        Ok(Node::new(NodeKind::Call { callee, args }, line, column))
    }

    fn parse_array(&mut self, line: u32, column: u32) -> PResult {
        let mut elements = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                // Allow a trailing comma.
                if self.check(&Token::RBracket) {
                    break;
                }
                elements.push(self.parse_expression()?);
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RBracket, "Expected ']' after array elements")?;
        Ok(Node::new(NodeKind::ArrayLit(elements), line, column))
    }

    fn parse_table(&mut self, line: u32, column: u32) -> PResult {
        let mut entries = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                if self.check(&Token::RBrace) {
                    break;
                }
                let (key, ..) = self.expect_ident("Expected key name")?;
                self.expect(&Token::Colon, "Expected ':' after key")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace, "Expected '}' after table entries")?;
        Ok(Node::new(NodeKind::TableLit(entries), line, column))
    }

    /// `fn` expression: a declaration when named, a lambda otherwise.
    fn parse_fn_expr(&mut self, line: u32, column: u32) -> PResult {
        let name = match self.peek() {
            Some(Spanned { token: Token::Ident(name), .. }) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        };

        self.expect(&Token::LParen, "Expected '(' after 'fn'")?;

        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (param, ..) = self.expect_ident("Expected parameter name")?;
                params.push(param);
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "Expected ')' after parameters")?;

        // Optional return type annotation, accepted and ignored.
        if self.matches(&Token::Arrow) {
            self.advance();
        }

        self.expect(&Token::LBrace, "Expected '{' before function body")?;
        let body = self.parse_block_body()?;

        let params: Rc<[String]> = params.into();
        match name {
            Some(name) => Ok(Node::new(
                NodeKind::FnDecl { name, params, body },
                line,
                column,
            )),
            None => Ok(Node::new(NodeKind::Lambda { params, body }, line, column)),
        }
    }

    //===------------------------------------------------------------------===//
    // Statements
    //===------------------------------------------------------------------===//

    /// Block body; the opening brace has already been consumed.
    fn parse_block_body(&mut self) -> PResult {
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));

        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        self.expect(&Token::RBrace, "Expected '}' after block")?;
        Ok(Node::new(NodeKind::Block(statements), line, column))
    }

    fn parse_statement(&mut self) -> PResult {
        // Declarations need two tokens of lookahead.
        if let Some(Spanned { token: Token::Ident(name), line, column }) = self.peek() {
            let decl = match self.peek_second().map(|t| &t.token) {
                Some(Token::ColonEq) => Some(false),
                Some(Token::ColonColon) => Some(true),
                _ => None,
            };
            if let Some(is_const) = decl {
                let (name, line, column) = (name.clone(), *line, *column);
                self.pos += 2;
                let init = self.parse_expression()?;
                return Ok(Node::new(
                    NodeKind::VarDecl { name, init, is_const },
                    line,
                    column,
                ));
            }
        }

        if let Some(spanned) = self.peek() {
            let (line, column) = (spanned.line, spanned.column);
            match spanned.token {
                Token::If => {
                    self.pos += 1;
                    return self.parse_if(line, column);
                }
                Token::While => {
                    self.pos += 1;
                    return self.parse_while(line, column);
                }
                Token::For => {
                    self.pos += 1;
                    return self.parse_for(line, column);
                }
                Token::Return => {
                    self.pos += 1;
                    return self.parse_return(line, column);
                }
                Token::Break => {
                    self.pos += 1;
                    return Ok(Node::new(NodeKind::Break, line, column));
                }
                Token::Continue => {
                    self.pos += 1;
                    return Ok(Node::new(NodeKind::Continue, line, column));
                }
                Token::Match => {
                    self.pos += 1;
                    return self.parse_match(line, column);
                }
                Token::Defer => {
                    self.pos += 1;
                    let statement = self.parse_statement()?;
                    return Ok(Node::new(NodeKind::Defer(statement), line, column));
                }
                Token::Fn => {
                    self.pos += 1;
                    let func = self.parse_fn_expr(line, column)?;
                    // A named fn is a declaration; a bare lambda is an
                    // expression statement.
                    if matches!(func.kind, NodeKind::Lambda { .. }) {
                        return Ok(Node::new(
                            NodeKind::ExprStmt(func),
                            line,
                            column,
                        ));
                    }
                    return Ok(func);
                }
                Token::At => {
                    self.pos += 1;
                    return self.parse_directive(line, column);
                }
                _ => {}
            }
        }

        // Expression statement, possibly an assignment.
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        let expr = self.parse_expression()?;

        if self.matches(&Token::Eq) {
            let value = self.parse_expression()?;
            return Ok(Node::new(
                NodeKind::Assign { target: expr, value },
                line,
                column,
            ));
        }

        Ok(Node::new(NodeKind::ExprStmt(expr), line, column))
    }

    fn parse_if(&mut self, line: u32, column: u32) -> PResult {
        let cond = self.parse_expression()?;
        self.expect(&Token::LBrace, "Expected '{' after if condition")?;
        let then_branch = self.parse_block_body()?;

        let else_branch = if self.check(&Token::Elif) {
            let elif = self.advance().unwrap();
            Some(self.parse_if(elif.line, elif.column)?)
        } else if self.matches(&Token::Else) {
            self.expect(&Token::LBrace, "Expected '{' after else")?;
            Some(self.parse_block_body()?)
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::If { cond, then_branch, else_branch },
            line,
            column,
        ))
    }

    fn parse_while(&mut self, line: u32, column: u32) -> PResult {
        let cond = self.parse_expression()?;
        self.expect(&Token::LBrace, "Expected '{' after while condition")?;
        let body = self.parse_block_body()?;
        Ok(Node::new(NodeKind::While { cond, body }, line, column))
    }

    fn parse_for(&mut self, line: u32, column: u32) -> PResult {
        let (iterator, ..) = self.expect_ident("Expected iterator name")?;
        self.expect(&Token::In, "Expected 'in' after iterator")?;
        let iterable = self.parse_expression()?;
        self.expect(&Token::LBrace, "Expected '{' after for iterable")?;
        let body = self.parse_block_body()?;
        Ok(Node::new(
            NodeKind::For { iterator, iterable, body },
            line,
            column,
        ))
    }

    fn parse_return(&mut self, line: u32, column: u32) -> PResult {
        let value = if self.sep_before_current()
            || self.check(&Token::RBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(Node::new(NodeKind::Return(value), line, column))
    }

    fn parse_match(&mut self, line: u32, column: u32) -> PResult {
        let scrutinee = self.parse_expression()?;
        self.expect(&Token::LBrace, "Expected '{' after match value")?;

        let mut arms = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let pattern = if let Some(spanned) = self.peek() {
                if matches!(spanned.token, Token::Underscore) {
                    let spanned = self.advance().unwrap();
                    Node::new(
                        NodeKind::Ident("_".to_string()),
                        spanned.line,
                        spanned.column,
                    )
                } else {
                    self.parse_expression()?
                }
            } else {
                return Err(self.error_here("Expected match pattern"));
            };

            self.expect(&Token::FatArrow, "Expected '=>' after pattern")?;

            let body = if self.matches(&Token::LBrace) {
                self.parse_block_body()?
            } else {
                self.parse_expression()?
            };

            arms.push(MatchArm { pattern, body });
            self.matches(&Token::Comma);
        }

        self.expect(&Token::RBrace, "Expected '}' after match arms")?;
        Ok(Node::new(NodeKind::Match { scrutinee, arms }, line, column))
    }

    fn parse_directive(&mut self, line: u32, column: u32) -> PResult {
        match self.peek() {
            Some(Spanned { token: Token::Ident(name), .. }) if name == "import" => {
                self.pos += 1;
                match self.advance() {
                    Some(Spanned { token: Token::Str(path), .. }) => {
                        Ok(Node::new(NodeKind::Import(path), line, column))
                    }
                    _ => Err(ParseError {
                        message: "Expected import path string".to_string(),
                        line,
                        column,
                    }),
                }
            }
            Some(Spanned { token: Token::Ident(name), .. }) if name == "c" => {
                self.pos += 1;
                self.parse_c_block(line, column)
            }
            _ => Err(ParseError {
                message: "Unknown directive".to_string(),
                line,
                column,
            }),
        }
    }

    /// Captures the body of an inline-C block as text. The block is never
    /// executed, so a token-level reconstruction is sufficient.
    fn parse_c_block(&mut self, line: u32, column: u32) -> PResult {
        self.expect(&Token::LBrace, "Expected '{' after @c")?;

        let mut depth = 1usize;
        let mut pieces: Vec<String> = Vec::new();
        while depth > 0 {
            match self.advance() {
                Some(spanned) => {
                    match spanned.token {
                        Token::LBrace => depth += 1,
                        Token::RBrace => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        pieces.push(spanned.token.to_string());
                    }
                }
                None => {
                    return Err(ParseError {
                        message: "Unterminated @c block".to_string(),
                        line,
                        column,
                    });
                }
            }
        }

        Ok(Node::new(NodeKind::CBlock(pieces.join(" ")), line, column))
    }

    fn parse_program(&mut self) -> NodeRef {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        Node::new(NodeKind::Program(statements), 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    fn parse_one(source: &str) -> NodeRef {
        let program = parse(source).expect("parse failed");
        match &program.kind {
            NodeKind::Program(statements) => {
                assert_eq!(statements.len(), 1, "expected one statement");
                statements[0].clone()
            }
            other => panic!("expected program, got {:?}", other),
        }
    }

    #[test]
    fn parse_var_and_const_decls() {
        match &parse_one("x := 1 + 2").kind {
            NodeKind::VarDecl { name, is_const, .. } => {
                assert_eq!(name, "x");
                assert!(!is_const);
            }
            other => panic!("expected var decl, got {:?}", other),
        }
        match &parse_one("PI :: 3.14").kind {
            NodeKind::VarDecl { name, is_const, .. } => {
                assert_eq!(name, "PI");
                assert!(is_const);
            }
            other => panic!("expected const decl, got {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let stmt = parse_one("1 + 2 * 3");
        let NodeKind::ExprStmt(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        let NodeKind::Binary { op, right, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        let NodeKind::Binary { op: inner, .. } = &right.kind else {
            panic!("expected nested binary");
        };
        assert_eq!(*inner, BinOp::Mul);
    }

    #[test]
    fn range_binds_looser_than_term() {
        let stmt = parse_one("0..n + 1");
        let NodeKind::ExprStmt(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr.kind, NodeKind::Range { .. }));
    }

    #[test]
    fn call_index_field_chain() {
        let stmt = parse_one("t.items[0](1, 2)");
        let NodeKind::ExprStmt(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        let NodeKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(callee.kind, NodeKind::Index { .. }));
    }

    #[test]
    fn named_fn_is_declaration_lambda_is_expression() {
        assert!(matches!(
            parse_one("fn add(a, b) { a + b }").kind,
            NodeKind::FnDecl { .. }
        ));
        let stmt = parse_one("fn(a) { a }");
        let NodeKind::ExprStmt(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr.kind, NodeKind::Lambda { .. }));
    }

    #[test]
    fn elif_chains_into_nested_if() {
        let stmt = parse_one("if a { } elif b { } else { }");
        let NodeKind::If { else_branch: Some(else_branch), .. } = &stmt.kind else {
            panic!("expected if with else");
        };
        assert!(matches!(else_branch.kind, NodeKind::If { .. }));
    }

    #[test]
    fn match_with_wildcard_and_range() {
        let stmt = parse_one("match x { 0..10 => \"low\", _ => \"high\" }");
        let NodeKind::Match { arms, .. } = &stmt.kind else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 2);
        assert!(matches!(arms[0].pattern.kind, NodeKind::Range { .. }));
        match &arms[1].pattern.kind {
            NodeKind::Ident(name) => assert_eq!(name, "_"),
            other => panic!("expected wildcard, got {:?}", other),
        }
    }

    #[test]
    fn import_directive() {
        match &parse_one("@import \"math.h\"").kind {
            NodeKind::Import(path) => assert_eq!(path, "math.h"),
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn c_block_is_recognized() {
        assert!(matches!(
            parse_one("@c { int x = 1 }").kind,
            NodeKind::CBlock(_)
        ));
    }

    #[test]
    fn semicolons_separate_statements() {
        let program = parse("a := 1; b := 2").expect("parse failed");
        let NodeKind::Program(statements) = &program.kind else {
            panic!("expected program");
        };
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn return_without_value_at_line_end() {
        let program = parse("fn f() {\n    return\n    1\n}").expect("parse");
        let NodeKind::Program(statements) = &program.kind else {
            panic!("expected program");
        };
        let NodeKind::FnDecl { body, .. } = &statements[0].kind else {
            panic!("expected fn decl");
        };
        let NodeKind::Block(body_statements) = &body.kind else {
            panic!("expected block body");
        };
        assert!(matches!(body_statements[0].kind, NodeKind::Return(None)));
    }

    #[test]
    fn reports_multiple_errors() {
        let errors = parse("x := \nfn 1\ny := )").unwrap_err();
        assert!(errors.len() >= 2, "expected >= 2 errors, got {:?}", errors);
    }

    #[test]
    fn print_then_reparse_preserves_shape() {
        let source = "\
fn grade(s) {
    match s {
        (90..101) => \"A\",
        (80..90) => \"B\",
        _ => \"F\",
    }
}
k := [1, 2, 3]
t := {a: 1, b: 2}
for x in k {
    if (x % 2) == 0 {
        println(x)
    } else {
        defer println(\"odd\")
    }
}
";
        let first = parse(source).expect("first parse");
        let printed = ast::print(&first);
        let second = parse(&printed).expect("reparse of printed source");
        assert_eq!(shape(&first), shape(&second));
    }

    /// Structural fingerprint that ignores positions.
    fn shape(node: &Node) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        fn walk(node: &Node, out: &mut String) {
            match &node.kind {
                NodeKind::IntLit(v) => {
                    let _ = write!(out, "int({})", v);
                }
                NodeKind::FloatLit(v) => {
                    let _ = write!(out, "float({})", v);
                }
                NodeKind::StrLit(s) => {
                    let _ = write!(out, "str({:?})", s);
                }
                NodeKind::BoolLit(v) => {
                    let _ = write!(out, "bool({})", v);
                }
                NodeKind::NilLit => out.push_str("nil"),
                NodeKind::Ident(name) => {
                    let _ = write!(out, "id({})", name);
                }
                NodeKind::Binary { op, left, right } => {
                    let _ = write!(out, "bin({},", op.symbol());
                    walk(left, out);
                    out.push(',');
                    walk(right, out);
                    out.push(')');
                }
                NodeKind::Unary { op, operand } => {
                    let _ = write!(out, "un({:?},", op);
                    walk(operand, out);
                    out.push(')');
                }
                NodeKind::Call { callee, args } => {
                    out.push_str("call(");
                    walk(callee, out);
                    for arg in args {
                        out.push(',');
                        walk(arg, out);
                    }
                    out.push(')');
                }
                NodeKind::Index { object, index } => {
                    out.push_str("index(");
                    walk(object, out);
                    out.push(',');
                    walk(index, out);
                    out.push(')');
                }
                NodeKind::Field { object, name } => {
                    let _ = write!(out, "field({},", name);
                    walk(object, out);
                    out.push(')');
                }
                NodeKind::ArrayLit(elements) => {
                    out.push_str("arr(");
                    for element in elements {
                        walk(element, out);
                        out.push(',');
                    }
                    out.push(')');
                }
                NodeKind::TableLit(entries) => {
                    out.push_str("table(");
                    for (key, value) in entries {
                        let _ = write!(out, "{}=", key);
                        walk(value, out);
                        out.push(',');
                    }
                    out.push(')');
                }
                NodeKind::Range { start, end } => {
                    out.push_str("range(");
                    walk(start, out);
                    out.push(',');
                    walk(end, out);
                    out.push(')');
                }
                NodeKind::Lambda { params, body } => {
                    let _ = write!(out, "lambda({:?},", params);
                    walk(body, out);
                    out.push(')');
                }
                NodeKind::AddressOf(operand) => {
                    out.push_str("addr(");
                    walk(operand, out);
                    out.push(')');
                }
                NodeKind::VarDecl { name, init, is_const } => {
                    let _ = write!(out, "decl({},{},", name, is_const);
                    walk(init, out);
                    out.push(')');
                }
                NodeKind::Assign { target, value } => {
                    out.push_str("assign(");
                    walk(target, out);
                    out.push(',');
                    walk(value, out);
                    out.push(')');
                }
                NodeKind::ExprStmt(expr) => {
                    out.push_str("expr(");
                    walk(expr, out);
                    out.push(')');
                }
                NodeKind::Block(statements) => {
                    out.push_str("block(");
                    for statement in statements {
                        walk(statement, out);
                        out.push(',');
                    }
                    out.push(')');
                }
                NodeKind::If { cond, then_branch, else_branch } => {
                    out.push_str("if(");
                    walk(cond, out);
                    out.push(',');
                    walk(then_branch, out);
                    if let Some(else_branch) = else_branch {
                        out.push(',');
                        walk(else_branch, out);
                    }
                    out.push(')');
                }
                NodeKind::While { cond, body } => {
                    out.push_str("while(");
                    walk(cond, out);
                    out.push(',');
                    walk(body, out);
                    out.push(')');
                }
                NodeKind::For { iterator, iterable, body } => {
                    let _ = write!(out, "for({},", iterator);
                    walk(iterable, out);
                    out.push(',');
                    walk(body, out);
                    out.push(')');
                }
                NodeKind::Return(value) => {
                    out.push_str("return(");
                    if let Some(value) = value {
                        walk(value, out);
                    }
                    out.push(')');
                }
                NodeKind::Break => out.push_str("break"),
                NodeKind::Continue => out.push_str("continue"),
                NodeKind::FnDecl { name, params, body } => {
                    let _ = write!(out, "fn({},{:?},", name, params);
                    walk(body, out);
                    out.push(')');
                }
                NodeKind::Match { scrutinee, arms } => {
                    out.push_str("match(");
                    walk(scrutinee, out);
                    for arm in arms {
                        out.push(',');
                        walk(&arm.pattern, out);
                        out.push_str("=>");
                        walk(&arm.body, out);
                    }
                    out.push(')');
                }
                NodeKind::Defer(statement) => {
                    out.push_str("defer(");
                    walk(statement, out);
                    out.push(')');
                }
                NodeKind::Import(path) => {
                    let _ = write!(out, "import({})", path);
                }
                NodeKind::CBlock(_) => out.push_str("cblock"),
                NodeKind::Program(statements) => {
                    out.push_str("program(");
                    for statement in statements {
                        walk(statement, out);
                        out.push(',');
                    }
                    out.push(')');
                }
            }
        }
        walk(node, &mut out);
        out
    }
}
