use logos::Logos;
use std::fmt;

//===----------------------------------------------------------------------===//
// Token
//
// Uses the logos crate to implement the tokenizer, bringing fast and
// efficient tokenization without hand-rolled state machines.
//===----------------------------------------------------------------------===//

#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    // --------- Skips ---------
    // Spaces, tabs and carriage returns are insignificant. Newlines are not:
    // they terminate statements, so they surface as tokens.
    #[regex(r"[ \t\r]+", logos::skip)]
    // Line comments: from # to end-of-line.
    #[regex(r"#[^\n]*", logos::skip)]
    #[token("\n")]
    Newline,

    // --------- Literals ---------
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*", |lex| parse_int(lex.slice()))]
    #[regex(r"[0-9][0-9_]*", |lex| parse_int(lex.slice()))]
    Int(i64),

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*", |lex| parse_float(lex.slice()))]
    Float(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let slice = lex.slice();
        unescape_string(&slice[1..slice.len() - 1])
    })]
    Str(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // --------- Keywords ---------
    #[token("fn")]
    Fn,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("match")]
    Match,
    #[token("defer")]
    Defer,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // --------- Identifier ---------
    #[token("_")]
    Underscore,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned(), priority = 1)]
    Ident(String),

    // --------- Operators ---------
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&")]
    Ampersand,
    #[token("..")]
    DotDot,
    #[token("=>")]
    FatArrow,
    #[token("->")]
    Arrow,
    #[token("!")]
    Bang,

    // --------- Delimiters ---------
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(":=")]
    ColonEq,
    #[token(";")]
    Semicolon,
    #[token("@")]
    At,
}

fn parse_int(slice: &str) -> Option<i64> {
    let digits: String = slice.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        digits.parse().ok()
    }
}

fn parse_float(slice: &str) -> Option<f64> {
    let digits: String = slice.chars().filter(|c| *c != '_').collect();
    digits.parse().ok()
}

/// Unescapes a string literal body, converting escape sequences to their
/// actual characters. Unknown escapes keep the character after the backslash.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some('0') => result.push('\0'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Displays a token the way it is spelled in source.
/// Used for error message formatting.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Token::Newline => "newline",
            Token::Int(v) => return write!(f, "{}", v),
            Token::Float(v) => return write!(f, "{}", v),
            Token::Str(s) => return write!(f, "\"{}\"", s),
            Token::True => "true",
            Token::False => "false",
            Token::Nil => "nil",
            Token::Fn => "fn",
            Token::If => "if",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::In => "in",
            Token::Return => "return",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Match => "match",
            Token::Defer => "defer",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Underscore => "_",
            Token::Ident(name) => return write!(f, "{}", name),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::Ampersand => "&",
            Token::DotDot => "..",
            Token::FatArrow => "=>",
            Token::Arrow => "->",
            Token::Bang => "!",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::ColonColon => "::",
            Token::ColonEq => ":=",
            Token::Semicolon => ";",
            Token::At => "@",
        };
        write!(f, "{}", text)
    }
}

//===----------------------------------------------------------------------===//
// Token stream
//===----------------------------------------------------------------------===//

/// A token with its source position.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Tokenizes the whole source up front. Lexically invalid input produces a
/// list of (line, column) positions the parser turns into diagnostics.
pub fn tokenize(source: &str) -> (Vec<Spanned>, Vec<(u32, u32)>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    let line_starts = line_starts(source);
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (line, column) = position_of(&line_starts, span.start);
        match result {
            Ok(token) => tokens.push(Spanned { token, line, column }),
            Err(()) => errors.push((line, column)),
        }
    }

    (tokens, errors)
}

fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn position_of(line_starts: &[usize], offset: usize) -> (u32, u32) {
    let line = match line_starts.binary_search(&offset) {
        Ok(idx) => idx,
        Err(idx) => idx - 1,
    };
    let column = offset - line_starts[line];
    (line as u32 + 1, column as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn lex_declaration_operators() {
        assert_eq!(
            kinds("x := 1"),
            vec![
                Token::Ident("x".to_string()),
                Token::ColonEq,
                Token::Int(1)
            ]
        );
        assert_eq!(
            kinds("PI :: 3.14"),
            vec![
                Token::Ident("PI".to_string()),
                Token::ColonColon,
                Token::Float(3.14)
            ]
        );
    }

    #[test]
    fn lex_hex_and_underscore_integers() {
        assert_eq!(kinds("0xFF"), vec![Token::Int(255)]);
        assert_eq!(kinds("1_000_000"), vec![Token::Int(1_000_000)]);
    }

    #[test]
    fn lex_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![Token::Str("a\nb".to_string())]
        );
    }

    #[test]
    fn lex_comments_are_skipped() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![Token::Int(1), Token::Newline, Token::Int(2)]
        );
    }

    #[test]
    fn lex_range_vs_dot() {
        assert_eq!(
            kinds("1..5"),
            vec![Token::Int(1), Token::DotDot, Token::Int(5)]
        );
        assert_eq!(
            kinds("t.field"),
            vec![
                Token::Ident("t".to_string()),
                Token::Dot,
                Token::Ident("field".to_string())
            ]
        );
    }

    #[test]
    fn lex_underscore_is_wildcard_token() {
        assert_eq!(kinds("_"), vec![Token::Underscore]);
        assert_eq!(kinds("_x"), vec![Token::Ident("_x".to_string())]);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let (tokens, _) = tokenize("a\n  b");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[2].column, 3);
    }
}
