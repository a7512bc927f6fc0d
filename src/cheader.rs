use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ctype::CType;

//===----------------------------------------------------------------------===//
// C header parser
//
// A tolerant, recovery-oriented single-pass recognizer. It never invokes
// the preprocessor; #include lines are ignored, GNU extensions are skipped
// wherever they appear, and anything unrecognized is stepped over. A hard
// iteration cap plus a forward-progress guarantee keep ill-formed input
// from hanging the parser.
//===----------------------------------------------------------------------===//

const MAX_ITERATIONS: usize = 100_000;

/// System include directories probed for header names.
const SYSTEM_INCLUDE_PATHS: &[&str] = &[
    "/usr/include",
    "/usr/local/include",
    "/usr/include/x86_64-linux-gnu",
];

#[derive(Debug, Clone)]
pub struct ParsedFunction {
    pub name: String,
    pub return_type: CType,
    pub param_types: Vec<CType>,
    pub param_names: Vec<Option<String>>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone)]
pub struct ParsedEnum {
    pub name: Option<String>,
    pub values: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub enum MacroValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct ParsedMacro {
    pub name: String,
    pub value: MacroValue,
}

/// Base type names the recognizer resolves directly. `long`, `signed`,
/// `unsigned` and `struct` take dedicated paths.
static BASE_TYPES: Lazy<FxHashMap<&'static str, CType>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("void", CType::Void);
    map.insert("char", CType::Char);
    map.insert("short", CType::Short);
    map.insert("int", CType::Int);
    map.insert("float", CType::Float);
    map.insert("double", CType::Double);
    map.insert("bool", CType::Bool);
    map.insert("_Bool", CType::Bool);
    map.insert("size_t", CType::SizeT);
    map.insert("int8_t", CType::Int8);
    map.insert("int16_t", CType::Int16);
    map.insert("int32_t", CType::Int32);
    map.insert("int64_t", CType::Int64);
    map.insert("uint8_t", CType::UInt8);
    map.insert("uint16_t", CType::UInt16);
    map.insert("uint32_t", CType::UInt32);
    map.insert("uint64_t", CType::UInt64);
    map
});

pub struct HeaderParser {
    source: Vec<u8>,
    pos: usize,
    pub functions: Vec<ParsedFunction>,
    pub enums: Vec<ParsedEnum>,
    pub macros: Vec<ParsedMacro>,
    /// Simple scalar typedefs fed back into the type recognizer.
    typedefs: FxHashMap<String, CType>,
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

impl HeaderParser {
    pub fn new() -> Self {
        HeaderParser {
            source: Vec::new(),
            pos: 0,
            functions: Vec::new(),
            enums: Vec::new(),
            macros: Vec::new(),
            typedefs: FxHashMap::default(),
        }
    }

    //===------------------------------------------------------------------===//
    // Cursor
    //===------------------------------------------------------------------===//

    fn peek(&self) -> u8 {
        self.source.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Skips whitespace and both comment forms.
    fn skip_space(&mut self) {
        while !self.at_end() {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => self.bump(),
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.bump();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.pos += 2;
                    while !self.at_end()
                        && !(self.peek() == b'*' && self.peek_at(1) == b'/')
                    {
                        self.bump();
                    }
                    if !self.at_end() {
                        self.pos += 2;
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes `kw` when it appears here as a whole word.
    fn match_keyword(&mut self, kw: &str) -> bool {
        let bytes = kw.as_bytes();
        if self.source[self.pos..].starts_with(bytes)
            && !is_ident_char(self.peek_at(bytes.len()))
        {
            self.pos += bytes.len();
            true
        } else {
            false
        }
    }

    fn read_ident(&mut self) -> Option<String> {
        self.skip_space();
        if !is_ident_start(self.peek()) {
            return None;
        }
        let start = self.pos;
        while is_ident_char(self.peek()) {
            self.bump();
        }
        Some(String::from_utf8_lossy(&self.source[start..self.pos]).into_owned())
    }

    fn skip_to(&mut self, target: u8) {
        while !self.at_end() && self.peek() != target {
            self.bump();
        }
    }

    /// Skips a balanced brace group; the cursor sits on the opening brace.
    fn skip_braces(&mut self) {
        let mut depth = 1;
        self.bump();
        while !self.at_end() && depth > 0 {
            match self.peek() {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }

    /// Skips a balanced parenthesis group; the cursor sits on the opener.
    fn skip_parens(&mut self) {
        let mut depth = 1;
        self.bump();
        while !self.at_end() && depth > 0 {
            match self.peek() {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }

    /// Skips __attribute__, __asm__, __extension__, __restrict and the rest
    /// of the double-underscore family, with any parenthesized arguments.
    fn skip_gnu_extension(&mut self) {
        const EXTENSIONS: &[&str] = &[
            "__attribute__",
            "__asm__",
            "__asm",
            "__extension__",
            "__inline__",
            "__inline",
            "__restrict",
            "__const",
            "__volatile",
            "__nonnull",
            "__wur",
            "__THROW",
            "__nothrow",
        ];

        self.skip_space();
        while self.peek() == b'_' && self.peek_at(1) == b'_' {
            let rest = &self.source[self.pos..];
            let known = EXTENSIONS.iter().any(|ext| rest.starts_with(ext.as_bytes()));
            if !known {
                break;
            }

            while is_ident_char(self.peek()) {
                self.bump();
            }
            self.skip_space();
            while self.peek() == b'(' {
                self.skip_parens();
                self.skip_space();
            }
            self.skip_space();
        }
    }

    //===------------------------------------------------------------------===//
    // Type recognizer
    //===------------------------------------------------------------------===//

    /// Reads a C type. Qualifiers are stripped; `char*` and `const char*`
    /// elevate to the string kind; unknown identifiers consult the typedef
    /// table and otherwise default to int.
    fn read_type(&mut self) -> CType {
        self.skip_space();
        self.skip_gnu_extension();

        loop {
            self.skip_space();
            self.skip_gnu_extension();
            if self.match_keyword("const")
                || self.match_keyword("volatile")
                || self.match_keyword("static")
                || self.match_keyword("extern")
                || self.match_keyword("inline")
                || self.match_keyword("register")
            {
                continue;
            }
            break;
        }

        self.skip_gnu_extension();

        let mut is_unsigned = false;
        if self.match_keyword("unsigned") {
            is_unsigned = true;
        } else {
            self.match_keyword("signed");
        }

        self.skip_space();

        let mut result = if self.match_keyword("long") {
            self.skip_space();
            if self.match_keyword("long") {
                if is_unsigned { CType::ULongLong } else { CType::LongLong }
            } else if self.match_keyword("double") {
                CType::Double
            } else if is_unsigned {
                CType::ULong
            } else {
                CType::Long
            }
        } else if self.match_keyword("struct") {
            let _ = self.read_ident();
            CType::Struct
        } else if let Some(name) = self.read_ident() {
            match BASE_TYPES.get(name.as_str()) {
                Some(base) => match (base, is_unsigned) {
                    (CType::Char, true) => CType::UChar,
                    (CType::Short, true) => CType::UShort,
                    (CType::Int, true) => CType::UInt,
                    (base, _) => *base,
                },
                None => match self.typedefs.get(name.as_str()) {
                    Some(aliased) => *aliased,
                    // Unknown identifier: assume an int-compatible typedef.
                    None => CType::Int,
                },
            }
        } else if is_unsigned {
            CType::UInt
        } else {
            CType::Int
        };

        self.skip_space();
        while self.peek() == b'*' {
            result = match result {
                CType::Char | CType::SChar | CType::UChar => CType::String,
                _ => CType::Pointer,
            };
            self.bump();
            self.skip_space();
            // `*__restrict` and friends.
            self.skip_gnu_extension();
        }

        result
    }

    //===------------------------------------------------------------------===//
    // Productions
    //===------------------------------------------------------------------===//

    /// Function prototype (or definition; the body is skipped). Returns
    /// false without consuming a recognizable declaration.
    fn parse_function(&mut self) -> bool {
        let start = self.pos;

        let return_type = self.read_type();
        self.skip_space();

        let Some(name) = self.read_ident() else {
            self.pos = start;
            return false;
        };

        self.skip_space();
        if self.peek() != b'(' {
            self.pos = start;
            return false;
        }
        self.bump();

        let mut param_types = Vec::new();
        let mut param_names = Vec::new();
        let mut is_variadic = false;

        self.skip_space();

        // `(void)` marks an empty parameter list.
        if self.match_keyword("void") {
            self.skip_space();
            if self.peek() != b')' {
                // void* or similar; too hairy, treat as unrecognized.
                self.pos = start;
                self.skip_to(b';');
                if !self.at_end() {
                    self.bump();
                }
                return false;
            }
        }

        while !self.at_end() && self.peek() != b')' {
            let loop_start = self.pos;
            self.skip_space();

            if self.peek() == b'.' && self.peek_at(1) == b'.' && self.peek_at(2) == b'.'
            {
                is_variadic = true;
                self.pos += 3;
                self.skip_space();
                break;
            }

            // Nested parentheses (macro-wrapped parameters).
            if self.peek() == b'(' {
                self.skip_parens();
                self.skip_space();
                if self.peek() == b',' {
                    self.bump();
                }
                continue;
            }

            if !is_ident_start(self.peek()) {
                while !self.at_end() && self.peek() != b',' && self.peek() != b')' {
                    self.bump();
                }
                if self.peek() == b',' {
                    self.bump();
                }
                continue;
            }

            let mut ptype = self.read_type();
            self.skip_space();

            let pname = if is_ident_start(self.peek()) {
                self.read_ident()
            } else {
                None
            };

            // Array parameters decay to pointers.
            self.skip_space();
            while self.peek() == b'[' {
                self.skip_to(b']');
                if !self.at_end() {
                    self.bump();
                }
                ptype = CType::Pointer;
                self.skip_space();
            }

            self.skip_gnu_extension();

            param_types.push(ptype);
            param_names.push(pname);

            self.skip_space();
            if self.peek() == b',' {
                self.bump();
            }

            if self.pos == loop_start {
                self.bump();
            }
        }

        if self.peek() == b')' {
            self.bump();
        }

        self.skip_space();
        self.skip_gnu_extension();
        if self.peek() == b'{' {
            self.skip_braces();
        } else {
            self.skip_to(b';');
            if !self.at_end() {
                self.bump();
            }
        }

        self.functions.push(ParsedFunction {
            name,
            return_type,
            param_types,
            param_names,
            is_variadic,
        });
        true
    }

    /// `#define NAME value` with a plain token-sequence value.
    /// Function-like macros are skipped.
    fn parse_define(&mut self) -> bool {
        self.skip_space_no_newline();

        let Some(name) = self.read_ident_no_newline() else {
            return false;
        };

        // Function-like macro.
        if self.peek() == b'(' {
            self.skip_to(b'\n');
            return false;
        }

        let value_start = self.pos;
        while !self.at_end() && self.peek() != b'\n' {
            self.bump();
        }
        let raw = String::from_utf8_lossy(&self.source[value_start..self.pos]);
        let value = raw.trim();
        if value.is_empty() {
            return false;
        }

        let parsed = if let Some(int_value) = parse_c_int(value) {
            MacroValue::Int(int_value)
        } else if let Ok(float_value) = value.parse::<f64>() {
            MacroValue::Float(float_value)
        } else {
            MacroValue::Str(value.to_string())
        };

        self.macros.push(ParsedMacro { name, value: parsed });
        true
    }

    /// Whitespace skip that respects the line-oriented nature of #define.
    fn skip_space_no_newline(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\r') {
            self.bump();
        }
    }

    fn read_ident_no_newline(&mut self) -> Option<String> {
        self.skip_space_no_newline();
        if !is_ident_start(self.peek()) {
            return None;
        }
        let start = self.pos;
        while is_ident_char(self.peek()) {
            self.bump();
        }
        Some(String::from_utf8_lossy(&self.source[start..self.pos]).into_owned())
    }

    /// `enum [Name] { A, B = expr, … };` — enumerators count up from zero
    /// when no explicit value is given.
    fn parse_enum(&mut self) -> bool {
        self.skip_space();

        let name = if is_ident_start(self.peek()) { self.read_ident() } else { None };

        self.skip_space();
        if self.peek() != b'{' {
            return false;
        }
        self.bump();

        let mut values = Vec::new();
        let mut current = 0i64;

        while !self.at_end() && self.peek() != b'}' {
            self.skip_space();
            if self.peek() == b'}' {
                break;
            }

            let Some(value_name) = self.read_ident() else {
                break;
            };

            self.skip_space();
            if self.peek() == b'=' {
                self.bump();
                self.skip_space();
                let expr_start = self.pos;
                while !self.at_end() && self.peek() != b',' && self.peek() != b'}' {
                    self.bump();
                }
                let expr =
                    String::from_utf8_lossy(&self.source[expr_start..self.pos]);
                current = parse_c_int_prefix(expr.trim());
            }

            values.push((value_name, current));
            current += 1;

            self.skip_space();
            if self.peek() == b',' {
                self.bump();
            }
        }

        if self.peek() == b'}' {
            self.bump();
        }
        self.skip_to(b';');
        if !self.at_end() {
            self.bump();
        }

        self.enums.push(ParsedEnum { name, values });
        true
    }

    /// Typedefs: a simple `typedef <scalar> NAME;` feeds the typedef table;
    /// anything more structured is skipped as a balanced group.
    fn parse_typedef(&mut self) {
        let start = self.pos;

        self.skip_space();
        if is_ident_start(self.peek()) {
            let aliased = self.read_type();
            if let Some(alias) = self.read_ident() {
                self.skip_space();
                if self.peek() == b';' {
                    self.bump();
                    self.typedefs.insert(alias, aliased);
                    return;
                }
            }
        }

        // Not a simple alias; skip the whole declaration.
        self.pos = start;
        while !self.at_end() && self.peek() != b';' {
            match self.peek() {
                b'{' => self.skip_braces(),
                b'(' => self.skip_parens(),
                _ => self.bump(),
            }
        }
        if !self.at_end() {
            self.bump();
        }
    }

    //===------------------------------------------------------------------===//
    // Driver
    //===------------------------------------------------------------------===//

    pub fn parse(&mut self, source: &str) {
        self.source = source.as_bytes().to_vec();
        self.pos = 0;

        let mut iterations = 0;
        while !self.at_end() && iterations < MAX_ITERATIONS {
            iterations += 1;
            let start_pos = self.pos;

            self.skip_space();
            self.skip_gnu_extension();
            if self.at_end() {
                break;
            }

            // Preprocessor directives.
            if self.peek() == b'#' {
                self.bump();
                self.skip_space_no_newline();
                if self.match_keyword("define") {
                    self.parse_define();
                } else {
                    // Skip the directive, honoring line continuations.
                    while !self.at_end() && self.peek() != b'\n' {
                        if self.peek() == b'\\' && self.peek_at(1) == b'\n' {
                            self.pos += 2;
                        } else {
                            self.bump();
                        }
                    }
                }
                continue;
            }

            // asm blocks.
            if self.source[self.pos..].starts_with(b"__asm")
                || self.source[self.pos..].starts_with(b"asm")
            {
                while is_ident_char(self.peek()) {
                    self.bump();
                }
                self.skip_space();
                if self.peek() == b'(' {
                    self.skip_parens();
                }
                if self.peek() == b'{' {
                    self.skip_braces();
                }
                self.skip_to(b';');
                if !self.at_end() {
                    self.bump();
                }
                continue;
            }

            if self.match_keyword("enum") {
                self.parse_enum();
                continue;
            }

            if self.match_keyword("typedef") {
                self.parse_typedef();
                continue;
            }

            // Struct and union definitions carry no callable symbols; skip.
            if self.match_keyword("struct") || self.match_keyword("union") {
                self.skip_space();
                self.skip_gnu_extension();
                if is_ident_start(self.peek()) {
                    let _ = self.read_ident();
                }
                self.skip_space();
                self.skip_gnu_extension();
                if self.peek() == b'{' {
                    self.skip_braces();
                }
                self.skip_to(b';');
                if !self.at_end() {
                    self.bump();
                }
                continue;
            }

            // extern "C" { opens a block that parses at the top level.
            if self.match_keyword("extern") {
                self.skip_space();
                if self.peek() == b'"' {
                    self.bump();
                    self.skip_to(b'"');
                    if !self.at_end() {
                        self.bump();
                    }
                    self.skip_space();
                    if self.peek() == b'{' {
                        self.bump();
                    }
                }
                continue;
            }

            let save = self.pos;
            if !self.parse_function() {
                self.pos = save;
                self.skip_to(b';');
                if !self.at_end() {
                    self.bump();
                }
            }

            // Forward progress even when nothing matched.
            if self.pos == start_pos && !self.at_end() {
                self.bump();
            }
        }
    }

    pub fn load(&mut self, path: &Path) -> std::io::Result<()> {
        let source = fs::read_to_string(path)?;
        self.parse(&source);
        Ok(())
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

//===----------------------------------------------------------------------===//
// Number parsing and include lookup
//===----------------------------------------------------------------------===//

/// Full-string C integer literal: decimal, 0x hex, or 0-prefixed octal.
fn parse_c_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let value = if let Some(hex) =
        digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -value } else { value })
}

/// Leading-integer parse for enum value expressions; `1 << 3` yields 1 the
/// way strtol would, and garbage yields 0.
fn parse_c_int_prefix(text: &str) -> i64 {
    if let Some(value) = parse_c_int(text) {
        return value;
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

/// Locates a header by probing the literal name and then the system
/// include directories.
pub fn find_include(name: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Some(direct);
    }

    for dir in SYSTEM_INCLUDE_PATHS {
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(source: &str) -> HeaderParser {
        let mut parser = HeaderParser::new();
        parser.parse(source);
        parser
    }

    #[test]
    fn parses_simple_prototypes() {
        let parser = parse_source(
            "int add(int a, int b);\ndouble sqrt(double x);\nvoid noop(void);\n",
        );
        assert_eq!(parser.functions.len(), 3);

        let add = &parser.functions[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.return_type, CType::Int);
        assert_eq!(add.param_types, vec![CType::Int, CType::Int]);
        assert!(!add.is_variadic);

        let noop = &parser.functions[2];
        assert_eq!(noop.name, "noop");
        assert!(noop.param_types.is_empty());
    }

    #[test]
    fn char_pointer_elevates_to_string() {
        let parser = parse_source("size_t strlen(const char* s);\n");
        let f = &parser.functions[0];
        assert_eq!(f.return_type, CType::SizeT);
        assert_eq!(f.param_types, vec![CType::String]);
    }

    #[test]
    fn variadic_flag_is_set() {
        let parser = parse_source("int printf(const char* fmt, ...);\n");
        let f = &parser.functions[0];
        assert!(f.is_variadic);
        assert_eq!(f.param_types, vec![CType::String]);
    }

    #[test]
    fn function_bodies_are_skipped() {
        let parser = parse_source(
            "int twice(int x) { return x + x; }\nint after(int y);\n",
        );
        let names: Vec<&str> =
            parser.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["twice", "after"]);
    }

    #[test]
    fn array_parameters_decay_to_pointer() {
        let parser = parse_source("void fill(int values[], int n);\n");
        assert_eq!(
            parser.functions[0].param_types,
            vec![CType::Pointer, CType::Int]
        );
    }

    #[test]
    fn gnu_extensions_are_skipped() {
        let parser = parse_source(
            "extern int dup (int __fd) __THROW __wur;\n\
             extern void *memcpy (void *__restrict __dest, const void *__restrict __src, size_t __n) __THROW __nonnull ((1, 2));\n",
        );
        let names: Vec<&str> =
            parser.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["dup", "memcpy"]);
        assert_eq!(parser.functions[1].param_types[0], CType::Pointer);
        assert_eq!(parser.functions[1].param_types[2], CType::SizeT);
    }

    #[test]
    fn defines_parse_int_float_and_string() {
        let parser = parse_source(
            "#define ANSWER 42\n\
             #define HEXA 0x10\n\
             #define RATIO 2.5\n\
             #define GREETING a_token_sequence\n\
             #define LIKE_FN(x) ((x) * 2)\n",
        );
        assert_eq!(parser.macros.len(), 4);
        assert!(matches!(parser.macros[0].value, MacroValue::Int(42)));
        assert!(matches!(parser.macros[1].value, MacroValue::Int(16)));
        assert!(matches!(parser.macros[2].value, MacroValue::Float(v) if v == 2.5));
        assert!(matches!(parser.macros[3].value, MacroValue::Str(_)));
    }

    #[test]
    fn enums_count_up_and_honor_explicit_values() {
        let parser = parse_source(
            "enum Color { RED, GREEN = 5, BLUE };\nenum { ANON = -2, NEXT };\n",
        );
        assert_eq!(parser.enums.len(), 2);
        assert_eq!(
            parser.enums[0].values,
            vec![
                ("RED".to_string(), 0),
                ("GREEN".to_string(), 5),
                ("BLUE".to_string(), 6)
            ]
        );
        assert_eq!(
            parser.enums[1].values,
            vec![("ANON".to_string(), -2), ("NEXT".to_string(), -1)]
        );
    }

    #[test]
    fn simple_typedefs_feed_the_recognizer() {
        let parser = parse_source(
            "typedef unsigned int GLuint;\nvoid glGenBuffers(GLuint n);\n",
        );
        assert_eq!(parser.functions[0].param_types, vec![CType::UInt]);
    }

    #[test]
    fn complex_typedefs_are_skipped() {
        let parser = parse_source(
            "typedef struct { int x; int y; } Point;\nint use_point(int p);\n",
        );
        assert_eq!(parser.functions.len(), 1);
        assert_eq!(parser.functions[0].name, "use_point");
    }

    #[test]
    fn unknown_types_default_to_int() {
        let parser = parse_source("MysteryType frob(OtherMystery m);\n");
        let f = &parser.functions[0];
        assert_eq!(f.return_type, CType::Int);
        assert_eq!(f.param_types, vec![CType::Int]);
    }

    #[test]
    fn struct_definitions_are_skipped() {
        let parser = parse_source(
            "struct Vec2 { float x; float y; };\nfloat length(float x, float y);\n",
        );
        assert_eq!(parser.functions.len(), 1);
        assert_eq!(parser.functions[0].name, "length");
    }

    #[test]
    fn extern_c_block_parses_at_top_level() {
        let parser = parse_source(
            "#ifdef __cplusplus\nextern \"C\" {\n#endif\nint inside(void);\n",
        );
        assert_eq!(parser.functions.len(), 1);
        assert_eq!(parser.functions[0].name, "inside");
    }

    #[test]
    fn includes_are_ignored() {
        let parser =
            parse_source("#include <stdio.h>\n#include \"local.h\"\nint f(int);\n");
        assert_eq!(parser.functions.len(), 1);
    }

    #[test]
    fn garbage_input_terminates() {
        let parser = parse_source("%%%$$$ @@@ ??? )))((( ;;; {{{}}}");
        assert!(parser.functions.is_empty());
    }

    #[test]
    fn long_variants_resolve() {
        let parser = parse_source(
            "long labs(long x);\nunsigned long long big(void);\nlong double ld(void);\n",
        );
        assert_eq!(parser.functions[0].return_type, CType::Long);
        assert_eq!(parser.functions[1].return_type, CType::ULongLong);
        assert_eq!(parser.functions[2].return_type, CType::Double);
    }

    #[test]
    fn find_include_resolves_system_headers() {
        // Presence depends on the host; at minimum a miss must be None.
        assert!(find_include("brisk-no-such-header.h").is_none());
    }
}
