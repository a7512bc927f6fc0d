use brisk::error::Error;
use brisk::runtime::{RunError, Runtime};
use brisk::value::Value;

//===----------------------------------------------------------------------===//
// Whole-program semantics, driven through the runtime pipeline. Programs
// end with an expression statement so the asserted value is the last_value
// slot the implicit-return machinery feeds.
//===----------------------------------------------------------------------===//

fn eval(source: &str) -> Value {
    let mut runtime = Runtime::new();
    runtime
        .eval_source(source)
        .unwrap_or_else(|error| panic!("program failed: {}\n{}", error, source))
}

fn eval_err(source: &str) -> Error {
    let mut runtime = Runtime::new();
    match runtime.eval_source(source) {
        Ok(value) => panic!("expected error, got {:?}", value),
        Err(RunError::Runtime(error)) => error.error,
        Err(RunError::Parse(errors)) => {
            panic!("expected runtime error, got parse errors {:?}", errors)
        }
    }
}

fn assert_int(source: &str, expected: i64) {
    match eval(source) {
        Value::Int(value) => assert_eq!(value, expected, "program: {}", source),
        other => panic!("expected Int({}), got {:?}: {}", expected, other, source),
    }
}

fn assert_bool(source: &str, expected: bool) {
    match eval(source) {
        Value::Bool(value) => assert_eq!(value, expected, "program: {}", source),
        other => panic!("expected Bool({}), got {:?}: {}", expected, other, source),
    }
}

fn assert_string(source: &str, expected: &str) {
    match eval(source) {
        Value::Obj(brisk::value::Obj::Str(s)) => {
            assert_eq!(s.as_str(), expected, "program: {}", source)
        }
        other => panic!("expected {:?}, got {:?}: {}", expected, other, source),
    }
}

//===----------------------------------------------------------------------===//
// Arithmetic and implicit return
//===----------------------------------------------------------------------===//

#[test]
fn function_body_implicit_return() {
    assert_int("fn f(x) { x * x }\nf(7)", 49);
}

#[test]
fn explicit_return_beats_trailing_statements() {
    assert_int("fn f() { return 1\n2 }\nf()", 1);
}

#[test]
fn return_without_value_is_nil() {
    match eval("fn f() { return }\nf()") {
        Value::Nil => {}
        other => panic!("expected nil, got {:?}", other),
    }
}

#[test]
fn mixed_arithmetic_promotes_to_float() {
    match eval("1 + 2.5") {
        Value::Float(v) => assert_eq!(v, 3.5),
        other => panic!("expected float, got {:?}", other),
    }
    assert_int("7 / 2", 3);
    match eval("7.0 / 2") {
        Value::Float(v) => assert_eq!(v, 3.5),
        other => panic!("expected float, got {:?}", other),
    }
}

#[test]
fn integer_arithmetic_wraps() {
    assert_int("9223372036854775807 + 1", i64::MIN);
}

#[test]
fn division_by_zero_is_an_error() {
    match eval_err("1 / 0") {
        Error::Runtime(msg) => assert!(msg.contains("Division by zero")),
        other => panic!("expected runtime error, got {:?}", other),
    }
    match eval_err("1 % 0") {
        Error::Runtime(msg) => assert!(msg.contains("Modulo by zero")),
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn float_modulo_keeps_sign_of_dividend() {
    match eval("7.5 % 2.0") {
        Value::Float(v) => assert_eq!(v, 1.5),
        other => panic!("expected float, got {:?}", other),
    }
}

#[test]
fn unary_operators() {
    assert_int("-(3 + 4)", -7);
    assert_bool("not 0", true);
    assert_bool("!1", false);
}

#[test]
fn string_concatenation_coerces_right_operand() {
    assert_string("\"a\" + \"b\"", "ab");
    assert_string("\"n=\" + 42", "n=42");
    assert_string("\"v=\" + 2.5", "v=2.5");
    assert_string("\"x=\" + nil", "x=nil");
}

//===----------------------------------------------------------------------===//
// Truthiness and short-circuit logic
//===----------------------------------------------------------------------===//

#[test]
fn and_returns_the_deciding_operand() {
    assert_int("0 and 5", 0);
    assert_int("3 and 5", 5);
    match eval("nil and 5") {
        Value::Nil => {}
        other => panic!("expected nil, got {:?}", other),
    }
}

#[test]
fn or_returns_the_deciding_operand() {
    assert_int("0 or 5", 5);
    assert_int("3 or 5", 3);
    assert_string("\"\" or \"fallback\"", "fallback");
}

#[test]
fn short_circuit_skips_right_operand() {
    assert_int("x := 0\nfn bump() { x = x + 1\n0 }\nfalse and bump()\nx", 0);
    assert_int("x := 0\nfn bump() { x = x + 1\n0 }\ntrue or bump()\nx", 0);
}

#[test]
fn equality_across_kinds() {
    assert_bool("1 == 1.0", true);
    assert_bool("1 == \"1\"", false);
    assert_bool("nil == false", false);
    assert_bool("nil == nil", true);
    assert_bool("\"abc\" == \"abc\"", true);
    assert_bool("[1] == [1]", false);
    assert_bool("a := [1]\nb := a\na == b", true);
}

//===----------------------------------------------------------------------===//
// Bindings and scope
//===----------------------------------------------------------------------===//

#[test]
fn shadowing_in_nested_block() {
    assert_int("x := 1\nif true { x := 2\nx = x + 1 }\nx", 1);
}

#[test]
fn redeclaration_in_same_scope_errors() {
    match eval_err("x := 1\nx := 2") {
        Error::Name(msg) => assert!(msg.contains("already defined")),
        other => panic!("expected name error, got {:?}", other),
    }
}

#[test]
fn const_assignment_errors() {
    match eval_err("PI :: 3.14\nPI = 3") {
        Error::Name(msg) => {
            assert!(msg.contains("Cannot assign to constant 'PI'"))
        }
        other => panic!("expected name error, got {:?}", other),
    }
}

#[test]
fn undefined_variable_errors() {
    match eval_err("ghost + 1") {
        Error::Name(msg) => assert!(msg.contains("Undefined variable 'ghost'")),
        other => panic!("expected name error, got {:?}", other),
    }
    match eval_err("ghost = 1") {
        Error::Name(msg) => assert!(msg.contains("Undefined variable 'ghost'")),
        other => panic!("expected name error, got {:?}", other),
    }
}

//===----------------------------------------------------------------------===//
// Closures
//===----------------------------------------------------------------------===//

#[test]
fn counter_closure_keeps_state() {
    let source = "\
fn make_counter() { c := 0\nfn() { c = c + 1\nc } }
k := make_counter()
k()
k()
k()";
    assert_int(source, 3);
}

#[test]
fn closures_capture_lexically_not_dynamically() {
    let source = "\
x := 10
fn f() { x }
fn g() { x := 99\nf() }
g()";
    assert_int(source, 10);
}

#[test]
fn two_closures_share_one_environment() {
    let source = "\
fn make() { c := 0\n{ inc: fn() { c = c + 1\nc }, get: fn() { c } } }
p := make()
p.inc()
p.inc()
p.get()";
    assert_int(source, 2);
}

//===----------------------------------------------------------------------===//
// Control flow
//===----------------------------------------------------------------------===//

#[test]
fn while_loop_with_break_and_continue() {
    let source = "\
total := 0
i := 0
while i < 10 {
    i = i + 1
    if i % 2 == 0 { continue }
    if i > 7 { break }
    total = total + i
}
total";
    assert_int(source, 1 + 3 + 5 + 7);
}

#[test]
fn for_loop_over_array() {
    assert_int("total := 0\nfor x in [1, 2, 3] { total = total + x }\ntotal", 6);
}

#[test]
fn for_loop_over_range() {
    assert_int("total := 0\nfor i in 0..5 { total = total + i }\ntotal", 10);
}

#[test]
fn for_over_empty_array_runs_zero_times() {
    assert_int("count := 0\nfor x in [] { count = count + 1 }\ncount", 0);
}

#[test]
fn iterator_is_not_visible_after_the_loop() {
    match eval_err("for x in [1] { }\nx") {
        Error::Name(_) => {}
        other => panic!("expected name error, got {:?}", other),
    }
}

#[test]
fn for_requires_an_array() {
    match eval_err("for x in 42 { }") {
        Error::Type(msg) => assert!(msg.contains("iterate")),
        other => panic!("expected type error, got {:?}", other),
    }
}

#[test]
fn elif_chain_dispatches() {
    let source = "\
fn pick(n) {
    if n < 0 { \"neg\" } elif n == 0 { \"zero\" } else { \"pos\" }
}
pick(-1) + pick(0) + pick(1)";
    assert_string(source, "negzeropos");
}

#[test]
fn return_propagates_through_loops() {
    let source = "\
fn find(items, wanted) {
    for x in items {
        if x == wanted { return \"found\" }
    }
    \"missing\"
}
find([1, 2, 3], 2) + find([1], 9)";
    assert_string(source, "foundmissing");
}

//===----------------------------------------------------------------------===//
// Ranges
//===----------------------------------------------------------------------===//

#[test]
fn range_materializes_half_open() {
    assert_int("len(1..5)", 4);
    assert_int("r := 2..5\nr[0]", 2);
    assert_int("r := 2..5\nr[2]", 4);
}

#[test]
fn descending_range_steps_down() {
    assert_int("r := 5..2\nr[0]", 5);
    assert_int("r := 5..2\nr[2]", 3);
    assert_int("len(5..2)", 3);
}

#[test]
fn empty_range() {
    assert_int("len(3..3)", 0);
}

#[test]
fn range_bounds_must_be_integers() {
    match eval_err("1.5..3") {
        Error::Type(msg) => assert!(msg.contains("Range bounds")),
        other => panic!("expected type error, got {:?}", other),
    }
}

//===----------------------------------------------------------------------===//
// Arrays, tables, strings
//===----------------------------------------------------------------------===//

#[test]
fn array_indexing_and_mutation() {
    assert_int("a := [10, 20, 30]\na[1] = 99\na[1]", 99);
    assert_int("a := [[1, 2], [3, 4]]\na[1][0]", 3);
}

#[test]
fn negative_index_is_out_of_bounds() {
    match eval_err("a := [1, 2, 3]\na[-1]") {
        Error::Index(msg) => assert!(msg.contains("out of bounds")),
        other => panic!("expected index error, got {:?}", other),
    }
}

#[test]
fn index_past_the_end_is_out_of_bounds() {
    match eval_err("a := [1]\na[1]") {
        Error::Index(_) => {}
        other => panic!("expected index error, got {:?}", other),
    }
}

#[test]
fn table_literal_field_and_index_access() {
    assert_int("t := {a: 1, b: 2}\nt.a + t[\"b\"]", 3);
    match eval("t := {a: 1}\nt.missing") {
        Value::Nil => {}
        other => panic!("expected nil, got {:?}", other),
    }
}

#[test]
fn table_membership() {
    assert_bool("t := {a: 1, b: 2}\nhas(t, \"a\")", true);
    assert_bool("t := {a: 1, b: 2}\nhas(t, \"c\")", false);
}

#[test]
fn table_field_assignment() {
    assert_int("t := {a: 1}\nt.a = 5\nt.b = 7\nt.a + t.b", 12);
    assert_int("t := {}\nt[\"k\"] = 3\nt[\"k\"]", 3);
}

#[test]
fn string_indexing_yields_one_char_strings() {
    assert_string("s := \"hello\"\ns[1]", "e");
    match eval_err("s := \"hi\"\ns[5]") {
        Error::Index(_) => {}
        other => panic!("expected index error, got {:?}", other),
    }
}

#[test]
fn indexing_wrong_kinds_errors() {
    match eval_err("a := [1]\na[\"k\"]") {
        Error::Type(_) => {}
        other => panic!("expected type error, got {:?}", other),
    }
    match eval_err("t := {a: 1}\nt[0]") {
        Error::Type(_) => {}
        other => panic!("expected type error, got {:?}", other),
    }
    match eval_err("x := 3\nx[0]") {
        Error::Type(_) => {}
        other => panic!("expected type error, got {:?}", other),
    }
}

//===----------------------------------------------------------------------===//
// Match
//===----------------------------------------------------------------------===//

#[test]
fn match_with_range_patterns() {
    let source = "\
fn grade(s) { match s { 90..101 => \"A\", 80..90 => \"B\", _ => \"F\" } }
grade(95) + grade(85) + grade(50)";
    assert_string(source, "ABF");
}

#[test]
fn match_literal_patterns() {
    let source = "\
fn describe(v) { match v { 0 => \"zero\", \"x\" => \"ex\", _ => \"other\" } }
describe(0) + describe(\"x\") + describe(true)";
    assert_string(source, "zeroexother");
}

#[test]
fn match_without_matching_arm_leaves_last_value() {
    assert_int("fn f(v) { 7\nmatch v { 1 => 99 } }\nf(2)", 7);
}

#[test]
fn match_block_arm_executes_as_statement() {
    let source = "\
total := 0
match 1 { 1 => { total = total + 5 }, _ => { total = total + 9 } }
total";
    assert_int(source, 5);
}

#[test]
fn match_range_boundaries_are_half_open() {
    let source = "fn f(v) { match v { 0..10 => \"in\", _ => \"out\" } }\n";
    assert_string(&format!("{}f(0)", source), "in");
    assert_string(&format!("{}f(9)", source), "in");
    assert_string(&format!("{}f(10)", source), "out");
}

//===----------------------------------------------------------------------===//
// Defer
//===----------------------------------------------------------------------===//

#[test]
fn defers_run_lifo_on_scope_exit() {
    let source = "\
log := []
fn g() {
    defer push(log, \"a\")
    defer push(log, \"b\")
    push(log, \"c\")
}
g()
join(log, \"\")";
    assert_string(source, "cba");
}

#[test]
fn defer_runs_when_a_loop_breaks() {
    let source = "\
log := []
while true {
    defer push(log, \"deferred\")
    push(log, \"body\")
    break
}
join(log, \",\")";
    assert_string(source, "body,deferred");
}

#[test]
fn defer_runs_on_early_return() {
    let source = "\
log := []
fn f() {
    defer push(log, \"cleanup\")
    return \"ret\"
}
f() + join(log, \"\")";
    assert_string(source, "retcleanup");
}

#[test]
fn deferred_return_cannot_hijack_the_unwind() {
    let source = "\
fn f() {
    defer return 99
    return 1
}
f()";
    assert_int(source, 1);
}

#[test]
fn defer_stack_depth_is_restored_per_scope() {
    let source = "\
log := []
fn f() {
    if true {
        defer push(log, \"inner\")
        push(log, \"body\")
    }
    push(log, \"after\")
}
f()
join(log, \",\")";
    assert_string(source, "body,inner,after");
}

#[test]
fn defer_runs_when_an_error_unwinds() {
    let source = "\
log := []
fn f() {
    defer push(log, \"ran\")
    1 / 0
}
f()";
    let mut runtime = Runtime::new();
    assert!(runtime.eval_source(source).is_err());
    match runtime.eval_source("join(log, \"\")") {
        Ok(Value::Obj(brisk::value::Obj::Str(s))) => assert_eq!(s.as_str(), "ran"),
        other => panic!("expected joined log, got {:?}", other),
    }
}

//===----------------------------------------------------------------------===//
// Calls and arity
//===----------------------------------------------------------------------===//

#[test]
fn wrong_arity_errors() {
    match eval_err("fn f(a, b) { a }\nf(1)") {
        Error::Arity(msg) => assert!(msg.contains("Expected 2 arguments but got 1")),
        other => panic!("expected arity error, got {:?}", other),
    }
}

#[test]
fn calling_a_non_function_errors() {
    match eval_err("x := 3\nx(1)") {
        Error::Type(msg) => assert!(msg.contains("call")),
        other => panic!("expected type error, got {:?}", other),
    }
}

#[test]
fn lambdas_are_first_class() {
    assert_int("apply := fn(f, x) { f(x) }\napply(fn(v) { v + 1 }, 41)", 42);
}

#[test]
fn recursion_works() {
    assert_int("fn fib(n) { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }\nfib(10)", 55);
}

#[test]
fn builtin_arity_is_checked() {
    match eval_err("len(1, 2)") {
        Error::Arity(_) => {}
        other => panic!("expected arity error, got {:?}", other),
    }
}

//===----------------------------------------------------------------------===//
// Builtins through the language
//===----------------------------------------------------------------------===//

#[test]
fn array_builtins() {
    assert_int("a := [1, 2]\npush(a, 3)\nlen(a)", 3);
    assert_int("a := [1, 2, 3]\npop(a)", 3);
    assert_int("first([7, 8])", 7);
    assert_int("last([7, 8])", 8);
}

#[test]
fn string_builtins() {
    assert_string("upper(\"abc\")", "ABC");
    assert_string("trim(\"  x  \")", "x");
    assert_int("len(\"hello\")", 5);
    assert_string("join(split(\"a-b-c\", \"-\"), \"+\")", "a+b+c");
}

#[test]
fn conversion_builtins() {
    assert_int("int(\"42\")", 42);
    assert_string("str(42)", "42");
    assert_string("str(4.0)", "4");
    assert_string("type([1])", "array");
    assert_bool("bool(\"\")", false);
}

//===----------------------------------------------------------------------===//
// Parse-level failures surface as parse errors
//===----------------------------------------------------------------------===//

#[test]
fn syntax_error_is_reported() {
    let mut runtime = Runtime::new();
    match runtime.eval_source("fn ( {") {
        Err(RunError::Parse(errors)) => assert!(!errors.is_empty()),
        other => panic!("expected parse errors, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn c_block_is_a_runtime_error() {
    match eval_err("@c { int x; }") {
        Error::Runtime(msg) => assert!(msg.contains("not yet implemented")),
        other => panic!("expected runtime error, got {:?}", other),
    }
}
