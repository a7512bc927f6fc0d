use once_cell::sync::Lazy;
use std::io::{BufRead, Write};
use std::process;
use std::time::Instant;

use crate::env::EnvRef;
use crate::error::Error;
use crate::interner::intern;
use crate::value::{ArrayObj, Native, NativeFn, Obj, Value};

//===----------------------------------------------------------------------===//
// Built-in functions
//
// Thin adapters registering native callables into the global environment.
// Following the reference behavior these are lenient: an argument of the
// wrong kind yields nil rather than an error, except assert/error/exit
// which terminate the process.
//===----------------------------------------------------------------------===//

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

fn register(env: &EnvRef, name: &'static str, arity: i32, function: NativeFn) {
    let native = Native::new(name, arity, function);
    env.define(&intern(name), Value::Obj(Obj::Native(native)), true);
}

/// Registers every builtin into `env`. Called once on the global scope.
pub fn register_all(env: &EnvRef) {
    // I/O
    register(env, "print", -1, native_print);
    register(env, "println", -1, native_println);
    register(env, "input", -1, native_input);

    // Type conversion
    register(env, "type", 1, native_type);
    register(env, "int", 1, native_int);
    register(env, "float", 1, native_float);
    register(env, "str", 1, native_str);
    register(env, "bool", 1, native_bool);

    // Array
    register(env, "len", 1, native_len);
    register(env, "push", 2, native_push);
    register(env, "pop", 1, native_pop);
    register(env, "first", 1, native_first);
    register(env, "last", 1, native_last);
    register(env, "insert", 3, native_insert);
    register(env, "remove", 2, native_remove);

    // String
    register(env, "substr", -1, native_substr);
    register(env, "find", 2, native_find);
    register(env, "replace", 3, native_replace);
    register(env, "split", 2, native_split);
    register(env, "join", 2, native_join);
    register(env, "upper", 1, native_upper);
    register(env, "lower", 1, native_lower);
    register(env, "trim", 1, native_trim);

    // Math
    register(env, "abs", 1, native_abs);
    register(env, "min", -1, native_min);
    register(env, "max", -1, native_max);
    register(env, "floor", 1, native_floor);
    register(env, "ceil", 1, native_ceil);
    register(env, "round", 1, native_round);
    register(env, "sqrt", 1, native_sqrt);
    register(env, "pow", 2, native_pow);
    register(env, "sin", 1, native_sin);
    register(env, "cos", 1, native_cos);
    register(env, "tan", 1, native_tan);

    // Table
    register(env, "keys", 1, native_keys);
    register(env, "values", 1, native_values);
    register(env, "has", 2, native_has);

    // Utility
    register(env, "assert", -1, native_assert);
    register(env, "error", -1, native_error);
    register(env, "clock", 0, native_clock);
    register(env, "exit", -1, native_exit);
}

//===----------------------------------------------------------------------===//
// I/O
//===----------------------------------------------------------------------===//

fn native_print(args: &[Value]) -> Result<Value, Error> {
    let mut out = std::io::stdout();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, " ");
        }
        let _ = write!(out, "{}", arg);
    }
    let _ = out.flush();
    Ok(Value::Nil)
}

fn native_println(args: &[Value]) -> Result<Value, Error> {
    let mut out = std::io::stdout();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, " ");
        }
        let _ = write!(out, "{}", arg);
    }
    let _ = writeln!(out);
    Ok(Value::Nil)
}

fn native_input(args: &[Value]) -> Result<Value, Error> {
    if let Some(prompt) = args.first().and_then(|v| v.as_str()) {
        print!("{}", prompt.as_str());
        let _ = std::io::stdout().flush();
    }

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() || line.is_empty() {
        return Ok(Value::Nil);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::str(intern(&line)))
}

//===----------------------------------------------------------------------===//
// Type conversion
//===----------------------------------------------------------------------===//

fn native_type(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::str(intern(value.type_name()))),
        _ => Ok(Value::Nil),
    }
}

fn native_int(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else { return Ok(Value::Nil) };
    Ok(match value {
        Value::Int(_) => value.clone(),
        Value::Float(v) => Value::Int(*v as i64),
        Value::Bool(b) => Value::Int(*b as i64),
        Value::Obj(Obj::Str(s)) => match s.as_str().parse::<i64>() {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Nil,
        },
        _ => Value::Nil,
    })
}

fn native_float(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else { return Ok(Value::Nil) };
    Ok(match value {
        Value::Float(_) => value.clone(),
        Value::Int(v) => Value::Float(*v as f64),
        Value::Obj(Obj::Str(s)) => match s.as_str().parse::<f64>() {
            Ok(v) => Value::Float(v),
            Err(_) => Value::Nil,
        },
        _ => Value::Nil,
    })
}

fn native_str(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else { return Ok(Value::Nil) };
    Ok(Value::str(intern(&value.to_display_string())))
}

fn native_bool(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else { return Ok(Value::Nil) };
    Ok(Value::Bool(value.is_truthy()))
}

//===----------------------------------------------------------------------===//
// Arrays
//===----------------------------------------------------------------------===//

fn native_len(args: &[Value]) -> Result<Value, Error> {
    let [value] = args else { return Ok(Value::Nil) };
    Ok(match value {
        Value::Obj(Obj::Str(s)) => Value::Int(s.len() as i64),
        Value::Obj(Obj::Array(arr)) => Value::Int(arr.elements.borrow().len() as i64),
        Value::Obj(Obj::Table(table)) => Value::Int(table.table.borrow().len() as i64),
        _ => Value::Nil,
    })
}

fn native_push(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr)), value] = args {
        arr.elements.borrow_mut().push(value.clone());
    }
    Ok(Value::Nil)
}

fn native_pop(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr))] = args {
        return Ok(arr.elements.borrow_mut().pop().unwrap_or(Value::Nil));
    }
    Ok(Value::Nil)
}

fn native_first(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr))] = args {
        return Ok(arr.elements.borrow().first().cloned().unwrap_or(Value::Nil));
    }
    Ok(Value::Nil)
}

fn native_last(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr))] = args {
        return Ok(arr.elements.borrow().last().cloned().unwrap_or(Value::Nil));
    }
    Ok(Value::Nil)
}

fn native_insert(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr)), Value::Int(index), value] = args {
        let mut elements = arr.elements.borrow_mut();
        let index = *index;
        if index >= 0 && index as usize <= elements.len() {
            elements.insert(index as usize, value.clone());
        }
    }
    Ok(Value::Nil)
}

fn native_remove(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr)), Value::Int(index)] = args {
        let mut elements = arr.elements.borrow_mut();
        let index = *index;
        if index >= 0 && (index as usize) < elements.len() {
            return Ok(elements.remove(index as usize));
        }
    }
    Ok(Value::Nil)
}

//===----------------------------------------------------------------------===//
// Strings
//===----------------------------------------------------------------------===//

fn native_substr(args: &[Value]) -> Result<Value, Error> {
    let (s, start) = match args {
        [Value::Obj(Obj::Str(s)), Value::Int(start)]
        | [Value::Obj(Obj::Str(s)), Value::Int(start), _] => (s, *start),
        _ => return Ok(Value::Nil),
    };

    let text = s.as_str();
    let length = match args.get(2) {
        Some(Value::Int(length)) => *length,
        _ => text.len() as i64 - start,
    };

    let start = start.max(0) as usize;
    if start >= text.len() {
        return Ok(Value::str(intern("")));
    }
    let end = (start + length.max(0) as usize).min(text.len());
    match text.get(start..end) {
        Some(slice) => Ok(Value::str(intern(slice))),
        None => Ok(Value::Nil),
    }
}

fn native_find(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(haystack)), Value::Obj(Obj::Str(needle))] = args {
        return Ok(match haystack.as_str().find(needle.as_str()) {
            Some(index) => Value::Int(index as i64),
            None => Value::Int(-1),
        });
    }
    Ok(Value::Nil)
}

fn native_replace(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(s)), Value::Obj(Obj::Str(old)), Value::Obj(Obj::Str(new))] =
        args
    {
        if old.is_empty() {
            return Ok(Value::str(intern(s.as_str())));
        }
        let replaced = s.as_str().replace(old.as_str(), new.as_str());
        return Ok(Value::str(intern(&replaced)));
    }
    Ok(Value::Nil)
}

fn native_split(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(s)), Value::Obj(Obj::Str(delim))] = args {
        let parts: Vec<Value> = if delim.is_empty() {
            s.as_str()
                .chars()
                .map(|c| Value::str(intern(&c.to_string())))
                .collect()
        } else {
            s.as_str()
                .split(delim.as_str())
                .map(|part| Value::str(intern(part)))
                .collect()
        };
        return Ok(Value::Obj(Obj::Array(ArrayObj::new(parts))));
    }
    Ok(Value::Nil)
}

fn native_join(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Array(arr)), Value::Obj(Obj::Str(delim))] = args {
        let elements = arr.elements.borrow();
        let parts: Vec<&str> = elements
            .iter()
            .filter_map(|element| element.as_str().map(|s| s.as_str()))
            .collect();
        return Ok(Value::str(intern(&parts.join(delim.as_str()))));
    }
    Ok(Value::Nil)
}

fn native_upper(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(s))] = args {
        return Ok(Value::str(intern(&s.as_str().to_uppercase())));
    }
    Ok(Value::Nil)
}

fn native_lower(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(s))] = args {
        return Ok(Value::str(intern(&s.as_str().to_lowercase())));
    }
    Ok(Value::Nil)
}

fn native_trim(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Str(s))] = args {
        return Ok(Value::str(intern(s.as_str().trim())));
    }
    Ok(Value::Nil)
}

//===----------------------------------------------------------------------===//
// Math
//===----------------------------------------------------------------------===//

fn native_abs(args: &[Value]) -> Result<Value, Error> {
    Ok(match args {
        [Value::Int(v)] => Value::Int(v.wrapping_abs()),
        [Value::Float(v)] => Value::Float(v.abs()),
        _ => Value::Nil,
    })
}

fn native_min(args: &[Value]) -> Result<Value, Error> {
    if args.len() < 2 {
        return Ok(Value::Nil);
    }
    let mut best = args[0].clone();
    for arg in &args[1..] {
        if let (Some(candidate), Some(current)) = (arg.as_number(), best.as_number()) {
            if candidate < current {
                best = arg.clone();
            }
        }
    }
    Ok(best)
}

fn native_max(args: &[Value]) -> Result<Value, Error> {
    if args.len() < 2 {
        return Ok(Value::Nil);
    }
    let mut best = args[0].clone();
    for arg in &args[1..] {
        if let (Some(candidate), Some(current)) = (arg.as_number(), best.as_number()) {
            if candidate > current {
                best = arg.clone();
            }
        }
    }
    Ok(best)
}

fn native_floor(args: &[Value]) -> Result<Value, Error> {
    Ok(match args {
        [Value::Int(_)] => args[0].clone(),
        [Value::Float(v)] => Value::Int(v.floor() as i64),
        _ => Value::Nil,
    })
}

fn native_ceil(args: &[Value]) -> Result<Value, Error> {
    Ok(match args {
        [Value::Int(_)] => args[0].clone(),
        [Value::Float(v)] => Value::Int(v.ceil() as i64),
        _ => Value::Nil,
    })
}

fn native_round(args: &[Value]) -> Result<Value, Error> {
    Ok(match args {
        [Value::Int(_)] => args[0].clone(),
        [Value::Float(v)] => Value::Int(v.round() as i64),
        _ => Value::Nil,
    })
}

fn native_sqrt(args: &[Value]) -> Result<Value, Error> {
    match args.first().and_then(|v| v.as_number()) {
        Some(v) if args.len() == 1 => Ok(Value::Float(v.sqrt())),
        _ => Ok(Value::Nil),
    }
}

fn native_pow(args: &[Value]) -> Result<Value, Error> {
    if let [a, b] = args {
        if let (Some(base), Some(exponent)) = (a.as_number(), b.as_number()) {
            return Ok(Value::Float(base.powf(exponent)));
        }
    }
    Ok(Value::Nil)
}

fn native_sin(args: &[Value]) -> Result<Value, Error> {
    match args.first().and_then(|v| v.as_number()) {
        Some(v) if args.len() == 1 => Ok(Value::Float(v.sin())),
        _ => Ok(Value::Nil),
    }
}

fn native_cos(args: &[Value]) -> Result<Value, Error> {
    match args.first().and_then(|v| v.as_number()) {
        Some(v) if args.len() == 1 => Ok(Value::Float(v.cos())),
        _ => Ok(Value::Nil),
    }
}

fn native_tan(args: &[Value]) -> Result<Value, Error> {
    match args.first().and_then(|v| v.as_number()) {
        Some(v) if args.len() == 1 => Ok(Value::Float(v.tan())),
        _ => Ok(Value::Nil),
    }
}

//===----------------------------------------------------------------------===//
// Tables
//===----------------------------------------------------------------------===//

fn native_keys(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Table(table))] = args {
        let keys: Vec<Value> =
            table.table.borrow().keys().into_iter().map(Value::str).collect();
        return Ok(Value::Obj(Obj::Array(ArrayObj::new(keys))));
    }
    Ok(Value::Nil)
}

fn native_values(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Table(table))] = args {
        let values = table.table.borrow().values();
        return Ok(Value::Obj(Obj::Array(ArrayObj::new(values))));
    }
    Ok(Value::Nil)
}

fn native_has(args: &[Value]) -> Result<Value, Error> {
    if let [Value::Obj(Obj::Table(table)), Value::Obj(Obj::Str(key))] = args {
        return Ok(Value::Bool(table.table.borrow().has(key)));
    }
    Ok(Value::Nil)
}

//===----------------------------------------------------------------------===//
// Utility
//===----------------------------------------------------------------------===//

fn native_assert(args: &[Value]) -> Result<Value, Error> {
    let Some(condition) = args.first() else { return Ok(Value::Nil) };
    if !condition.is_truthy() {
        match args.get(1).and_then(|v| v.as_str()) {
            Some(message) => eprintln!("Assertion failed: {}", message.as_str()),
            None => eprintln!("Assertion failed"),
        }
        process::exit(1);
    }
    Ok(Value::Nil)
}

fn native_error(args: &[Value]) -> Result<Value, Error> {
    match args.first().and_then(|v| v.as_str()) {
        Some(message) => eprintln!("Error: {}", message.as_str()),
        None => eprintln!("Error"),
    }
    process::exit(1);
}

fn native_clock(_args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Float(START_TIME.elapsed().as_secs_f64()))
}

fn native_exit(args: &[Value]) -> Result<Value, Error> {
    let code = match args.first() {
        Some(Value::Int(code)) => *code as i32,
        _ => 0,
    };
    process::exit(code);
}

/// Re-exported for `clock`: force the epoch to the first touch of the
/// runtime rather than the first call.
pub fn init_clock() {
    Lazy::force(&START_TIME);
}
