//! Names every expression can see, plus methods on strings, lists and
//! dicts.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::Write;

use enaml_syntax::expr::BinOp;

use crate::callable::{arg_range, exact_args, NativeFunction};
use crate::error::{Error, Result};
use crate::eval::{binary_op, order};
use crate::value::{format_float, Value};

type Args = Vec<Value>;
type Kwargs = Vec<(String, Value)>;

/// Resolves a builtin name.
pub fn lookup(name: &str) -> Option<Value> {
    let f: fn(Args, Kwargs) -> Result<Value> = match name {
        "None" => return Some(Value::None),
        "True" => return Some(Value::Bool(true)),
        "False" => return Some(Value::Bool(false)),
        "len" => len,
        "str" => str_,
        "repr" => repr,
        "int" => int,
        "float" => float,
        "bool" => bool_,
        "abs" => abs,
        "min" => |a, k| extreme("min", a, k, Ordering::Less),
        "max" => |a, k| extreme("max", a, k, Ordering::Greater),
        "round" => round,
        "sum" => sum,
        "range" => range,
        "list" => |a, k| Ok(Value::list(iterable_arg("list", a, k)?)),
        "tuple" => |a, k| Ok(Value::tuple(iterable_arg("tuple", a, k)?)),
        "sorted" => sorted,
        "getattr" => getattr,
        "setattr" => setattr,
        "hasattr" => hasattr,
        "print" => print,
        _ => return None,
    };
    Some(NativeFunction::value(name, f))
}

/// Items of anything iterable: sequences, the characters of a string, the
/// keys of a dict.
pub fn iterate(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Dict(map) => Ok(map.keys().map(Value::str).collect()),
        other => Err(Error::Type(format!("'{}' object is not iterable", other.type_name()))),
    }
}

fn iterable_arg(name: &str, args: Args, kwargs: Kwargs) -> Result<Vec<Value>> {
    arg_range(name, &args, &kwargs, 0, 1)?;
    args.first().map_or(Ok(Vec::new()), iterate)
}

fn len(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("len", &args, &kwargs, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        Value::Dict(map) => map.len(),
        other => return Err(Error::Type(format!("object of type '{}' has no len()", other.type_name()))),
    };
    Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
}

fn str_(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("str", &args, &kwargs, 0, 1)?;
    Ok(args.first().map_or_else(|| Value::str(""), |v| Value::str(v.to_string())))
}

fn repr(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("repr", &args, &kwargs, 1)?;
    Ok(Value::str(args[0].repr()))
}

fn int(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("int", &args, &kwargs, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        Some(Value::Float(f)) if f.is_finite() && f.abs() < 9.2e18 => Ok(Value::Int(f.trunc() as i64)),
        Some(Value::Float(f)) => Err(Error::Value(format!("cannot convert float {} to integer", format_float(*f)))),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::Value(format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()))),
        Some(other) => Err(Error::Type(format!("int() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

fn float(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("float", &args, &kwargs, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::Value(format!("could not convert string to float: {}", Value::Str(s.clone()).repr()))),
        Some(v) => v
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| Error::Type(format!("float() argument must be a string or a number, not '{}'", v.type_name()))),
    }
}

fn bool_(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("bool", &args, &kwargs, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn abs(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("abs", &args, &kwargs, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        v => match v.as_int() {
            Some(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Error::Value("integer overflow in `abs`".into())),
            None => Err(Error::Type(format!("bad operand type for abs(): '{}'", v.type_name()))),
        },
    }
}

fn extreme(name: &str, args: Args, kwargs: Kwargs, wanted: Ordering) -> Result<Value> {
    arg_range(name, &args, &kwargs, 1, usize::MAX)?;
    let items = if args.len() == 1 { iterate(&args[0])? } else { args };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| Error::Value(format!("{name}() arg is an empty sequence")))?;
    for item in iter {
        if order(&item, &best)? == wanted {
            best = item;
        }
    }
    Ok(best)
}

fn round(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("round", &args, &kwargs, 1, 2)?;
    let x = args[0]
        .as_float()
        .ok_or_else(|| Error::Type(format!("type {} doesn't define __round__ method", args[0].type_name())))?;
    match args.get(1) {
        None => {
            if let Value::Int(i) = args[0] {
                return Ok(Value::Int(i));
            }
            let r = x.round_ties_even();
            if r.is_finite() && r.abs() < 9.2e18 {
                Ok(Value::Int(r as i64))
            } else {
                Err(Error::Value(format!("cannot convert float {} to integer", format_float(x))))
            }
        }
        Some(digits) => {
            let n = digits
                .as_int()
                .ok_or_else(|| Error::Type("round() ndigits must be an integer".into()))?;
            let scale = 10f64.powi(i32::try_from(n).unwrap_or(0));
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
    }
}

fn sum(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("sum", &args, &kwargs, 1, 2)?;
    let start = args.get(1).cloned().unwrap_or(Value::Int(0));
    iterate(&args[0])?.iter().try_fold(start, |acc, item| binary_op(BinOp::Add, &acc, item))
}

fn range(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("range", &args, &kwargs, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| a.as_int().ok_or_else(|| Error::Type(format!("range() integer argument expected, got {}", a.type_name()))))
        .collect::<Result<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(Error::Type(format!("range expected at most 3 arguments, got {}", ints.len()))),
    };
    if step == 0 {
        return Err(Error::Value("range() arg 3 must not be zero".into()));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::list(out))
}

fn sorted(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("sorted", &args, &kwargs, 1)?;
    let mut items = iterate(&args[0])?;
    let failure = RefCell::new(None);
    items.sort_by(|a, b| {
        order(a, b).unwrap_or_else(|e| {
            failure.borrow_mut().get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(Value::list(items)),
    }
}

fn getattr(args: Args, kwargs: Kwargs) -> Result<Value> {
    arg_range("getattr", &args, &kwargs, 2, 3)?;
    let name = args[1]
        .as_str()
        .ok_or_else(|| Error::Type("getattr(): attribute name must be string".into()))?;
    match (args[0].getattr(name), args.get(2)) {
        (Err(Error::Attribute(_)), Some(default)) => Ok(default.clone()),
        (result, _) => result,
    }
}

fn setattr(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("setattr", &args, &kwargs, 3)?;
    let name = args[1]
        .as_str()
        .ok_or_else(|| Error::Type("setattr(): attribute name must be string".into()))?;
    args[0].setattr(name, args[2].clone())?;
    Ok(Value::None)
}

fn hasattr(args: Args, kwargs: Kwargs) -> Result<Value> {
    exact_args("hasattr", &args, &kwargs, 2)?;
    let name = args[1]
        .as_str()
        .ok_or_else(|| Error::Type("hasattr(): attribute name must be string".into()))?;
    Ok(Value::Bool(args[0].getattr(name).is_ok()))
}

fn print(args: Args, kwargs: Kwargs) -> Result<Value> {
    let mut sep = " ".to_string();
    let mut end = "\n".to_string();
    for (key, value) in kwargs {
        match key.as_str() {
            "sep" => sep = value.to_string(),
            "end" => end = value.to_string(),
            _ => return Err(Error::Type(format!("print() got an unexpected keyword argument `{key}`"))),
        }
    }
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    print!("{}{end}", line.join(&sep));
    Ok(Value::None)
}

// ── Methods ───────────────────────────────────────────────────────────────

/// A method of a builtin value, bound to `receiver`.
pub fn method(receiver: &Value, name: &str) -> Option<Value> {
    let this = receiver.clone();
    let qualified = format!("{}.{name}", receiver.type_name());
    match (receiver, name) {
        (Value::Str(_), "upper" | "lower" | "strip" | "startswith" | "endswith" | "replace" | "split" | "join" | "format") => {
            let name = name.to_string();
            Some(NativeFunction::value(qualified, move |args, kwargs| str_method(&this, &name, args, kwargs)))
        }
        (Value::List(_) | Value::Tuple(_), "count" | "index") => {
            let name = name.to_string();
            Some(NativeFunction::value(qualified, move |args, kwargs| {
                exact_args(&name, &args, &kwargs, 1)?;
                let items = this.as_sequence().unwrap_or_default();
                if name == "count" {
                    let n = items.iter().filter(|v| **v == args[0]).count();
                    return Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)));
                }
                items
                    .iter()
                    .position(|v| *v == args[0])
                    .map(|i| Value::Int(i64::try_from(i).unwrap_or(i64::MAX)))
                    .ok_or_else(|| Error::Value(format!("{} is not in list", args[0].repr())))
            }))
        }
        (Value::Dict(_), "keys" | "values" | "items" | "get") => {
            let name = name.to_string();
            Some(NativeFunction::value(qualified, move |args, kwargs| dict_method(&this, &name, args, kwargs)))
        }
        _ => None,
    }
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::Type(format!("{method}() argument must be str, not {}", value.type_name())))
}

fn str_method(this: &Value, name: &str, args: Args, kwargs: Kwargs) -> Result<Value> {
    let s = this.as_str().unwrap_or_default();
    match name {
        "format" => return Ok(Value::str(brace_format(s, &args, &kwargs)?)),
        "upper" => {
            exact_args(name, &args, &kwargs, 0)?;
            return Ok(Value::str(s.to_uppercase()));
        }
        "lower" => {
            exact_args(name, &args, &kwargs, 0)?;
            return Ok(Value::str(s.to_lowercase()));
        }
        _ => {}
    }
    match name {
        "strip" => {
            arg_range(name, &args, &kwargs, 0, 1)?;
            match args.first() {
                Some(chars) => {
                    let chars = str_arg(name, chars)?;
                    Ok(Value::str(s.trim_matches(|c: char| chars.contains(c))))
                }
                None => Ok(Value::str(s.trim())),
            }
        }
        "startswith" | "endswith" => {
            exact_args(name, &args, &kwargs, 1)?;
            let affix = str_arg(name, &args[0])?;
            Ok(Value::Bool(if name == "startswith" { s.starts_with(affix) } else { s.ends_with(affix) }))
        }
        "replace" => {
            exact_args(name, &args, &kwargs, 2)?;
            Ok(Value::str(s.replace(str_arg(name, &args[0])?, str_arg(name, &args[1])?)))
        }
        "split" => {
            arg_range(name, &args, &kwargs, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                Some(Value::None) | None => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(Error::Value("empty separator".into()));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        _ => {
            exact_args(name, &args, &kwargs, 1)?;
            let pieces = iterate(&args[0])?
                .iter()
                .map(|v| str_arg(name, v).map(str::to_string))
                .collect::<Result<Vec<String>>>()?;
            Ok(Value::str(pieces.join(s)))
        }
    }
}

fn dict_method(this: &Value, name: &str, args: Args, kwargs: Kwargs) -> Result<Value> {
    let Value::Dict(map) = this else {
        return Err(Error::Type(format!("{name}() requires a dict")));
    };
    match name {
        "get" => {
            arg_range(name, &args, &kwargs, 1, 2)?;
            let found = args[0].as_str().and_then(|k| map.get(k)).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => {
            exact_args(name, &args, &kwargs, 0)?;
            Ok(Value::list(map.keys().map(Value::str)))
        }
        "values" => {
            exact_args(name, &args, &kwargs, 0)?;
            Ok(Value::list(map.values().cloned()))
        }
        _ => {
            exact_args(name, &args, &kwargs, 0)?;
            Ok(Value::list(map.iter().map(|(k, v)| Value::tuple([Value::str(k), v.clone()]))))
        }
    }
}

// ── Formatting ────────────────────────────────────────────────────────────

/// `str.format` with `{}`, `{0}`, `{name}` fields and an optional
/// `:.Nf` precision.
pub fn brace_format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> Result<String> {
    let mut out = String::new();
    let mut auto = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err(Error::Value("Single '{' encountered in format string".into())),
                    }
                }
                let (key, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let value = if key.is_empty() {
                    auto += 1;
                    args.get(auto - 1)
                        .ok_or_else(|| Error::Index(format!("Replacement index {} out of range", auto - 1)))?
                } else if let Ok(i) = key.parse::<usize>() {
                    args.get(i).ok_or_else(|| Error::Index(format!("Replacement index {i} out of range")))?
                } else {
                    kwargs
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v)
                        .ok_or_else(|| Error::Key(format!("'{key}'")))?
                };
                out.push_str(&format_spec(value, spec)?);
            }
            '}' => return Err(Error::Value("Single '}' encountered in format string".into())),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn format_spec(value: &Value, spec: &str) -> Result<String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let precision = spec
        .strip_prefix('.')
        .and_then(|s| s.strip_suffix('f'))
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(|| Error::Value(format!("unsupported format specifier '{spec}'")))?;
    let f = value
        .as_float()
        .ok_or_else(|| Error::Value(format!("Unknown format code 'f' for object of type '{}'", value.type_name())))?;
    Ok(format!("{f:.precision$}"))
}

/// The host language's `template % args`.
///
/// Supports `%s %r %d %i %f %x %%` with `-`/`0` flags, a width and a
/// precision. A tuple supplies one value per directive; anything else is
/// a single value.
pub fn percent_format(template: &str, args: &Value) -> Result<String> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut next = values.iter();
    let mut out = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut left = false;
        let mut zero = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '0' => zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            precision = Some(p);
        }
        let conv = chars
            .next()
            .ok_or_else(|| Error::Value("incomplete format".into()))?;
        if conv == '%' {
            out.push('%');
            continue;
        }
        let value = next
            .next()
            .ok_or_else(|| Error::Type("not enough arguments for format string".into()))?;
        let body = match conv {
            's' => value.to_string(),
            'r' => value.repr(),
            'd' | 'i' => match value {
                Value::Float(f) => format!("{}", f.trunc() as i64),
                v => v
                    .as_int()
                    .map(|i| i.to_string())
                    .ok_or_else(|| Error::Type(format!("%{conv} format: a number is required, not {}", v.type_name())))?,
            },
            'x' => value
                .as_int()
                .map(|i| format!("{i:x}"))
                .ok_or_else(|| Error::Type(format!("%x format: an integer is required, not {}", value.type_name())))?,
            'f' | 'F' => {
                let f = value
                    .as_float()
                    .ok_or_else(|| Error::Type(format!("float argument required, not {}", value.type_name())))?;
                format!("{f:.prec$}", prec = precision.unwrap_or(6))
            }
            other => return Err(Error::Value(format!("unsupported format character '{other}'"))),
        };
        let body = match (conv, precision) {
            ('s' | 'r', Some(p)) => body.chars().take(p).collect(),
            _ => body,
        };
        let pad = width.saturating_sub(body.chars().count());
        if left {
            let _ = write!(out, "{body}{}", " ".repeat(pad));
        } else if zero && matches!(conv, 'd' | 'i' | 'f' | 'F' | 'x') {
            match body.strip_prefix('-') {
                Some(digits) => {
                    let _ = write!(out, "-{}{digits}", "0".repeat(pad));
                }
                None => {
                    let _ = write!(out, "{}{body}", "0".repeat(pad));
                }
            }
        } else {
            let _ = write!(out, "{}{body}", " ".repeat(pad));
        }
    }

    if next.next().is_some() {
        return Err(Error::Type("not all arguments converted during string formatting".into()));
    }
    Ok(out)
}
