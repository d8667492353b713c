//! Tree-walking evaluator for the expression language.
//!
//! Semantics follow the host language closely: `and`/`or` return an
//! operand, comparisons chain, `//` and `%` floor toward negative
//! infinity and `/` is true division.

use std::cmp::Ordering;
use std::rc::Rc;

use enaml_syntax::expr::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};

use crate::builtins;
use crate::callable::Callable;
use crate::error::{Error, Result};
use crate::namespace::Scope;
use crate::value::Value;

pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value> {
    match &expr.kind {
        ExprKind::Name(name) => scope.resolve(name),
        ExprKind::Int(i) => Ok(Value::Int(*i)),
        ExprKind::Float(f) => Ok(Value::Float(*f)),
        ExprKind::Str(s) => Ok(Value::str(s)),
        ExprKind::Attribute { value, attr } => evaluate(value, scope)?.getattr(attr),
        ExprKind::Subscript { value, index } => {
            let value = evaluate(value, scope)?;
            let index = evaluate(index, scope)?;
            subscript(&value, &index)
        }
        ExprKind::Call { func, args, keywords } => {
            let func = evaluate(func, scope)?;
            let args = args.iter().map(|a| evaluate(a, scope)).collect::<Result<Vec<_>>>()?;
            let kwargs = keywords
                .iter()
                .map(|(k, v)| Ok((k.clone(), evaluate(v, scope)?)))
                .collect::<Result<Vec<_>>>()?;
            func.call(args, kwargs)
        }
        ExprKind::Unary { op, operand } => unary_op(*op, &evaluate(operand, scope)?),
        ExprKind::Binary { left, op, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            binary_op(*op, &left, &right)
        }
        ExprKind::Compare { left, ops, comparators } => {
            let mut left = evaluate(left, scope)?;
            for (op, comparator) in ops.iter().zip(comparators) {
                let right = evaluate(comparator, scope)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        ExprKind::BoolOp { op, values } => {
            let mut last = Value::None;
            for value in values {
                last = evaluate(value, scope)?;
                let short_circuit = match op {
                    BoolOp::And => !last.is_truthy(),
                    BoolOp::Or => last.is_truthy(),
                };
                if short_circuit {
                    break;
                }
            }
            Ok(last)
        }
        ExprKind::IfExp { test, body, orelse } => {
            if evaluate(test, scope)?.is_truthy() {
                evaluate(body, scope)
            } else {
                evaluate(orelse, scope)
            }
        }
        ExprKind::List(items) => Ok(Value::List(evaluate_all(items, scope)?.into())),
        ExprKind::Tuple(items) => Ok(Value::Tuple(evaluate_all(items, scope)?.into())),
        ExprKind::Dict(pairs) => {
            let mut map = std::collections::BTreeMap::new();
            for (key, value) in pairs {
                let key = match evaluate(key, scope)? {
                    Value::Str(s) => s.to_string(),
                    other => return Err(Error::Type(format!("dict keys must be strings, not {}", other.type_name()))),
                };
                map.insert(key, evaluate(value, scope)?);
            }
            Ok(Value::Dict(Rc::new(map)))
        }
        ExprKind::Lambda { params, body } => Ok(Value::function(Closure {
            params: params.clone(),
            body: (**body).clone(),
            scope: scope.clone(),
        })),
    }
}

fn evaluate_all(items: &[Expr], scope: &Scope) -> Result<Vec<Value>> {
    items.iter().map(|item| evaluate(item, scope)).collect()
}

// ── Closures ──────────────────────────────────────────────────────────────

/// A `lambda` together with the scope it was created in.
pub struct Closure {
    params: Vec<String>,
    body: Expr,
    scope: Scope,
}

impl Callable for Closure {
    fn name(&self) -> &str {
        "<lambda>"
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        let given = args.len() + kwargs.len();
        if given != self.params.len() {
            return Err(Error::Type(format!(
                "<lambda>() takes exactly {} arguments ({given} given)",
                self.params.len()
            )));
        }
        let mut bindings: Vec<(String, Value)> = self.params.iter().cloned().zip(args).collect();
        for (name, value) in kwargs {
            if !self.params.contains(&name) {
                return Err(Error::Type(format!("<lambda>() got an unexpected keyword argument `{name}`")));
            }
            if bindings.iter().any(|(n, _)| *n == name) {
                return Err(Error::Type(format!("<lambda>() got multiple values for keyword `{name}`")));
            }
            bindings.push((name, value));
        }
        evaluate(&self.body, &self.scope.with_locals(bindings))
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::I(*i)),
        Value::Bool(b) => Some(Num::I(i64::from(*b))),
        Value::Float(f) => Some(Num::F(*f)),
        _ => None,
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(f) => f,
    }
}

fn unsupported(op: &str, l: &Value, r: &Value) -> Error {
    Error::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        l.type_name(),
        r.type_name()
    ))
}

fn overflow(op: BinOp) -> Error {
    Error::Value(format!("integer overflow in `{}`", op.symbol()))
}

pub fn unary_op(op: UnaryOp, v: &Value) -> Result<Value> {
    let bad = || {
        let sym = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        };
        Error::Type(format!("bad operand type for unary {sym}: '{}'", v.type_name()))
    };
    match (op, num(v)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Some(Num::I(i))) => i.checked_neg().map(Value::Int).ok_or_else(|| overflow(BinOp::Sub)),
        (UnaryOp::Neg, Some(Num::F(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::I(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::F(f))) => Ok(Value::Float(f)),
        (UnaryOp::Invert, Some(Num::I(i))) => Ok(Value::Int(!i)),
        _ => Err(bad()),
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
}

fn repeat(items: &[Value], n: i64) -> Vec<Value> {
    let n = usize::try_from(n).unwrap_or(0);
    items.iter().cloned().cycle().take(items.len() * n).collect()
}

pub fn binary_op(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    let sym = op.symbol();
    match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => return Ok(Value::list(a.iter().chain(b.iter()).cloned())),
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => return Ok(Value::tuple(a.iter().chain(b.iter()).cloned())),
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = usize::try_from(n.as_int().unwrap_or(0)).unwrap_or(0);
            return Ok(Value::str(s.repeat(count)));
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items)) if n.as_int().is_some() => {
            return Ok(Value::list(repeat(items, n.as_int().unwrap_or(0))));
        }
        (BinOp::Mod, Value::Str(template), args) => {
            return Ok(Value::str(builtins::percent_format(template, args)?));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (num(l), num(r)) else {
        return Err(unsupported(sym, l, r));
    };

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul => match (a, b) {
            (Num::I(x), Num::I(y)) => {
                let out = match op {
                    BinOp::Add => x.checked_add(y),
                    BinOp::Sub => x.checked_sub(y),
                    _ => x.checked_mul(y),
                };
                out.map(Value::Int).ok_or_else(|| overflow(op))
            }
            _ => {
                let (x, y) = (to_f64(a), to_f64(b));
                Ok(Value::Float(match op {
                    BinOp::Add => x + y,
                    BinOp::Sub => x - y,
                    _ => x * y,
                }))
            }
        },
        BinOp::Div => {
            let y = to_f64(b);
            if y == 0.0 {
                return Err(Error::ZeroDivision("division by zero".into()));
            }
            Ok(Value::Float(to_f64(a) / y))
        }
        BinOp::FloorDiv | BinOp::Mod => match (a, b) {
            (Num::I(_), Num::I(0)) => Err(Error::ZeroDivision("integer division or modulo by zero".into())),
            (Num::I(x), Num::I(y)) if op == BinOp::FloorDiv => {
                if x == i64::MIN && y == -1 { Err(overflow(op)) } else { Ok(Value::Int(floor_div(x, y))) }
            }
            (Num::I(x), Num::I(y)) => Ok(Value::Int(if y == -1 { 0 } else { floor_mod(x, y) })),
            _ => {
                let (x, y) = (to_f64(a), to_f64(b));
                if y == 0.0 {
                    return Err(Error::ZeroDivision("float division by zero".into()));
                }
                Ok(Value::Float(if op == BinOp::FloorDiv { (x / y).floor() } else { float_mod(x, y) }))
            }
        },
        BinOp::Pow => match (a, b) {
            (Num::I(x), Num::I(y)) if y >= 0 => {
                let exp = u32::try_from(y).map_err(|_| overflow(op))?;
                x.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow(op))
            }
            _ => Ok(Value::Float(to_f64(a).powf(to_f64(b)))),
        },
        BinOp::LShift | BinOp::RShift | BinOp::BitAnd | BinOp::BitXor | BinOp::BitOr => {
            let (Num::I(x), Num::I(y)) = (a, b) else {
                return Err(unsupported(sym, l, r));
            };
            if let (Value::Bool(p), Value::Bool(q)) = (l, r) {
                match op {
                    BinOp::BitAnd => return Ok(Value::Bool(p & q)),
                    BinOp::BitOr => return Ok(Value::Bool(p | q)),
                    BinOp::BitXor => return Ok(Value::Bool(p ^ q)),
                    _ => {}
                }
            }
            match op {
                BinOp::BitAnd => Ok(Value::Int(x & y)),
                BinOp::BitOr => Ok(Value::Int(x | y)),
                BinOp::BitXor => Ok(Value::Int(x ^ y)),
                _ if y < 0 => Err(Error::Value("negative shift count".into())),
                BinOp::LShift => {
                    let shifted = u32::try_from(y).ok().and_then(|s| x.checked_shl(s));
                    match shifted {
                        Some(v) if v >> y == x => Ok(Value::Int(v)),
                        _ => Err(overflow(op)),
                    }
                }
                _ => Ok(Value::Int(if y >= 64 { if x < 0 { -1 } else { 0 } } else { x >> y })),
            }
        }
    }
}

/// Orders two values for `<`-style comparisons and sorting.
pub fn order(l: &Value, r: &Value) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (num(l), num(r)) {
        return match (a, b) {
            (Num::I(x), Num::I(y)) => Ok(x.cmp(&y)),
            _ => to_f64(a)
                .partial_cmp(&to_f64(b))
                .ok_or_else(|| Error::Value("cannot order NaN".into())),
        };
    }
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match order(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(Error::Type(format!(
            "'<' not supported between instances of '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))),
    }
}

pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(&**needle)),
            other => Err(Error::Type(format!("'in <string>' requires string as left operand, not {}", other.type_name()))),
        },
        Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Dict(map) => Ok(item.as_str().is_some_and(|k| map.contains_key(k))),
        other => Err(Error::Type(format!("argument of type '{}' is not iterable", other.type_name()))),
    }
}

pub fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool> {
    Ok(match op {
        CmpOp::Eq => l == r,
        CmpOp::NotEq => l != r,
        CmpOp::Lt => order(l, r)? == Ordering::Less,
        CmpOp::LtE => order(l, r)? != Ordering::Greater,
        CmpOp::Gt => order(l, r)? == Ordering::Greater,
        CmpOp::GtE => order(l, r)? != Ordering::Less,
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
        CmpOp::Is => l.is(r),
        CmpOp::IsNot => !l.is(r),
    })
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) { usize::try_from(i).ok() } else { None }
}

pub fn subscript(value: &Value, index: &Value) -> Result<Value> {
    match value {
        Value::List(items) | Value::Tuple(items) => {
            let kind = value.type_name();
            let i = index
                .as_int()
                .ok_or_else(|| Error::Type(format!("{kind} indices must be integers, not {}", index.type_name())))?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| Error::Index(format!("{kind} index out of range")))
        }
        Value::Str(s) => {
            let i = index
                .as_int()
                .ok_or_else(|| Error::Type(format!("string indices must be integers, not {}", index.type_name())))?;
            let chars: Vec<char> = s.chars().collect();
            normalize_index(i, chars.len())
                .map(|i| Value::str(chars[i].to_string()))
                .ok_or_else(|| Error::Index("string index out of range".into()))
        }
        Value::Dict(map) => index
            .as_str()
            .and_then(|k| map.get(k).cloned())
            .ok_or_else(|| Error::Key(index.repr())),
        Value::Namespace(ns) => index
            .as_str()
            .and_then(|k| ns.get(k))
            .ok_or_else(|| Error::Key(index.repr())),
        other => Err(Error::Type(format!("'{}' object is not subscriptable", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassDef;
    use crate::namespace::Namespace;
    use crate::toolkit::{Toolkit, ToolkitRegistry};
    use crate::ErrorKind;
    use enaml_syntax::parse_expr;
    use pretty_assertions::assert_eq;

    fn scope() -> Scope {
        let toolkit: Rc<dyn Toolkit> = Rc::new(ToolkitRegistry::builder("test").build());
        let globals = Rc::new(Namespace::new());
        let model = ClassDef::model("Model").instantiate();
        model.set("count", Value::Int(5)).unwrap();
        model.set("name", Value::str("ada")).unwrap();
        globals.insert("model", Value::Object(model));
        globals.insert("items", Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]));
        Scope::module(globals, toolkit)
    }

    fn eval(src: &str) -> Value {
        evaluate(&parse_expr(src).unwrap(), &scope()).unwrap()
    }

    fn eval_err(src: &str) -> Error {
        evaluate(&parse_expr(src).unwrap(), &scope()).unwrap_err()
    }

    // ── arithmetic ────────────────────────────────────────────────────────

    #[test]
    fn precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval("-2 ** 2"), Value::Int(-4));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
    }

    #[test]
    fn division_and_modulo_floor() {
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("-7 // 2"), Value::Int(-4));
        assert_eq!(eval("7 // -2"), Value::Int(-4));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("7.5 // 2"), Value::Float(3.0));
        assert_eq!(eval_err("1 / 0").kind(), ErrorKind::ZeroDivision);
        assert_eq!(eval_err("1 % 0").kind(), ErrorKind::ZeroDivision);
    }

    #[test]
    fn mixed_numbers_promote() {
        assert_eq!(eval("1 + 2.5"), Value::Float(3.5));
        assert_eq!(eval("True + 1"), Value::Int(2));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
    }

    #[test]
    fn bit_ops_and_shifts() {
        assert_eq!(eval("6 & 3 | 8 ^ 1"), Value::Int(11));
        assert_eq!(eval("1 << 4"), Value::Int(16));
        assert_eq!(eval("-16 >> 2"), Value::Int(-4));
        assert_eq!(eval("~5"), Value::Int(-6));
        assert_eq!(eval_err("1 << -1").kind(), ErrorKind::Value);
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        assert_eq!(eval_err("9223372036854775807 + 1").kind(), ErrorKind::Value);
        assert_eq!(eval_err("2 ** 64").kind(), ErrorKind::Value);
    }

    #[test]
    fn sequences() {
        assert_eq!(eval("'ab' + 'c'"), Value::str("abc"));
        assert_eq!(eval("'ab' * 2"), Value::str("abab"));
        assert_eq!(eval("[1] + [2]"), Value::list([Value::Int(1), Value::Int(2)]));
        assert_eq!(eval("[0] * 3"), Value::list([Value::Int(0), Value::Int(0), Value::Int(0)]));
        assert_eq!(eval_err("'a' + 1").to_string(), "TypeError: unsupported operand type(s) for +: 'str' and 'int'");
    }

    // ── logic and comparison ──────────────────────────────────────────────

    #[test]
    fn boolean_operators_return_operands() {
        assert_eq!(eval("0 or 'x'"), Value::str("x"));
        assert_eq!(eval("1 and 0"), Value::Int(0));
        assert_eq!(eval("not []"), Value::Bool(true));
        // short circuit: the undefined name is never evaluated
        assert_eq!(eval("True or undefined_name"), Value::Bool(true));
    }

    #[test]
    fn chained_comparisons() {
        assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval("1 < 3 < 2"), Value::Bool(false));
        assert_eq!(eval("2 in items"), Value::Bool(true));
        assert_eq!(eval("4 not in items"), Value::Bool(true));
        assert_eq!(eval("'d' in 'ada'"), Value::Bool(true));
        assert_eq!(eval("None is None"), Value::Bool(true));
        assert_eq!(eval("model is not None"), Value::Bool(true));
        assert_eq!(eval_err("1 < 'a'").kind(), ErrorKind::Type);
    }

    #[test]
    fn conditional_expression() {
        assert_eq!(eval("'big' if model.count > 3 else 'small'"), Value::str("big"));
    }

    // ── access ────────────────────────────────────────────────────────────

    #[test]
    fn attribute_subscript_and_call() {
        assert_eq!(eval("model.count * 2"), Value::Int(10));
        assert_eq!(eval("items[-1]"), Value::Int(3));
        assert_eq!(eval("{'a': 1}['a']"), Value::Int(1));
        assert_eq!(eval("len(items)"), Value::Int(3));
        assert_eq!(eval_err("items[5]").to_string(), "IndexError: list index out of range");
        assert_eq!(eval_err("{'a': 1}['b']").to_string(), "KeyError: 'b'");
    }

    #[test]
    fn undefined_name() {
        assert_eq!(eval_err("nope + 1").to_string(), "NameError: name `nope` is not defined");
    }

    #[test]
    fn lambda_captures_scope() {
        assert_eq!(eval("(lambda x, y: x * y + model.count)(2, 3)"), Value::Int(11));
        assert_eq!(eval("(lambda: 42)()"), Value::Int(42));
        assert_eq!(eval_err("(lambda x: x)()").kind(), ErrorKind::Type);
    }

    #[test]
    fn displays() {
        assert_eq!(eval("(1,)"), Value::tuple([Value::Int(1)]));
        assert_eq!(eval("()"), Value::tuple([]));
        assert_eq!(eval_err("{1: 2}").kind(), ErrorKind::Type);
    }

    #[test]
    fn string_formatting_operator() {
        assert_eq!(eval("'%s has %d' % (model.name, model.count)"), Value::str("ada has 5"));
        assert_eq!(eval("'%.2f' % 2"), Value::str("2.00"));
    }
}
