//! Dynamically typed values flowing through expressions and attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::builtins;
use crate::callable::Callable;
use crate::class::ClassDef;
use crate::code::CompiledExpr;
use crate::error::{Error, Result};
use crate::module::Module;
use crate::namespace::Namespace;
use crate::object::{ChangeEvent, ObjectRef};

/// A runtime value.
///
/// Containers are immutable and cheap to clone: producing a modified list
/// means building a new one. Numbers compare across `Bool`, `Int` and
/// `Float` the way the host language does (`True == 1 == 1.0`).
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Tuple(Rc<[Value]>),
    Dict(Rc<BTreeMap<String, Value>>),
    Object(ObjectRef),
    Function(Rc<dyn Callable>),
    Class(Rc<ClassDef>),
    /// The `msg` handed to `>>` notifiers.
    Message(Rc<ChangeEvent>),
    Module(Rc<Module>),
    Namespace(Rc<Namespace>),
    Code(Rc<CompiledExpr>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn function(f: impl Callable + 'static) -> Value {
        Value::Function(Rc::new(f))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Object(obj) => obj.type_name(),
            Value::Function(_) => "function",
            Value::Class(_) => "type",
            Value::Message(_) => "message",
            Value::Module(_) => "module",
            Value::Namespace(_) => "namespace",
            Value::Code(_) => "code",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            _ => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The items of a list or tuple.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Attribute access on any value.
    pub fn getattr(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.get(name),
            Value::Module(module) => module.get(name).ok_or_else(|| {
                Error::Attribute(format!("'module' object `{}` has no attribute `{name}`", module.name()))
            }),
            Value::Namespace(ns) => ns
                .get(name)
                .ok_or_else(|| Error::Attribute(format!("namespace has no attribute `{name}`"))),
            Value::Message(msg) => match name {
                "obj" => Ok(Value::Object(msg.object.clone())),
                "name" => Ok(Value::str(&msg.name)),
                "old" => Ok(msg.old.clone()),
                "new" => Ok(msg.new.clone()),
                _ => Err(self.no_attribute(name)),
            },
            Value::Str(_) | Value::List(_) | Value::Tuple(_) | Value::Dict(_) => {
                builtins::method(self, name).ok_or_else(|| self.no_attribute(name))
            }
            _ => Err(self.no_attribute(name)),
        }
    }

    /// Attribute assignment; only objects accept it.
    pub fn setattr(&self, name: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => obj.set(name, value),
            _ => Err(self.no_attribute(name)),
        }
    }

    fn no_attribute(&self, name: &str) -> Error {
        Error::Attribute(format!("'{}' object has no attribute `{name}`", self.type_name()))
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        match self {
            Value::Function(f) => f.call(args, kwargs),
            Value::Class(class) => Ok(Value::Object(class.call(args, kwargs)?)),
            _ => Err(Error::Type(format!("'{}' object is not callable", self.type_name()))),
        }
    }

    /// Calls the value as a component producer: a class yields one fresh
    /// instance, an enaml definition yields its components and the
    /// namespace it exported.
    pub fn enaml_call(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<(Vec<ObjectRef>, Rc<Namespace>)> {
        match self {
            Value::Function(f) => f.enaml_call(args, kwargs),
            Value::Class(class) => Ok((vec![class.call(args, kwargs)?], Rc::new(Namespace::new()))),
            _ => Err(Error::Type(format!("'{}' object is not callable", self.type_name()))),
        }
    }

    /// The host-language `repr()` of the value.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote(s),
            Value::List(items) => format!("[{}]", join_repr(items)),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join_repr(items)),
            Value::Dict(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", quote(k), v.repr())).collect();
                format!("{{{}}}", pairs.join(", "))
            }
            Value::Object(obj) => match obj.identifier() {
                Some(id) => format!("<{} object '{id}'>", obj.type_name()),
                None => format!("<{} object>", obj.type_name()),
            },
            Value::Function(f) => format!("<function {}>", f.name()),
            Value::Class(class) => format!("<class '{}'>", class.name()),
            Value::Message(msg) => format!("<message `{}` of {} object>", msg.name, msg.object.type_name()),
            Value::Module(module) => format!("<module '{}'>", module.name()),
            Value::Namespace(_) => "<namespace>".into(),
            Value::Code(code) => format!("<code at line {}>", code.line()),
        }
    }

    /// Identity in the `is` sense.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => false,
        }
    }
}

/// Formats a float the way the host language prints it: integral values
/// keep a trailing `.0`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".into()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".into() } else { "-inf".into() }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Value {
    /// The host-language `str()`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (a, b) if is_number(a) && is_number(b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            (Value::Message(a), Value::Message(b)) => Rc::ptr_eq(a, b),
            (Value::Code(a), Value::Code(b)) => Rc::ptr_eq(a, b),
            (a, b) => a.is(b),
        }
    }
}

fn is_number(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(2), Value::str("2"));
    }

    #[test]
    fn lists_and_tuples_are_distinct() {
        assert_ne!(Value::list([Value::Int(1)]), Value::tuple([Value::Int(1)]));
        assert_eq!(Value::list([Value::Int(1)]), Value::list([Value::Float(1.0)]));
    }

    #[test]
    fn str_and_repr() {
        assert_eq!(Value::str("hi").to_string(), "hi");
        assert_eq!(Value::str("it's").repr(), "'it\\'s'");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::tuple([Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::list([Value::None, Value::Bool(true)]).repr(), "[None, True]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::list([Value::None]).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }

    #[test]
    fn calling_a_number_is_a_type_error() {
        let err = Value::Int(3).call(vec![], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'int' object is not callable");
    }

    #[test]
    fn numbers_have_no_attributes() {
        let err = Value::Int(3).getattr("real").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Attribute);
    }
}
