//! Binding operators: what runs when `attr <op> expr` is applied to an
//! object.

use std::fmt;
use std::rc::Rc;

use enaml_syntax::operator::translate_operator;
use enaml_syntax::BindingKind;

use crate::binding::BindingFactory;
use crate::callable::Callable;
use crate::code::CompiledExpr;
use crate::error::{Error, Result};
use crate::namespace::{Namespace, Scope};
use crate::object::ObjectRef;
use crate::toolkit::Toolkit;
use crate::value::Value;

/// Everything an operator receives.
pub struct OperatorCall<'a> {
    pub object: &'a ObjectRef,
    pub attr: &'a str,
    pub code: &'a Rc<CompiledExpr>,
    pub scope: &'a Scope,
}

pub type OperatorFn = dyn Fn(&OperatorCall<'_>) -> Result<()>;

/// An operator implementation.
#[derive(Clone)]
pub enum Operator {
    /// One of the four standard binding kinds.
    Binding(BindingKind),
    Custom(Rc<OperatorFn>),
}

impl Operator {
    pub fn custom(f: impl Fn(&OperatorCall<'_>) -> Result<()> + 'static) -> Self {
        Operator::Custom(Rc::new(f))
    }

    /// Wraps an expression-level callable. It is called with
    /// `(object, attr, code, globals, locals)`.
    pub fn from_value(value: Value) -> Self {
        Operator::custom(move |call| {
            value
                .call(
                    vec![
                        Value::Object(call.object.clone()),
                        Value::str(call.attr),
                        Value::Code(Rc::clone(call.code)),
                        Value::Namespace(Rc::clone(&call.scope.globals)),
                        Value::Namespace(Rc::clone(&call.scope.locals)),
                    ],
                    vec![],
                )
                .map(|_| ())
        })
    }

    pub fn binding_kind(&self) -> Option<BindingKind> {
        match self {
            Operator::Binding(kind) => Some(*kind),
            Operator::Custom(_) => None,
        }
    }

    pub fn apply(&self, call: &OperatorCall<'_>) -> Result<()> {
        match self {
            Operator::Binding(kind) => {
                BindingFactory::new(*kind, Rc::clone(call.code)).bind(call.object, call.attr, call.scope.clone())
            }
            Operator::Custom(f) => f(call),
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Binding(kind) => write!(f, "Binding({kind})"),
            Operator::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// `=`, `<<`, `:=` and `>>` under their translated names.
pub fn standard_operators() -> Vec<(String, Operator)> {
    BindingKind::all()
        .into_iter()
        .filter_map(|kind| translate_operator(kind.symbol()).map(|name| (name, Operator::Binding(kind))))
        .collect()
}

// ── Callable form ─────────────────────────────────────────────────────────

/// An operator exposed to expressions and the construction VM.
pub struct OperatorFunction {
    name: String,
    operator: Operator,
    toolkit: Rc<dyn Toolkit>,
}

impl OperatorFunction {
    pub fn new(name: impl Into<String>, operator: Operator, toolkit: Rc<dyn Toolkit>) -> Self {
        Self { name: name.into(), operator, toolkit }
    }
}

impl Callable for OperatorFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        crate::callable::exact_args(&self.name, &args, &kwargs, 5)?;
        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(Value::None);
        let (object, attr, code, globals, locals) = (next(), next(), next(), next(), next());
        let bad = |what: &str, got: &Value| {
            Error::Type(format!("{}() expects {what}, got {}", self.name, got.type_name()))
        };
        let object = object.as_object().cloned().ok_or_else(|| bad("an object", &object))?;
        let attr = attr.as_str().map(str::to_string).ok_or_else(|| bad("an attribute name", &attr))?;
        let Value::Code(code) = code else {
            return Err(bad("compiled code", &code));
        };
        let globals = namespace(globals).map_err(|v| bad("a globals namespace", &v))?;
        let locals = namespace(locals).map_err(|v| bad("a locals namespace", &v))?;
        let scope = Scope::new(globals, locals, Rc::clone(&self.toolkit));
        self.operator.apply(&OperatorCall { object: &object, attr: &attr, code: &code, scope: &scope })?;
        Ok(Value::None)
    }
}

fn namespace(value: Value) -> std::result::Result<Rc<Namespace>, Value> {
    match value {
        Value::Namespace(ns) => Ok(ns),
        other => Err(other),
    }
}
