use std::fmt;
use std::rc::Rc;

use crate::class::Method;
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::object::ObjectRef;
use crate::value::Value;

/// Anything an expression can call.
pub trait Callable {
    fn name(&self) -> &str;

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value>;

    /// Calls the value as a component producer, returning the produced
    /// components and the namespace they export.
    fn enaml_call(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<(Vec<ObjectRef>, Rc<Namespace>)> {
        let _ = (args, kwargs);
        Err(Error::Type(format!("`{}` does not produce components", self.name())))
    }
}

type NativeFn = dyn Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value>;

/// A function implemented in Rust.
///
/// Closures may `?` any [`anyhow::Error`]; callers see it as
/// [`ErrorKind::Host`](crate::error::ErrorKind::Host).
pub struct NativeFunction {
    name: String,
    f: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value> + 'static,
    ) -> Self {
        Self { name: name.into(), f: Box::new(f) }
    }

    /// Wraps the function straight into a [`Value`].
    pub fn value(
        name: impl Into<String>,
        f: impl Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value> + 'static,
    ) -> Value {
        Value::function(NativeFunction::new(name, f))
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        (self.f)(args, kwargs)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

/// A class method bound to its receiver.
pub struct BoundMethod {
    object: ObjectRef,
    name: String,
    method: Method,
}

impl BoundMethod {
    pub fn new(object: ObjectRef, name: impl Into<String>, method: Method) -> Self {
        Self { object, name: name.into(), method }
    }
}

impl Callable for BoundMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        (self.method)(&self.object, args, kwargs)
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────

/// Checks that a builtin received exactly `n` positional arguments and no
/// keywords.
pub fn exact_args(name: &str, args: &[Value], kwargs: &[(String, Value)], n: usize) -> Result<()> {
    if let Some((key, _)) = kwargs.first() {
        return Err(Error::Type(format!("{name}() got an unexpected keyword argument `{key}`")));
    }
    if args.len() != n {
        let plural = if n == 1 { "" } else { "s" };
        return Err(Error::Type(format!(
            "{name}() takes exactly {n} argument{plural} ({} given)",
            args.len()
        )));
    }
    Ok(())
}

/// Checks a positional argument count within `min..=max`, no keywords.
pub fn arg_range(name: &str, args: &[Value], kwargs: &[(String, Value)], min: usize, max: usize) -> Result<()> {
    if let Some((key, _)) = kwargs.first() {
        return Err(Error::Type(format!("{name}() got an unexpected keyword argument `{key}`")));
    }
    if args.len() < min {
        return Err(Error::Type(format!("{name}() requires at least {min} arguments ({} given)", args.len())));
    }
    if args.len() > max {
        return Err(Error::Type(format!("{name}() takes at most {max} arguments ({} given)", args.len())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn native_function_is_callable_through_value() {
        let double = NativeFunction::value("double", |args, kwargs| {
            exact_args("double", &args, &kwargs, 1)?;
            Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
        });
        assert_eq!(double.call(vec![Value::Int(4)], vec![]).unwrap(), Value::Int(8));
        let err = double.call(vec![], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: double() takes exactly 1 argument (0 given)");
    }

    fn read_setting(key: &str) -> anyhow::Result<i64> {
        anyhow::bail!("no setting named `{key}`")
    }

    #[test]
    fn host_failures_pass_through_unchanged() {
        let setting = NativeFunction::value("setting", |args, kwargs| {
            exact_args("setting", &args, &kwargs, 1)?;
            Ok(Value::Int(read_setting(&args[0].to_string())?))
        });
        let err = setting.call(vec![Value::str("margin")], vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
        assert_eq!(err.to_string(), "no setting named `margin`");
    }

    #[test]
    fn native_function_cannot_produce_components() {
        let f = NativeFunction::value("f", |_, _| Ok(Value::None));
        assert!(f.enaml_call(vec![], vec![]).is_err());
    }

    #[test]
    fn arg_range_bounds() {
        assert!(arg_range("r", &[Value::None], &[], 1, 3).is_ok());
        assert!(arg_range("r", &[], &[], 1, 3).is_err());
        assert!(arg_range("r", &vec![Value::None; 4], &[], 1, 3).is_err());
    }
}
