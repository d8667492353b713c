use std::fmt;
use std::rc::Rc;

use crate::value::Value;

pub type ValidateFn = dyn Fn(Value) -> Result<Value, String>;

/// Coercion hook run on every write to an attribute.
///
/// On failure the returned message describes what was expected; the
/// object turns it into an [`Error::Validation`](crate::Error::Validation)
/// naming the attribute.
#[derive(Clone)]
pub enum Validator {
    Any,
    Bool,
    Int,
    /// Accepts ints and floats, storing a float.
    Float,
    Str,
    /// An inclusive integer range. Out-of-range values are clamped when
    /// `clamp` is set and rejected otherwise.
    Range { low: i64, high: i64, clamp: bool },
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// A list; tuples are converted.
    List,
    /// `None` or an object whose class is or inherits the named class.
    Instance(String),
    Custom(Rc<ValidateFn>),
}

impl Validator {
    pub fn custom(f: impl Fn(Value) -> Result<Value, String> + 'static) -> Self {
        Validator::Custom(Rc::new(f))
    }

    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::Enum(choices.into_iter().map(Into::into).collect())
    }

    pub fn validate(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (Validator::Any, v) => Ok(v),
            (Validator::Bool, v @ Value::Bool(_)) => Ok(v),
            (Validator::Int, v @ Value::Int(_)) => Ok(v),
            (Validator::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Validator::Float, v @ Value::Float(_)) => Ok(v),
            (Validator::Str, v @ Value::Str(_)) => Ok(v),
            (Validator::Range { low, high, clamp }, Value::Int(i)) => {
                if (*low..=*high).contains(&i) {
                    Ok(Value::Int(i))
                } else if *clamp {
                    Ok(Value::Int(i.clamp(*low, *high)))
                } else {
                    Err(format!("must be in the range [{low}, {high}], got {i}"))
                }
            }
            (Validator::Enum(choices), Value::Str(s)) if choices.iter().any(|c| **c == *s) => Ok(Value::Str(s)),
            (Validator::List, v @ Value::List(_)) => Ok(v),
            (Validator::List, Value::Tuple(items)) => Ok(Value::List(items)),
            (Validator::Instance(_), Value::None) => Ok(Value::None),
            (Validator::Instance(class), Value::Object(obj)) if obj.class().is_a(class) => Ok(Value::Object(obj)),
            (Validator::Custom(f), v) => f(v),
            (validator, v) => Err(format!("must be {validator}, but a value of {} <{}> was specified", v.repr(), v.type_name())),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Any => f.write_str("any value"),
            Validator::Bool => f.write_str("a bool"),
            Validator::Int => f.write_str("an int"),
            Validator::Float => f.write_str("a float"),
            Validator::Str => f.write_str("a string"),
            Validator::Range { low, high, .. } => write!(f, "an int in the range [{low}, {high}]"),
            Validator::Enum(choices) => write!(f, "one of {}", choices.join(", ")),
            Validator::List => f.write_str("a list"),
            Validator::Instance(class) => write!(f, "a {class} instance or None"),
            Validator::Custom(_) => f.write_str("a custom-validated value"),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({self})")
    }
}
