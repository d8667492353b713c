use std::rc::Rc;

use enaml_runtime::callable::exact_args;
use enaml_runtime::{ClassDef, Role, Validator, Value};

/// A single-line text input.
///
/// `value` holds whatever the field edits; `text` is its display form.
pub fn field(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Field", Role::Element)
        .extends(base)
        .attr("value", Validator::Any, Value::None)
        .property("text", |obj| {
            Ok(match obj.get("value")? {
                Value::None => Value::str(""),
                other => Value::str(other.to_string()),
            })
        })
        .attr("placeholder", Validator::Str, Value::str(""))
        .attr("read_only", Validator::Bool, Value::Bool(false))
        .attr("max_length", Validator::Range { low: 0, high: 32_767, clamp: true }, Value::Int(32_767))
        .event("return_pressed", Validator::Any)
        .method("clear", |obj, args, kwargs| {
            exact_args("clear", &args, &kwargs, 0)?;
            obj.set("value", Value::None)?;
            Ok(Value::None)
        })
        .finish()
}

pub fn label(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Label", Role::Element)
        .extends(base)
        .attr("text", Validator::Str, Value::str(""))
        .attr("word_wrap", Validator::Bool, Value::Bool(false))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::component;

    #[test]
    fn text_follows_value() {
        let f = field(&component()).instantiate();
        assert_eq!(f.get("text").unwrap(), Value::str(""));
        f.set("value", Value::Int(5)).unwrap();
        assert_eq!(f.get("text").unwrap(), Value::str("5"));
        f.get("clear").unwrap().call(vec![], vec![]).unwrap();
        assert_eq!(f.get("value").unwrap(), Value::None);
    }

    #[test]
    fn text_cannot_be_assigned() {
        let f = field(&component()).instantiate();
        assert!(f.set("text", Value::str("x")).is_err());
    }
}
