use std::rc::Rc;

use enaml_runtime::callable::exact_args;
use enaml_runtime::{ClassDef, Role, Validator, Value};

/// A button that fires `clicked`. `click()` simulates a press.
pub fn push_button(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("PushButton", Role::Element)
        .extends(base)
        .attr("text", Validator::Str, Value::str(""))
        .attr("down", Validator::Bool, Value::Bool(false))
        .event("clicked", Validator::Any)
        .event("pressed", Validator::Any)
        .event("released", Validator::Any)
        .method("click", |obj, args, kwargs| {
            exact_args("click", &args, &kwargs, 0)?;
            if !obj.get("enabled")?.is_truthy() {
                return Ok(Value::None);
            }
            obj.set("down", Value::Bool(true))?;
            obj.set("pressed", Value::Bool(true))?;
            obj.set("down", Value::Bool(false))?;
            obj.set("released", Value::Bool(true))?;
            obj.set("clicked", Value::Bool(true))?;
            Ok(Value::None)
        })
        .finish()
}

pub fn check_box(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("CheckBox", Role::Element)
        .extends(base)
        .attr("text", Validator::Str, Value::str(""))
        .attr("checked", Validator::Bool, Value::Bool(false))
        .event("toggled", Validator::Bool)
        .method("toggle", |obj, args, kwargs| {
            exact_args("toggle", &args, &kwargs, 0)?;
            let checked = !obj.get("checked")?.is_truthy();
            obj.set("checked", Value::Bool(checked))?;
            obj.set("toggled", Value::Bool(checked))?;
            Ok(Value::None)
        })
        .finish()
}
