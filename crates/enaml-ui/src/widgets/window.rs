use std::rc::Rc;

use enaml_runtime::callable::exact_args;
use enaml_runtime::{ClassDef, ObjectRef, Result, Role, Validator, Value};

fn toggle_visible(obj: &ObjectRef, visible: bool) -> Result<Value> {
    obj.set("visible", Value::Bool(visible))?;
    Ok(Value::None)
}

/// A top-level window. Hidden until shown.
pub fn window(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Window", Role::Window)
        .extends(base)
        .attr("title", Validator::Str, Value::str(""))
        .attr("visible", Validator::Bool, Value::Bool(false))
        .event("closed", Validator::Any)
        .method("show", |obj, args, kwargs| {
            exact_args("show", &args, &kwargs, 0)?;
            toggle_visible(obj, true)
        })
        .method("hide", |obj, args, kwargs| {
            exact_args("hide", &args, &kwargs, 0)?;
            toggle_visible(obj, false)
        })
        .method("close", |obj, args, kwargs| {
            exact_args("close", &args, &kwargs, 0)?;
            toggle_visible(obj, false)?;
            obj.set("closed", Value::Bool(true))?;
            Ok(Value::None)
        })
        .finish()
}

fn finish_dialog(obj: &ObjectRef, result: &str) -> Result<Value> {
    let old = obj.get("result")?;
    let new = Value::str(result);
    obj.init("result", new.clone())?;
    obj.notify("result", old, new.clone())?;
    obj.set("visible", Value::Bool(false))?;
    obj.set("finished", new)?;
    Ok(Value::None)
}

/// A window that ends with a result: `accepted` or `rejected`.
pub fn dialog(window: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Dialog", Role::Window)
        .extends(window)
        .readonly("result", Validator::one_of(["rejected", "accepted"]), Value::str("rejected"))
        .event("finished", Validator::Str)
        .method("accept", |obj, args, kwargs| {
            exact_args("accept", &args, &kwargs, 0)?;
            finish_dialog(obj, "accepted")
        })
        .method("reject", |obj, args, kwargs| {
            exact_args("reject", &args, &kwargs, 0)?;
            finish_dialog(obj, "rejected")
        })
        .finish()
}
