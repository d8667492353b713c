//! Integer range widgets. Values outside `[0, 100]` are clamped.

use std::rc::Rc;

use enaml_runtime::callable::exact_args;
use enaml_runtime::{ClassDef, ObjectRef, Result, Role, Validator, Value};

const RANGE: Validator = Validator::Range { low: 0, high: 100, clamp: true };

pub fn slider(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Slider", Role::Element)
        .extends(base)
        .attr("value", RANGE, Value::Int(0))
        .attr("tick_interval", Validator::Range { low: 1, high: 100, clamp: true }, Value::Int(10))
        .attr("orientation", Validator::one_of(["horizontal", "vertical"]), Value::str("horizontal"))
        .attr("tracking", Validator::Bool, Value::Bool(true))
        .event("moved", Validator::Int)
        .finish()
}

fn step(obj: &ObjectRef, direction: i64) -> Result<Value> {
    let value = obj.get("value")?.as_int().unwrap_or(0);
    let step = obj.get("single_step")?.as_int().unwrap_or(1);
    obj.set("value", Value::Int(value.saturating_add(direction.saturating_mul(step))))?;
    Ok(Value::None)
}

pub fn spin_box(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("SpinBox", Role::Element)
        .extends(base)
        .attr("value", RANGE, Value::Int(0))
        .attr("single_step", Validator::Range { low: 1, high: 100, clamp: true }, Value::Int(1))
        .attr("prefix", Validator::Str, Value::str(""))
        .attr("suffix", Validator::Str, Value::str(""))
        .property("text", |obj| {
            Ok(Value::str(format!("{}{}{}", obj.get("prefix")?, obj.get("value")?, obj.get("suffix")?)))
        })
        .method("step_up", |obj, args, kwargs| {
            exact_args("step_up", &args, &kwargs, 0)?;
            step(obj, 1)
        })
        .method("step_down", |obj, args, kwargs| {
            exact_args("step_down", &args, &kwargs, 0)?;
            step(obj, -1)
        })
        .finish()
}
