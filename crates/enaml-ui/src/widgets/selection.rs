use std::rc::Rc;

use enaml_runtime::{ClassDef, Role, Validator, Value};

/// A drop-down list. `index` is `-1` when nothing is selected; `value`
/// reads the selected item.
pub fn combo_box(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("ComboBox", Role::Element)
        .extends(base)
        .attr("items", Validator::List, Value::list(Vec::new()))
        .attr("index", Validator::Int, Value::Int(-1))
        .property("value", |obj| {
            let items = obj.get("items")?;
            let index = obj.get("index")?.as_int().unwrap_or(-1);
            let selected = usize::try_from(index).ok().and_then(|i| items.as_sequence()?.get(i).cloned());
            Ok(selected.unwrap_or(Value::None))
        })
        .event("selected", Validator::Any)
        .finish()
}
