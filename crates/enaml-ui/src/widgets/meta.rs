use std::rc::Rc;

use enaml_runtime::{ClassDef, Role, Validator, Value};

/// Layout hints for the parent. Declared as a child, stored in `metas`.
pub fn layout_meta() -> Rc<ClassDef> {
    ClassDef::build("LayoutMeta", Role::Meta)
        .attr("margin", Validator::Range { low: 0, high: 1000, clamp: true }, Value::Int(0))
        .attr("stretch", Validator::Range { low: 0, high: 100, clamp: true }, Value::Int(0))
        .finish()
}
