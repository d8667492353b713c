use std::rc::Rc;

use enaml_runtime::{ClassDef, Role, Validator, Value};

const SPACING: Validator = Validator::Range { low: 0, high: 1000, clamp: true };

pub fn container(base: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Container", Role::Container).extends(base).finish()
}

/// Stacks children top to bottom.
pub fn vgroup(container: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("VGroup", Role::Container)
        .extends(container)
        .attr("spacing", SPACING, Value::Int(10))
        .finish()
}

/// Lines children up left to right.
pub fn hgroup(container: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("HGroup", Role::Container)
        .extends(container)
        .attr("spacing", SPACING, Value::Int(10))
        .finish()
}

/// Label/field pairs in two columns.
pub fn form(container: &Rc<ClassDef>) -> Rc<ClassDef> {
    ClassDef::build("Form", Role::Container)
        .extends(container)
        .attr("label_width", Validator::Range { low: 0, high: 10_000, clamp: true }, Value::Int(120))
        .finish()
}
