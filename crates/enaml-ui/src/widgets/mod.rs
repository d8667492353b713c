//! Headless widget classes.
//!
//! Each widget is a [`ClassDef`] describing its attribute contract. There
//! is no rendering: state lives in the object and changes are observable,
//! which is all the binding runtime needs.

pub mod button;
pub mod container;
pub mod field;
pub mod meta;
pub mod range;
pub mod selection;
pub mod window;

use std::rc::Rc;

use enaml_runtime::{ClassDef, Role, Validator, Value};

/// The base every widget extends.
pub fn component() -> Rc<ClassDef> {
    ClassDef::build("Component", Role::Element)
        .attr("enabled", Validator::Bool, Value::Bool(true))
        .attr("visible", Validator::Bool, Value::Bool(true))
        .attr("tool_tip", Validator::Str, Value::str(""))
        .finish()
}

/// Every concrete widget class, sharing one base.
pub fn all() -> Vec<Rc<ClassDef>> {
    let base = component();
    let window = window::window(&base);
    let container = container::container(&base);
    vec![
        window::dialog(&window),
        window,
        container::vgroup(&container),
        container::hgroup(&container),
        container::form(&container),
        container,
        field::field(&base),
        field::label(&base),
        button::push_button(&base),
        button::check_box(&base),
        range::slider(&base),
        range::spin_box(&base),
        selection::combo_box(&base),
        meta::layout_meta(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_widget_is_a_component_except_metas() {
        for class in all() {
            match class.role() {
                Role::Meta => assert!(!class.is_a("Component"), "{}", class.name()),
                _ => assert!(class.is_a("Component"), "{}", class.name()),
            }
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<String> = all().iter().map(|c| c.name().to_string()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
