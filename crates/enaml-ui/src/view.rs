//! The result of building a component: its top-level objects plus the
//! namespace of identifiers they export.

use std::fmt::Write as _;
use std::rc::Rc;

use enaml_runtime::{AttrKind, Namespace, ObjectRef, Result, Role, Value};

/// A built component tree.
///
/// The view owns its top-level components; the namespace only refers to
/// them, so dropping the view drops the tree.
#[derive(Debug)]
pub struct View {
    components: Vec<ObjectRef>,
    ns: Rc<Namespace>,
}

impl View {
    pub fn new(components: Vec<ObjectRef>, ns: Rc<Namespace>) -> Self {
        Self { components, ns }
    }

    /// The first top-level component.
    pub fn root(&self) -> Option<&ObjectRef> {
        self.components.first()
    }

    pub fn components(&self) -> &[ObjectRef] {
        &self.components
    }

    pub fn namespace(&self) -> &Rc<Namespace> {
        &self.ns
    }

    /// Looks up an identifier (or any other name) in the view's namespace.
    pub fn find(&self, name: &str) -> Option<Value> {
        self.ns.get(name)
    }

    /// Like [`find`](Self::find), for names that must be objects.
    pub fn object(&self, name: &str) -> Option<ObjectRef> {
        self.find(name).and_then(|v| v.as_object().cloned())
    }

    /// Makes every top-level window visible.
    pub fn show(&self) -> Result<()> {
        for component in &self.components {
            if component.role() == Role::Window {
                log::debug!("showing {}", component.type_name());
                component.set("visible", Value::Bool(true))?;
            }
        }
        Ok(())
    }

    /// Renders the tree as indented text, one component per line.
    ///
    /// Each line shows the type, the identifier if any, and every stored
    /// attribute whose value differs from the class default.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for component in &self.components {
            dump_into(&mut out, component, 0);
        }
        out
    }
}

fn dump_into(out: &mut String, obj: &ObjectRef, depth: usize) {
    let indent = "    ".repeat(depth);
    let _ = write!(out, "{indent}{}", obj.type_name());
    if let Some(id) = obj.identifier() {
        let _ = write!(out, " {id}");
    }
    let changed: Vec<String> = obj
        .class()
        .attrs()
        .into_iter()
        .filter(|def| matches!(def.kind, AttrKind::Value | AttrKind::ReadOnly))
        .filter_map(|def| match obj.get(&def.name) {
            Ok(value) if value == def.default => None,
            Ok(value) => Some(format!("{}={}", def.name, value.repr())),
            Err(e) => Some(format!("{}=<{}>", def.name, e.kind())),
        })
        .collect();
    if !changed.is_empty() {
        let _ = write!(out, " ({})", changed.join(", "));
    }
    out.push('\n');
    for meta in obj.metas() {
        dump_into(out, &meta, depth + 1);
    }
    for child in obj.children() {
        dump_into(out, &child, depth + 1);
    }
}
