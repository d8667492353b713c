//! Class definitions: the attribute contract of a component or model type.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::validator::Validator;
use crate::value::Value;

/// Where instances of a class may appear in a component tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A top-level window; never wrapped.
    Window,
    /// A component that lays out children.
    Container,
    /// A leaf component.
    Element,
    /// A non-visual helper attached to its parent's `metas`.
    Meta,
    /// A plain observable object, typically supplied as context.
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// Stored and validated; the only kind that accepts interceptors.
    Value,
    /// Stored, but rejected on assignment.
    ReadOnly,
    /// Never stored; every assignment is a notification.
    Event,
    /// Computed by a getter; not assignable.
    Property,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrKind::Value => "value",
            AttrKind::ReadOnly => "read-only",
            AttrKind::Event => "event",
            AttrKind::Property => "property",
        })
    }
}

pub type Getter = Rc<dyn Fn(&ObjectRef) -> Result<Value>>;

pub type Method = Rc<dyn Fn(&ObjectRef, Vec<Value>, Vec<(String, Value)>) -> Result<Value>>;

#[derive(Clone)]
pub struct AttrDef {
    pub name: String,
    pub kind: AttrKind,
    pub validator: Validator,
    pub default: Value,
    pub(crate) getter: Option<Getter>,
}

impl fmt::Debug for AttrDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("validator", &self.validator)
            .field("default", &self.default)
            .finish()
    }
}

/// A component or model class.
///
/// Attribute lookups walk the `base` chain, so a subclass may redeclare an
/// attribute to change its default.
pub struct ClassDef {
    name: String,
    role: Role,
    base: Option<Rc<ClassDef>>,
    attrs: Vec<AttrDef>,
    methods: HashMap<String, Method>,
    open: bool,
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .finish_non_exhaustive()
    }
}

impl ClassDef {
    pub fn build(name: impl Into<String>, role: Role) -> ClassBuilder {
        ClassBuilder {
            class: ClassDef {
                name: name.into(),
                role,
                base: None,
                attrs: Vec::new(),
                methods: HashMap::new(),
                open: false,
            },
        }
    }

    /// An open model class that accepts any attribute.
    pub fn model(name: impl Into<String>) -> Rc<ClassDef> {
        ClassDef::build(name, Role::Model).open().finish()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn base(&self) -> Option<&Rc<ClassDef>> {
        self.base.as_ref()
    }

    /// Whether undeclared attributes may be set on instances.
    pub fn is_open(&self) -> bool {
        self.open || self.base.as_ref().is_some_and(|b| b.is_open())
    }

    pub fn attr(&self, name: &str) -> Option<&AttrDef> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.base.as_ref().and_then(|b| b.attr(name)))
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name).or_else(|| self.base.as_ref().and_then(|b| b.method(name)))
    }

    /// All attributes, base classes first, redeclarations replacing the
    /// inherited entry in place.
    pub fn attrs(&self) -> Vec<&AttrDef> {
        let mut all = self.base.as_ref().map(|b| b.attrs()).unwrap_or_default();
        for attr in &self.attrs {
            match all.iter().position(|a| a.name == attr.name) {
                Some(i) => all[i] = attr,
                None => all.push(attr),
            }
        }
        all
    }

    /// `true` when this class is `name` or inherits from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.base.as_ref().is_some_and(|b| b.is_a(name))
    }

    /// Creates an instance with every attribute at its default.
    pub fn instantiate(self: &Rc<Self>) -> ObjectRef {
        ObjectRef::new(Rc::clone(self))
    }

    /// Calls the class: a fresh instance whose keyword arguments are then
    /// assigned as attributes.
    pub fn call(self: &Rc<Self>, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<ObjectRef> {
        if !args.is_empty() {
            return Err(Error::Type(format!("{}() takes no positional arguments", self.name)));
        }
        let obj = self.instantiate();
        for (name, value) in kwargs {
            obj.set(&name, value)?;
        }
        Ok(obj)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Builder returned by [`ClassDef::build`].
///
/// ```rust
/// use enaml_runtime::{ClassDef, Role, Validator, Value};
///
/// let label = ClassDef::build("Label", Role::Element)
///     .attr("text", Validator::Str, Value::str(""))
///     .finish();
/// assert_eq!(label.instantiate().get("text").unwrap(), Value::str(""));
/// ```
pub struct ClassBuilder {
    class: ClassDef,
}

impl ClassBuilder {
    pub fn extends(mut self, base: &Rc<ClassDef>) -> Self {
        self.class.base = Some(Rc::clone(base));
        self
    }

    fn push(mut self, name: impl Into<String>, kind: AttrKind, validator: Validator, default: Value) -> Self {
        self.class.attrs.push(AttrDef { name: name.into(), kind, validator, default, getter: None });
        self
    }

    pub fn attr(self, name: impl Into<String>, validator: Validator, default: Value) -> Self {
        self.push(name, AttrKind::Value, validator, default)
    }

    pub fn readonly(self, name: impl Into<String>, validator: Validator, default: Value) -> Self {
        self.push(name, AttrKind::ReadOnly, validator, default)
    }

    pub fn event(self, name: impl Into<String>, validator: Validator) -> Self {
        self.push(name, AttrKind::Event, validator, Value::None)
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&ObjectRef) -> Result<Value> + 'static,
    ) -> Self {
        self.class.attrs.push(AttrDef {
            name: name.into(),
            kind: AttrKind::Property,
            validator: Validator::Any,
            default: Value::None,
            getter: Some(Rc::new(getter)),
        });
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&ObjectRef, Vec<Value>, Vec<(String, Value)>) -> Result<Value> + 'static,
    ) -> Self {
        self.class.methods.insert(name.into(), Rc::new(f));
        self
    }

    pub fn open(mut self) -> Self {
        self.class.open = true;
        self
    }

    pub fn finish(self) -> Rc<ClassDef> {
        Rc::new(self.class)
    }
}
