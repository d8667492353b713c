//! Observable objects: the attribute contract every bindable component
//! honours.
//!
//! An [`ObjectRef`] is a cheap, clonable handle. Parents own their
//! children; a child refers back to its parent weakly. Interceptors
//! installed by bindings are owned by the object they decorate.
//!
//! No `RefCell` borrow is held while user code runs, so interceptors and
//! listeners may freely read and write the object that invoked them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::callable::BoundMethod;
use crate::class::{AttrKind, ClassDef, Role};
use crate::error::{Error, Result};
use crate::value::Value;

/// Attributes every object exposes read-only.
pub const BUILTIN_ATTRS: [&str; 3] = ["children", "parent", "style_type"];

/// Re-entrant notifications deeper than this fail with [`Error::Recursion`].
pub const MAX_NOTIFY_DEPTH: usize = 64;

thread_local! {
    static NOTIFY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

// ── Change notification ───────────────────────────────────────────────────

/// One attribute change, as delivered to listeners.
#[derive(Clone)]
pub struct ChangeEvent {
    pub object: ObjectRef,
    pub name: String,
    pub old: Value,
    pub new: Value,
}

impl fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("object", &self.object)
            .field("name", &self.name)
            .field("old", &self.old)
            .field("new", &self.new)
            .finish()
    }
}

/// A listener registered weakly; it is pruned once its owner drops it.
pub trait ChangeListener {
    fn changed(&self, event: &ChangeEvent) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Rc<dyn Fn(&ChangeEvent) -> Result<()>>;

#[derive(Clone)]
enum Listener {
    Strong(Callback),
    Weak(Weak<dyn ChangeListener>),
}

struct Observer {
    id: ObserverId,
    attr: String,
    listener: Listener,
}

// ── Interceptors ──────────────────────────────────────────────────────────

/// Replaces the storage of one attribute.
///
/// `set` returns the `(old, new)` pair the object should announce, or
/// `None` when the interceptor takes care of notification itself.
pub trait Interceptor {
    fn get(&self, obj: &ObjectRef, name: &str) -> Result<Value>;
    fn set(&self, obj: &ObjectRef, name: &str, value: Value) -> Result<Option<(Value, Value)>>;
}

// ── ObjectRef ─────────────────────────────────────────────────────────────

struct ObjectInner {
    class: Rc<ClassDef>,
    state: RefCell<ObjectState>,
}

#[derive(Default)]
struct ObjectState {
    values: HashMap<String, Value>,
    interceptors: HashMap<String, Rc<dyn Interceptor>>,
    observers: Vec<Observer>,
    next_observer: u64,
    parent: Option<Weak<ObjectInner>>,
    children: Vec<ObjectRef>,
    metas: Vec<ObjectRef>,
    identifier: Option<String>,
}

/// A shared handle to an observable object.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectInner>);

/// A non-owning handle to an [`ObjectRef`].
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "Weak({obj:?})"),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier() {
            Some(id) => write!(f, "<{} object '{id}'>", self.type_name()),
            None => write!(f, "<{} object>", self.type_name()),
        }
    }
}

impl ObjectRef {
    pub fn new(class: Rc<ClassDef>) -> Self {
        let values = class
            .attrs()
            .into_iter()
            .filter(|a| matches!(a.kind, AttrKind::Value | AttrKind::ReadOnly))
            .map(|a| (a.name.clone(), a.default.clone()))
            .collect();
        let state = ObjectState { values, ..ObjectState::default() };
        ObjectRef(Rc::new(ObjectInner { class, state: RefCell::new(state) }))
    }

    pub fn class(&self) -> &Rc<ClassDef> {
        &self.0.class
    }

    pub fn type_name(&self) -> &str {
        self.0.class.name()
    }

    pub fn role(&self) -> Role {
        self.0.class.role()
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn identifier(&self) -> Option<String> {
        self.0.state.borrow().identifier.clone()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) {
        self.0.state.borrow_mut().identifier = Some(identifier.into());
    }

    /// The kind of `name` on this object, or `None` when it has no such
    /// attribute. Undeclared attributes of open classes are plain values.
    pub fn attr_kind(&self, name: &str) -> Option<AttrKind> {
        if BUILTIN_ATTRS.contains(&name) {
            return Some(AttrKind::ReadOnly);
        }
        match self.0.class.attr(name) {
            Some(def) => Some(def.kind),
            None if self.0.class.is_open() => Some(AttrKind::Value),
            None => None,
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr_kind(name).is_some() || self.0.class.method(name).is_some()
    }

    // ── get / set ─────────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Result<Value> {
        match name {
            "children" => return Ok(Value::list(self.children().into_iter().map(Value::Object))),
            "parent" => return Ok(self.parent().map_or(Value::None, Value::Object)),
            "style_type" => return Ok(Value::str(self.type_name())),
            _ => {}
        }

        let interceptor = self.0.state.borrow().interceptors.get(name).cloned();
        if let Some(interceptor) = interceptor {
            return interceptor.get(self, name);
        }

        if let Some(def) = self.0.class.attr(name) {
            return match def.kind {
                AttrKind::Property => match &def.getter {
                    Some(getter) => getter(self),
                    None => Ok(Value::None),
                },
                AttrKind::Event => Ok(Value::None),
                AttrKind::Value | AttrKind::ReadOnly => {
                    Ok(self.0.state.borrow().values.get(name).cloned().unwrap_or(Value::None))
                }
            };
        }

        if let Some(method) = self.0.class.method(name) {
            return Ok(Value::function(BoundMethod::new(self.clone(), name, Rc::clone(method))));
        }

        if let Some(value) = self.0.state.borrow().values.get(name) {
            return Ok(value.clone());
        }

        Err(self.missing(name))
    }

    /// Assigns `value`, running validation, interceptors and notification.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        if BUILTIN_ATTRS.contains(&name) {
            return Err(Error::Type(format!("`{name}` attribute of a {} object is read-only", self.type_name())));
        }

        let interceptor = self.0.state.borrow().interceptors.get(name).cloned();
        if let Some(interceptor) = interceptor {
            return match interceptor.set(self, name, value)? {
                Some((old, new)) => self.notify(name, old, new),
                None => Ok(()),
            };
        }

        let kind = self.attr_kind(name).ok_or_else(|| self.missing(name))?;
        match kind {
            AttrKind::ReadOnly => Err(Error::Type(format!(
                "`{name}` attribute of a {} object is read-only",
                self.type_name()
            ))),
            AttrKind::Property => Err(Error::Type(format!(
                "`{name}` attribute of a {} object is a property and cannot be assigned",
                self.type_name()
            ))),
            AttrKind::Event => {
                let value = self.validate(name, value)?;
                self.notify(name, Value::None, value)
            }
            AttrKind::Value => {
                let value = self.validate(name, value)?;
                let old = self.0.state.borrow_mut().values.insert(name.to_string(), value.clone());
                let old = old.unwrap_or(Value::None);
                if old == value {
                    return Ok(());
                }
                self.notify(name, old, value)
            }
        }
    }

    /// Stores a validated value without notifying or consulting an
    /// interceptor. Accepts read-only attributes; used by the owning
    /// toolkit to initialise or update state it controls.
    pub fn init(&self, name: &str, value: Value) -> Result<()> {
        if BUILTIN_ATTRS.contains(&name) {
            return Err(Error::Type(format!("`{name}` attribute of a {} object is read-only", self.type_name())));
        }
        match self.attr_kind(name) {
            Some(AttrKind::Value | AttrKind::ReadOnly) => {
                let value = self.validate(name, value)?;
                self.0.state.borrow_mut().values.insert(name.to_string(), value);
                Ok(())
            }
            Some(kind) => Err(Error::Type(format!("cannot store the {kind} attribute `{name}`"))),
            None => Err(self.missing(name)),
        }
    }

    /// Runs the validator of `name` over `value`.
    pub fn validate(&self, name: &str, value: Value) -> Result<Value> {
        let Some(def) = self.0.class.attr(name) else {
            return Ok(value);
        };
        def.validator.validate(value).map_err(|msg| {
            Error::Validation(format!("The `{name}` attribute of a {} object {msg}", self.type_name()))
        })
    }

    fn missing(&self, name: &str) -> Error {
        Error::Attribute(format!("`{name}` is not an attribute on the {} object", self.type_name()))
    }

    // ── Interceptors ──────────────────────────────────────────────────────

    /// Installs `interceptor` as the storage of `name`.
    pub fn intercept(&self, name: &str, interceptor: Rc<dyn Interceptor>) -> Result<()> {
        match self.attr_kind(name) {
            None => return Err(self.missing(name)),
            Some(AttrKind::Value) => {}
            Some(kind) => {
                return Err(Error::Type(format!(
                    "cannot bind to the {kind} attribute `{name}` of a {} object",
                    self.type_name()
                )));
            }
        }
        let mut state = self.0.state.borrow_mut();
        if state.interceptors.contains_key(name) {
            return Err(Error::Type(format!(
                "`{name}` on the {} object already has an active binding",
                self.type_name()
            )));
        }
        state.interceptors.insert(name.to_string(), interceptor);
        Ok(())
    }

    pub fn is_intercepted(&self, name: &str) -> bool {
        self.0.state.borrow().interceptors.contains_key(name)
    }

    /// The raw stored value of `name`, bypassing interceptors.
    pub fn stored(&self, name: &str) -> Option<Value> {
        self.0.state.borrow().values.get(name).cloned()
    }

    // ── Observers ─────────────────────────────────────────────────────────

    fn add_observer(&self, attr: &str, listener: Listener) -> ObserverId {
        let mut state = self.0.state.borrow_mut();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push(Observer { id, attr: attr.to_string(), listener });
        id
    }

    /// Calls `f` after every change of `attr`. The object keeps `f` alive.
    pub fn on_change(&self, attr: &str, f: impl Fn(&ChangeEvent) -> Result<()> + 'static) -> ObserverId {
        self.add_observer(attr, Listener::Strong(Rc::new(f)))
    }

    /// Registers a listener that does not keep `listener` alive.
    pub fn observe_weak(&self, attr: &str, listener: Weak<dyn ChangeListener>) -> ObserverId {
        self.add_observer(attr, Listener::Weak(listener))
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut state = self.0.state.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|o| o.id != id);
        state.observers.len() != before
    }

    /// Live observers of `attr`.
    pub fn observer_count(&self, attr: &str) -> usize {
        self.0
            .state
            .borrow()
            .observers
            .iter()
            .filter(|o| o.attr == attr)
            .filter(|o| match &o.listener {
                Listener::Strong(_) => true,
                Listener::Weak(w) => w.strong_count() > 0,
            })
            .count()
    }

    /// Delivers a change of `name` to its observers, in registration order.
    pub fn notify(&self, name: &str, old: Value, new: Value) -> Result<()> {
        let listeners: Vec<Listener> = {
            let mut state = self.0.state.borrow_mut();
            state.observers.retain(|o| match &o.listener {
                Listener::Strong(_) => true,
                Listener::Weak(w) => w.strong_count() > 0,
            });
            state.observers.iter().filter(|o| o.attr == name).map(|o| o.listener.clone()).collect()
        };
        if listeners.is_empty() {
            return Ok(());
        }

        let _guard = DepthGuard::enter(self, name)?;
        let event = ChangeEvent { object: self.clone(), name: name.to_string(), old, new };
        for listener in listeners {
            match listener {
                Listener::Strong(f) => f(&event)?,
                Listener::Weak(w) => {
                    if let Some(l) = w.upgrade() {
                        l.changed(&event)?;
                    }
                }
            }
        }
        Ok(())
    }

    // ── Tree ──────────────────────────────────────────────────────────────

    pub fn parent(&self) -> Option<ObjectRef> {
        self.0.state.borrow().parent.as_ref().and_then(Weak::upgrade).map(ObjectRef)
    }

    pub fn children(&self) -> Vec<ObjectRef> {
        self.0.state.borrow().children.clone()
    }

    pub fn metas(&self) -> Vec<ObjectRef> {
        self.0.state.borrow().metas.clone()
    }

    pub fn add_meta(&self, meta: ObjectRef) {
        meta.0.state.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.state.borrow_mut().metas.push(meta);
    }

    /// `true` when `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &ObjectRef) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    fn adopt(&self, child: &ObjectRef) -> Result<()> {
        if child.is_ancestor_of(self) {
            return Err(Error::Value(format!(
                "cannot add a {} object as a child of itself or of its descendant",
                child.type_name()
            )));
        }
        // A child moving within `self` is repositioned by the caller's single
        // `children` update.
        if let Some(old_parent) = child.parent().filter(|p| !p.ptr_eq(self)) {
            old_parent.remove_child(child)?;
        }
        Ok(())
    }

    fn update_children(&self, f: impl FnOnce(&mut Vec<ObjectRef>)) -> Result<()> {
        let (old, new) = {
            let mut state = self.0.state.borrow_mut();
            let old = state.children.clone();
            f(&mut state.children);
            (old, state.children.clone())
        };
        self.notify("children", Value::list(old.into_iter().map(Value::Object)), Value::list(new.into_iter().map(Value::Object)))
    }

    fn child_index(&self, child: &ObjectRef) -> Option<usize> {
        self.0.state.borrow().children.iter().position(|c| c.ptr_eq(child))
    }

    pub fn add_child(&self, child: &ObjectRef) -> Result<()> {
        self.adopt(child)?;
        child.0.state.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.update_children(|children| {
            children.retain(|c| !c.ptr_eq(child));
            children.push(child.clone());
        })
    }

    pub fn insert_child(&self, index: usize, child: &ObjectRef) -> Result<()> {
        self.adopt(child)?;
        child.0.state.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.update_children(|children| {
            children.retain(|c| !c.ptr_eq(child));
            let index = index.min(children.len());
            children.insert(index, child.clone());
        })
    }

    pub fn remove_child(&self, child: &ObjectRef) -> Result<()> {
        let index = self.child_index(child).ok_or_else(|| self.not_a_child(child))?;
        child.0.state.borrow_mut().parent = None;
        self.update_children(|children| {
            children.remove(index);
        })
    }

    /// Puts `new` in the place of `old`, which loses its parent.
    pub fn replace_child(&self, old: &ObjectRef, new: &ObjectRef) -> Result<()> {
        if old.ptr_eq(new) {
            return Ok(());
        }
        self.child_index(old).ok_or_else(|| self.not_a_child(old))?;
        self.adopt(new)?;
        self.child_index(old).ok_or_else(|| self.not_a_child(old))?;
        old.0.state.borrow_mut().parent = None;
        new.0.state.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.update_children(|children| {
            children.retain(|c| !c.ptr_eq(new));
            if let Some(index) = children.iter().position(|c| c.ptr_eq(old)) {
                children[index] = new.clone();
            }
        })
    }

    pub fn swap_children(&self, a: &ObjectRef, b: &ObjectRef) -> Result<()> {
        let i = self.child_index(a).ok_or_else(|| self.not_a_child(a))?;
        let j = self.child_index(b).ok_or_else(|| self.not_a_child(b))?;
        self.update_children(|children| children.swap(i, j))
    }

    fn not_a_child(&self, child: &ObjectRef) -> Error {
        Error::Value(format!("{child:?} is not a child of {self:?}"))
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter(obj: &ObjectRef, name: &str) -> Result<DepthGuard> {
        let depth = NOTIFY_DEPTH.with(Cell::get);
        if depth >= MAX_NOTIFY_DEPTH {
            return Err(Error::Recursion(format!(
                "maximum notification depth exceeded while notifying `{name}` of {obj:?}"
            )));
        }
        NOTIFY_DEPTH.with(|d| d.set(depth + 1));
        Ok(DepthGuard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NOTIFY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
