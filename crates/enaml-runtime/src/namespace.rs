//! Name tables and the scope used to evaluate expressions.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::builtins;
use crate::class::Role;
use crate::error::{Error, Result};
use crate::object::{ObjectRef, WeakObject};
use crate::toolkit::{self, Toolkit};
use crate::value::Value;

enum Slot {
    Strong(Value),
    Component(WeakObject),
}

/// A mutable mapping of names to values.
///
/// Component objects are held weakly: the component tree owns them and a
/// namespace only refers to them. Model objects and every other value are
/// held strongly. An overlay namespace falls back to its parent on misses
/// and writes only to itself.
#[derive(Default)]
pub struct Namespace {
    entries: RefCell<BTreeMap<String, Slot>>,
    identifiers: RefCell<BTreeSet<String>>,
    parent: Option<Rc<Namespace>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty namespace layered over `parent`.
    pub fn overlay(parent: &Rc<Namespace>) -> Self {
        Self { parent: Some(Rc::clone(parent)), ..Self::default() }
    }

    pub fn insert(&self, name: impl Into<String>, value: Value) {
        let slot = match value {
            Value::Object(obj) if obj.role() != Role::Model => Slot::Component(obj.downgrade()),
            other => Slot::Strong(other),
        };
        self.entries.borrow_mut().insert(name.into(), slot);
    }

    /// Looks `name` up here, then in the parent chain. Components that have
    /// been dropped read as missing.
    pub fn get(&self, name: &str) -> Option<Value> {
        let own = self.entries.borrow().get(name).map(|slot| match slot {
            Slot::Strong(v) => Some(v.clone()),
            Slot::Component(w) => w.upgrade().map(Value::Object),
        });
        match own {
            Some(found) => found,
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.entries.borrow_mut().remove(name).and_then(|slot| match slot {
            Slot::Strong(v) => Some(v),
            Slot::Component(w) => w.upgrade().map(Value::Object),
        })
    }

    /// Registers `obj` under its declared identifier. An identifier may be
    /// registered once per namespace.
    pub fn register_identifier(&self, name: &str, obj: &ObjectRef) -> Result<()> {
        if !self.identifiers.borrow_mut().insert(name.to_string()) {
            return Err(Error::Name(format!("duplicate identifier `{name}`")));
        }
        if self.get(name).is_some() {
            log::warn!("identifier `{name}` shadows an existing global name");
        }
        obj.set_identifier(name);
        self.insert(name, Value::Object(obj.clone()));
        Ok(())
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.identifiers.borrow().iter().cloned().collect()
    }

    /// Names defined directly in this namespace, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Copies every live entry of `other` (not its parents) into `self`.
    pub fn extend_from(&self, other: &Namespace) {
        for name in other.names() {
            if let Some(value) = other.get(&name) {
                self.insert(name, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("names", &self.names())
            .field("identifiers", &self.identifiers())
            .field("overlay", &self.parent.is_some())
            .finish()
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────

/// Everything an expression can see.
///
/// Lookup order: `locals` (with its overlay chain), `globals`, the
/// toolkit, then builtins.
#[derive(Clone)]
pub struct Scope {
    pub globals: Rc<Namespace>,
    pub locals: Rc<Namespace>,
    pub toolkit: Rc<dyn Toolkit>,
}

impl Scope {
    pub fn new(globals: Rc<Namespace>, locals: Rc<Namespace>, toolkit: Rc<dyn Toolkit>) -> Self {
        Self { globals, locals, toolkit }
    }

    /// A scope whose locals are the globals, as used by module-level code.
    pub fn module(globals: Rc<Namespace>, toolkit: Rc<dyn Toolkit>) -> Self {
        Self { locals: Rc::clone(&globals), globals, toolkit }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .or_else(|| toolkit::lookup_value(&self.toolkit, name))
            .or_else(|| builtins::lookup(name))
    }

    pub fn resolve(&self, name: &str) -> Result<Value> {
        self.lookup(name).ok_or_else(|| Error::Name(format!("name `{name}` is not defined")))
    }

    /// A scope with `bindings` layered over the current locals.
    pub fn with_locals(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Scope {
        let overlay = Namespace::overlay(&self.locals);
        for (name, value) in bindings {
            overlay.insert(name, value);
        }
        Scope { globals: Rc::clone(&self.globals), locals: Rc::new(overlay), toolkit: Rc::clone(&self.toolkit) }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("globals", &self.globals)
            .field("locals", &self.locals)
            .field("toolkit", &self.toolkit.name())
            .finish()
    }
}
