//! Constructor trees: the reusable, compiled form of a top-level component
//! declaration.
//!
//! An [`EnamlFactory`] builds a fresh component tree each time it is
//! called. A build runs five phases, each over the whole tree before the
//! next starts:
//!
//! 1. `construct`: instantiate every object and attach children and metas
//! 2. `build_ns`: fill each node's locals and register identifiers
//! 3. `inject`: apply every binding operator
//! 4. `build_view`: wrap the root in a [`View`]
//! 5. `cleanup`: drop the per-build state, even after a failure

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use enaml_runtime::{
    ClassDef, CompiledExpr, Error, Namespace, ObjectRef, Operator, OperatorCall, Result, Role, Scope,
    Toolkit, Value,
};
use enaml_syntax::ast::BindingTarget;

use crate::view::View;

// ── Bindings ──────────────────────────────────────────────────────────────

/// One `lhs <op> rhs` line of a declaration, with its operator resolved.
#[derive(Clone)]
pub struct ConstructorBinding {
    pub target: BindingTarget,
    pub symbol: String,
    pub operator: Operator,
    pub code: Rc<CompiledExpr>,
    pub line: usize,
}

impl ConstructorBinding {
    /// Whether the operator replaces the attribute's behaviour, as `=`,
    /// `<<` and `:=` do.
    pub fn intercepts(&self) -> bool {
        self.operator.binding_kind().is_some_and(|kind| kind.intercepts())
    }

    /// The object the binding applies to: `obj` itself, or for `root.leaf`
    /// the object stored in `obj.root`.
    fn resolve_target(&self, obj: &ObjectRef) -> Result<ObjectRef> {
        let Some(root) = &self.target.root else {
            return Ok(obj.clone());
        };
        match obj.get(root)? {
            Value::Object(target) => Ok(target),
            other => Err(Error::Type(format!(
                "cannot bind `{}`: `{root}` of the {} object is a {}, not an object",
                self.target.dotted(),
                obj.type_name(),
                other.type_name()
            ))),
        }
    }
}

impl fmt::Debug for ConstructorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <line {}>", self.target.dotted(), self.symbol, self.line)
    }
}

// ── Constructor ───────────────────────────────────────────────────────────

/// One declared component.
///
/// The declaration data is immutable after compilation; `object` and
/// `locals` only hold values while a build is running.
pub struct Constructor {
    class: Rc<ClassDef>,
    identifier: Option<String>,
    bindings: Vec<ConstructorBinding>,
    children: Vec<Constructor>,
    metas: Vec<Constructor>,
    line: usize,
    object: RefCell<Option<ObjectRef>>,
    locals: RefCell<Option<Rc<Namespace>>>,
}

impl Constructor {
    pub fn new(class: Rc<ClassDef>, identifier: Option<String>, line: usize) -> Self {
        Self {
            class,
            identifier,
            bindings: Vec::new(),
            children: Vec::new(),
            metas: Vec::new(),
            line,
            object: RefCell::new(None),
            locals: RefCell::new(None),
        }
    }

    pub fn class(&self) -> &Rc<ClassDef> {
        &self.class
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn bindings(&self) -> &[ConstructorBinding] {
        &self.bindings
    }

    pub fn children(&self) -> &[Constructor] {
        &self.children
    }

    pub fn metas(&self) -> &[Constructor] {
        &self.metas
    }

    /// Adds a binding. An interceptor on an attribute that already has one
    /// replaces it.
    pub fn push_binding(&mut self, binding: ConstructorBinding) {
        if binding.intercepts() {
            let dotted = binding.target.dotted();
            if let Some(pos) = self.bindings.iter().position(|b| b.intercepts() && b.target.dotted() == dotted) {
                let old = self.bindings.remove(pos);
                log::warn!(
                    "{}: `{dotted} {}` on line {} supersedes `{dotted} {}` on line {}",
                    self.class.name(),
                    binding.symbol,
                    binding.line,
                    old.symbol,
                    old.line
                );
            }
        }
        self.bindings.push(binding);
    }

    /// Adds a declared child, routing metas into `metas`.
    pub fn push_child(&mut self, child: Constructor) {
        match child.class.role() {
            Role::Meta => self.metas.push(child),
            _ => self.children.push(child),
        }
    }

    /// Wraps `self` in a new constructor of `class`.
    pub fn wrap(self, class: Rc<ClassDef>) -> Constructor {
        let mut wrapper = Constructor::new(class, None, self.line);
        wrapper.push_child(self);
        wrapper
    }

    fn instance(&self) -> Result<ObjectRef> {
        self.object
            .borrow()
            .clone()
            .ok_or_else(|| Error::Value(format!("{} constructor used outside of a build", self.class.name())))
    }

    // ── Phases ────────────────────────────────────────────────────────────

    fn construct(&self) -> Result<ObjectRef> {
        let obj = self.class.instantiate();
        for meta in &self.metas {
            obj.add_meta(meta.construct()?);
        }
        for child in &self.children {
            obj.add_child(&child.construct()?)?;
        }
        *self.object.borrow_mut() = Some(obj.clone());
        Ok(obj)
    }

    fn build_ns(&self, global: &Namespace, parent: Option<&ObjectRef>) -> Result<()> {
        let obj = self.instance()?;
        let locals = Namespace::new();
        locals.insert("self", Value::Object(obj.clone()));
        locals.insert("parent", parent.map_or(Value::None, |p| Value::Object(p.clone())));
        *self.locals.borrow_mut() = Some(Rc::new(locals));

        if let Some(id) = &self.identifier {
            global.register_identifier(id, &obj).map_err(|e| e.at_line(self.line))?;
        }
        for node in self.metas.iter().chain(&self.children) {
            node.build_ns(global, Some(&obj))?;
        }
        Ok(())
    }

    fn inject(&self, global: &Rc<Namespace>, toolkit: &Rc<dyn Toolkit>) -> Result<()> {
        let obj = self.instance()?;
        let locals = self
            .locals
            .borrow()
            .clone()
            .ok_or_else(|| Error::Value(format!("{} has no namespace yet", self.class.name())))?;
        let scope = Scope::new(Rc::clone(global), locals, Rc::clone(toolkit));
        for binding in &self.bindings {
            let target = binding.resolve_target(&obj).map_err(|e| e.at_line(binding.line))?;
            let call = OperatorCall { object: &target, attr: &binding.target.leaf, code: &binding.code, scope: &scope };
            binding.operator.apply(&call).map_err(|e| e.at_line(binding.line))?;
        }
        for node in self.metas.iter().chain(&self.children) {
            node.inject(global, toolkit)?;
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.object.borrow_mut().take();
        self.locals.borrow_mut().take();
        for node in self.metas.iter().chain(&self.children) {
            node.cleanup();
        }
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("class", &self.class.name())
            .field("identifier", &self.identifier)
            .field("bindings", &self.bindings)
            .field("metas", &self.metas)
            .field("children", &self.children)
            .finish()
    }
}

// ── Factory ───────────────────────────────────────────────────────────────

/// A callable top-level component.
pub struct EnamlFactory {
    name: String,
    root: Constructor,
    module: Rc<Namespace>,
    toolkit: Rc<dyn Toolkit>,
    building: Cell<bool>,
}

impl EnamlFactory {
    /// Makes `root` showable: a container is wrapped in a `Window`, an
    /// element in a `Window` holding a `VGroup`.
    pub fn new(name: impl Into<String>, root: Constructor, module: Rc<Namespace>, toolkit: Rc<dyn Toolkit>) -> Result<Self> {
        let name = name.into();
        let root = match root.class.role() {
            Role::Window => root,
            Role::Container => root.wrap(required(&toolkit, "Window", &name)?),
            Role::Element | Role::Model => root
                .wrap(required(&toolkit, "VGroup", &name)?)
                .wrap(required(&toolkit, "Window", &name)?),
            Role::Meta => {
                return Err(Error::Type(format!("{} cannot be declared at the top level", root.class.name()))
                    .at_line(root.line));
            }
        };
        Ok(Self { name, root, module, toolkit, building: Cell::new(false) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root constructor, after any wrapping.
    pub fn root(&self) -> &Constructor {
        &self.root
    }

    /// Builds an independent component tree. `context` values are visible
    /// to every expression as globals.
    pub fn call(&self, context: impl IntoIterator<Item = (String, Value)>) -> Result<View> {
        if self.building.replace(true) {
            return Err(Error::Recursion(format!("`{}` is already being built", self.name)));
        }
        let global = Rc::new(Namespace::overlay(&self.module));
        for (name, value) in context {
            global.insert(name, value);
        }
        let result = self.build(global);
        log::debug!("{}: cleanup", self.name);
        self.root.cleanup();
        self.building.set(false);
        result
    }

    fn build(&self, global: Rc<Namespace>) -> Result<View> {
        log::debug!("{}: construct", self.name);
        let root = self.root.construct()?;
        log::debug!("{}: build_ns", self.name);
        self.root.build_ns(&global, None)?;
        log::debug!("{}: inject", self.name);
        self.root.inject(&global, &self.toolkit)?;
        log::debug!("{}: build_view", self.name);
        Ok(View::new(vec![root], global))
    }
}

impl fmt::Debug for EnamlFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnamlFactory").field("name", &self.name).field("root", &self.root).finish_non_exhaustive()
    }
}

fn required(toolkit: &Rc<dyn Toolkit>, class: &str, wrapping: &str) -> Result<Rc<ClassDef>> {
    toolkit.constructor(class).ok_or_else(|| {
        Error::Toolkit(format!("toolkit `{}` has no {class} to wrap `{wrapping}` in", toolkit.name()))
    })
}
