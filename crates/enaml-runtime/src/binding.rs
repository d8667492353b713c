//! The four standard bindings.
//!
//! A [`BindingFactory`] is created once per binding expression at compile
//! time. Each call to [`BindingFactory::bind`] attaches a fresh binding
//! instance to one object, so two objects built from the same definition
//! never share state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use enaml_syntax::BindingKind;

use crate::class::Role;
use crate::code::CompiledExpr;
use crate::error::{Error, Result};
use crate::namespace::Scope;
use crate::object::{ChangeEvent, ChangeListener, Interceptor, ObjectRef, WeakObject};
use crate::value::Value;

/// Creates binding instances for one compiled expression.
#[derive(Clone)]
pub struct BindingFactory {
    kind: BindingKind,
    code: Rc<CompiledExpr>,
}

impl BindingFactory {
    pub fn new(kind: BindingKind, code: Rc<CompiledExpr>) -> Self {
        Self { kind, code }
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn code(&self) -> &Rc<CompiledExpr> {
        &self.code
    }

    /// Attaches a new binding instance to `obj.attr`, evaluating in `scope`.
    pub fn bind(&self, obj: &ObjectRef, attr: &str, scope: Scope) -> Result<()> {
        log::debug!("binding {}.{attr} {} (line {})", obj.type_name(), self.kind, self.code.line());
        let code = Rc::clone(&self.code);
        match self.kind {
            BindingKind::Default => {
                obj.intercept(attr, Rc::new(LazyValue::new(code, scope)))?;
            }
            BindingKind::Bind => {
                let binding = Rc::new(Subscription {
                    owner: obj.downgrade(),
                    attr: attr.to_string(),
                    value: LazyValue::new(code, scope),
                });
                obj.intercept(attr, Rc::clone(&binding) as Rc<dyn Interceptor>)?;
                binding.subscribe(obj)?;
            }
            BindingKind::Delegate => {
                let binding = Delegation::resolve(obj, attr, &code, &scope)?;
                let target = binding.target.get().ok_or_else(|| dangling(&binding.target_attr))?;
                obj.intercept(attr, Rc::clone(&binding) as Rc<dyn Interceptor>)?;
                let weak = Rc::downgrade(&binding) as std::rc::Weak<dyn ChangeListener>;
                target.observe_weak(&binding.target_attr, weak);
            }
            BindingKind::Notify => {
                if !obj.has_attr(attr) {
                    return Err(Error::Attribute(format!(
                        "`{attr}` is not an attribute on the {} object",
                        obj.type_name()
                    )));
                }
                let notifier = Notifier { code, scope };
                obj.on_change(attr, move |event| notifier.run(event));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BindingFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingFactory").field("kind", &self.kind).field("code", &self.code).finish()
    }
}

/// Nested reads or writes through one delegation beyond this are a cycle.
const MAX_DELEGATION_DEPTH: usize = 16;

fn dangling(attr: &str) -> Error {
    Error::Value(format!("the delegate target of `{attr}` no longer exists"))
}

/// Counts nested entries into one binding instance. Dropping it leaves.
struct Reentry<'a>(&'a Cell<usize>);

impl<'a> Reentry<'a> {
    fn enter(depth: &'a Cell<usize>, limit: usize, message: impl FnOnce() -> String) -> Result<Self> {
        if depth.get() >= limit {
            return Err(Error::Recursion(message()));
        }
        depth.set(depth.get() + 1);
        Ok(Self(depth))
    }
}

impl Drop for Reentry<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

// ── Default ───────────────────────────────────────────────────────────────

/// `=`: computed on first read, then plain storage.
///
/// A read that reaches the same value again while it is being computed is a
/// dependency cycle and fails with [`Error::Recursion`].
struct LazyValue {
    code: Rc<CompiledExpr>,
    scope: Scope,
    value: RefCell<Option<Value>>,
    evaluating: Cell<usize>,
}

impl LazyValue {
    fn new(code: Rc<CompiledExpr>, scope: Scope) -> Self {
        Self { code, scope, value: RefCell::new(None), evaluating: Cell::new(0) }
    }
}

impl Interceptor for LazyValue {
    fn get(&self, obj: &ObjectRef, name: &str) -> Result<Value> {
        if let Some(value) = self.value.borrow().as_ref() {
            return Ok(value.clone());
        }
        let _entry = Reentry::enter(&self.evaluating, 1, || {
            format!("`{name}` of the {} object depends on itself", obj.type_name())
        })
        .map_err(|e| e.at_line(self.code.line()))?;
        let value = self.code.evaluate(&self.scope)?;
        let value = obj.validate(name, value).map_err(|e| e.at_line(self.code.line()))?;
        *self.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn set(&self, obj: &ObjectRef, name: &str, value: Value) -> Result<Option<(Value, Value)>> {
        let new = obj.validate(name, value)?;
        let old = self.value.replace(Some(new.clone())).unwrap_or(Value::None);
        Ok((old != new).then_some((old, new)))
    }
}

// ── Bind ──────────────────────────────────────────────────────────────────

/// `<<`: a lazy value that is recomputed when a dependency changes.
struct Subscription {
    owner: WeakObject,
    attr: String,
    value: LazyValue,
}

impl Subscription {
    fn subscribe(self: &Rc<Self>, owner: &ObjectRef) -> Result<()> {
        for dep in self.value.code.dependencies() {
            let root = self.value.scope.lookup(&dep.root).ok_or_else(|| {
                Error::Name(format!("`{}` is not defined or accessible in the namespace.", dep.root))
                    .at_line(self.value.code.line())
            })?;
            let Value::Object(target) = root else {
                continue;
            };
            let weak = Rc::downgrade(self) as std::rc::Weak<dyn ChangeListener>;
            target.observe_weak(&dep.attr, weak);
            log::trace!("{}.{} tracks {}.{}", owner.type_name(), self.attr, dep.root, dep.attr);
        }
        Ok(())
    }
}

impl Interceptor for Subscription {
    fn get(&self, obj: &ObjectRef, name: &str) -> Result<Value> {
        self.value.get(obj, name)
    }

    fn set(&self, obj: &ObjectRef, name: &str, value: Value) -> Result<Option<(Value, Value)>> {
        self.value.set(obj, name, value)
    }
}

impl ChangeListener for Subscription {
    fn changed(&self, _event: &ChangeEvent) -> Result<()> {
        let Some(owner) = self.owner.upgrade() else {
            return Ok(());
        };
        let value = self.value.code.evaluate(&self.value.scope)?;
        owner.set(&self.attr, value).map_err(|e| e.at_line(self.value.code.line()))
    }
}

// ── Delegate ──────────────────────────────────────────────────────────────

/// How a delegation holds its target: models strongly, components weakly.
enum Target {
    Strong(ObjectRef),
    Weak(WeakObject),
}

impl Target {
    fn new(obj: ObjectRef) -> Self {
        match obj.role() {
            Role::Model => Target::Strong(obj),
            _ => Target::Weak(obj.downgrade()),
        }
    }

    fn get(&self) -> Option<ObjectRef> {
        match self {
            Target::Strong(obj) => Some(obj.clone()),
            Target::Weak(weak) => weak.upgrade(),
        }
    }
}

/// `:=`: reads and writes go straight through to `target.target_attr`.
struct Delegation {
    owner: WeakObject,
    attr: String,
    target: Target,
    target_attr: String,
    /// Reads and writes in flight through this delegation.
    depth: Cell<usize>,
}

impl Delegation {
    fn resolve(obj: &ObjectRef, attr: &str, code: &CompiledExpr, scope: &Scope) -> Result<Rc<Self>> {
        let line = code.line();
        let (root, target_attr) = code.as_attribute_ref().ok_or_else(|| {
            Error::Type("can only delegate to an attribute of the form `name.attr`".into()).at_line(line)
        })?;
        let target = match scope.lookup(root) {
            Some(Value::Object(target)) => target,
            Some(other) => {
                return Err(Error::Type(format!(
                    "cannot delegate to `{root}.{target_attr}`: `{root}` is a {}, not an object",
                    other.type_name()
                ))
                .at_line(line));
            }
            None => {
                return Err(Error::Name(format!("`{root}` is not defined or accessible in the namespace."))
                    .at_line(line));
            }
        };
        if !target.has_attr(target_attr) {
            return Err(Error::Attribute(format!(
                "`{target_attr}` is not an attribute on the {} object",
                target.type_name()
            ))
            .at_line(line));
        }
        if target.ptr_eq(obj) && target_attr == attr {
            return Err(Error::Type(format!("`{attr}` cannot delegate to itself")).at_line(line));
        }
        Ok(Rc::new(Self {
            owner: obj.downgrade(),
            attr: attr.to_string(),
            target: Target::new(target),
            target_attr: target_attr.to_string(),
            depth: Cell::new(0),
        }))
    }
}

impl Delegation {
    /// Delegations that point back at each other never reach storage; the
    /// nesting bound turns that loop into an error.
    fn enter(&self, obj: &ObjectRef) -> Result<Reentry<'_>> {
        Reentry::enter(&self.depth, MAX_DELEGATION_DEPTH, || {
            format!(
                "`{}` of the {} object delegates back to itself through `{}`",
                self.attr,
                obj.type_name(),
                self.target_attr
            )
        })
    }
}

impl Interceptor for Delegation {
    fn get(&self, obj: &ObjectRef, name: &str) -> Result<Value> {
        let _entry = self.enter(obj)?;
        let target = self.target.get().ok_or_else(|| dangling(name))?;
        obj.validate(name, target.get(&self.target_attr)?)
    }

    fn set(&self, obj: &ObjectRef, name: &str, value: Value) -> Result<Option<(Value, Value)>> {
        let _entry = self.enter(obj)?;
        let value = obj.validate(name, value)?;
        let target = self.target.get().ok_or_else(|| dangling(name))?;
        target.set(&self.target_attr, value)?;
        // The change comes back through `changed`, which notifies the owner.
        Ok(None)
    }
}

impl ChangeListener for Delegation {
    fn changed(&self, event: &ChangeEvent) -> Result<()> {
        let Some(owner) = self.owner.upgrade() else {
            return Ok(());
        };
        let new = owner.validate(&self.attr, event.new.clone())?;
        owner.notify(&self.attr, event.old.clone(), new)
    }
}

// ── Notify ────────────────────────────────────────────────────────────────

/// `>>`: evaluated after every change, with the change bound to `msg`.
struct Notifier {
    code: Rc<CompiledExpr>,
    scope: Scope,
}

impl Notifier {
    fn run(&self, event: &ChangeEvent) -> Result<()> {
        let msg = Value::Message(Rc::new(event.clone()));
        let scope = self.scope.with_locals([("msg".to_string(), msg)]);
        self.code.evaluate(&scope).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassDef;
    use crate::namespace::Namespace;
    use crate::toolkit::{Toolkit, ToolkitRegistry};
    use crate::validator::Validator;
    use crate::ErrorKind;
    use enaml_syntax::parse_expr;
    use pretty_assertions::assert_eq;

    struct Fixture {
        scope: Scope,
        model: ObjectRef,
    }

    impl Fixture {
        fn new() -> Self {
            let toolkit: Rc<dyn Toolkit> = Rc::new(ToolkitRegistry::builder("t").build());
            let globals = Rc::new(Namespace::new());
            let model = ClassDef::build("Counter", Role::Model)
                .attr("count", Validator::Int, Value::Int(0))
                .attr("name", Validator::Str, Value::str("bob"))
                .event("bumped", Validator::Any)
                .finish()
                .instantiate();
            globals.insert("model", Value::Object(model.clone()));
            Self { scope: Scope::module(globals, toolkit), model }
        }

        fn field(&self) -> ObjectRef {
            ClassDef::build("Field", Role::Element)
                .attr("value", Validator::Any, Value::None)
                .attr("text", Validator::Str, Value::str(""))
                .attr("number", Validator::Int, Value::Int(0))
                .readonly("id", Validator::Int, Value::Int(7))
                .finish()
                .instantiate()
        }

        fn bind(&self, kind: BindingKind, obj: &ObjectRef, attr: &str, src: &str) -> Result<()> {
            let code = Rc::new(CompiledExpr::new(parse_expr(src).unwrap()));
            BindingFactory::new(kind, code).bind(obj, attr, self.scope.clone())
        }
    }

    fn global(fx: &Fixture, name: &str, value: Value) {
        fx.scope.globals.insert(name, value);
    }

    #[test]
    fn default_is_lazy_and_evaluated_once() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Default, &field, "number", "model.count + 1").unwrap();
        fx.model.set("count", Value::Int(4)).unwrap();
        assert_eq!(field.get("number").unwrap(), Value::Int(5));
        fx.model.set("count", Value::Int(10)).unwrap();
        assert_eq!(field.get("number").unwrap(), Value::Int(5));
    }

    #[test]
    fn default_set_stores_without_reevaluating() {
        let fx = Fixture::new();
        let field = fx.field();
        let evaluations = Rc::new(Cell::new(0));
        let counter = Rc::clone(&evaluations);
        global(
            &fx,
            "tick",
            crate::callable::NativeFunction::value("tick", move |_, _| {
                counter.set(counter.get() + 1);
                Ok(Value::Int(1))
            }),
        );
        fx.bind(BindingKind::Default, &field, "number", "tick()").unwrap();
        field.set("number", Value::Int(3)).unwrap();
        assert_eq!(field.get("number").unwrap(), Value::Int(3));
        assert_eq!(evaluations.get(), 0);
    }

    #[test]
    fn default_validation_failure_surfaces_on_read() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Default, &field, "text", "42").unwrap();
        let err = field.get("text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn bind_recomputes_on_dependency_change() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Bind, &field, "text", "'%s has %d' % (model.name, model.count)").unwrap();
        assert_eq!(field.get("text").unwrap(), Value::str("bob has 0"));
        fx.model.set("count", Value::Int(2)).unwrap();
        assert_eq!(field.get("text").unwrap(), Value::str("bob has 2"));
        fx.model.set("name", Value::str("al")).unwrap();
        assert_eq!(field.get("text").unwrap(), Value::str("al has 2"));
    }

    #[test]
    fn bind_notifies_the_owner() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Bind, &field, "number", "model.count * 2").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        field.on_change("number", move |e| {
            sink.borrow_mut().push(e.new.clone());
            Ok(())
        });
        fx.model.set("count", Value::Int(3)).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::Int(6)]);
    }

    #[test]
    fn bind_to_unknown_root_is_a_name_error() {
        let fx = Fixture::new();
        let field = fx.field();
        let err = fx.bind(BindingKind::Bind, &field, "text", "ghost.name").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.root().to_string(), "NameError: `ghost` is not defined or accessible in the namespace.");
    }

    #[test]
    fn bind_listener_dies_with_the_owner() {
        let fx = Fixture::new();
        {
            let field = fx.field();
            fx.bind(BindingKind::Bind, &field, "number", "model.count").unwrap();
            assert_eq!(fx.model.observer_count("count"), 1);
        }
        assert_eq!(fx.model.observer_count("count"), 0);
        fx.model.set("count", Value::Int(1)).unwrap();
    }

    #[test]
    fn delegate_reads_and_writes_through() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Delegate, &field, "number", "model.count").unwrap();
        fx.model.set("count", Value::Int(5)).unwrap();
        assert_eq!(field.get("number").unwrap(), Value::Int(5));
        field.set("number", Value::Int(9)).unwrap();
        assert_eq!(fx.model.get("count").unwrap(), Value::Int(9));
    }

    #[test]
    fn delegate_notifies_once_per_change() {
        let fx = Fixture::new();
        let field = fx.field();
        fx.bind(BindingKind::Delegate, &field, "number", "model.count").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        field.on_change("number", move |e| {
            sink.borrow_mut().push((e.old.clone(), e.new.clone()));
            Ok(())
        });
        field.set("number", Value::Int(2)).unwrap();
        fx.model.set("count", Value::Int(3)).unwrap();
        assert_eq!(*seen.borrow(), vec![(Value::Int(0), Value::Int(2)), (Value::Int(2), Value::Int(3))]);
    }

    #[test]
    fn delegate_requires_an_attribute_reference() {
        let fx = Fixture::new();
        let field = fx.field();
        let err = fx.bind(BindingKind::Delegate, &field, "number", "model.count + 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(!field.is_intercepted("number"));
    }

    #[test]
    fn delegate_to_itself_is_rejected() {
        let fx = Fixture::new();
        let field = fx.field();
        global(&fx, "me", Value::Object(field.clone()));
        let err = fx.bind(BindingKind::Delegate, &field, "number", "me.number").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn delegates_pointing_at_each_other_fail_cleanly() {
        let fx = Fixture::new();
        let (a, b) = (fx.field(), fx.field());
        global(&fx, "a", Value::Object(a.clone()));
        global(&fx, "b", Value::Object(b.clone()));
        fx.bind(BindingKind::Delegate, &a, "number", "b.number").unwrap();
        fx.bind(BindingKind::Delegate, &b, "number", "a.number").unwrap();

        assert_eq!(a.set("number", Value::Int(1)).unwrap_err().kind(), ErrorKind::Recursion);
        assert_eq!(b.get("number").unwrap_err().kind(), ErrorKind::Recursion);
        // the nesting counters unwind, so the same error comes back
        assert_eq!(a.get("number").unwrap_err().kind(), ErrorKind::Recursion);
    }

    #[test]
    fn delegate_chains_still_reach_the_model() {
        let fx = Fixture::new();
        let (a, b) = (fx.field(), fx.field());
        global(&fx, "a", Value::Object(a.clone()));
        fx.bind(BindingKind::Delegate, &a, "number", "model.count").unwrap();
        fx.bind(BindingKind::Delegate, &b, "number", "a.number").unwrap();
        b.set("number", Value::Int(4)).unwrap();
        assert_eq!(fx.model.get("count").unwrap(), Value::Int(4));
        assert_eq!(a.get("number").unwrap(), Value::Int(4));
    }

    #[test]
    fn mutually_bound_values_report_recursion() {
        let fx = Fixture::new();
        let (a, b) = (fx.field(), fx.field());
        global(&fx, "a", Value::Object(a.clone()));
        global(&fx, "b", Value::Object(b.clone()));
        fx.bind(BindingKind::Bind, &a, "number", "b.number + 1").unwrap();
        fx.bind(BindingKind::Bind, &b, "number", "a.number + 1").unwrap();

        let err = a.get("number").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert!(err.root().to_string().contains("depends on itself"), "{err}");
        assert_eq!(b.get("number").unwrap_err().kind(), ErrorKind::Recursion);
    }

    #[test]
    fn default_reading_itself_is_a_cycle() {
        let fx = Fixture::new();
        let field = fx.field();
        global(&fx, "me", Value::Object(field.clone()));
        fx.bind(BindingKind::Default, &field, "number", "me.number + 1").unwrap();
        assert_eq!(field.get("number").unwrap_err().kind(), ErrorKind::Recursion);
        field.set("number", Value::Int(3)).unwrap();
        assert_eq!(field.get("number").unwrap(), Value::Int(3));
    }

    #[test]
    fn notifier_sees_msg_and_runs_every_change() {
        let fx = Fixture::new();
        let field = fx.field();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        global(
            &fx,
            "record",
            crate::callable::NativeFunction::value("record", move |args, _| {
                sink.borrow_mut().push(args[0].clone());
                Ok(Value::None)
            }),
        );
        fx.bind(BindingKind::Notify, &field, "text", "record((msg.name, msg.old, msg.new))").unwrap();
        field.set("text", Value::str("a")).unwrap();
        field.set("text", Value::str("b")).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                Value::tuple([Value::str("text"), Value::str(""), Value::str("a")]),
                Value::tuple([Value::str("text"), Value::str("a"), Value::str("b")]),
            ]
        );
    }

    #[test]
    fn notifier_can_watch_events() {
        let fx = Fixture::new();
        fx.bind(BindingKind::Notify, &fx.model, "bumped", "setattr(model, 'count', model.count + 1)").unwrap();
        fx.model.set("bumped", Value::Bool(true)).unwrap();
        fx.model.set("bumped", Value::Bool(true)).unwrap();
        assert_eq!(fx.model.get("count").unwrap(), Value::Int(2));
    }

    #[test]
    fn interceptors_refuse_readonly_and_rebinding() {
        let fx = Fixture::new();
        let field = fx.field();
        let err = fx.bind(BindingKind::Default, &field, "id", "1").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: cannot bind to the read-only attribute `id` of a Field object");
        fx.bind(BindingKind::Default, &field, "number", "1").unwrap();
        let err = fx.bind(BindingKind::Bind, &field, "number", "model.count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn runtime_errors_carry_the_line() {
        let fx = Fixture::new();
        let field = fx.field();
        let mut expr = parse_expr("1 // 0").unwrap();
        expr.set_locations(12, 5);
        BindingFactory::new(BindingKind::Default, Rc::new(CompiledExpr::new(expr)))
            .bind(&field, "number", fx.scope.clone())
            .unwrap();
        let err = field.get("number").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ZeroDivision);
        assert_eq!(err.line(), Some(12));
    }
}
