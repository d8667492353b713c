//! `defn` blocks: parameterised component factories compiled to VM code.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use enaml_runtime::{Callable, CompiledExpr, Error, Namespace, ObjectRef, Result, Scope, Toolkit, Value};
use enaml_syntax::ast::{Argument, AssignTarget, Assignment, Call, CallItem, Defn};
use enaml_syntax::expr::Expr;

use crate::view::View;
use crate::vm::{self, Instr, ItemKey};

// ── Definition ────────────────────────────────────────────────────────────

/// A compiled `defn`. Calling it runs its body in the VM against a fresh
/// locals namespace built from the arguments.
pub struct EnamlDefinition {
    name: String,
    doc: Option<String>,
    code: Vec<Instr>,
    params: Vec<String>,
    defaults: Vec<Value>,
    globals: Weak<Namespace>,
    toolkit: Rc<dyn Toolkit>,
}

impl EnamlDefinition {
    /// Compiles `defn`, evaluating its default values once, in the module
    /// namespace.
    pub fn compile(defn: &Defn, globals: &Rc<Namespace>, toolkit: &Rc<dyn Toolkit>) -> Result<Self> {
        let scope = Scope::module(Rc::clone(globals), Rc::clone(toolkit));
        let defaults = defn
            .params
            .defaults
            .iter()
            .map(|expr| CompiledExpr::new(expr.clone()).evaluate(&scope))
            .collect::<Result<Vec<_>>>()?;
        let code = BodyCompiler::compile(&defn.params.names, &defn.body);
        log::debug!("compiled defn {} to {} instructions", defn.name, code.len());
        Ok(Self {
            name: defn.name.clone(),
            doc: defn.doc.clone(),
            code,
            params: defn.params.names.clone(),
            defaults,
            globals: Rc::downgrade(globals),
            toolkit: Rc::clone(toolkit),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    /// Builds the view the definition describes.
    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<View> {
        let (components, ns) = self.run(args, kwargs)?;
        Ok(View::new(components, ns))
    }

    fn run(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<(Vec<ObjectRef>, Rc<Namespace>)> {
        let globals = self
            .globals
            .upgrade()
            .ok_or_else(|| Error::Value(format!("the module defining {}() has been dropped", self.name)))?;
        let locals = Rc::new(self.build_locals(args, kwargs)?);
        let components = vm::run(&self.code, &globals, &locals, &self.toolkit)?;
        Ok((components, locals))
    }

    /// The initial locals of a call, checked the way function calls are.
    fn build_locals(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Namespace> {
        let name = &self.name;
        let n_params = self.params.len();
        let n_defaults = self.defaults.len();
        let n_required = n_params - n_defaults;
        let n_args = args.len();
        let n_supplied = n_args + kwargs.len();

        if n_params > 0 && n_defaults == 0 && n_supplied != n_params {
            return Err(Error::Type(format!("{name}() takes exactly {n_params} arguments ({n_supplied} given)")));
        } else if n_supplied < n_required {
            return Err(Error::Type(format!("{name}() requires at least {n_required} arguments ({n_supplied} given)")));
        } else if n_supplied > n_params {
            return Err(Error::Type(format!("{name}() takes at most {n_params} arguments ({n_supplied} given)")));
        }

        let locals = Namespace::new();
        let mut bound: BTreeSet<&str> = BTreeSet::new();
        for (param, value) in self.params.iter().zip(args) {
            bound.insert(param.as_str());
            locals.insert(param.as_str(), value);
        }
        for (key, value) in kwargs {
            let Some(param) = self.params.iter().find(|p| **p == key) else {
                return Err(Error::Type(format!("{name}() got an unexpected keyword argument `{key}`")));
            };
            if !bound.insert(param.as_str()) {
                return Err(Error::Type(format!("{name}() got multiple values for keyword `{key}`")));
            }
            locals.insert(key, value);
        }
        for (param, value) in self.params[n_required..].iter().zip(&self.defaults) {
            if !bound.contains(param.as_str()) {
                locals.insert(param.as_str(), value.clone());
            }
        }
        Ok(locals)
    }
}

impl Callable for EnamlDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value> {
        let (components, _) = self.run(args, kwargs)?;
        Ok(Value::tuple(components.into_iter().map(Value::Object)))
    }

    fn enaml_call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<(Vec<ObjectRef>, Rc<Namespace>)> {
        self.run(args, kwargs)
    }
}

impl fmt::Debug for EnamlDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnamlDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("instructions", &self.code.len())
            .finish_non_exhaustive()
    }
}

// ── Body compiler ─────────────────────────────────────────────────────────

/// Hands out `_Name_0`, `_Name_1`, ... for anonymous calls.
#[derive(Default)]
struct Mangler {
    counts: HashMap<String, usize>,
}

impl Mangler {
    fn mangle(&mut self, name: &str) -> String {
        let n = self.counts.entry(name.to_string()).or_insert(0);
        let mangled = format!("_{name}_{n}");
        *n += 1;
        mangled
    }
}

/// Lowers a `defn` body to VM instructions.
///
/// Names bound so far (parameters, unpacked results and captures) load
/// from the locals; everything else loads from the globals.
struct BodyCompiler {
    mangler: Mangler,
    local_names: BTreeSet<String>,
    code: Vec<Instr>,
}

impl BodyCompiler {
    fn compile(params: &[String], body: &[CallItem]) -> Vec<Instr> {
        let mut compiler = BodyCompiler {
            mangler: Mangler::default(),
            local_names: params.iter().cloned().collect(),
            code: Vec::new(),
        };
        for item in body {
            compiler.item(item);
        }
        compiler.code
    }

    fn item(&mut self, item: &CallItem) {
        match item {
            CallItem::Call(call) => self.call(call),
            CallItem::Assignment(assignment) => self.assignment(assignment),
        }
    }

    fn load(&self, name: &str) -> Instr {
        if self.local_names.contains(name) {
            Instr::LoadLocal(name.to_string())
        } else {
            Instr::LoadGlobal(name.to_string())
        }
    }

    fn store(&mut self, name: &str) {
        self.code.push(Instr::StoreLocal(name.to_string()));
        self.local_names.insert(name.to_string());
    }

    fn call(&mut self, call: &Call) {
        // The parent sequence is both the children's target and part of
        // what the enclosing call returns.
        self.code.push(Instr::DupTop);
        let callee = self.load(&call.name);
        self.code.push(callee);

        let (mut n_args, mut n_kwargs) = (0, 0);
        for argument in &call.arguments {
            match argument {
                Argument::Positional(expr) => {
                    n_args += 1;
                    self.code.push(Instr::LoadConst(code_value(expr)));
                }
                Argument::Keyword(name, expr) => {
                    n_kwargs += 1;
                    self.code.push(Instr::LoadConst(Value::str(name)));
                    self.code.push(Instr::LoadConst(code_value(expr)));
                }
            }
            self.code.push(Instr::Eval);
        }
        self.code.push(Instr::EnamlCall { args: n_args, kwargs: n_kwargs });

        // | parent | components | namespace
        for capture in &call.captures {
            self.code.push(Instr::DupTop);
            if let Some(name) = &capture.name {
                self.code.push(Instr::GetItem(ItemKey::Name(name.clone())));
            }
            self.store(&capture.alias);
        }
        self.code.push(Instr::PopTop);

        self.code.push(Instr::DupTop);
        let unpack = match call.unpack.as_slice() {
            [] => vec![self.mangler.mangle(&call.name)],
            names => names.to_vec(),
        };
        self.code.push(Instr::UnpackSequence(unpack.len()));
        for name in &unpack {
            self.store(name);
        }

        for item in &call.body {
            self.item(item);
        }
        self.code.push(Instr::EnamlAddChildren);
    }

    fn assignment(&mut self, assignment: &Assignment) {
        let code = code_value(&assignment.rhs);
        let op = &assignment.op.name;
        match &assignment.target {
            AssignTarget::Name(attr) => {
                self.code.push(Instr::DupTop);
                self.code.push(Instr::GetIter);
                let body = self.binding(op, attr, code);
                let loop_start = self.code.len();
                self.code.push(Instr::ForIter(loop_start + body.len() + 2));
                self.code.extend(body);
                self.code.push(Instr::JumpAbsolute(loop_start));
            }
            AssignTarget::Attr { name, attr } => {
                self.code.push(Instr::LoadLocal(name.clone()));
                let body = self.binding(op, attr, code);
                self.code.extend(body);
            }
            AssignTarget::Index { name, index, attr } => {
                self.code.push(Instr::LoadLocal(name.clone()));
                self.code.push(Instr::GetItem(ItemKey::Index(*index)));
                let body = self.binding(op, attr, code);
                self.code.extend(body);
            }
        }
    }

    /// Applies operator `op` to the object on top of the stack. The
    /// operator is called as `op(obj, attr, code, globals, locals)`.
    fn binding(&self, op: &str, attr: &str, code: Value) -> Vec<Instr> {
        vec![
            self.load(op),
            Instr::RotTwo,
            Instr::LoadConst(Value::str(attr)),
            Instr::LoadConst(code),
            Instr::LoadGlobalsClosure,
            Instr::LoadLocalsClosure,
            Instr::Call { args: 5, kwargs: 0 },
            Instr::PopTop,
        ]
    }
}

fn code_value(expr: &Expr) -> Value {
    Value::Code(Rc::new(CompiledExpr::new(expr.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless;
    use enaml_runtime::{ClassDef, ErrorKind};
    use enaml_syntax::parse_str;
    use pretty_assertions::assert_eq;

    struct Fixture {
        globals: Rc<Namespace>,
        toolkit: Rc<dyn Toolkit>,
    }

    impl Fixture {
        fn new() -> Self {
            Self { globals: Rc::new(Namespace::new()), toolkit: Rc::new(headless()) }
        }

        fn define(&self, src: &str) -> EnamlDefinition {
            let module = parse_str(src).unwrap();
            let defn = module.defns().next().unwrap();
            EnamlDefinition::compile(defn, &self.globals, &self.toolkit).unwrap()
        }
    }

    #[test]
    fn mangled_names_count_per_type() {
        let mut mangler = Mangler::default();
        assert_eq!(mangler.mangle("Panel"), "_Panel_0");
        assert_eq!(mangler.mangle("Panel"), "_Panel_1");
        assert_eq!(mangler.mangle("Foo"), "_Foo_0");
    }

    #[test]
    fn call_builds_a_view() {
        let fx = Fixture::new();
        let defn = fx.define(
            "defn LabeledField(label, value=0):\n    'A label over a field.'\n    VGroup:\n        Label:\n            text = label\n        Field -> f:\n            value = value\n",
        );
        assert_eq!(defn.doc(), Some("A label over a field."));
        let view = defn.call(vec![Value::str("Age")], vec![]).unwrap();
        let group = view.root().unwrap();
        assert_eq!(group.type_name(), "VGroup");
        let children = group.children();
        assert_eq!(children[0].get("text").unwrap(), Value::str("Age"));
        assert_eq!(children[1].get("value").unwrap(), Value::Int(0));
        assert!(view.object("f").unwrap().ptr_eq(&children[1]));
        assert!(view.object("_VGroup_0").unwrap().ptr_eq(group));
        assert!(view.object("_Label_0").is_some());
    }

    #[test]
    fn anonymous_bindings_apply_to_every_result() {
        let fx = Fixture::new();
        let pair = fx.define("defn Pair():\n    Label\n    Label\n");
        fx.globals.insert("Pair", Value::function(pair));
        let outer = fx.define("defn Outer():\n    Container:\n        Pair() -> a, b:\n            text = 'same'\n        b.text = 'b'\n");
        let view = outer.call(vec![], vec![]).unwrap();
        let labels = view.root().unwrap().children();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].get("text").unwrap(), Value::str("same"));
        assert_eq!(labels[1].get("text").unwrap(), Value::str("b"));
    }

    #[test]
    fn captures_read_the_callee_namespace() {
        let fx = Fixture::new();
        let inner = fx.define("defn Inner():\n    Field -> field\n");
        fx.globals.insert("Inner", Value::function(inner));
        let outer = fx.define(
            "defn Outer():\n    Container:\n        Inner() -> field as f, * as ns:\n            pass\n        Label:\n            text << str(f.value)\n",
        );
        let view = outer.call(vec![], vec![]).unwrap();
        let field = view.object("f").unwrap();
        assert_eq!(field.type_name(), "Field");
        field.set("value", Value::Int(3)).unwrap();
        let label = &view.root().unwrap().children()[1];
        assert_eq!(label.get("text").unwrap(), Value::str("3"));
        let Some(Value::Namespace(ns)) = view.find("ns") else { panic!("`ns` was not captured") };
        assert!(ns.get("field").unwrap().as_object().unwrap().ptr_eq(&field));
    }

    #[test]
    fn indexed_and_attribute_targets() {
        let fx = Fixture::new();
        let pair = fx.define("defn Pair():\n    Label\n    Label\n");
        fx.globals.insert("Pair", Value::function(pair));
        let outer = fx.define("defn Outer():\n    Container:\n        Pair() -> both:\n            both[-1].text = 'last'\n");
        let view = outer.call(vec![], vec![]).unwrap();
        let labels = view.root().unwrap().children();
        assert_eq!(labels[0].get("text").unwrap(), Value::str(""));
        assert_eq!(labels[1].get("text").unwrap(), Value::str("last"));
    }

    #[test]
    fn defaults_are_evaluated_once_in_the_module() {
        let fx = Fixture::new();
        fx.globals.insert("START", Value::Int(4));
        let defn = fx.define("defn Counter(n=START * 2):\n    SpinBox:\n        value = n\n");
        fx.globals.insert("START", Value::Int(100));
        let view = defn.call(vec![], vec![]).unwrap();
        assert_eq!(view.root().unwrap().get("value").unwrap(), Value::Int(8));
    }

    #[test]
    fn argument_checking() {
        let fx = Fixture::new();
        let exact = fx.define("defn A(x, y):\n    pass\n");
        let err = exact.call(vec![Value::Int(1)], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: A() takes exactly 2 arguments (1 given)");

        let ranged = fx.define("defn B(x, y=1):\n    pass\n");
        assert_eq!(
            ranged.call(vec![], vec![]).unwrap_err().to_string(),
            "TypeError: B() requires at least 1 arguments (0 given)"
        );
        assert_eq!(
            ranged.call(vec![Value::Int(1); 3], vec![]).unwrap_err().to_string(),
            "TypeError: B() takes at most 2 arguments (3 given)"
        );
        assert_eq!(
            ranged.call(vec![Value::Int(1)], vec![("z".into(), Value::Int(2))]).unwrap_err().to_string(),
            "TypeError: B() got an unexpected keyword argument `z`"
        );
        assert_eq!(
            ranged.call(vec![Value::Int(1)], vec![("x".into(), Value::Int(2))]).unwrap_err().to_string(),
            "TypeError: B() got multiple values for keyword `x`"
        );
        assert!(ranged.call(vec![], vec![("x".into(), Value::Int(2))]).is_ok());
    }

    #[test]
    fn operators_resolve_locally_first() {
        let fx = Fixture::new();
        let defn = fx.define("defn A(__operator_Equal__):\n    Label:\n        text = 'ignored'\n");
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let op = enaml_runtime::NativeFunction::value("op", move |args, _| {
            log.borrow_mut().push(args[1].clone());
            Ok(Value::None)
        });
        let view = defn.call(vec![op], vec![]).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::str("text")]);
        assert_eq!(view.root().unwrap().get("text").unwrap(), Value::str(""));
    }

    #[test]
    fn models_passed_in_are_bindable() {
        let fx = Fixture::new();
        let defn = fx.define("defn Counter(model):\n    Label:\n        text << 'n=%d' % model.count\n");
        let model = ClassDef::model("Model").instantiate();
        model.set("count", Value::Int(1)).unwrap();
        let view = defn.call(vec![Value::Object(model.clone())], vec![]).unwrap();
        model.set("count", Value::Int(2)).unwrap();
        assert_eq!(view.root().unwrap().get("text").unwrap(), Value::str("n=2"));
    }

    #[test]
    fn unknown_names_fail_at_call_time() {
        let fx = Fixture::new();
        let defn = fx.define("defn A():\n    Nope\n");
        assert_eq!(defn.call(vec![], vec![]).unwrap_err().kind(), ErrorKind::Name);
    }

    #[test]
    fn dropped_module_is_reported() {
        let fx = Fixture::new();
        let defn = fx.define("defn A():\n    Label\n");
        drop(fx.globals);
        let err = defn.call(vec![], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: the module defining A() has been dropped");
    }
}
