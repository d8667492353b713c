//! Compiles a parsed `.enaml` module against a toolkit.
//!
//! Module items run in source order: imports and raw python blocks fill the
//! module namespace, `defn` blocks become [`EnamlDefinition`]s stored in it,
//! and each top-level component becomes an [`EnamlFactory`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use enaml_runtime::eval::evaluate;
use enaml_runtime::operator::OperatorFunction;
use enaml_runtime::{
    Callable, CompiledExpr, Error, Module as RuntimeModule, ModuleRegistry, Namespace, Operator, Result, Scope, Toolkit, Value,
};
use enaml_syntax::ast::{Component, Item, Module, RawPython};
use enaml_syntax::expr::Stmt;
use enaml_syntax::operator::{translate_operator, OperatorRef};

use crate::constructor::{Constructor, ConstructorBinding, EnamlFactory};
use crate::defn::EnamlDefinition;
use crate::view::View;

// ── CompiledModule ────────────────────────────────────────────────────────

/// The result of compiling one module.
pub struct CompiledModule {
    ns: Rc<Namespace>,
    factories: Vec<Rc<EnamlFactory>>,
    definitions: Vec<Rc<EnamlDefinition>>,
}

impl CompiledModule {
    /// Imports, raw python results, definitions and operators.
    pub fn namespace(&self) -> &Rc<Namespace> {
        &self.ns
    }

    /// Top-level components in declaration order.
    pub fn factories(&self) -> &[Rc<EnamlFactory>] {
        &self.factories
    }

    /// The component declared under `name`, by identifier or else by type
    /// name. A later declaration shadows an earlier one.
    pub fn factory(&self, name: &str) -> Option<&Rc<EnamlFactory>> {
        self.factories.iter().rev().find(|f| f.name() == name)
    }

    pub fn last_factory(&self) -> Option<&Rc<EnamlFactory>> {
        self.factories.last()
    }

    pub fn definition(&self, name: &str) -> Option<&Rc<EnamlDefinition>> {
        self.definitions.iter().rev().find(|d| d.name() == name)
    }

    /// Builds the component or definition called `name`.
    ///
    /// A definition receives the context entries that match its parameter
    /// names as keyword arguments.
    pub fn instantiate(&self, name: &str, context: Vec<(String, Value)>) -> Result<View> {
        if let Some(factory) = self.factory(name) {
            return factory.call(context);
        }
        if let Some(defn) = self.definition(name) {
            let kwargs = context.into_iter().filter(|(k, _)| defn.params().contains(k)).collect();
            return defn.call(Vec::new(), kwargs);
        }
        Err(Error::Name(format!("no component named `{name}` in this module")))
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories: Vec<&str> = self.factories.iter().map(|f| f.name()).collect();
        let definitions: Vec<&str> = self.definitions.iter().map(|d| d.name()).collect();
        f.debug_struct("CompiledModule")
            .field("factories", &factories)
            .field("definitions", &definitions)
            .field("names", &self.ns.names())
            .finish()
    }
}

// ── Compiler ──────────────────────────────────────────────────────────────

/// Turns parsed modules into factories.
///
/// ```rust
/// use std::rc::Rc;
/// use enaml_ui::{headless, Compiler};
///
/// let module = enaml_syntax::parse_str("Window main:\n    title = 'Hi'\n").unwrap();
/// let compiled = Compiler::new(Rc::new(headless())).compile(&module).unwrap();
/// let view = compiled.instantiate("main", Vec::new()).unwrap();
/// assert_eq!(view.dump(), "Window main (title='Hi')\n");
/// ```
pub struct Compiler {
    toolkit: Rc<dyn Toolkit>,
    modules: ModuleRegistry,
    operators: BTreeMap<String, Operator>,
}

impl Compiler {
    pub fn new(toolkit: Rc<dyn Toolkit>) -> Self {
        Self { toolkit, modules: ModuleRegistry::new(), operators: BTreeMap::new() }
    }

    pub fn toolkit(&self) -> &Rc<dyn Toolkit> {
        &self.toolkit
    }

    /// Swaps the toolkit, keeping registered modules and operators.
    pub fn with_toolkit(mut self, toolkit: Rc<dyn Toolkit>) -> Self {
        self.toolkit = toolkit;
        self
    }

    /// Makes `module` importable.
    pub fn module(mut self, module: RuntimeModule) -> Self {
        self.modules.register(module);
        self
    }

    /// Registers an operator under its symbol (`<<<`) or its translated
    /// name (`__operator_LessLessLess__`). It takes precedence over the
    /// module namespace and the toolkit.
    pub fn operator(mut self, name: impl Into<String>, operator: Operator) -> Self {
        let name = name.into();
        let name = if name.starts_with("__operator_") { name } else { translate_operator(&name).unwrap_or(name) };
        self.operators.insert(name, operator);
        self
    }

    pub fn compile(&self, module: &Module) -> Result<CompiledModule> {
        let ns = Rc::new(Namespace::new());
        if let Some(doc) = &module.doc {
            ns.insert("__doc__", Value::str(doc));
        }
        // `defn` bodies load operators by name, so the registered ones must
        // be visible there too.
        for (name, operator) in &self.operators {
            let function = OperatorFunction::new(name.as_str(), operator.clone(), Rc::clone(&self.toolkit));
            ns.insert(name.as_str(), Value::function(function));
        }

        let mut factories = Vec::new();
        let mut definitions = Vec::new();
        for item in &module.body {
            match item {
                Item::Import(import) => self.modules.import(import, &ns)?,
                Item::RawPython(block) => self.exec(block, &ns)?,
                Item::Defn(defn) => {
                    let definition = Rc::new(EnamlDefinition::compile(defn, &ns, &self.toolkit).map_err(|e| e.at_line(defn.line))?);
                    ns.insert(defn.name.as_str(), Value::Function(Rc::clone(&definition) as Rc<dyn Callable>));
                    definitions.push(definition);
                }
                Item::Component(component) => {
                    let root = self.constructor(component, &ns)?;
                    let name = component.identifier.as_deref().unwrap_or(&component.name);
                    let factory = EnamlFactory::new(name, root, Rc::clone(&ns), Rc::clone(&self.toolkit))?;
                    log::debug!("compiled factory `{name}` (line {})", component.line);
                    factories.push(Rc::new(factory));
                }
            }
        }
        Ok(CompiledModule { ns, factories, definitions })
    }

    /// Runs a raw python block in the module namespace.
    fn exec(&self, block: &RawPython, ns: &Rc<Namespace>) -> Result<()> {
        let scope = Scope::module(Rc::clone(ns), Rc::clone(&self.toolkit));
        for stmt in &block.body {
            match stmt {
                Stmt::Assign { target, value, line } => {
                    let value = evaluate(value, &scope).map_err(|e| e.at_line(*line))?;
                    ns.insert(target.as_str(), value);
                }
                Stmt::Expr(expr) => {
                    evaluate(expr, &scope).map_err(|e| e.at_line(expr.line))?;
                }
                Stmt::Pass => {}
            }
        }
        Ok(())
    }

    fn constructor(&self, component: &Component, ns: &Namespace) -> Result<Constructor> {
        let class = self.toolkit.constructor(&component.name).ok_or_else(|| {
            Error::Value(format!("Toolkit does not support the {} item.", component.name)).at_line(component.line)
        })?;
        let mut ctor = Constructor::new(class, component.identifier.clone(), component.line);
        for expr in &component.body.expressions {
            let operator = self.resolve_operator(&expr.op, ns).map_err(|e| e.at_line(expr.line))?;
            ctor.push_binding(ConstructorBinding {
                target: expr.lhs.clone(),
                symbol: expr.op.symbol.clone(),
                operator,
                code: Rc::new(CompiledExpr::new(expr.rhs.clone())),
                line: expr.line,
            });
        }
        for child in &component.body.children {
            ctor.push_child(self.constructor(child, ns)?);
        }
        Ok(ctor)
    }

    /// Registered operators, then the module namespace, then the toolkit.
    fn resolve_operator(&self, op: &OperatorRef, ns: &Namespace) -> Result<Operator> {
        if let Some(operator) = self.operators.get(&op.name) {
            return Ok(operator.clone());
        }
        if let Some(value) = ns.get(&op.name) {
            return Ok(Operator::from_value(value));
        }
        self.toolkit
            .operator(&op.name)
            .ok_or_else(|| Error::OperatorLookup(format!("failed to load operator '{}' ( {} )", op.name, op.symbol)))
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("toolkit", &self.toolkit.name())
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless;
    use enaml_runtime::{ClassDef, ErrorKind};
    use enaml_syntax::parse_str;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn compile(src: &str) -> Result<CompiledModule> {
        Compiler::new(Rc::new(headless())).compile(&parse_str(src).unwrap())
    }

    #[test]
    fn factories_are_keyed_by_identifier_or_type() {
        let module = compile("Window main:\n    pass\nDialog:\n    pass\nWindow:\n    title = 'last'\n").unwrap();
        assert!(module.factory("main").is_some());
        assert!(module.factory("Dialog").is_some());
        assert_eq!(module.last_factory().unwrap().name(), "Window");
        assert!(module.factory("Missing").is_none());
    }

    #[test]
    fn unknown_type_names_the_type() {
        let err = compile("Window:\n    Frobnicator:\n        pass\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.root().to_string(), "ValueError: Toolkit does not support the Frobnicator item.");
    }

    #[test]
    fn unknown_operator_fails_at_compile_time() {
        let err = compile("Window:\n    title <<< 'x'\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperatorLookup);
        assert_eq!(
            err.root().to_string(),
            "OperatorLookupError: failed to load operator '__operator_LessLessLess__' ( <<< )"
        );
    }

    #[test]
    fn registered_operators_apply() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let compiler = Compiler::new(Rc::new(headless())).operator(
            "<<<",
            Operator::custom(move |call| {
                log.borrow_mut().push(format!("{}.{}", call.object.type_name(), call.attr));
                Ok(())
            }),
        );
        let module = compiler.compile(&parse_str("Window:\n    title <<< 'x'\n").unwrap()).unwrap();
        module.instantiate("Window", Vec::new()).unwrap();
        assert_eq!(*seen.borrow(), vec!["Window.title".to_string()]);
        assert!(module.namespace().get("__operator_LessLessLess__").is_some());
    }

    #[test]
    fn raw_python_and_imports_fill_the_namespace() {
        let src = "\
\"\"\"Demo module.\"\"\"
from math import sqrt
:: python ::
side = sqrt(16)
label = 'side: %d' % side
:: end ::
Window:
    title = label
";
        let module = compile(src).unwrap();
        assert_eq!(module.namespace().get("__doc__"), Some(Value::str("Demo module.")));
        assert_eq!(module.namespace().get("side"), Some(Value::Float(4.0)));
        let view = module.instantiate("Window", Vec::new()).unwrap();
        assert_eq!(view.root().unwrap().get("title").unwrap(), Value::str("side: 4"));
    }

    #[test]
    fn raw_python_errors_carry_their_line() {
        let err = compile(":: python ::\nx = 1\ny = missing\n:: end ::\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn missing_module_is_an_import_error() {
        let err = compile("import nosuch\n").unwrap_err();
        assert_eq!(err.root().to_string(), "ImportError: No module named nosuch");
    }

    #[test]
    fn definitions_are_stored_and_callable() {
        let module = compile("defn Greeting(who='world'):\n    Label:\n        text = 'hello ' + who\n").unwrap();
        assert!(matches!(module.namespace().get("Greeting"), Some(Value::Function(_))));
        let view = module
            .instantiate("Greeting", vec![("who".into(), Value::str("there")), ("model".into(), Value::None)])
            .unwrap();
        assert_eq!(view.root().unwrap().get("text").unwrap(), Value::str("hello there"));
    }

    #[test]
    fn module_level_operator_values_are_used() {
        let src = "\
:: python ::
__operator_LessLessLess__ = lambda obj, attr, code, g, l: setattr(obj, attr, 'tilde')
:: end ::
Window:
    title <<< 'ignored'
";
        let module = compile(src).unwrap();
        let view = module.instantiate("Window", Vec::new()).unwrap();
        assert_eq!(view.root().unwrap().get("title").unwrap(), Value::str("tilde"));
    }

    #[test]
    fn context_models_are_visible() {
        let module = compile("Label:\n    text << model.name\n").unwrap();
        let model = ClassDef::model("Person").instantiate();
        model.set("name", Value::str("Ada")).unwrap();
        let view = module.instantiate("Label", vec![("model".into(), Value::Object(model.clone()))]).unwrap();
        model.set("name", Value::str("Grace")).unwrap();
        let label = view.root().unwrap().children()[0].children()[0].clone();
        assert_eq!(label.get("text").unwrap(), Value::str("Grace"));
    }

    #[test]
    fn unknown_names_report_the_module() {
        let module = compile("Window:\n    pass\n").unwrap();
        let err = module.instantiate("Nope", Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "NameError: no component named `Nope` in this module");
    }
}
