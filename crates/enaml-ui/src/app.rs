use std::rc::Rc;

use enaml_runtime::{Error, Module, Operator, Result, Toolkit, Value};

use crate::compiler::{CompiledModule, Compiler};
use crate::toolkit::headless;
use crate::view::View;

// ── Application ───────────────────────────────────────────────────────────

/// Top-level embedding API.
///
/// Configure the toolkit, importable modules, operators and context values,
/// then build a view from `.enaml` source or [`run`](Self::run) it.
///
/// ```rust
/// use enaml_runtime::{ClassDef, Value};
/// use enaml_ui::Application;
///
/// let model = ClassDef::model("Model").instantiate();
/// model.set("count", Value::Int(5)).unwrap();
///
/// let view = Application::new()
///     .context("model", Value::Object(model.clone()))
///     .build("Window:\n    Field f:\n        value := model.count\n", None)
///     .unwrap();
///
/// let field = view.object("f").unwrap();
/// assert_eq!(field.get("value").unwrap(), Value::Int(5));
/// field.set("value", Value::Int(9)).unwrap();
/// assert_eq!(model.get("count").unwrap(), Value::Int(9));
/// ```
pub struct Application {
    compiler: Compiler,
    context:  Vec<(String, Value)>,
}

impl Application {
    /// An application on the headless toolkit.
    pub fn new() -> Self {
        Self { compiler: Compiler::new(Rc::new(headless())), context: Vec::new() }
    }

    pub fn toolkit(mut self, toolkit: impl Toolkit + 'static) -> Self {
        self.compiler = self.compiler.with_toolkit(Rc::new(toolkit));
        self
    }

    /// Makes `module` importable from `.enaml` source.
    pub fn module(mut self, module: Module) -> Self {
        self.compiler = self.compiler.module(module);
        self
    }

    /// A value every expression can see by `name`.
    pub fn context(mut self, name: impl Into<String>, value: Value) -> Self {
        self.context.push((name.into(), value));
        self
    }

    /// Registers a binding operator by symbol or translated name.
    pub fn operator(mut self, name: impl Into<String>, operator: Operator) -> Self {
        self.compiler = self.compiler.operator(name, operator);
        self
    }

    pub fn toolkit_ref(&self) -> &Rc<dyn Toolkit> {
        self.compiler.toolkit()
    }

    pub fn compile(&self, source: &str) -> Result<CompiledModule> {
        let module = enaml_syntax::parse_str(source)?;
        self.compiler.compile(&module)
    }

    /// Builds `component`, or the last declared one when `None`.
    pub fn build(&self, source: &str, component: Option<&str>) -> Result<View> {
        let module = self.compile(source)?;
        let name = match component {
            Some(name) => name.to_string(),
            None => module
                .last_factory()
                .map(|f| f.name().to_string())
                .ok_or_else(|| Error::Name("the module declares no components".into()))?,
        };
        log::debug!("building `{name}`");
        module.instantiate(&name, self.context.clone())
    }

    /// Primes the event loop, builds and shows the view, then runs the
    /// loop until it returns.
    pub fn run(&self, source: &str, component: Option<&str>) -> Result<View> {
        let toolkit = Rc::clone(self.compiler.toolkit());
        toolkit.prime_event_loop()?;
        let view = self.build(source, component)?;
        view.show()?;
        toolkit.start_event_loop()?;
        Ok(view)
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enaml_runtime::toolkit::EventLoop;
    use enaml_runtime::{ErrorKind, ToolkitRegistry};
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl EventLoop for Recorder {
        fn prime(&self) -> Result<()> {
            self.0.borrow_mut().push("prime");
            Ok(())
        }

        fn start(&self) -> Result<()> {
            self.0.borrow_mut().push("start");
            Ok(())
        }
    }

    #[test]
    fn run_primes_shows_and_starts() {
        let recorder = Recorder::default();
        let mut builder = ToolkitRegistry::builder("recording").event_loop(recorder.clone());
        for class in crate::widgets::all() {
            builder = builder.constructor(class);
        }
        let view = Application::new().toolkit(builder.build()).run("Window:\n    title = 'x'\n", None).unwrap();
        assert_eq!(*recorder.0.borrow(), vec!["prime", "start"]);
        assert_eq!(view.root().unwrap().get("visible").unwrap(), Value::Bool(true));
    }

    #[test]
    fn build_picks_the_last_component_by_default() {
        let view = Application::new().build("Window first:\n    pass\nDialog second:\n    pass\n", None).unwrap();
        assert_eq!(view.root().unwrap().type_name(), "Dialog");
        let view = Application::new().build("Window first:\n    pass\nDialog second:\n    pass\n", Some("first")).unwrap();
        assert_eq!(view.root().unwrap().type_name(), "Window");
    }

    #[test]
    fn empty_modules_have_nothing_to_build() {
        let err = Application::new().build("import math\n", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
    }

    #[test]
    fn syntax_errors_pass_through() {
        let err = Application::new().build("Window:\nField:\n", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.line().is_some());
    }

    #[test]
    fn modules_can_be_registered() {
        let units = Module::new("units").with("GAP", Value::Int(12));
        let view = Application::new()
            .module(units)
            .build("from units import GAP\nVGroup:\n    spacing = GAP\n", None)
            .unwrap();
        let group = view.root().unwrap().children()[0].clone();
        assert_eq!(group.get("spacing").unwrap(), Value::Int(12));
    }
}
