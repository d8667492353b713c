//! The toolkit seam: where component constructors, binding operators and
//! helper functions come from, and who owns the event loop.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::class::ClassDef;
use crate::error::Result;
use crate::operator::{standard_operators, Operator, OperatorFunction};
use crate::value::Value;

/// One thing a toolkit can provide under a name.
#[derive(Clone)]
pub enum ToolkitEntry {
    Constructor(Rc<ClassDef>),
    Operator(Operator),
    Util(Value),
}

impl ToolkitEntry {
    /// The entry as an expression-level value. Operators become callables
    /// that take `(object, attr, code, globals, locals)`.
    pub fn into_value(self, name: &str, toolkit: &Rc<dyn Toolkit>) -> Value {
        match self {
            ToolkitEntry::Constructor(class) => Value::Class(class),
            ToolkitEntry::Operator(op) => Value::function(OperatorFunction::new(name, op, Rc::clone(toolkit))),
            ToolkitEntry::Util(value) => value,
        }
    }
}

impl fmt::Debug for ToolkitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolkitEntry::Constructor(class) => write!(f, "Constructor({})", class.name()),
            ToolkitEntry::Operator(op) => write!(f, "Operator({op:?})"),
            ToolkitEntry::Util(value) => write!(f, "Util({value:?})"),
        }
    }
}

/// A widget toolkit as the runtime sees it.
pub trait Toolkit {
    fn name(&self) -> &str;

    fn constructor(&self, name: &str) -> Option<Rc<ClassDef>>;

    /// Looks an operator up by its translated name, e.g. `__operator_Equal__`.
    fn operator(&self, name: &str) -> Option<Operator>;

    fn util(&self, name: &str) -> Option<Value>;

    /// Constructors first, then operators, then utils.
    fn lookup(&self, name: &str) -> Option<ToolkitEntry> {
        self.constructor(name)
            .map(ToolkitEntry::Constructor)
            .or_else(|| self.operator(name).map(ToolkitEntry::Operator))
            .or_else(|| self.util(name).map(ToolkitEntry::Util))
    }

    fn prime_event_loop(&self) -> Result<()>;

    fn start_event_loop(&self) -> Result<()>;
}

/// Resolves `name` against `toolkit` as a value, for expression scopes.
pub fn lookup_value(toolkit: &Rc<dyn Toolkit>, name: &str) -> Option<Value> {
    toolkit.lookup(name).map(|entry| entry.into_value(name, toolkit))
}

// ── Event loop ────────────────────────────────────────────────────────────

/// Drives a toolkit's main loop.
pub trait EventLoop {
    fn prime(&self) -> Result<()>;

    fn start(&self) -> Result<()>;
}

/// An event loop with nothing to wait for. Starting it returns at once.
#[derive(Debug, Default)]
pub struct NullEventLoop;

impl EventLoop for NullEventLoop {
    fn prime(&self) -> Result<()> {
        log::debug!("event loop primed");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        log::info!("event loop started with nothing to run; returning");
        Ok(())
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

/// A toolkit assembled from tables.
///
/// ```
/// use enaml_runtime::{ClassDef, Role, Toolkit, ToolkitRegistry};
///
/// let toolkit = ToolkitRegistry::builder("demo")
///     .constructor(ClassDef::build("Label", Role::Element).finish())
///     .build();
/// assert!(toolkit.constructor("Label").is_some());
/// assert!(toolkit.operator("__operator_LessLess__").is_some());
/// ```
pub struct ToolkitRegistry {
    name: String,
    constructors: BTreeMap<String, Rc<ClassDef>>,
    operators: BTreeMap<String, Operator>,
    utils: BTreeMap<String, Value>,
    event_loop: Box<dyn EventLoop>,
}

impl ToolkitRegistry {
    /// Starts a registry that already knows the four standard operators.
    pub fn builder(name: impl Into<String>) -> ToolkitBuilder {
        ToolkitBuilder {
            registry: ToolkitRegistry {
                name: name.into(),
                constructors: BTreeMap::new(),
                operators: standard_operators().into_iter().collect(),
                utils: BTreeMap::new(),
                event_loop: Box::new(NullEventLoop),
            },
        }
    }

    pub fn constructor_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Toolkit for ToolkitRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn constructor(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.constructors.get(name).cloned()
    }

    fn operator(&self, name: &str) -> Option<Operator> {
        self.operators.get(name).cloned()
    }

    fn util(&self, name: &str) -> Option<Value> {
        self.utils.get(name).cloned()
    }

    fn prime_event_loop(&self) -> Result<()> {
        self.event_loop.prime()
    }

    fn start_event_loop(&self) -> Result<()> {
        log::debug!("starting the `{}` event loop", self.name);
        self.event_loop.start()
    }
}

impl fmt::Debug for ToolkitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolkitRegistry")
            .field("name", &self.name)
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .field("utils", &self.utils.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub struct ToolkitBuilder {
    registry: ToolkitRegistry,
}

impl ToolkitBuilder {
    /// Registers a constructor under its class name.
    pub fn constructor(mut self, class: Rc<ClassDef>) -> Self {
        self.registry.constructors.insert(class.name().to_string(), class);
        self
    }

    /// Registers an operator under its translated name. Replaces any
    /// earlier operator of that name, standard ones included.
    pub fn operator(mut self, name: impl Into<String>, op: Operator) -> Self {
        self.registry.operators.insert(name.into(), op);
        self
    }

    pub fn util(mut self, name: impl Into<String>, value: Value) -> Self {
        self.registry.utils.insert(name.into(), value);
        self
    }

    pub fn event_loop(mut self, event_loop: impl EventLoop + 'static) -> Self {
        self.registry.event_loop = Box::new(event_loop);
        self
    }

    pub fn build(self) -> ToolkitRegistry {
        log::debug!(
            "toolkit `{}`: {} constructors, {} operators, {} utils",
            self.registry.name,
            self.registry.constructors.len(),
            self.registry.operators.len(),
            self.registry.utils.len()
        );
        self.registry
    }
}
