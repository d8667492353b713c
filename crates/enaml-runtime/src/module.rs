//! Importable modules and the registry that resolves `import` items.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts;
use std::fmt;
use std::rc::Rc;

use enaml_syntax::ast::Import;

use crate::callable::{exact_args, NativeFunction};
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::value::Value;

/// A named, immutable table of values.
pub struct Module {
    name: String,
    entries: BTreeMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: BTreeMap::new() }
    }

    /// Adds an entry; used while assembling a module.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).cloned()
    }

    /// Public names, as bound by `from m import *`.
    pub fn public(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().filter(|(k, _)| !k.starts_with('_')).map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

/// The modules `import` can see. Ships with `math`.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: HashMap<String, Rc<Module>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        let mut registry = Self { modules: HashMap::new() };
        registry.register(math());
        registry
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with no modules at all.
    pub fn empty() -> Self {
        Self { modules: HashMap::new() }
    }

    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), Rc::new(module));
    }

    pub fn get(&self, name: &str) -> Result<Rc<Module>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Import(format!("No module named {name}")))
    }

    /// Executes one import item, binding names into `ns`.
    pub fn import(&self, item: &Import, ns: &Namespace) -> Result<()> {
        let located = |e: Error| e.at_line(item.line());
        match item {
            Import::Modules { names, .. } => {
                for (dotted, alias) in names {
                    let module = self.get(dotted).map_err(located)?;
                    match alias {
                        Some(alias) => ns.insert(alias.as_str(), Value::Module(module)),
                        None => {
                            // `import a.b` binds the top-level package `a`.
                            let top = dotted.split('.').next().unwrap_or(dotted);
                            let top = if top == dotted.as_str() { module } else { self.get(top).map_err(located)? };
                            ns.insert(top.name(), Value::Module(Rc::clone(&top)));
                        }
                    }
                }
            }
            Import::From { module, names, .. } => {
                let module = self.get(module).map_err(located)?;
                for (name, alias) in names {
                    let value = module.get(name).ok_or_else(|| {
                        located(Error::Import(format!("cannot import name {name}")))
                    })?;
                    ns.insert(alias.as_deref().unwrap_or(name), value);
                }
            }
            Import::Star { module, .. } => {
                let module = self.get(module).map_err(located)?;
                for (name, value) in module.public() {
                    ns.insert(name, value.clone());
                }
            }
        }
        log::debug!("import at line {} done", item.line());
        Ok(())
    }
}

// ── math ──────────────────────────────────────────────────────────────────

fn unary(name: &'static str, f: fn(f64) -> f64) -> Value {
    NativeFunction::value(name, move |args, kwargs| {
        exact_args(name, &args, &kwargs, 1)?;
        let x = args[0]
            .as_float()
            .ok_or_else(|| Error::Type(format!("a float is required, not {}", args[0].type_name())))?;
        Ok(Value::Float(f(x)))
    })
}

fn rounding(name: &'static str, f: fn(f64) -> f64) -> Value {
    NativeFunction::value(name, move |args, kwargs| {
        exact_args(name, &args, &kwargs, 1)?;
        if let Value::Int(i) = args[0] {
            return Ok(Value::Int(i));
        }
        let x = args[0]
            .as_float()
            .ok_or_else(|| Error::Type(format!("a float is required, not {}", args[0].type_name())))?;
        let r = f(x);
        if r.is_finite() && r.abs() < 9.2e18 {
            Ok(Value::Int(r as i64))
        } else {
            Err(Error::Value(format!("cannot convert {r} to integer")))
        }
    })
}

fn domain_checked(name: &'static str, f: fn(f64) -> f64, ok: fn(f64) -> bool) -> Value {
    NativeFunction::value(name, move |args, kwargs| {
        exact_args(name, &args, &kwargs, 1)?;
        let x = args[0]
            .as_float()
            .ok_or_else(|| Error::Type(format!("a float is required, not {}", args[0].type_name())))?;
        if !ok(x) {
            return Err(Error::Value("math domain error".into()));
        }
        Ok(Value::Float(f(x)))
    })
}

/// The builtin `math` module.
pub fn math() -> Module {
    let pow = NativeFunction::value("pow", |args, kwargs| {
        exact_args("pow", &args, &kwargs, 2)?;
        match (args[0].as_float(), args[1].as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(x.powf(y))),
            _ => Err(Error::Type("pow() arguments must be numbers".into())),
        }
    });
    Module::new("math")
        .with("pi", Value::Float(consts::PI))
        .with("e", Value::Float(consts::E))
        .with("sqrt", domain_checked("sqrt", f64::sqrt, |x| x >= 0.0))
        .with("log", domain_checked("log", f64::ln, |x| x > 0.0))
        .with("floor", rounding("floor", f64::floor))
        .with("ceil", rounding("ceil", f64::ceil))
        .with("sin", unary("sin", f64::sin))
        .with("cos", unary("cos", f64::cos))
        .with("tan", unary("tan", f64::tan))
        .with("fabs", unary("fabs", f64::abs))
        .with("pow", pow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use enaml_syntax::parse_str;
    use enaml_syntax::ast::Item;

    fn run(src: &str) -> Result<Namespace> {
        let module = parse_str(src).unwrap();
        let ns = Namespace::new();
        let registry = ModuleRegistry::new();
        for item in &module.body {
            if let Item::Import(import) = item {
                registry.import(import, &ns)?;
            }
        }
        Ok(ns)
    }

    #[test]
    fn import_module_and_alias() {
        let ns = run("import math\nimport math as m\n").unwrap();
        assert!(matches!(ns.get("math"), Some(Value::Module(_))));
        assert!(matches!(ns.get("m"), Some(Value::Module(_))));
    }

    #[test]
    fn from_import_names() {
        let ns = run("from math import pi, sqrt as root\n").unwrap();
        assert_eq!(ns.get("pi"), Some(Value::Float(consts::PI)));
        let root = ns.get("root").unwrap();
        assert_eq!(root.call(vec![Value::Int(9)], vec![]).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn star_import() {
        let ns = run("from math import *\n").unwrap();
        assert!(ns.contains("cos") && ns.contains("e"));
    }

    #[test]
    fn unknown_module() {
        let err = run("import nope\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Import);
        assert_eq!(err.line(), Some(1));
        assert_eq!(err.root().to_string(), "ImportError: No module named nope");
    }

    #[test]
    fn unknown_name() {
        let err = run("\nfrom math import tau\n").unwrap_err();
        assert_eq!(err.root().to_string(), "ImportError: cannot import name tau");
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn math_functions() {
        let m = math();
        let call = |name: &str, x: Value| m.get(name).unwrap().call(vec![x], vec![]);
        assert_eq!(call("floor", Value::Float(2.7)).unwrap(), Value::Int(2));
        assert_eq!(call("ceil", Value::Float(2.1)).unwrap(), Value::Int(3));
        assert_eq!(call("sqrt", Value::Int(-1)).unwrap_err().kind(), ErrorKind::Value);
    }
}
