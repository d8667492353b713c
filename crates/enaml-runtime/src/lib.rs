//! Enaml runtime: observable objects, the expression evaluator and the
//! four binding kinds.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`object`] | `ObjectRef`, change notification, interceptors, the parent/child tree |
//! | [`class`] | `ClassDef`, attribute kinds, roles |
//! | [`validator`] | attribute validators |
//! | [`value`] | `Value`, the dynamic value type of expressions |
//! | [`eval`] | expression evaluation |
//! | [`namespace`] | `Namespace` and `Scope` |
//! | [`code`] | `CompiledExpr`: an expression plus its dependencies |
//! | [`binding`] | `=`, `<<`, `:=` and `>>` |
//! | [`operator`] | operator lookup and custom operators |
//! | [`toolkit`] | the `Toolkit` trait and `ToolkitRegistry` |
//! | [`module`] | importable modules, `math` |
//! | [`builtins`] | `len`, `str`, `range` and friends |
//! | [`logging`] | `env_logger` setup |
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use enaml_runtime::{BindingFactory, ClassDef, CompiledExpr, Namespace, Role, Scope,
//!                     Toolkit, ToolkitRegistry, Validator, Value};
//! use enaml_syntax::{parse_expr, BindingKind};
//!
//! let model = ClassDef::build("Model", Role::Model)
//!     .attr("count", Validator::Int, Value::Int(1))
//!     .finish()
//!     .instantiate();
//! let label = ClassDef::build("Label", Role::Element)
//!     .attr("text", Validator::Str, Value::str(""))
//!     .finish()
//!     .instantiate();
//!
//! let globals = Rc::new(Namespace::new());
//! globals.insert("model", Value::Object(model.clone()));
//! let toolkit: Rc<dyn Toolkit> = Rc::new(ToolkitRegistry::builder("demo").build());
//! let scope = Scope::module(globals, toolkit);
//!
//! let code = Rc::new(CompiledExpr::new(parse_expr("'n=%d' % model.count").unwrap()));
//! BindingFactory::new(BindingKind::Bind, code).bind(&label, "text", scope).unwrap();
//!
//! model.set("count", Value::Int(2)).unwrap();
//! assert_eq!(label.get("text").unwrap(), Value::str("n=2"));
//! ```

pub mod binding;
pub mod builtins;
pub mod callable;
pub mod class;
pub mod code;
pub mod error;
pub mod eval;
pub mod logging;
pub mod module;
pub mod namespace;
pub mod object;
pub mod operator;
pub mod toolkit;
pub mod validator;
pub mod value;

pub use binding::BindingFactory;
pub use callable::{Callable, NativeFunction};
pub use class::{AttrKind, ClassDef, Role};
pub use code::CompiledExpr;
pub use error::{Error, ErrorKind, Result};
pub use module::{Module, ModuleRegistry};
pub use namespace::{Namespace, Scope};
pub use object::{ChangeEvent, ObjectRef, WeakObject};
pub use operator::{Operator, OperatorCall};
pub use toolkit::{EventLoop, Toolkit, ToolkitRegistry};
pub use validator::Validator;
pub use value::Value;
