//! Enaml UI: compiles `.enaml` modules into live, bound component trees.
//!
//! # Quick start
//!
//! ```rust
//! use enaml_runtime::{ClassDef, Value};
//! use enaml_ui::Application;
//!
//! let src = "\
//! Window:
//!     title = 'Counter'
//!     VGroup:
//!         Label:
//!             text << 'Count: %d' % model.count
//!         PushButton:
//!             text = 'Add'
//!             clicked >> setattr(model, 'count', model.count + 1)
//! ";
//!
//! let model = ClassDef::model("Model").instantiate();
//! model.set("count", Value::Int(0)).unwrap();
//!
//! let view = Application::new().context("model", Value::Object(model.clone())).build(src, None).unwrap();
//! let group = view.root().unwrap().children()[0].clone();
//! let widgets = group.children();
//! let (label, button) = (&widgets[0], &widgets[1]);
//!
//! button.get("click").unwrap().call(vec![], vec![]).unwrap();
//! assert_eq!(label.get("text").unwrap(), Value::str("Count: 1"));
//! ```
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`app`] | `Application`, the embedding entry point |
//! | [`compiler`] | `Compiler` and `CompiledModule` |
//! | [`constructor`] | the constructor tree and `EnamlFactory` |
//! | [`defn`] | `defn` blocks compiled to VM code |
//! | [`vm`] | the stack machine that runs `defn` bodies |
//! | [`view`] | `View`, the result of building a component |
//! | [`toolkit`] | the headless toolkit |
//! | [`widgets`] | headless widget classes |

pub mod app;
pub mod compiler;
pub mod constructor;
pub mod defn;
pub mod toolkit;
pub mod view;
pub mod vm;
pub mod widgets;

pub use app::Application;
pub use compiler::{CompiledModule, Compiler};
pub use constructor::EnamlFactory;
pub use defn::EnamlDefinition;
pub use toolkit::headless;
pub use view::View;

/// The types most embedders need.
pub mod prelude {
    pub use crate::{Application, CompiledModule, View};
    pub use enaml_runtime::{ClassDef, ObjectRef, Operator, Role, Validator, Value};
}
