//! The headless toolkit: every widget class, the dialog-style utils and an
//! event loop that only logs.

use enaml_runtime::callable::arg_range;
use enaml_runtime::toolkit::EventLoop;
use enaml_runtime::{NativeFunction, Result, ToolkitRegistry, Value};

use crate::widgets;

pub const HEADLESS: &str = "headless";

/// Logs lifecycle hooks; `start` returns at once.
#[derive(Debug, Default)]
pub struct HeadlessEventLoop;

impl EventLoop for HeadlessEventLoop {
    fn prime(&self) -> Result<()> {
        log::info!("headless event loop primed");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        log::info!("headless event loop started; no windows to service, exiting");
        Ok(())
    }
}

/// A message util: logs `(title, text)` at `level` and returns `answer`.
fn message(name: &'static str, level: log::Level, answer: Value) -> Value {
    NativeFunction::value(name, move |args, kwargs| {
        arg_range(name, &args, &kwargs, 1, 2)?;
        let (title, text) = match args.as_slice() {
            [text] => (String::new(), text.to_string()),
            [title, text, ..] => (title.to_string(), text.to_string()),
            [] => (String::new(), String::new()),
        };
        log::log!(level, "[{name}] {title}: {text}");
        Ok(answer.clone())
    })
}

/// The headless toolkit with every widget registered.
///
/// ```rust
/// use enaml_runtime::Toolkit;
///
/// let toolkit = enaml_ui::headless();
/// assert!(toolkit.constructor("PushButton").is_some());
/// assert!(toolkit.util("information").is_some());
/// ```
pub fn headless() -> ToolkitRegistry {
    let mut builder = ToolkitRegistry::builder(HEADLESS)
        .util("information", message("information", log::Level::Info, Value::None))
        .util("warning", message("warning", log::Level::Warn, Value::None))
        .util("question", message("question", log::Level::Info, Value::str("yes")))
        .event_loop(HeadlessEventLoop);
    for class in widgets::all() {
        builder = builder.constructor(class);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use enaml_runtime::{Role, Toolkit};

    #[test]
    fn registers_every_widget() {
        let toolkit = headless();
        for name in [
            "Window", "Dialog", "Container", "VGroup", "HGroup", "Form", "Field", "Label", "PushButton",
            "CheckBox", "Slider", "SpinBox", "ComboBox", "LayoutMeta",
        ] {
            assert!(toolkit.constructor(name).is_some(), "{name}");
        }
        assert_eq!(toolkit.constructor("LayoutMeta").unwrap().role(), Role::Meta);
        assert!(toolkit.constructor("Component").is_none());
    }

    #[test]
    fn utils_log_and_answer() {
        let toolkit = headless();
        let question = toolkit.util("question").unwrap();
        let answer = question.call(vec![Value::str("Quit?"), Value::str("Really quit?")], vec![]).unwrap();
        assert_eq!(answer, Value::str("yes"));
        let info = toolkit.util("information").unwrap();
        assert!(info.call(vec![], vec![]).is_err());
    }

    #[test]
    fn event_loop_returns() {
        let toolkit = headless();
        toolkit.prime_event_loop().unwrap();
        toolkit.start_event_loop().unwrap();
    }
}
