//! Source text in, live component trees out.

use std::cell::RefCell;
use std::rc::Rc;

use enaml_runtime::{ClassDef, ErrorKind, NativeFunction, ObjectRef, Role, Value};
use enaml_ui::{Application, View};
use pretty_assertions::assert_eq;

fn model(count: i64) -> ObjectRef {
    let model = ClassDef::model("Model").instantiate();
    model.set("count", Value::Int(count)).unwrap();
    model.set("name", Value::str("Ada")).unwrap();
    model
}

fn build(src: &str, model: &ObjectRef) -> View {
    Application::new().context("model", Value::Object(model.clone())).build(src, None).unwrap()
}

/// A `record(x)` function and the values it has seen.
fn recorder() -> (Value, Rc<RefCell<Vec<Value>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let record = NativeFunction::value("record", move |args, _| {
        sink.borrow_mut().extend(args);
        Ok(Value::None)
    });
    (record, seen)
}

const COUNTER: &str = "\
Window:
    Field f:
        value = 0
        value := model.count
";

// ── The field/model round trip ────────────────────────────────────────────

#[test]
fn delegated_field_tracks_its_model_both_ways() {
    let model = model(5);
    let view = build(COUNTER, &model);
    let f = view.object("f").unwrap();

    assert_eq!(f.get("value").unwrap(), Value::Int(5));

    f.set("value", Value::Int(9)).unwrap();
    assert_eq!(model.get("count").unwrap(), Value::Int(9));

    model.set("count", Value::Int(2)).unwrap();
    assert_eq!(f.get("value").unwrap(), Value::Int(2));
}

#[test]
fn each_invocation_builds_an_independent_tree() {
    let module = Application::new().compile(COUNTER).unwrap();
    let (a, b) = (model(1), model(100));
    let first = module.instantiate("Window", vec![("model".into(), Value::Object(a.clone()))]).unwrap();
    let second = module.instantiate("Window", vec![("model".into(), Value::Object(b.clone()))]).unwrap();

    let (fa, fb) = (first.object("f").unwrap(), second.object("f").unwrap());
    assert!(!fa.ptr_eq(&fb));

    fa.set("value", Value::Int(7)).unwrap();
    assert_eq!(a.get("count").unwrap(), Value::Int(7));
    assert_eq!(b.get("count").unwrap(), Value::Int(100));
    assert_eq!(fb.get("value").unwrap(), Value::Int(100));
}

// ── Binding kinds ─────────────────────────────────────────────────────────

#[test]
fn default_is_evaluated_once() {
    let model = model(3);
    let view = build("Window:\n    Label l:\n        text = model.name\n", &model);
    let label = view.object("l").unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("Ada"));

    model.set("name", Value::str("Grace")).unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("Ada"));

    label.set("text", Value::str("manual")).unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("manual"));
}

#[test]
fn bind_follows_its_dependencies() {
    let model = model(3);
    let view = build("Window:\n    Label l:\n        text << '%s has %d' % (model.name, model.count)\n", &model);
    let label = view.object("l").unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("Ada has 3"));

    model.set("count", Value::Int(4)).unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("Ada has 4"));
    model.set("name", Value::str("Grace")).unwrap();
    assert_eq!(label.get("text").unwrap(), Value::str("Grace has 4"));
}

#[test]
fn bind_sees_sibling_identifiers() {
    let model = model(0);
    let src = "\
Window:
    VGroup:
        CheckBox check:
            checked = True
        Label l:
            enabled << check.checked
";
    let view = build(src, &model);
    let (check, label) = (view.object("check").unwrap(), view.object("l").unwrap());
    assert_eq!(label.get("enabled").unwrap(), Value::Bool(true));
    check.get("toggle").unwrap().call(vec![], vec![]).unwrap();
    assert_eq!(label.get("enabled").unwrap(), Value::Bool(false));
}

#[test]
fn notify_runs_once_per_change_with_msg() {
    let model = model(0);
    let (record, seen) = recorder();
    let src = "\
Window:
    Field f:
        value >> record((msg.obj is f, msg.name, msg.old, msg.new))
";
    let view = Application::new()
        .context("model", Value::Object(model))
        .context("record", record)
        .build(src, None)
        .unwrap();
    let f = view.object("f").unwrap();
    f.set("value", Value::Int(1)).unwrap();
    f.set("value", Value::Int(2)).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            Value::tuple([Value::Bool(true), Value::str("value"), Value::None, Value::Int(1)]),
            Value::tuple([Value::Bool(true), Value::str("value"), Value::Int(1), Value::Int(2)]),
        ]
    );
}

#[test]
fn button_clicks_drive_the_model() {
    let model = model(0);
    let src = "\
Window:
    VGroup:
        Label l:
            text << 'Count: %d' % model.count
        PushButton b:
            clicked >> setattr(model, 'count', model.count + 1)
";
    let view = build(src, &model);
    let click = view.object("b").unwrap().get("click").unwrap();
    click.call(vec![], vec![]).unwrap();
    click.call(vec![], vec![]).unwrap();
    assert_eq!(model.get("count").unwrap(), Value::Int(2));
    assert_eq!(view.object("l").unwrap().get("text").unwrap(), Value::str("Count: 2"));
}

// ── Errors ────────────────────────────────────────────────────────────────

#[test]
fn duplicate_identifiers_fail_the_build() {
    let err = Application::new().build("Window:\n    Field f:\n        pass\n    Label f:\n        pass\n", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
    assert!(err.to_string().contains("duplicate identifier `f`"), "{err}");
}

#[test]
fn unknown_types_are_named() {
    let err = Application::new().build("Window:\n    Gizmo:\n        pass\n", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(err.to_string().contains("Gizmo"), "{err}");
}

#[test]
fn binding_a_missing_attribute_fails() {
    let err = Application::new().build("Window:\n    Label:\n        colour = 'red'\n", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Attribute);
    assert_eq!(err.line(), Some(3));
}

#[test]
fn validation_errors_reach_the_setter() {
    let view = Application::new().build("Window:\n    Label l:\n        text = 'x'\n", None).unwrap();
    let err = view.object("l").unwrap().set("text", Value::Int(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn host_function_failures_keep_their_kind_and_line() {
    let lookup = NativeFunction::value("lookup", |_, _| -> enaml_runtime::Result<Value> {
        Err(anyhow::anyhow!("settings store is offline"))?
    });
    let view = Application::new()
        .context("lookup", lookup)
        .build("Window:\n    Label l:\n        text = lookup('title')\n", None)
        .unwrap();
    let err = view.object("l").unwrap().get("text").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
    assert_eq!(err.line(), Some(3));
    assert_eq!(err.root().to_string(), "settings store is offline");
}

#[test]
fn fields_delegating_to_each_other_fail_without_crashing() {
    let src = "\
Window:
    Field a:
        value := b.value
    Field b:
        value := a.value
";
    let view = Application::new().build(src, None).unwrap();
    let a = view.object("a").unwrap();
    assert_eq!(a.set("value", Value::Int(1)).unwrap_err().kind(), ErrorKind::Recursion);
    assert_eq!(view.object("b").unwrap().get("value").unwrap_err().kind(), ErrorKind::Recursion);
}

#[test]
fn fields_bound_to_each_other_report_the_cycle() {
    let src = "\
Window:
    Field a:
        value << b.value + 1
    Field b:
        value << a.value + 1
";
    let view = Application::new().build(src, None).unwrap();
    let err = view.object("a").unwrap().get("value").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recursion);
    assert_eq!(err.line(), Some(3));
}

// ── Tree shape ────────────────────────────────────────────────────────────

#[test]
fn elements_are_wrapped_in_a_window() {
    let view = Application::new().build("Label:\n    text = 'alone'\n", None).unwrap();
    assert_eq!(view.dump(), "Window\n    VGroup\n        Label (text='alone')\n");
}

#[test]
fn metas_do_not_become_children() {
    let view = Application::new()
        .build("Window:\n    VGroup g:\n        LayoutMeta:\n            margin = 4\n        Label:\n            pass\n", None)
        .unwrap();
    let group = view.object("g").unwrap();
    assert_eq!(group.children().len(), 1);
    assert_eq!(group.metas().len(), 1);
    assert_eq!(group.metas()[0].role(), Role::Meta);
    assert_eq!(group.metas()[0].get("margin").unwrap(), Value::Int(4));
}

// ── defn ──────────────────────────────────────────────────────────────────

#[test]
fn definitions_build_through_the_vm() {
    let src = "\
defn Counter(model, caption='Count'):
    VGroup:
        Label:
            text = caption
        Field -> f:
            value := model.count
";
    let model = model(5);
    let view = Application::new()
        .context("model", Value::Object(model.clone()))
        .build(src, Some("Counter"))
        .unwrap();
    let group = view.root().unwrap();
    assert_eq!(group.type_name(), "VGroup");
    let widgets = group.children();
    assert_eq!(widgets[0].get("text").unwrap(), Value::str("Count"));
    widgets[1].set("value", Value::Int(8)).unwrap();
    assert_eq!(model.get("count").unwrap(), Value::Int(8));
}

#[test]
fn raw_python_can_call_definitions() {
    let src = "\
defn Pair(a, b):
    Label:
        text = a
    Label:
        text = b
:: python ::
labels = Pair('left', 'right')
:: end ::
";
    let module = Application::new().compile(src).unwrap();
    let labels = module.namespace().get("labels").unwrap();
    let texts: Vec<Value> = labels
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().get("text").unwrap())
        .collect();
    assert_eq!(texts, vec![Value::str("left"), Value::str("right")]);
}
