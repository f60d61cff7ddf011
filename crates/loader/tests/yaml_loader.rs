//! YAML loader behavior over realistic workflow sources.

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use cjunct_action::{HandlerRegistry, HandlerSettings};
use cjunct_error::ClassifiedError;
use cjunct_loader::{WorkflowLoader, YamlWorkflowLoader};
use cjunct_templar::ContextValue;
use cjunct_workflow::{Severity, Workflow};

fn loader() -> Box<YamlWorkflowLoader> {
    Box::new(YamlWorkflowLoader::new(Arc::new(HandlerRegistry::bundled(
        HandlerSettings::default(),
    ))))
}

fn loads(text: &str) -> Result<Workflow, ClassifiedError> {
    loader().loads(text)
}

fn load_error(text: &str) -> String {
    match loads(text) {
        Err(ClassifiedError::Load(error)) => error.to_string(),
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn minimal_workflow() {
    let workflow = loads(
        r#"
actions:
  - name: Foo
    type: echo
    message: foo
  - name: Bar
    type: echo
    message: bar
    expects: Foo
"#,
    )
    .unwrap();

    assert_eq!(workflow.len(), 2);
    let bar = workflow.get("Bar").unwrap();
    assert!(bar.ancestors.contains_key("Foo"));
    assert!(!bar.ancestors["Foo"].strict);
    assert_eq!(workflow.get("Foo").unwrap().tier, 0);
    assert_eq!(bar.tier, 1);
}

#[test]
fn dependency_mappings_carry_flags() {
    let workflow = loads(
        r#"
actions:
  - name: Base
    type: echo
    message: base
  - name: Leaf
    type: echo
    message: leaf
    expects:
      - name: Base
        strict: true
      - name: Elsewhere
        external: true
"#,
    )
    .unwrap();

    let leaf = workflow.get("Leaf").unwrap();
    assert!(leaf.ancestors["Base"].strict);
    // The missing external dependency is pruned on build.
    assert!(!leaf.ancestors.contains_key("Elsewhere"));
}

#[test]
fn selectable_severity_and_description() {
    let workflow = loads(
        r#"
actions:
  - name: Quiet
    type: echo
    message: shh
    description: a quiet step
    selectable: false
    severity: low
"#,
    )
    .unwrap();

    let quiet = workflow.get("Quiet").unwrap();
    assert!(!quiet.selectable);
    assert_eq!(quiet.severity, Severity::Low);
    assert_eq!(quiet.description.as_deref(), Some("a quiet step"));
}

#[test]
fn unknown_root_keys_are_rejected() {
    let message = load_error("bogus: 1\nactions: []\n");
    assert!(
        message.contains("Unrecognized root keys: [\"bogus\"]"),
        "got: {message}"
    );
}

#[test]
fn duplicate_actions_are_rejected() {
    let message = load_error(
        r#"
actions:
  - name: Twin
    type: echo
    message: one
  - name: Twin
    type: echo
    message: two
"#,
    );
    assert_eq!(message, "Action declared twice: \"Twin\"");
}

#[test]
fn missing_name_is_rejected() {
    let message = load_error("actions:\n  - type: echo\n    message: hi\n");
    assert_eq!(message, "Missing action node required key: 'name'");
}

#[test]
fn unknown_type_is_rejected() {
    let message = load_error("actions:\n  - name: X\n    type: teleport\n");
    assert_eq!(message, "Unknown dispatched type: teleport");
}

#[test]
fn unknown_args_are_rejected_with_the_action_name() {
    let message = load_error(
        "actions:\n  - name: Foo\n    type: echo\n    message: hi\n    bogus: 1\n",
    );
    assert_eq!(message, "Action \"Foo\": Unrecognized keys: [\"bogus\"]");
}

#[test]
fn missing_args_are_rejected_with_the_field() {
    let message = load_error("actions:\n  - name: Foo\n    type: echo\n");
    assert_eq!(message, "Action \"Foo\": Missing key: \"message\"");
}

#[test]
fn invalid_severity_is_rejected() {
    let message = load_error(
        "actions:\n  - name: Foo\n    type: echo\n    message: hi\n    severity: fatal\n",
    );
    assert!(message.contains("unknown severity"), "got: {message}");
}

#[test]
fn missing_dependency_is_an_integrity_error() {
    let result = loads(
        r#"
actions:
  - name: B
    type: echo
    message: b
    expects: A
"#,
    );
    match result {
        Err(ClassifiedError::Integrity(error)) => {
            assert_eq!(
                error.to_string(),
                "Missing actions among dependencies: [\"A\"]"
            );
        }
        other => panic!("expected an integrity error, got {other:?}"),
    }
}

#[test]
fn context_merges_shallow_last_wins() {
    let workflow = loads(
        r#"
actions:
  - name: Foo
    type: echo
    message: hi
context:
  - plugh: first
    keep: kept
  - plugh: second
"#,
    )
    .unwrap();

    assert_eq!(
        workflow.context["plugh"],
        ContextValue::from_string("second")
    );
    assert_eq!(workflow.context["keep"], ContextValue::from_string("kept"));
}

#[test]
fn context_strings_with_triggers_are_deferred() {
    let workflow = loads(
        r#"
actions:
  - name: Foo
    type: echo
    message: hi
context:
  direct: plain
  deferred: "@{ ctx.direct }"
  shaped: !@ ctx.direct
"#,
    )
    .unwrap();

    assert!(!workflow.context["direct"].is_deferred());
    assert!(workflow.context["deferred"].is_deferred());
    assert_eq!(
        workflow.context["shaped"],
        ContextValue::Expression("ctx.direct".into())
    );
}

#[test]
fn miscellaneous_root_key_is_ignored() {
    let workflow = loads(
        r#"
actions:
  - name: Foo
    type: echo
    message: hi
miscellaneous:
  anything: goes
"#,
    )
    .unwrap();
    assert_eq!(workflow.len(), 1);
}

#[test]
fn imports_splice_actions() {
    let dir = tempfile::tempdir().unwrap();
    let imported = dir.path().join("extra.yml");
    let mut file = std::fs::File::create(&imported).unwrap();
    write!(
        file,
        "actions:\n  - name: Imported\n    type: echo\n    message: from afar\n"
    )
    .unwrap();

    let main = dir.path().join("main.yml");
    let mut file = std::fs::File::create(&main).unwrap();
    write!(
        file,
        "actions:\n  - !import extra.yml\n  - name: Local\n    type: echo\n    message: here\n"
    )
    .unwrap();

    let workflow = loader().load(&main).unwrap();
    assert!(workflow.get("Imported").is_some());
    assert!(workflow.get("Local").is_some());
}

#[test]
fn cyclic_imports_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.yml");
    let second = dir.path().join("second.yml");
    std::fs::write(&first, "actions:\n  - !import second.yml\n").unwrap();
    std::fs::write(&second, "actions:\n  - !import first.yml\n").unwrap();

    match loader().load(&first) {
        Err(ClassifiedError::Load(error)) => {
            assert!(error.message.contains("Cyclic load"), "got: {error}");
            assert!(!error.stack.is_empty());
        }
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn import_of_missing_file_reports_the_stack() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("main.yml");
    std::fs::write(&main, "actions:\n  - !import nowhere.yml\n").unwrap();

    match loader().load(&main) {
        Err(ClassifiedError::Load(error)) => {
            assert!(error.message.contains("Workflow file not found"), "got: {error}");
            assert!(error.to_string().contains("Current stack"));
        }
        other => panic!("expected a load error, got {other:?}"),
    }
}
