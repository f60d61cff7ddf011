//! End-to-end runner scenarios over bundled handlers.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use cjunct_action::{HandlerRegistry, HandlerSettings};
use cjunct_config::Config;
use cjunct_engine::{Display, DisplayResult, PrefixDisplay, Runner};
use cjunct_error::{ClassifiedError, InteractionError};
use cjunct_loader::{WorkflowLoader, YamlWorkflowLoader};
use cjunct_workflow::{Action, ActionEvent, ActionStatus, Workflow};

#[derive(Default)]
struct CollectorState {
    messages: Vec<(String, bool, String)>,
    errors: Vec<(String, String)>,
    started: Vec<String>,
    finished: Vec<String>,
    banner: Vec<(String, ActionStatus)>,
}

#[derive(Clone, Default)]
struct Collector(Arc<Mutex<CollectorState>>);

impl Collector {
    fn message_texts(&self) -> Vec<String> {
        self.0
            .lock()
            .messages
            .iter()
            .map(|(_, _, text)| text.clone())
            .collect()
    }
}

impl Display for Collector {
    fn emit_action_message(&mut self, action: &Action, event: &ActionEvent) -> DisplayResult {
        self.0.lock().messages.push((
            action.name.clone(),
            event.is_stderr(),
            event.text().to_string(),
        ));
        Ok(())
    }

    fn emit_action_error(&mut self, action: &Action, message: &str) -> DisplayResult {
        self.0
            .lock()
            .errors
            .push((action.name.clone(), message.to_string()));
        Ok(())
    }

    fn on_action_start(&mut self, action: &Action) -> DisplayResult {
        self.0.lock().started.push(action.name.clone());
        Ok(())
    }

    fn on_action_finish(&mut self, action: &Action) -> DisplayResult {
        self.0.lock().finished.push(action.name.clone());
        Ok(())
    }

    fn on_finish(&mut self, workflow: &Workflow) -> DisplayResult {
        let mut state = self.0.lock();
        for (_, action) in workflow.iter_by_tier() {
            state.banner.push((action.name.clone(), action.status()));
        }
        Ok(())
    }
}

/// Interactive display scripted to keep only the given selection.
struct ScriptedSelection {
    keep: Vec<&'static str>,
    inner: Collector,
}

impl Display for ScriptedSelection {
    fn emit_action_message(&mut self, action: &Action, event: &ActionEvent) -> DisplayResult {
        self.inner.emit_action_message(action, event)
    }

    fn on_plan_interaction(&mut self, workflow: &Workflow) -> Result<(), InteractionError> {
        for action in workflow.iter() {
            if !self.keep.contains(&action.name.as_str()) {
                let _ = action.disable();
            }
        }
        Ok(())
    }
}

fn load(yaml: &str) -> Workflow {
    let loader = Box::new(YamlWorkflowLoader::new(Arc::new(HandlerRegistry::bundled(
        HandlerSettings::default(),
    ))));
    loader.loads(yaml).expect("scenario workflow must load")
}

async fn run_collected(
    yaml: &str,
    strategy: &str,
) -> (Collector, Result<(), ClassifiedError>, Vec<Arc<Action>>) {
    let workflow = load(yaml);
    let handles: Vec<Arc<Action>> = workflow.iter().map(Arc::clone).collect();
    let collector = Collector::default();
    let mut runner = Runner::new(Config::default())
        .with_workflow(workflow)
        .with_strategy(strategy)
        .with_display("collector");
    let registered = collector.clone();
    runner
        .displays_mut()
        .register("collector", move |_, _| Box::new(registered.clone()));
    let result = runner.run().await;
    (collector, result, handles)
}

fn status_of(handles: &[Arc<Action>], name: &str) -> ActionStatus {
    handles
        .iter()
        .find(|action| action.name == name)
        .unwrap_or_else(|| panic!("no action {name}"))
        .status()
}

#[tokio::test]
async fn two_node_dependency_loose() {
    let (collector, result, handles) = run_collected(
        r#"
actions:
  - name: Foo
    type: shell
    command: echo "foo"
  - name: Bar
    type: shell
    command: echo "bar" >&2
    expects: [Foo]
"#,
        "loose",
    )
    .await;

    result.unwrap();
    assert_eq!(status_of(&handles, "Foo"), ActionStatus::Success);
    assert_eq!(status_of(&handles, "Bar"), ActionStatus::Success);

    let state = collector.0.lock();
    assert!(
        state
            .messages
            .contains(&("Foo".to_string(), false, "foo".to_string()))
    );
    assert!(
        state
            .messages
            .contains(&("Bar".to_string(), true, "bar".to_string()))
    );
    assert_eq!(state.started, vec!["Foo", "Bar"]);
    assert_eq!(
        state.banner,
        vec![
            ("Foo".to_string(), ActionStatus::Success),
            ("Bar".to_string(), ActionStatus::Success),
        ]
    );
}

#[tokio::test]
async fn outcome_flow_via_sentinel() {
    let (collector, result, handles) = run_collected(
        r#"
actions:
  - name: Foo
    type: shell
    command: yield_outcome result_key "I am foo"
  - name: Bar
    type: shell
    command: |
      echo "@{outcomes.Foo.result_key}"
      echo "prefix ##cjunct[yield-outcome-b64 cmVzdWx0X2tleQ== YmFy]##"
    expects: Foo
  - name: Baz
    type: shell
    command: echo "@{outcomes.Bar.result_key}"
    expects: Bar
"#,
        "loose",
    )
    .await;

    result.unwrap();
    for name in ["Foo", "Bar", "Baz"] {
        assert_eq!(status_of(&handles, name), ActionStatus::Success, "{name}");
    }
    assert_eq!(
        collector.message_texts(),
        vec!["I am foo", "prefix ", "bar"]
    );
}

#[tokio::test]
async fn strict_failure_cascade() {
    let (collector, result, handles) = run_collected(
        r#"
actions:
  - name: a
    type: shell
    command: exit 1
  - name: b
    type: shell
    command: exit 1
    expects: [{name: a, strict: true}]
  - name: c
    type: shell
    command: exit 1
    expects: [{name: b, strict: true}]
  - name: d
    type: shell
    command: exit 1
    expects: [{name: c, strict: true}]
  - name: e
    type: shell
    command: exit 1
    expects: [{name: d, strict: true}]
  - name: f
    type: shell
    command: exit 1
    expects: [{name: e, strict: true}]
"#,
        "loose",
    )
    .await;

    match result {
        Err(ClassifiedError::ExecutionFailed(failed)) => {
            assert_eq!(failed.0, vec!["a".to_string()]);
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert_eq!(status_of(&handles, "a"), ActionStatus::Failure);
    for name in ["b", "c", "d", "e", "f"] {
        assert_eq!(status_of(&handles, name), ActionStatus::Skipped, "{name}");
    }
    // Exactly `a` was emitted and started.
    assert_eq!(collector.0.lock().started, vec!["a"]);
}

#[tokio::test]
async fn render_cycle_fails_only_the_affected_action() {
    let (collector, result, handles) = run_collected(
        r#"
context:
  x: "@{context.y}"
  y: "@{context.x}"
actions:
  - name: broken
    type: echo
    message: "@{context.x}"
  - name: fine
    type: echo
    message: ok
"#,
        "loose",
    )
    .await;

    match result {
        Err(ClassifiedError::ExecutionFailed(failed)) => {
            assert_eq!(failed.0, vec!["broken".to_string()]);
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert_eq!(status_of(&handles, "broken"), ActionStatus::Failure);
    assert_eq!(status_of(&handles, "fine"), ActionStatus::Success);

    let state = collector.0.lock();
    let (errored, message) = &state.errors[0];
    assert_eq!(errored, "broken");
    assert!(
        message.contains("Recursion depth exceeded"),
        "got: {message}"
    );
    // The broken handler never ran.
    assert!(!state.started.contains(&"broken".to_string()));
}

#[tokio::test]
async fn interactive_selection_omits_the_rest() {
    let workflow = load(
        r#"
actions:
  - name: Foo
    type: echo
    message: run me
  - name: Bar
    type: echo
    message: cannot be picked
    selectable: false
  - name: Baz
    type: echo
    message: not picked
"#,
    );
    let handles: Vec<Arc<Action>> = workflow.iter().map(Arc::clone).collect();
    let collector = Collector::default();
    let mut runner = Runner::new(Config::default())
        .with_workflow(workflow)
        .with_display("scripted")
        .interactive(true);
    let inner = collector.clone();
    runner.displays_mut().register("scripted", move |_, _| {
        Box::new(ScriptedSelection {
            keep: vec!["Foo"],
            inner: inner.clone(),
        })
    });

    runner.run().await.unwrap();

    assert_eq!(status_of(&handles, "Foo"), ActionStatus::Success);
    assert_eq!(status_of(&handles, "Bar"), ActionStatus::Omitted);
    assert_eq!(status_of(&handles, "Baz"), ActionStatus::Omitted);
}

#[tokio::test]
async fn warning_severity_does_not_fail_the_run() {
    let (_, result, handles) = run_collected(
        r#"
actions:
  - name: tolerant
    type: shell
    command: exit 7
    severity: low
  - name: after
    type: echo
    message: still here
    expects: [{name: tolerant, strict: true}]
"#,
        "loose",
    )
    .await;

    result.unwrap();
    assert_eq!(status_of(&handles, "tolerant"), ActionStatus::Warning);
    assert_eq!(status_of(&handles, "after"), ActionStatus::Success);
}

#[tokio::test]
async fn status_expressions_see_ancestor_results() {
    let (collector, result, _) = run_collected(
        r#"
actions:
  - name: first
    type: echo
    message: leading
  - name: second
    type: echo
    message: "first ended as @{status.first}"
    expects: [first]
"#,
        "loose",
    )
    .await;

    result.unwrap();
    assert!(
        collector
            .message_texts()
            .contains(&"first ended as SUCCESS".to_string())
    );
}

#[tokio::test]
async fn prefix_display_formats_lines() {
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let workflow = load(
        r#"
actions:
  - name: Foo
    type: shell
    command: echo "foo"
  - name: Bar
    type: shell
    command: echo "bar" >&2
    expects: [Foo]
"#,
    );
    let buffer = SharedBuffer::default();
    let sink = buffer.clone();
    let mut runner = Runner::new(Config::default())
        .with_workflow(workflow)
        .with_display("buffered");
    runner.displays_mut().register("buffered", move |workflow, _| {
        Box::new(PrefixDisplay::with_writer(
            workflow,
            false,
            Box::new(sink.clone()),
        ))
    });

    runner.run().await.unwrap();

    let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert!(lines.contains(&"[Foo]  | foo"), "output: {output}");
    assert!(lines.contains(&"[Bar] *| bar"), "output: {output}");
    assert!(lines.contains(&"SUCCESS: Foo"), "output: {output}");
    assert!(lines.contains(&"SUCCESS: Bar"), "output: {output}");
}
