//! The default prefix display.
//!
//! Each line is prefixed with the emitting action's name, left-padded to
//! a uniform width; repeated lines from the same action blank the name.
//! Stdout lines carry a `" |"` mark, stderr lines `"*|"`, error lines
//! `"!|"`. A tier-ordered status banner is printed at the end.

use std::io::{IsTerminal, Write};

use cjunct_config::Config;
use cjunct_error::InteractionError;
use cjunct_workflow::{Action, ActionEvent, Workflow};

use super::color::Color;
use super::{Display, DisplayResult};

/// Prefix-based line display over an arbitrary writer (stdout by
/// default).
pub struct PrefixDisplay {
    writer: Box<dyn Write + Send>,
    color: Color,
    justification: usize,
    last_name: String,
}

impl PrefixDisplay {
    /// Build for a workflow, honoring `force_color` from the config and
    /// falling back to terminal detection.
    pub fn new(workflow: &Workflow, config: &Config) -> Self {
        let use_color = config
            .force_color
            .unwrap_or_else(|| std::io::stdout().is_terminal());
        Self::with_writer(workflow, use_color, Box::new(std::io::stdout()))
    }

    /// Build over an explicit writer (used by tests and embedders).
    pub fn with_writer(
        workflow: &Workflow,
        use_color: bool,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        // Two extra columns for the square brackets.
        let justification = workflow
            .iter()
            .map(|action| action.name.len())
            .max()
            .unwrap_or(0)
            + 2;
        Self {
            writer,
            color: Color::new(use_color),
            justification,
            last_name: String::new(),
        }
    }

    fn display(&mut self, line: &str) -> DisplayResult {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn make_prefix(&mut self, source_name: &str, mark: char) -> String {
        let formatted_name = if self.last_name == source_name {
            " ".repeat(self.justification)
        } else {
            format!("[{source_name}]{}", " ".repeat(self.justification.saturating_sub(source_name.len() + 2)))
        };
        self.last_name = source_name.to_string();
        self.color.gray(&format!("{formatted_name} {mark}| "))
    }

    fn banner(&mut self, workflow: &Workflow) -> DisplayResult {
        // Nine extra columns for the longest status prefix.
        let width = self.justification + 9;
        let separator = self.color.gray(&"=".repeat(width));
        self.display(&separator)?;
        for (_, action) in workflow.iter_by_tier() {
            let status = action.status();
            let line = format!(
                "{}: {}",
                self.color.for_status(status, &status.to_string()),
                action.name
            );
            self.display(&line)?;
        }
        Ok(())
    }
}

impl Display for PrefixDisplay {
    fn emit_action_message(&mut self, action: &Action, event: &ActionEvent) -> DisplayResult {
        let mark = if event.is_stderr() { '*' } else { ' ' };
        let prefix = self.make_prefix(&action.name, mark);
        for line in event.text().split('\n') {
            let text = if event.is_stderr() {
                self.color.yellow(line)
            } else {
                line.to_string()
            };
            self.display(&format!("{prefix}{text}"))?;
        }
        Ok(())
    }

    fn emit_action_error(&mut self, action: &Action, message: &str) -> DisplayResult {
        let prefix = self.make_prefix(&action.name, '!');
        for line in message.split('\n') {
            let text = self.color.red(line);
            self.display(&format!("{prefix}{text}"))?;
        }
        Ok(())
    }

    fn on_finish(&mut self, workflow: &Workflow) -> DisplayResult {
        self.banner(workflow)
    }

    /// Prompt for the subset of selectable actions to run; everything
    /// else is disabled. An empty reply keeps the whole plan.
    fn on_plan_interaction(&mut self, workflow: &Workflow) -> Result<(), InteractionError> {
        if !std::io::stdin().is_terminal() {
            return Err(InteractionError(
                "interactive mode requires a terminal on standard input".into(),
            ));
        }
        let selectable: Vec<&str> = workflow
            .iter()
            .filter(|action| action.selectable && !action.is_done())
            .map(|action| action.name.as_str())
            .collect();
        let _ = self.display(&format!(
            "Selectable actions: {}",
            selectable.join(", ")
        ));
        let _ = self.display("Comma-separated actions to run (empty keeps the whole plan):");

        let mut reply = String::new();
        std::io::stdin()
            .read_line(&mut reply)
            .map_err(|e| InteractionError(format!("failed to read selection: {e}")))?;
        let selected: Vec<&str> = reply
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if selected.is_empty() {
            return Ok(());
        }
        for name in &selected {
            if !selectable.contains(name) {
                return Err(InteractionError(format!("unknown selectable action: {name}")));
            }
        }
        for action in workflow.iter() {
            if !selected.contains(&action.name.as_str()) && !action.is_done() {
                let _ = action.disable();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use cjunct_templar::{ContextStore, RenderResult, Renderer};
    use cjunct_workflow::{ActionHandler, ActionIo, ActionRunError};

    use super::*;

    #[derive(Debug)]
    struct NoopHandler;

    #[async_trait]
    impl ActionHandler for NoopHandler {
        fn type_name(&self) -> &str {
            "noop"
        }

        fn render_args(&mut self, _renderer: &dyn Renderer) -> RenderResult<()> {
            Ok(())
        }

        async fn run(self: Box<Self>, _io: ActionIo) -> Result<(), ActionRunError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_workflow() -> Workflow {
        let actions = ["Foo", "Bar"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    cjunct_workflow::Action::new(name, "noop", Box::new(NoopHandler)),
                )
            })
            .collect();
        Workflow::new(actions, ContextStore::new()).unwrap()
    }

    fn lines(buffer: &SharedBuffer) -> Vec<String> {
        String::from_utf8(buffer.0.lock().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn stdout_and_stderr_marks() {
        let workflow = sample_workflow();
        let buffer = SharedBuffer::default();
        let mut display =
            PrefixDisplay::with_writer(&workflow, false, Box::new(buffer.clone()));

        let foo = workflow.get("Foo").unwrap();
        let bar = workflow.get("Bar").unwrap();
        display
            .emit_action_message(foo, &ActionEvent::Stdout("foo".into()))
            .unwrap();
        display
            .emit_action_message(bar, &ActionEvent::Stderr("bar".into()))
            .unwrap();

        assert_eq!(lines(&buffer), vec!["[Foo]  | foo", "[Bar] *| bar"]);
    }

    #[test]
    fn repeated_source_blanks_the_name() {
        let workflow = sample_workflow();
        let buffer = SharedBuffer::default();
        let mut display =
            PrefixDisplay::with_writer(&workflow, false, Box::new(buffer.clone()));

        let foo = workflow.get("Foo").unwrap();
        display
            .emit_action_message(foo, &ActionEvent::Stdout("one".into()))
            .unwrap();
        display
            .emit_action_message(foo, &ActionEvent::Stdout("two".into()))
            .unwrap();

        assert_eq!(lines(&buffer), vec!["[Foo]  | one", "       | two"]);
    }

    #[test]
    fn error_lines_use_the_bang_mark() {
        let workflow = sample_workflow();
        let buffer = SharedBuffer::default();
        let mut display =
            PrefixDisplay::with_writer(&workflow, false, Box::new(buffer.clone()));

        let foo = workflow.get("Foo").unwrap();
        display.emit_action_error(foo, "render failed").unwrap();

        assert_eq!(lines(&buffer), vec!["[Foo] !| render failed"]);
    }

    #[test]
    fn banner_lists_statuses_in_tier_order() {
        let workflow = sample_workflow();
        let buffer = SharedBuffer::default();
        let mut display =
            PrefixDisplay::with_writer(&workflow, false, Box::new(buffer.clone()));

        workflow.get("Foo").unwrap().start().unwrap();
        workflow.get("Foo").unwrap().finish_run(Ok(()));
        display.on_finish(&workflow).unwrap();

        let output = lines(&buffer);
        assert!(output[0].chars().all(|c| c == '='));
        assert!(output.contains(&"SUCCESS: Foo".to_string()));
        assert!(output.contains(&"PENDING: Bar".to_string()));
    }
}
