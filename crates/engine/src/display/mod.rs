//! The display contract and bundled displays.
//!
//! A display is a pluggable sink for lifecycle and per-action I/O
//! events. Every callback may fail; the runner logs and swallows those
//! failures so a broken display never aborts the workflow. The one
//! exception is [`Display::on_plan_interaction`], whose error carries
//! meaning (interactive mode unavailable).

mod color;
mod prefix;
mod silent;

use indexmap::IndexMap;
use thiserror::Error;

use cjunct_config::Config;
use cjunct_error::InteractionError;
use cjunct_workflow::{Action, ActionEvent, Workflow};

pub use color::Color;
pub use prefix::PrefixDisplay;
pub use silent::SilentDisplay;

/// A non-fatal display callback failure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DisplayError(pub String);

impl From<std::io::Error> for DisplayError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Result alias for display callbacks.
pub type DisplayResult = Result<(), DisplayError>;

/// Sink for workflow execution events.
pub trait Display: Send {
    /// A stdout- or stderr-tagged line emitted by a running action.
    fn emit_action_message(&mut self, action: &Action, event: &ActionEvent) -> DisplayResult {
        let _ = (action, event);
        Ok(())
    }

    /// An error-style line concerning an action (render failures,
    /// handler failure messages).
    fn emit_action_error(&mut self, action: &Action, message: &str) -> DisplayResult {
        let _ = (action, message);
        Ok(())
    }

    /// The action is about to run.
    fn on_action_start(&mut self, action: &Action) -> DisplayResult {
        let _ = action;
        Ok(())
    }

    /// The action reached a terminal state and its events are drained.
    fn on_action_finish(&mut self, action: &Action) -> DisplayResult {
        let _ = action;
        Ok(())
    }

    /// Called once after every action completed.
    fn on_finish(&mut self, workflow: &Workflow) -> DisplayResult {
        let _ = workflow;
        Ok(())
    }

    /// Interactive plan selection: may disable selectable actions before
    /// execution begins.
    fn on_plan_interaction(&mut self, workflow: &Workflow) -> Result<(), InteractionError> {
        let _ = workflow;
        Err(InteractionError(
            "this display does not support plan interaction".into(),
        ))
    }
}

/// Constructor for a registered display.
pub type DisplayFactory = Box<dyn Fn(&Workflow, &Config) -> Box<dyn Display> + Send + Sync>;

/// The default display name.
pub const DEFAULT_DISPLAY: &str = "prefix";

/// Registry of display constructors keyed by name.
pub struct DisplayRegistry {
    factories: IndexMap<String, DisplayFactory>,
}

impl DisplayRegistry {
    /// A registry holding the bundled displays.
    #[must_use]
    pub fn bundled() -> Self {
        let mut registry = Self {
            factories: IndexMap::new(),
        };
        registry.register(DEFAULT_DISPLAY, |workflow, config| {
            Box::new(PrefixDisplay::new(workflow, config))
        });
        registry.register("silent", |_, _| Box::new(SilentDisplay));
        registry
    }

    /// Register (or override) a display constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Workflow, &Config) -> Box<dyn Display> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Registered display names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the named display, or `None` for unknown names.
    pub fn build(
        &self,
        name: &str,
        workflow: &Workflow,
        config: &Config,
    ) -> Option<Box<dyn Display>> {
        self.factories
            .get(name)
            .map(|factory| factory(workflow, config))
    }
}

impl Default for DisplayRegistry {
    fn default() -> Self {
        Self::bundled()
    }
}

impl std::fmt::Debug for DisplayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
