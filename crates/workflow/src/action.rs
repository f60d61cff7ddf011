//! The action runtime: a uniquely named unit of work with a validated
//! status machine, an event stream, an outcomes mapping, and a
//! completion signal.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use cjunct_templar::{RenderResult, Renderer};

use crate::event::ActionEvent;
use crate::status::{ActionStatus, Severity, TransitionError};

/// Dependency edge attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dependency {
    /// Ancestor failure or skip cascades into this action.
    pub strict: bool,
    /// The ancestor may be absent from the workflow; the edge is pruned
    /// on build.
    pub external: bool,
}

/// How a handler run ended, when it did not end cleanly.
#[derive(Debug, Error)]
pub enum ActionRunError {
    /// The handler decided there is nothing to do.
    #[error("skipped")]
    Skipped,
    /// Handler-declared failure with a user-visible message.
    #[error("{0}")]
    Fail(String),
    /// Anything else that went wrong inside the handler.
    #[error("{0}")]
    Internal(String),
}

impl From<std::io::Error> for ActionRunError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

/// Per-action I/O facade handed to the running handler.
///
/// Cheap to clone; all methods are non-blocking.
#[derive(Clone)]
pub struct ActionIo {
    events: async_channel::Sender<ActionEvent>,
    outcomes: Arc<Mutex<IndexMap<String, String>>>,
}

impl ActionIo {
    /// Publish a stdout-tagged line.
    pub fn emit(&self, text: impl Into<String>) {
        let _ = self.events.try_send(ActionEvent::Stdout(text.into()));
    }

    /// Publish a stderr-tagged line.
    pub fn emit_stderr(&self, text: impl Into<String>) {
        let _ = self.events.try_send(ActionEvent::Stderr(text.into()));
    }

    /// Set or overwrite one outcome entry.
    pub fn yield_outcome(&self, key: impl Into<String>, value: impl Into<String>) {
        self.outcomes.lock().insert(key.into(), value.into());
    }
}

/// Handler-specific behavior behind each action type.
#[async_trait]
pub trait ActionHandler: Send + Sync + std::fmt::Debug {
    /// The dispatch key this handler was registered under.
    fn type_name(&self) -> &str;

    /// Render template-bearing args against the live scope. Called by
    /// the runner just before the action starts.
    fn render_args(&mut self, renderer: &dyn Renderer) -> RenderResult<()>;

    /// Execute the action body. Return [`ActionRunError::Skipped`] to end
    /// as SKIPPED or [`ActionRunError::Fail`] to end as FAILURE (WARNING
    /// under low severity); any other error is a failure too.
    async fn run(self: Box<Self>, io: ActionIo) -> Result<(), ActionRunError>;
}

/// Runtime channels and mutable cells, shared across tasks.
struct ActionRuntime {
    status: Mutex<ActionStatus>,
    outcomes: Arc<Mutex<IndexMap<String, String>>>,
    events_tx: async_channel::Sender<ActionEvent>,
    events_rx: async_channel::Receiver<ActionEvent>,
    finished_tx: watch::Sender<bool>,
    finished_rx: watch::Receiver<bool>,
}

impl ActionRuntime {
    fn new() -> Self {
        let (events_tx, events_rx) = async_channel::unbounded();
        let (finished_tx, finished_rx) = watch::channel(false);
        Self {
            status: Mutex::new(ActionStatus::Pending),
            outcomes: Arc::new(Mutex::new(IndexMap::new())),
            events_tx,
            events_rx,
            finished_tx,
            finished_rx,
        }
    }
}

/// A named node of the workflow graph plus its runtime state.
pub struct Action {
    /// Unique name within the workflow.
    pub name: String,
    /// Dispatch key that selected the handler.
    pub action_type: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Ancestor edges, keyed by ancestor name. Pruned of missing
    /// external edges during workflow build.
    pub ancestors: IndexMap<String, Dependency>,
    /// Inverse edges, derived during workflow build.
    pub descendants: IndexMap<String, Dependency>,
    /// Distance from the entrypoint tier, derived during workflow build.
    pub tier: usize,
    /// Whether the interactive plan phase may toggle this action.
    pub selectable: bool,
    /// Failure classification.
    pub severity: Severity,
    runtime: ActionRuntime,
    handler: Mutex<Option<Box<dyn ActionHandler>>>,
}

impl Action {
    /// Create a pending action. Graph fields (`descendants`, `tier`) are
    /// filled in by the workflow build.
    pub fn new(
        name: impl Into<String>,
        action_type: impl Into<String>,
        handler: Box<dyn ActionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            action_type: action_type.into(),
            description: None,
            ancestors: IndexMap::new(),
            descendants: IndexMap::new(),
            tier: 0,
            selectable: true,
            severity: Severity::Normal,
            runtime: ActionRuntime::new(),
            handler: Mutex::new(Some(handler)),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        *self.runtime.status.lock()
    }

    /// Returns `true` once the action reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// Snapshot of the outcomes yielded so far.
    #[must_use]
    pub fn outcomes(&self) -> IndexMap<String, String> {
        self.runtime.outcomes.lock().clone()
    }

    /// The I/O facade for this action's handler.
    #[must_use]
    pub fn io(&self) -> ActionIo {
        ActionIo {
            events: self.runtime.events_tx.clone(),
            outcomes: Arc::clone(&self.runtime.outcomes),
        }
    }

    /// Take the handler for execution. Yields `None` on the second call;
    /// an action runs at most once.
    pub fn take_handler(&self) -> Option<Box<dyn ActionHandler>> {
        self.handler.lock().take()
    }

    /// The event stream. Ends after the action is done and every
    /// buffered event has been read.
    #[must_use]
    pub fn read_events(&self) -> async_channel::Receiver<ActionEvent> {
        self.runtime.events_rx.clone()
    }

    /// Await the completion signal.
    pub async fn wait_done(&self) {
        let mut rx = self.runtime.finished_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// A waitable handle on the completion signal.
    #[must_use]
    pub fn completion(&self) -> watch::Receiver<bool> {
        self.runtime.finished_rx.clone()
    }

    fn transition(&self, to: ActionStatus) -> Result<(), TransitionError> {
        let mut status = self.runtime.status.lock();
        if !status.can_transition_to(to) {
            return Err(TransitionError { from: *status, to });
        }
        debug!(action = self.name, from = %*status, to = %to, "status transition");
        *status = to;
        Ok(())
    }

    fn complete(&self) {
        self.runtime.events_tx.close();
        let _ = self.runtime.finished_tx.send(true);
    }

    /// Move PENDING → RUNNING.
    pub fn start(&self) -> Result<(), TransitionError> {
        self.transition(ActionStatus::Running)
    }

    /// Disable a pending action: PENDING → OMITTED, completing it.
    pub fn disable(&self) -> Result<(), TransitionError> {
        self.transition(ActionStatus::Omitted)?;
        self.complete();
        Ok(())
    }

    /// Scheduler-side skip of a pending action: PENDING → SKIPPED,
    /// completing it.
    pub fn skip(&self) -> Result<(), TransitionError> {
        self.transition(ActionStatus::Skipped)?;
        self.complete();
        Ok(())
    }

    /// Record the handler result, transitioning to the matching terminal
    /// state and firing the completion signal.
    ///
    /// Returns the user-visible failure message, when there is one.
    pub fn finish_run(&self, result: Result<(), ActionRunError>) -> Option<String> {
        let (target, message) = match result {
            Ok(()) => (ActionStatus::Success, None),
            Err(ActionRunError::Skipped) => (ActionStatus::Skipped, None),
            Err(ActionRunError::Fail(message)) => (self.failure_status(), Some(message)),
            Err(ActionRunError::Internal(message)) => (self.failure_status(), Some(message)),
        };
        // The handler already drove the action to RUNNING; a failed
        // transition here would be a runner bug, not a user error.
        if let Err(e) = self.transition(target) {
            debug!(action = self.name, error = %e, "late finish ignored");
        }
        self.complete();
        message
    }

    fn failure_status(&self) -> ActionStatus {
        match self.severity {
            Severity::Normal => ActionStatus::Failure,
            Severity::Low => ActionStatus::Warning,
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("type", &self.action_type)
            .field("status", &self.status())
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}
