//! The runner: binds strategy, renderer, action runtime, and display.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use cjunct_action::{HandlerRegistry, HandlerSettings};
use cjunct_config::Config;
use cjunct_error::{ClassifiedError, ExecutionFailed, SourceError};
use cjunct_loader::{WorkflowLoader, YamlWorkflowLoader, check_loadable};
use cjunct_templar::{ContextStore, RenderOptions, RenderScope, Templar};
use cjunct_workflow::{ActionRunError, Workflow};

use crate::display::{DisplayRegistry, DisplayResult};
use crate::strategy::{DEFAULT_STRATEGY, KNOWN_STRATEGIES, strategy_by_name};

/// Names tried during source autodetection, in order.
pub const AUTODETECT_FILE_NAMES: &[&str] = &["cjunct.yml", "cjunct.yaml"];

/// Where the workflow definition comes from.
#[derive(Debug, Default)]
pub enum WorkflowSource {
    /// `CJUNCT_WORKFLOW_FILE`, then autodetection in the working
    /// directory.
    #[default]
    Auto,
    /// An explicit file path.
    File(PathBuf),
    /// Standard input (the `-` positional).
    Stdin,
}

/// The live view renderers evaluate against: statuses straight off the
/// workflow, outcomes from the runner's aggregate map.
struct RunnerScope<'a> {
    workflow: &'a Workflow,
    outcomes: &'a IndexMap<String, IndexMap<String, String>>,
}

impl RenderScope for RunnerScope<'_> {
    fn action_outcomes(&self, action: &str) -> Option<IndexMap<String, String>> {
        self.workflow.get(action)?;
        Some(self.outcomes.get(action).cloned().unwrap_or_default())
    }

    fn action_status(&self, action: &str) -> Option<String> {
        self.workflow
            .get(action)
            .map(|action| action.status().to_string())
    }

    fn context(&self) -> &ContextStore {
        &self.workflow.context
    }
}

/// Constructor for a custom workflow loader (extension point).
pub type LoaderFactory =
    Box<dyn FnOnce(Arc<HandlerRegistry>) -> Box<dyn WorkflowLoader> + Send>;

/// The main driver. A value runs at most once: [`Runner::run`] consumes
/// it.
pub struct Runner {
    config: Config,
    handlers: HandlerRegistry,
    displays: DisplayRegistry,
    source: WorkflowSource,
    preloaded: Option<Workflow>,
    loader_factory: Option<LoaderFactory>,
    strategy_name: Option<String>,
    display_name: Option<String>,
    interactive: bool,
}

impl Runner {
    /// Create a runner over a configuration, with the bundled handlers,
    /// displays, and strategies registered.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let handlers = HandlerRegistry::bundled(HandlerSettings {
            shell_inject_yield_function: config.shell_inject_yield_function,
        });
        Self {
            config,
            handlers,
            displays: DisplayRegistry::bundled(),
            source: WorkflowSource::Auto,
            preloaded: None,
            loader_factory: None,
            strategy_name: None,
            display_name: None,
            interactive: false,
        }
    }

    /// Replace the default YAML loader (custom workflow formats).
    #[must_use]
    pub fn with_loader<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(Arc<HandlerRegistry>) -> Box<dyn WorkflowLoader> + Send + 'static,
    {
        self.loader_factory = Some(Box::new(factory));
        self
    }

    /// Explicit workflow source (CLI positional).
    #[must_use]
    pub fn with_source(mut self, source: WorkflowSource) -> Self {
        self.source = source;
        self
    }

    /// Skip loading entirely and run this workflow (library embedding).
    #[must_use]
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.preloaded = Some(workflow);
        self
    }

    /// Strategy override (CLI flag; wins over the environment).
    #[must_use]
    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy_name = Some(name.into());
        self
    }

    /// Display override (CLI flag; wins over the environment).
    #[must_use]
    pub fn with_display(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Enable the interactive plan-selection phase.
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Mutable access to the handler registry (custom action types).
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    /// Mutable access to the display registry (custom displays).
    pub fn displays_mut(&mut self) -> &mut DisplayRegistry {
        &mut self.displays
    }

    /// Resolve, load, and validate the workflow without running it.
    pub fn load(mut self) -> Result<Workflow, ClassifiedError> {
        self.config.ensure_static_extensions()?;
        self.load_workflow()
    }

    /// Execute the workflow. Consumes the runner; the process exit code
    /// is derived from the returned [`ClassifiedError`], if any.
    pub async fn run(mut self) -> Result<(), ClassifiedError> {
        self.config.ensure_static_extensions()?;
        let workflow = Arc::new(self.load_workflow()?);

        let display_name = self
            .display_name
            .take()
            .or_else(|| self.config.display_name.clone())
            .unwrap_or_else(|| crate::display::DEFAULT_DISPLAY.to_string());
        let display = self
            .displays
            .build(&display_name, &workflow, &self.config)
            .ok_or_else(|| {
                ClassifiedError::Other(format!(
                    "Invalid display name: {display_name:?} (allowed: {:?})",
                    self.displays.names().collect::<Vec<_>>()
                ))
            })?;
        let display = Arc::new(Mutex::new(display));

        let strategy_name = self
            .strategy_name
            .take()
            .or_else(|| self.config.strategy_name.clone())
            .unwrap_or_else(|| DEFAULT_STRATEGY.to_string());
        let mut strategy = strategy_by_name(&strategy_name, &workflow).ok_or_else(|| {
            ClassifiedError::Other(format!(
                "Invalid strategy name: {strategy_name:?} (allowed: {KNOWN_STRATEGIES:?})"
            ))
        })?;
        debug!(strategy = strategy.name(), display = display_name, "runner configured");

        if self.interactive {
            display.lock().on_plan_interaction(&workflow)?;
        }

        let render_options = RenderOptions {
            strict_outcomes: self.config.strict_outcomes_rendering,
            ..RenderOptions::default()
        };
        let mut outcomes: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut runners: JoinSet<()> = JoinSet::new();

        while let Some(action) = strategy.next_action().await {
            // Reap runners that finished since the last emission.
            while runners.try_join_next().is_some() {}
            snapshot_outcomes(&workflow, &mut outcomes);

            if action.is_done() {
                // Disabled or scheduler-settled before emission.
                log_display(display.lock().on_action_finish(&action));
                continue;
            }
            let Some(mut handler) = action.take_handler() else {
                warn!(action = action.name, "emitted twice, ignoring");
                continue;
            };
            if let Err(error) = action.start() {
                warn!(action = action.name, %error, "cannot start");
                continue;
            }

            // Render just before start, against ancestors' final
            // outcomes.
            let render_result = {
                let scope = RunnerScope {
                    workflow: &workflow,
                    outcomes: &outcomes,
                };
                let templar = Templar::new(&scope, render_options);
                handler.render_args(&templar)
            };
            if let Err(render_error) = render_result {
                warn!(action = action.name, error = %render_error, "args rendering failed");
                let message = action
                    .finish_run(Err(ActionRunError::Internal(render_error.to_string())));
                if let Some(message) = message {
                    log_display(display.lock().emit_action_error(&action, &message));
                }
                log_display(display.lock().on_action_finish(&action));
                continue;
            }

            log_display(display.lock().on_action_start(&action));
            let action = Arc::clone(&action);
            let display = Arc::clone(&display);
            runners.spawn(async move {
                let forwarder = {
                    let action = Arc::clone(&action);
                    let display = Arc::clone(&display);
                    tokio::spawn(async move {
                        let events = action.read_events();
                        while let Ok(event) = events.recv().await {
                            log_display(display.lock().emit_action_message(&action, &event));
                        }
                    })
                };

                // Run the handler in its own task so a panic becomes a
                // failure instead of a hung workflow.
                let awaiter = tokio::spawn(handler.run(action.io()));
                let result = match awaiter.await {
                    Ok(result) => result,
                    Err(join_error) => Err(ActionRunError::Internal(format!(
                        "handler aborted: {join_error}"
                    ))),
                };
                let message = action.finish_run(result);
                if let Some(message) = message {
                    log_display(display.lock().emit_action_error(&action, &message));
                }
                let _ = forwarder.await;
                log_display(display.lock().on_action_finish(&action));
            });
        }

        while runners.join_next().await.is_some() {}
        snapshot_outcomes(&workflow, &mut outcomes);
        log_display(display.lock().on_finish(&workflow));

        let failed: Vec<String> = workflow
            .iter()
            .filter(|action| action.status().is_failure())
            .map(|action| action.name.clone())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ExecutionFailed(failed).into())
        }
    }

    fn load_workflow(&mut self) -> Result<Workflow, ClassifiedError> {
        if let Some(workflow) = self.preloaded.take() {
            return Ok(workflow);
        }
        let handlers = Arc::new(std::mem::take(&mut self.handlers));
        let custom = self.loader_factory.take();
        let default_loader = custom.is_none();
        let loader: Box<dyn WorkflowLoader> = match custom {
            Some(factory) => factory(handlers),
            None => Box::new(YamlWorkflowLoader::new(handlers)),
        };
        match std::mem::take(&mut self.source) {
            WorkflowSource::Stdin => {
                let text = std::io::read_to_string(std::io::stdin()).map_err(|e| {
                    SourceError::Unreadable {
                        path: PathBuf::from("-"),
                        reason: e.to_string(),
                    }
                })?;
                loader.loads(&text)
            }
            WorkflowSource::File(path) => {
                if default_loader {
                    check_loadable(&path)?;
                }
                loader.load(&path)
            }
            WorkflowSource::Auto => {
                let path = match self.config.workflow_file.take() {
                    Some(path) => path,
                    None => detect_source()?,
                };
                if default_loader {
                    check_loadable(&path)?;
                }
                loader.load(&path)
            }
        }
    }
}

/// Autodetect `cjunct.yml` / `cjunct.yaml` in the working directory.
/// Exactly one must match.
fn detect_source() -> Result<PathBuf, SourceError> {
    let cwd = std::env::current_dir().map_err(|e| SourceError::Unreadable {
        path: PathBuf::from("."),
        reason: e.to_string(),
    })?;
    let candidates: Vec<&str> = AUTODETECT_FILE_NAMES
        .iter()
        .copied()
        .filter(|name| cwd.join(name).is_file())
        .collect();
    match candidates.as_slice() {
        [] => Err(SourceError::NotFound(cwd)),
        [single] => Ok(cwd.join(single)),
        many => Err(SourceError::Ambiguous(
            cwd,
            many.iter().map(|name| (*name).to_string()).collect(),
        )),
    }
}

fn snapshot_outcomes(
    workflow: &Workflow,
    outcomes: &mut IndexMap<String, IndexMap<String, String>>,
) {
    for action in workflow.iter() {
        if action.is_done() && !outcomes.contains_key(&action.name) {
            outcomes.insert(action.name.clone(), action.outcomes());
        }
    }
}

fn log_display(result: DisplayResult) {
    if let Err(error) = result {
        warn!(%error, "display callback failed");
    }
}

/// Convenience wrapper: path or `-`.
pub fn source_from_arg(argument: Option<&str>) -> WorkflowSource {
    match argument {
        None => WorkflowSource::Auto,
        Some("-") => WorkflowSource::Stdin,
        Some(path) => WorkflowSource::File(Path::new(path).to_path_buf()),
    }
}
