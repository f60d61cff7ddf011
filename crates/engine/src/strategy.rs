//! Execution strategies: async iterators over the workflow's actions.
//!
//! Five variants share the same machinery but differ in ordering,
//! parallelism, and failure propagation:
//!
//! | name                | order       | parallelism | strict deps | forces strict |
//! |---------------------|-------------|-------------|-------------|---------------|
//! | `free`              | declaration | full        | no          | no            |
//! | `sequential`        | declaration | one         | no          | no            |
//! | `loose` (default)   | topological | full        | yes         | no            |
//! | `strict`            | topological | full        | yes         | yes           |
//! | `strict-sequential` | topological | one         | yes         | yes           |

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::select_all;
use indexmap::IndexMap;
use tracing::debug;

use cjunct_workflow::{Action, ActionStatus, Workflow};

/// Names accepted by [`strategy_by_name`], in canonical order.
pub const KNOWN_STRATEGIES: &[&str] =
    &["free", "sequential", "loose", "strict", "strict-sequential"];

/// The default strategy name.
pub const DEFAULT_STRATEGY: &str = "loose";

/// An async iterator emitting actions as their preconditions are met.
///
/// Actions the scheduler decides to skip (strict ancestor failed or was
/// skipped) are driven to SKIPPED internally and never emitted; callers
/// only ever receive actions ready to run.
#[async_trait]
pub trait Strategy: Send {
    /// The registered strategy name.
    fn name(&self) -> &'static str;

    /// The next runnable action, or `None` once the workflow is
    /// exhausted.
    async fn next_action(&mut self) -> Option<Arc<Action>>;
}

/// Build the named strategy over a workflow.
pub fn strategy_by_name(name: &str, workflow: &Workflow) -> Option<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match name {
        "free" => Box::new(FreeStrategy::new(workflow, false)),
        "sequential" => Box::new(FreeStrategy::new(workflow, true)),
        "loose" => Box::new(TieredStrategy::loose(workflow)),
        "strict" => Box::new(TieredStrategy::strict(workflow)),
        "strict-sequential" => Box::new(TieredStrategy::strict_sequential(workflow)),
        _ => return None,
    };
    Some(strategy)
}

fn actions_of(workflow: &Workflow) -> IndexMap<String, Arc<Action>> {
    workflow
        .iter()
        .map(|action| (action.name.clone(), Arc::clone(action)))
        .collect()
}

/// Declaration-order emission, ignoring dependencies and failures.
///
/// With `one_at_a_time`, the previously emitted action is awaited before
/// the next one is produced.
pub struct FreeStrategy {
    queue: std::collections::VecDeque<Arc<Action>>,
    one_at_a_time: bool,
    previous: Option<Arc<Action>>,
}

impl FreeStrategy {
    fn new(workflow: &Workflow, one_at_a_time: bool) -> Self {
        Self {
            queue: workflow.iter().map(Arc::clone).collect(),
            one_at_a_time,
            previous: None,
        }
    }
}

#[async_trait]
impl Strategy for FreeStrategy {
    fn name(&self) -> &'static str {
        if self.one_at_a_time { "sequential" } else { "free" }
    }

    async fn next_action(&mut self) -> Option<Arc<Action>> {
        if self.one_at_a_time
            && let Some(previous) = self.previous.take()
        {
            previous.wait_done().await;
        }
        let action = self.queue.pop_front()?;
        if self.one_at_a_time {
            self.previous = Some(Arc::clone(&action));
        }
        Some(action)
    }
}

/// Dependency-tiered scheduler shared by `loose`, `strict`, and
/// `strict-sequential`.
pub struct TieredStrategy {
    actions: IndexMap<String, Arc<Action>>,
    /// Remaining not-yet-done ancestors per pending action.
    blockers: IndexMap<String, HashSet<String>>,
    /// Emitted but not yet finished actions.
    active: IndexMap<String, Arc<Action>>,
    /// Treat every dependency as strict.
    force_strict: bool,
    /// Await each emitted action before producing the next.
    one_at_a_time: bool,
    /// Skip everything remaining after the first non-success.
    halt_on_failure: bool,
    halted: bool,
    previous: Option<Arc<Action>>,
    strategy_name: &'static str,
}

impl TieredStrategy {
    fn new(
        workflow: &Workflow,
        force_strict: bool,
        one_at_a_time: bool,
        halt_on_failure: bool,
        strategy_name: &'static str,
    ) -> Self {
        let actions = actions_of(workflow);
        let blockers = actions
            .values()
            .map(|action| {
                (
                    action.name.clone(),
                    action.ancestors.keys().cloned().collect(),
                )
            })
            .collect();
        Self {
            actions,
            blockers,
            active: IndexMap::new(),
            force_strict,
            one_at_a_time,
            halt_on_failure,
            halted: false,
            previous: None,
            strategy_name,
        }
    }

    /// Full parallelism, honoring only explicitly strict edges.
    pub fn loose(workflow: &Workflow) -> Self {
        Self::new(workflow, false, false, false, "loose")
    }

    /// Full parallelism, every edge treated as strict.
    pub fn strict(workflow: &Workflow) -> Self {
        Self::new(workflow, true, false, false, "strict")
    }

    /// One action at a time; everything after the first non-success is
    /// skipped.
    pub fn strict_sequential(workflow: &Workflow) -> Self {
        Self::new(workflow, true, true, true, "strict-sequential")
    }

    /// Scan for an unblocked action. Deliberately rescans everything:
    /// linear in workflow size, trivially fair.
    ///
    /// Actions that must be skipped (halt, or a strict ancestor ended in
    /// FAILURE/SKIPPED) are driven to SKIPPED here and not returned;
    /// already-terminal actions (e.g. OMITTED interactively) pass
    /// through silently. WARNING ancestors count as success.
    fn pop_ready(&mut self) -> Option<Arc<Action>> {
        // A skip settles an action, which may unblock (and skip) its own
        // descendants in turn; rescan until the cascade dries up.
        loop {
            let done_names: HashSet<String> = self
                .actions
                .values()
                .filter(|action| action.is_done())
                .map(|action| action.name.clone())
                .collect();

            let mut skipped_any = false;
            let candidates: Vec<String> = self.blockers.keys().cloned().collect();
            for name in candidates {
                if let Some(remaining) = self.blockers.get_mut(&name) {
                    remaining.retain(|blocker| !done_names.contains(blocker));
                    if !remaining.is_empty() {
                        continue;
                    }
                }
                self.blockers.shift_remove(&name);
                let action = Arc::clone(&self.actions[&name]);

                if action.is_done() {
                    continue;
                }
                if self.halted || self.has_broken_strict_ancestor(&action) {
                    debug!(action = name, "skipping due to broken ancestry");
                    if action.skip().is_ok() && self.halt_on_failure {
                        self.halted = true;
                    }
                    skipped_any = true;
                    continue;
                }
                debug!(action = name, "ready for scheduling");
                self.active.insert(name, Arc::clone(&action));
                return Some(action);
            }
            if !skipped_any {
                return None;
            }
        }
    }

    fn has_broken_strict_ancestor(&self, action: &Action) -> bool {
        action.ancestors.iter().any(|(ancestor, dependency)| {
            if !dependency.strict && !self.force_strict {
                return false;
            }
            self.actions.get(ancestor).is_some_and(|ancestor| {
                matches!(
                    ancestor.status(),
                    ActionStatus::Failure | ActionStatus::Skipped
                )
            })
        })
    }

    async fn wait_for_any_active(&mut self) {
        let waits: Vec<_> = self
            .active
            .values()
            .map(|action| {
                let action = Arc::clone(action);
                Box::pin(async move { action.wait_done().await })
            })
            .collect();
        let _ = select_all(waits).await;
        self.harvest_done();
    }

    fn harvest_done(&mut self) {
        let finished: Vec<String> = self
            .active
            .values()
            .filter(|action| action.is_done())
            .map(|action| action.name.clone())
            .collect();
        for name in finished {
            if let Some(action) = self.active.shift_remove(&name) {
                debug!(action = name, status = %action.status(), "finished, removed from active set");
                if self.halt_on_failure
                    && matches!(
                        action.status(),
                        ActionStatus::Failure | ActionStatus::Skipped
                    )
                {
                    self.halted = true;
                }
            }
        }
    }
}

#[async_trait]
impl Strategy for TieredStrategy {
    fn name(&self) -> &'static str {
        self.strategy_name
    }

    async fn next_action(&mut self) -> Option<Arc<Action>> {
        if self.one_at_a_time
            && let Some(previous) = self.previous.take()
        {
            previous.wait_done().await;
            self.harvest_done();
        }
        loop {
            if let Some(action) = self.pop_ready() {
                if self.one_at_a_time {
                    self.previous = Some(Arc::clone(&action));
                }
                return Some(action);
            }
            if self.active.is_empty() {
                return None;
            }
            self.wait_for_any_active().await;
        }
    }
}
