//! Workflow construction: dependency integrity, inverse edges, and
//! tier assignment.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use cjunct_error::IntegrityError;
use cjunct_templar::ContextStore;

use crate::action::Action;

/// A validated, tiered DAG of actions plus the free-form context.
pub struct Workflow {
    actions: IndexMap<String, Arc<Action>>,
    /// Workflow-wide context mapping.
    pub context: ContextStore,
}

impl Workflow {
    /// Build and validate a workflow from loaded actions.
    ///
    /// - missing ancestors marked `external` are silently pruned;
    /// - any other missing ancestor is fatal;
    /// - `descendants` is derived as the inverse of `ancestors`;
    /// - at least one entrypoint must remain after pruning;
    /// - tiers are assigned in Kahn waves (`tier = 1 + max(ancestor
    ///   tiers)`), so every cycle leaves its members untiered and is
    ///   reported as unreachable.
    pub fn new(
        actions: IndexMap<String, Action>,
        context: ContextStore,
    ) -> Result<Self, IntegrityError> {
        let mut actions = actions;

        // Prune missing external edges and collect hard failures.
        let known: HashSet<String> = actions.keys().cloned().collect();
        let mut missing: Vec<String> = Vec::new();
        for action in actions.values_mut() {
            action.ancestors.retain(|ancestor, dependency| {
                if known.contains(ancestor) {
                    return true;
                }
                if dependency.external {
                    debug!(action = action.name, ancestor, "pruned external dependency");
                    return false;
                }
                if !missing.contains(ancestor) {
                    missing.push(ancestor.clone());
                }
                false
            });
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(IntegrityError(format!(
                "Missing actions among dependencies: {missing:?}"
            )));
        }

        // Derive inverse edges.
        let edges: Vec<(String, String, crate::action::Dependency)> = actions
            .values()
            .flat_map(|action| {
                action
                    .ancestors
                    .iter()
                    .map(|(ancestor, dependency)| {
                        (ancestor.clone(), action.name.clone(), *dependency)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        for (ancestor, descendant, dependency) in edges {
            if let Some(action) = actions.get_mut(&ancestor) {
                action.descendants.insert(descendant, dependency);
            }
        }

        // Entrypoints are the actions left without ancestors.
        let entrypoints: Vec<String> = actions
            .values()
            .filter(|action| action.ancestors.is_empty())
            .map(|action| action.name.clone())
            .collect();
        if entrypoints.is_empty() {
            return Err(IntegrityError("No entrypoints for the graph".into()));
        }

        // Kahn waves: an action is tiered once all of its ancestors are.
        let mut tiers: IndexMap<String, usize> = IndexMap::new();
        let mut pending: IndexMap<String, usize> = actions
            .iter()
            .map(|(name, action)| (name.clone(), action.ancestors.len()))
            .collect();
        let mut ready: Vec<String> = entrypoints;
        while let Some(name) = ready.pop() {
            let tier = actions[&name]
                .ancestors
                .keys()
                .filter_map(|ancestor| tiers.get(ancestor))
                .map(|ancestor_tier| ancestor_tier + 1)
                .max()
                .unwrap_or(0);
            tiers.insert(name.clone(), tier);
            for descendant in actions[&name].descendants.keys() {
                if let Some(remaining) = pending.get_mut(descendant) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        ready.push(descendant.clone());
                    }
                }
            }
        }

        let mut unreachable: Vec<String> = actions
            .keys()
            .filter(|name| !tiers.contains_key(*name))
            .cloned()
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort();
            return Err(IntegrityError(format!(
                "Unreachable actions found: {unreachable:?}"
            )));
        }

        for (name, tier) in &tiers {
            actions[name].tier = *tier;
        }
        debug!(
            actions = actions.len(),
            tiers = tiers.values().max().map_or(0, |t| t + 1),
            "workflow built"
        );

        Ok(Self {
            actions: actions
                .into_iter()
                .map(|(name, action)| (name, Arc::new(action)))
                .collect(),
            context,
        })
    }

    /// Look an action up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.get(name)
    }

    /// Iterate actions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.values()
    }

    /// Iterate `(tier, action)` pairs in tier order (declaration order
    /// within a tier). Used for reporting.
    pub fn iter_by_tier(&self) -> impl Iterator<Item = (usize, &Arc<Action>)> {
        let mut ordered: Vec<&Arc<Action>> = self.actions.values().collect();
        ordered.sort_by_key(|action| action.tier);
        ordered.into_iter().map(|action| (action.tier, action))
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` for a workflow without actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
