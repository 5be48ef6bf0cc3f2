//! Selection engine
//!
//! Two entry points over a [`SchemaModel`]:
//!
//! - [`SelectionEngine::select_most_probable`]: automatic resolution of a
//!   subtree. Chosen OR nodes keep only their most probable child, AND nodes
//!   and LEAF nodes pass their flag to all children, and every chosen LEAF
//!   recomputes its attributes (probability ≥ threshold) and its most
//!   probable XSD type.
//! - [`SelectionEngine::select_subtree`]: manual override. Every OR ancestor
//!   of the target, outermost first, re-resolves the child leading to the
//!   target and unchooses the rest of its children.
//!
//! Both first compute a complete plan against the current state and only
//! then write it into the model, so a failing call changes nothing.

use crate::model::{SchemaModel, SchemaNodePatch, DEFAULT_TYPE};
use crate::{SelectError, SelectionConfig};
use std::collections::BTreeMap;
use xsdtree_fragments::{most_probable, FragmentDictionary, NodeKind};
use xsdtree_graph::NodeId;

/// What one selection call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// Nodes the plan touched.
    pub planned: usize,
    /// Nodes whose payload actually changed.
    pub changed: usize,
}

/// Pending writes, layered over the model's current state.
#[derive(Default)]
struct Plan {
    patches: BTreeMap<NodeId, SchemaNodePatch>,
}

impl Plan {
    fn is_chosen(&self, model: &SchemaModel, id: NodeId) -> Result<bool, SelectError> {
        match self.patches.get(&id).and_then(|patch| patch.chosen) {
            Some(chosen) => Ok(chosen),
            None => Ok(model.data(id)?.chosen),
        }
    }

    fn record(&mut self, id: NodeId, patch: SchemaNodePatch) {
        self.patches.entry(id).or_default().merge(patch);
    }

    /// Parents precede children in identity order, so observers never see a
    /// chosen child under a parent that is still unchosen.
    fn commit(self, model: &mut SchemaModel) -> Result<SelectionOutcome, SelectError> {
        let mut outcome = SelectionOutcome {
            planned: self.patches.len(),
            changed: 0,
        };
        for (id, patch) in self.patches {
            if model.update(id, patch)? {
                outcome.changed += 1;
            }
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    config: SelectionConfig,
}

impl SelectionEngine {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Re-resolve the subtree under `from` automatically.
    ///
    /// `from` keeps its own chosen flag, except the root, which is always
    /// chosen. Resolving the root therefore selects the globally most
    /// probable variant of the whole tree.
    pub fn select_most_probable(
        &self,
        model: &mut SchemaModel,
        dictionary: &FragmentDictionary,
        from: NodeId,
    ) -> Result<SelectionOutcome, SelectError> {
        let node = model.node(from)?;
        let chosen = node.is_root() || node.data().chosen;

        let mut plan = Plan::default();
        self.resolve(model, dictionary, &mut plan, from, chosen)?;
        let outcome = plan.commit(model)?;

        tracing::debug!(
            from = %from,
            planned = outcome.planned,
            changed = outcome.changed,
            "automatic selection applied"
        );
        Ok(outcome)
    }

    /// Make `target` part of the resolved tree.
    ///
    /// For each OR ancestor, outermost first: the child on the path to
    /// `target` is chosen and its subtree resolved automatically again, and
    /// every other child is unchosen with its whole subtree. Deeper ORs on
    /// the path then override that resolution, so earlier manual choices
    /// inside the on-path subtrees are replaced. Branches off the ancestor
    /// chain are untouched. Calling it again with the same target changes
    /// nothing.
    pub fn select_subtree(
        &self,
        model: &mut SchemaModel,
        dictionary: &FragmentDictionary,
        target: NodeId,
    ) -> Result<SelectionOutcome, SelectError> {
        let path = Self::path_from_root(model, target)?;

        let mut plan = Plan::default();
        let root = path[0];
        if !plan.is_chosen(model, root)? {
            self.resolve(model, dictionary, &mut plan, root, true)?;
        }

        let mut or_ancestors = 0usize;
        for step in path.windows(2) {
            let (ancestor, on_path) = (step[0], step[1]);
            if model.data(ancestor)?.kind != NodeKind::Or {
                continue;
            }
            or_ancestors += 1;
            for &child in model.children(ancestor)? {
                if child == on_path {
                    self.resolve(model, dictionary, &mut plan, child, true)?;
                } else if plan.is_chosen(model, child)? {
                    self.resolve(model, dictionary, &mut plan, child, false)?;
                }
            }
        }

        let outcome = plan.commit(model)?;
        tracing::debug!(
            node = %target,
            or_ancestors,
            planned = outcome.planned,
            changed = outcome.changed,
            "subtree selected"
        );
        Ok(outcome)
    }

    /// Identities from the root down to `target`, inclusive.
    fn path_from_root(model: &SchemaModel, target: NodeId) -> Result<Vec<NodeId>, SelectError> {
        let mut path = vec![target];
        let mut current = model.node(target)?;
        while let Some(parent) = current.parent() {
            if path.len() > model.len() {
                return Err(SelectError::InvariantViolation(format!(
                    "parent chain of {target} does not terminate"
                )));
            }
            current = model.node(parent).map_err(|_| {
                SelectError::InvariantViolation(format!(
                    "parent {parent} of {} is not in the model",
                    current.id()
                ))
            })?;
            path.push(parent);
        }
        if current.id() != model.root_id() {
            return Err(SelectError::InvariantViolation(format!(
                "node {target} does not reach the root"
            )));
        }
        path.reverse();
        Ok(path)
    }

    /// Plan the flag `chosen` for `from` and derive its whole subtree.
    fn resolve(
        &self,
        model: &SchemaModel,
        dictionary: &FragmentDictionary,
        plan: &mut Plan,
        from: NodeId,
        chosen: bool,
    ) -> Result<(), SelectError> {
        let mut stack = vec![(from, chosen)];
        while let Some((id, chosen)) = stack.pop() {
            let node = model.node(id)?;
            let data = node.data();

            let mut patch = SchemaNodePatch::chosen(chosen);
            if chosen && data.kind.is_leaf() {
                let (attributes, type_name) = self.resolve_leaf(dictionary, &data.value);
                patch.chosen_attributes = Some(attributes);
                patch.chosen_type = Some(type_name);
            }
            plan.record(id, patch);

            let children = node.children();
            if chosen && data.kind == NodeKind::Or {
                let candidates = children
                    .iter()
                    .map(|&child| model.data(child).map(|d| (child, d.probability)))
                    .collect::<Result<Vec<_>, _>>()?;
                let best = most_probable(candidates, self.config.tie_break);
                stack.extend(children.iter().rev().map(|&child| (child, Some(child) == best)));
            } else {
                stack.extend(children.iter().rev().map(|&child| (child, chosen)));
            }
        }
        Ok(())
    }

    /// Attributes at or above the threshold, in fragment order, and the most
    /// probable value type. A leaf without a fragment keeps nothing and
    /// falls back to [`DEFAULT_TYPE`].
    fn resolve_leaf(&self, dictionary: &FragmentDictionary, key: &str) -> (Vec<String>, String) {
        let Some(entry) = dictionary.get(key) else {
            return (Vec::new(), DEFAULT_TYPE.to_string());
        };
        let attributes = entry
            .attributes
            .iter()
            .filter(|(_, candidate)| candidate.probability >= self.config.attribute_threshold)
            .map(|(name, _)| name.clone())
            .collect();
        let type_name = most_probable(
            entry.types.iter().map(|(name, p)| (name, *p)),
            self.config.tie_break,
        )
        .map_or_else(|| DEFAULT_TYPE.to_string(), String::clone);
        (attributes, type_name)
    }
}
