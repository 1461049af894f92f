//! Cascading activation.
//!
//! Each toggle is planned against the current [`ActivationState`] without
//! mutating it. The caller applies the plan's delta through the provider
//! mutator and commits the checked-state changes only if that succeeds.

use std::collections::HashMap;

use foundation::NodeId;
use providers::ActivationDelta;
use tree::{ItemKind, TreeIndex};

use crate::state::ActivationState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    UnknownNode(NodeId),
    KindMismatch {
        node: NodeId,
        expected: ItemKind,
        found: ItemKind,
    },
}

impl std::fmt::Display for CascadeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeError::UnknownNode(id) => write!(f, "no tree item with id {id}"),
            CascadeError::KindMismatch {
                node,
                expected,
                found,
            } => write!(f, "tree item {node} is a {found:?}, expected a {expected:?}"),
        }
    }
}

impl std::error::Error for CascadeError {}

/// Outcome of planning one toggle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    pub delta: ActivationDelta,
    /// Checked flags that differ from the current state, in traversal order.
    pub changes: Vec<(NodeId, bool)>,
    /// Dormant flags that differ from the current state.
    pub dormant: Vec<(NodeId, bool)>,
}

impl Plan {
    fn check(&mut self, state: &ActivationState, id: NodeId, checked: bool) {
        if state.is_checked(id) != checked && !self.changes.iter().any(|(c, _)| *c == id) {
            self.changes.push((id, checked));
        }
    }

    fn park(&mut self, state: &ActivationState, id: NodeId, dormant: bool) {
        if state.is_dormant(id) != dormant && !self.dormant.iter().any(|(d, _)| *d == id) {
            self.dormant.push((id, dormant));
        }
    }

    /// Every ancestor of `id` becomes checked. The root has no ancestors.
    fn check_ancestors(&mut self, index: &TreeIndex, state: &ActivationState, id: NodeId) {
        for ancestor in index.ancestors(id) {
            self.check(state, ancestor, true);
        }
    }
}

fn expect_kind(index: &TreeIndex, id: NodeId, expected: ItemKind) -> Result<(), CascadeError> {
    let found = index.kind(id).ok_or(CascadeError::UnknownNode(id))?;
    if found != expected {
        return Err(CascadeError::KindMismatch {
            node: id,
            expected,
            found,
        });
    }
    Ok(())
}

/// Switches on exactly `leaf`; siblings keep their state.
pub fn plan_activate_leaf(
    index: &TreeIndex,
    state: &ActivationState,
    leaf: NodeId,
) -> Result<Plan, CascadeError> {
    expect_kind(index, leaf, ItemKind::Leaf)?;
    let mut plan = Plan {
        delta: ActivationDelta::new(vec![leaf], Vec::new()),
        ..Plan::default()
    };
    plan.check(state, leaf, true);
    plan.park(state, leaf, false);
    plan.check_ancestors(index, state, leaf);
    Ok(plan)
}

/// Switches off `leaf`. Ancestors stay checked.
pub fn plan_deactivate_leaf(
    index: &TreeIndex,
    state: &ActivationState,
    leaf: NodeId,
) -> Result<Plan, CascadeError> {
    expect_kind(index, leaf, ItemKind::Leaf)?;
    let mut plan = Plan {
        delta: ActivationDelta::new(Vec::new(), vec![leaf]),
        ..Plan::default()
    };
    plan.check(state, leaf, false);
    plan.park(state, leaf, false);
    Ok(plan)
}

/// Resets the subtree under `node` to the checked or dormant leaves whose
/// immediate group is checked, treating `node` itself as checked. Leaves under
/// an unchecked group are switched off and, if they were checked, go dormant.
/// Other leaves under a checked group are left alone.
pub fn plan_activate_node(
    index: &TreeIndex,
    state: &ActivationState,
    node: NodeId,
) -> Result<Plan, CascadeError> {
    expect_kind(index, node, ItemKind::Node)?;

    let mut group_checked: HashMap<NodeId, bool> = HashMap::new();
    group_checked.insert(node, true);

    let mut plan = Plan::default();
    // Preorder visits every group before its children.
    for id in index.descendants(node) {
        match index.kind(id) {
            Some(ItemKind::Node) => {
                group_checked.insert(id, state.is_checked(id));
            }
            Some(ItemKind::Leaf) => {
                let parent_on = index
                    .parent(id)
                    .and_then(|p| group_checked.get(&p).copied())
                    .unwrap_or(false);
                if !parent_on {
                    plan.delta.remove.push(id);
                    if state.is_checked(id) {
                        plan.check(state, id, false);
                        plan.park(state, id, true);
                    }
                } else if state.is_checked(id) || state.is_dormant(id) {
                    plan.delta.add.push(id);
                    plan.check(state, id, true);
                    plan.park(state, id, false);
                }
            }
            None => {}
        }
    }

    plan.check(state, node, true);
    plan.check_ancestors(index, state, node);
    Ok(plan)
}

/// Switches off every checked leaf under `node`, plus `node` itself. Those
/// leaves go dormant so a later activation of the group restores them.
pub fn plan_deactivate_node(
    index: &TreeIndex,
    state: &ActivationState,
    node: NodeId,
) -> Result<Plan, CascadeError> {
    expect_kind(index, node, ItemKind::Node)?;

    let mut plan = Plan::default();
    plan.delta.remove.push(node);
    plan.check(state, node, false);
    for id in index
        .descendants(node)
        .filter(|id| index.kind(*id) == Some(ItemKind::Leaf) && state.is_checked(*id))
    {
        plan.delta.remove.push(id);
        plan.check(state, id, false);
        plan.park(state, id, true);
    }
    Ok(plan)
}
