use std::collections::BTreeSet;

use foundation::NodeId;
use tree::TreeItem;

/// Checked and expanded flags for one registration's tree.
///
/// This is the only record of what the user has switched on; renderers read
/// it rather than holding their own copy. A checked leaf is always active on
/// the provider. Leaves switched off together with their group are kept as
/// dormant so that re-activating the group brings them back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationState {
    checked: BTreeSet<NodeId>,
    dormant: BTreeSet<NodeId>,
    expanded: BTreeSet<NodeId>,
}

impl ActivationState {
    /// Seeds checked flags from each item's `enabled`.
    pub fn seed(tree: &TreeItem) -> Self {
        Self {
            checked: tree
                .iter()
                .filter(|item| item.enabled())
                .map(TreeItem::id)
                .collect(),
            dormant: BTreeSet::new(),
            expanded: BTreeSet::new(),
        }
    }

    pub fn is_checked(&self, id: NodeId) -> bool {
        self.checked.contains(&id)
    }

    /// Returns whether the flag changed.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> bool {
        if checked {
            self.checked.insert(id)
        } else {
            self.checked.remove(&id)
        }
    }

    pub fn checked(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.checked.iter().copied()
    }

    pub fn is_dormant(&self, id: NodeId) -> bool {
        self.dormant.contains(&id)
    }

    pub fn set_dormant(&mut self, id: NodeId, dormant: bool) -> bool {
        if dormant {
            self.dormant.insert(id)
        } else {
            self.dormant.remove(&id)
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> bool {
        if expanded {
            self.expanded.insert(id)
        } else {
            self.expanded.remove(&id)
        }
    }
}
