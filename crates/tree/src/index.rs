use std::collections::HashMap;

use foundation::NodeId;

use crate::model::{ItemKind, TreeItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    DuplicateId(NodeId),
    /// `parent` is not the structural parent of `id`.
    DanglingParent { id: NodeId, parent: NodeId },
    /// The root must name itself as parent.
    RootHasParent { root: NodeId, parent: NodeId },
    /// Deriving the `index`-th child id of `parent` overflowed.
    IdSpaceExhausted { parent: NodeId, index: usize },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::DuplicateId(id) => write!(f, "duplicate tree id {id}"),
            TreeError::DanglingParent { id, parent } => {
                write!(f, "tree item {id} names {parent} as parent")
            }
            TreeError::RootHasParent { root, parent } => {
                write!(f, "tree root {root} names {parent} as parent")
            }
            TreeError::IdSpaceExhausted { parent, index } => {
                write!(f, "cannot derive id for child {index} of {parent}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: ItemKind,
    /// `None` for the root.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 1 for the root.
    pub depth: usize,
}

/// Id-keyed view of one normalized tree, built once after normalization.
#[derive(Debug, Clone)]
pub struct TreeIndex {
    root: NodeId,
    entries: HashMap<NodeId, IndexEntry>,
    preorder: Vec<NodeId>,
}

impl TreeIndex {
    /// Indexes `tree`, rejecting duplicate ids and inconsistent parent links.
    pub fn build(tree: &TreeItem) -> Result<Self, TreeError> {
        let root = tree.id();
        if tree.parent_id() != root {
            return Err(TreeError::RootHasParent {
                root,
                parent: tree.parent_id(),
            });
        }

        let mut entries: HashMap<NodeId, IndexEntry> = HashMap::new();
        let mut preorder: Vec<NodeId> = Vec::new();
        let mut stack: Vec<(&TreeItem, Option<NodeId>, usize)> = vec![(tree, None, 1)];

        while let Some((item, parent, depth)) = stack.pop() {
            let id = item.id();
            if let Some(parent) = parent
                && item.parent_id() != parent
            {
                return Err(TreeError::DanglingParent {
                    id,
                    parent: item.parent_id(),
                });
            }

            let entry = IndexEntry {
                kind: item.kind(),
                parent,
                children: item.children().iter().map(TreeItem::id).collect(),
                depth,
            };
            if entries.insert(id, entry).is_some() {
                return Err(TreeError::DuplicateId(id));
            }
            preorder.push(id);

            for child in item.children().iter().rev() {
                stack.push((child, Some(id), depth + 1));
            }
        }

        Ok(Self {
            root,
            entries,
            preorder,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.preorder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preorder.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<ItemKind> {
        self.entries.get(&id).map(|e| e.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(&id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entries
            .get(&id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// All ids in depth-first child order.
    pub fn preorder(&self) -> &[NodeId] {
        &self.preorder
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            next: self.parent(id),
        }
    }

    /// Descendants of `id` in depth-first child order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            index: self,
            stack: self.children(id).iter().rev().copied().collect(),
        }
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }
}

pub struct Ancestors<'a> {
    index: &'a TreeIndex,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.index.parent(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    index: &'a TreeIndex,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.index.children(current).iter().rev().copied());
        Some(current)
    }
}
