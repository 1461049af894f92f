use foundation::NodeId;
use layers::Legend;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Node,
    Leaf,
}

/// A grouping with no activatable content of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub label: String,
    pub parent_id: NodeId,
    /// Source order; encodes the source's drawing priority.
    pub children: Vec<TreeItem>,
    /// Initial checkbox state only.
    pub enabled: bool,
}

/// One directly activatable layer or sub-layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLeaf {
    pub id: NodeId,
    pub label: String,
    pub parent_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    pub enabled: bool,
}

impl TreeNode {
    pub fn new(id: NodeId, label: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            id,
            label: label.into(),
            parent_id,
            children: Vec::new(),
            enabled: false,
        }
    }
}

impl TreeLeaf {
    pub fn new(id: NodeId, label: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            id,
            label: label.into(),
            parent_id,
            legend: None,
            enabled: false,
        }
    }
}

/// One item of a normalized layer tree.
///
/// The root of a tree is its own parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeItem {
    Node(TreeNode),
    Leaf(TreeLeaf),
}

impl TreeItem {
    pub fn id(&self) -> NodeId {
        match self {
            TreeItem::Node(n) => n.id,
            TreeItem::Leaf(l) => l.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TreeItem::Node(n) => &n.label,
            TreeItem::Leaf(l) => &l.label,
        }
    }

    pub fn parent_id(&self) -> NodeId {
        match self {
            TreeItem::Node(n) => n.parent_id,
            TreeItem::Leaf(l) => l.parent_id,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            TreeItem::Node(n) => n.enabled,
            TreeItem::Leaf(l) => l.enabled,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            TreeItem::Node(_) => ItemKind::Node,
            TreeItem::Leaf(_) => ItemKind::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeItem::Leaf(_))
    }

    pub fn is_root(&self) -> bool {
        self.id() == self.parent_id()
    }

    pub fn children(&self) -> &[TreeItem] {
        match self {
            TreeItem::Node(n) => &n.children,
            TreeItem::Leaf(_) => &[],
        }
    }

    pub fn legend(&self) -> Option<&Legend> {
        match self {
            TreeItem::Node(_) => None,
            TreeItem::Leaf(l) => l.legend.as_ref(),
        }
    }

    /// Depth-first traversal in child order, starting with `self`.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeLeaf> {
        self.iter().filter_map(|item| match item {
            TreeItem::Leaf(l) => Some(l),
            TreeItem::Node(_) => None,
        })
    }

    /// Finds `id` within the subtree rooted at `self`.
    pub fn find(&self, id: NodeId) -> Option<&TreeItem> {
        self.iter().find(|item| item.id() == id)
    }

    pub fn strip_legends(&mut self) {
        match self {
            TreeItem::Node(n) => n.children.iter_mut().for_each(TreeItem::strip_legends),
            TreeItem::Leaf(l) => l.legend = None,
        }
    }
}

impl From<TreeNode> for TreeItem {
    fn from(value: TreeNode) -> Self {
        TreeItem::Node(value)
    }
}

impl From<TreeLeaf> for TreeItem {
    fn from(value: TreeLeaf) -> Self {
        TreeItem::Leaf(value)
    }
}

pub struct Preorder<'a> {
    stack: Vec<&'a TreeItem>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a TreeItem;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.stack.pop()?;
        self.stack.extend(item.children().iter().rev());
        Some(item)
    }
}
