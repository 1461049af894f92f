//! Static-hierarchy normalizer for caller-described map layers.

use std::collections::HashMap;

use foundation::{NodeId, RegistrationId};
use layers::{Layer, LayerId, MapLayer};
use tree::{TreeError, TreeItem, TreeLeaf, TreeNode};

use crate::NormalizeError;
use crate::mutator::StaticLayerMutator;
use crate::registration::{RegistrationError, StaticRegistration};

#[derive(Debug, Clone)]
pub struct StaticTree {
    pub root: TreeItem,
    pub mutator: StaticLayerMutator,
}

/// Normalizes a static registration.
///
/// Nothing here performs I/O; the function is async so both normalizers share
/// one calling convention.
pub async fn normalize_static(
    id: RegistrationId,
    registration: &StaticRegistration,
) -> Result<StaticTree, NormalizeError> {
    build_static_tree(id, registration)
}

pub fn build_static_tree(
    id: RegistrationId,
    registration: &StaticRegistration,
) -> Result<StaticTree, NormalizeError> {
    let root_id = NodeId::Registration(id);

    if registration.children.is_none() {
        let layer = registration
            .layer
            .as_ref()
            .ok_or_else(|| RegistrationError::MissingLayer {
                name: registration.name.clone(),
            })?;
        let leaf = build_leaf(root_id, root_id, registration, layer);
        let mutator = StaticLayerMutator::single(layer.id(), leaf.enabled);
        return Ok(StaticTree {
            root: leaf.into(),
            mutator,
        });
    }

    let mut handles: HashMap<NodeId, LayerId> = HashMap::new();
    let root = build_entry(root_id, root_id, registration, &mut handles)?;

    let shown: Vec<LayerId> = root
        .leaves()
        .filter(|l| l.enabled)
        .filter_map(|l| handles.get(&l.id).copied())
        .collect();

    Ok(StaticTree {
        root,
        mutator: StaticLayerMutator::group(handles, shown),
    })
}

fn build_entry(
    id: NodeId,
    parent: NodeId,
    entry: &StaticRegistration,
    handles: &mut HashMap<NodeId, LayerId>,
) -> Result<TreeItem, NormalizeError> {
    let Some(children) = &entry.children else {
        let layer = entry
            .layer
            .as_ref()
            .ok_or_else(|| RegistrationError::MissingLayer {
                name: entry.name.clone(),
            })?;
        handles.insert(id, layer.id());
        return Ok(build_leaf(id, parent, entry, layer).into());
    };

    let mut node = TreeNode::new(id, entry.name.clone(), parent);
    for (index, child) in children.iter().enumerate() {
        let child_id =
            NodeId::child(id, index).ok_or(TreeError::IdSpaceExhausted { parent: id, index })?;
        node.children
            .push(build_entry(child_id, id, child, handles)?);
    }
    node.enabled = entry.enabled || node.children.iter().any(TreeItem::enabled);
    Ok(node.into())
}

fn build_leaf(id: NodeId, parent: NodeId, entry: &StaticRegistration, layer: &MapLayer) -> TreeLeaf {
    let mut leaf = TreeLeaf::new(id, entry.name.clone(), parent);
    leaf.legend = match &entry.legend {
        Some(input) => input.clone().classify(),
        None => layer.synthesized_legend(),
    };
    leaf.enabled = entry.enabled;
    leaf
}

#[cfg(test)]
mod tests {
    use super::{build_static_tree, normalize_static};
    use crate::NormalizeError;
    use crate::registration::StaticRegistration;
    use foundation::{NodeId, RegistrationId};
    use layers::{LegendInput, LegendShape, MapLayer};
    use pretty_assertions::assert_eq;
    use tree::{ItemKind, TreeError, TreeIndex};

    #[tokio::test]
    async fn children_get_positional_ids() {
        let reg = StaticRegistration::group(
            "Basemaps",
            vec![
                StaticRegistration::leaf("A", MapLayer::new(10)),
                StaticRegistration::leaf("B", MapLayer::new(11)),
            ],
        );
        let tree = normalize_static(RegistrationId(7), &reg).await.unwrap();
        let ids: Vec<NodeId> = tree.root.children().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![NodeId::Item(7000), NodeId::Item(7001)]);
        assert_eq!(tree.root.id(), NodeId::Registration(RegistrationId(7)));
        assert_eq!(tree.root.label(), "Basemaps");

        // Rebuilding from the same input yields the same ids.
        let again = build_static_tree(RegistrationId(7), &reg).unwrap();
        assert_eq!(again.root, tree.root);
    }

    #[test]
    fn nested_groups_derive_ids_from_parent() {
        let reg = StaticRegistration::group(
            "Root",
            vec![StaticRegistration::group(
                "Inner",
                vec![StaticRegistration::leaf("Deep", MapLayer::new(1)).enabled()],
            )],
        );
        let tree = build_static_tree(RegistrationId(2), &reg).unwrap();
        let index = TreeIndex::build(&tree.root).unwrap();
        assert_eq!(index.kind(NodeId::Item(2000)), Some(ItemKind::Node));
        assert_eq!(index.parent(NodeId::Item(2_000_000)), Some(NodeId::Item(2000)));
        // Enabled leaves seed their groups.
        assert!(tree.root.find(NodeId::Item(2000)).unwrap().enabled());
        assert!(tree.root.enabled());
    }

    #[test]
    fn legends_are_classified_or_synthesized() {
        let wms = MapLayer::new(1)
            .with_url("https://maps.example.com/wms")
            .with_wms_layers("roads");
        let reg = StaticRegistration::group(
            "G",
            vec![
                StaticRegistration::leaf("explicit", wms.clone())
                    .with_legend(LegendInput::Url("https://host/x.png".to_string())),
                StaticRegistration::leaf("synthesized", wms),
                StaticRegistration::leaf("none", MapLayer::new(2)),
            ],
        );
        let tree = build_static_tree(RegistrationId(1), &reg).unwrap();
        let shapes: Vec<Option<LegendShape>> = tree
            .root
            .leaves()
            .map(|l| l.legend.as_ref().map(|lg| lg.shape()))
            .collect();
        assert_eq!(
            shapes,
            vec![Some(LegendShape::Single), Some(LegendShape::LargeImage), None]
        );
    }

    #[test]
    fn single_layer_registration_is_a_leaf() {
        let reg = StaticRegistration::leaf("Imagery", MapLayer::new(5)).enabled();
        let tree = build_static_tree(RegistrationId(4), &reg).unwrap();
        assert_eq!(tree.root.kind(), ItemKind::Leaf);
        assert!(tree.root.is_root());
        assert!(tree.root.enabled());
    }

    #[test]
    fn id_overflow_is_an_error() {
        let mut reg = StaticRegistration::leaf("leaf", MapLayer::new(1));
        for depth in 0..8 {
            reg = StaticRegistration::group(format!("level {depth}"), vec![reg]);
        }
        let err = build_static_tree(RegistrationId(9), &reg).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::Tree(TreeError::IdSpaceExhausted { .. })
        ));
    }
}
