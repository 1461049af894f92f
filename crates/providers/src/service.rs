//! Service-hierarchy normalizer.
//!
//! A map service reports its sub-layers as a flat list where every entry names
//! its parent and, for groups, its children. This module turns that list into
//! a normalized tree rooted at the registration.

use std::collections::{HashMap, HashSet};

use foundation::{NodeId, RegistrationId, SubLayerId};
use futures_util::future::try_join;
use layers::Legend;
use tracing::{debug, info, warn};
use tree::{TreeItem, TreeLeaf, TreeNode};

use crate::NormalizeError;
use crate::metadata::{ServiceInfo, ServiceLegend, ServiceMetadataClient, SubLayerInfo};
use crate::registration::ServiceRegistration;

/// Result of normalizing a service registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTree {
    pub root: TreeItem,
    /// Active sub-layers at construction, in registration order.
    pub active: Vec<SubLayerId>,
    /// The service reported at most one layer and is represented by one leaf.
    pub collapsed: bool,
}

/// Fetches hierarchy and legend metadata concurrently and builds the tree.
///
/// Either fetch failing fails the whole normalization.
pub async fn fetch_service_tree(
    id: RegistrationId,
    registration: &ServiceRegistration,
    client: &dyn ServiceMetadataClient,
) -> Result<ServiceTree, NormalizeError> {
    let service = &registration.layer;
    debug!("{id}: fetching metadata from {}", service.base_url());

    let (hierarchy, legend) = try_join(client.fetch_info(service), client.fetch_legend(service))
        .await
        .map_err(NormalizeError::Fetch)?;

    let tree = build_service_tree(id, registration, hierarchy, &legend);
    info!(
        "{id}: normalized {:?} ({} items, collapsed={})",
        registration.name,
        tree.root.iter().count(),
        tree.collapsed
    );
    Ok(tree)
}

pub fn build_service_tree(
    id: RegistrationId,
    registration: &ServiceRegistration,
    info: ServiceInfo,
    legend: &ServiceLegend,
) -> ServiceTree {
    let root_id = NodeId::Registration(id);
    let legends: HashMap<SubLayerId, Legend> = legend
        .entries_by_layer(registration.layer.base_url())
        .into_iter()
        .filter_map(|(layer, entries)| Legend::from_entries(entries).map(|l| (layer, l)))
        .collect();

    let mut active: Vec<SubLayerId> = Vec::new();
    for layer in &registration.visible_layers {
        if !active.contains(layer) {
            active.push(*layer);
        }
    }

    // A service with one layer has no hierarchy worth showing.
    if info.layers.len() <= 1 {
        let only = info.layers.first();
        let mut leaf = TreeLeaf::new(root_id, registration.name.clone(), root_id);
        leaf.legend = only.and_then(|l| legends.get(&l.id).cloned());
        leaf.enabled =
            only.is_some_and(|l| registration.all_visible || active.contains(&l.id));
        return ServiceTree {
            root: leaf.into(),
            active,
            collapsed: true,
        };
    }

    let sublayers: Vec<SubLayerInfo> = match &registration.sublayer_allow_list {
        Some(allowed) => info
            .layers
            .into_iter()
            .filter(|l| allowed.contains(&l.id))
            .collect(),
        None => info.layers,
    };

    if registration.all_visible {
        for l in &sublayers {
            if !active.contains(&l.id) {
                active.push(l.id);
            }
        }
    }

    let active_set: HashSet<SubLayerId> = active.iter().copied().collect();
    let mut builder = Builder {
        by_id: sublayers.iter().map(|l| (l.id, l)).collect(),
        legends: &legends,
        active: &active_set,
        visited: HashSet::new(),
    };

    let mut root = TreeNode::new(root_id, registration.name.clone(), root_id);
    for layer in sublayers.iter().filter(|l| l.parent_layer_id.is_none()) {
        if let Some(item) = builder.build(layer, root_id) {
            root.children.push(item);
        }
    }
    root.enabled = root.children.iter().any(TreeItem::enabled);

    ServiceTree {
        root: root.into(),
        active,
        collapsed: false,
    }
}

struct Builder<'a> {
    by_id: HashMap<SubLayerId, &'a SubLayerInfo>,
    legends: &'a HashMap<SubLayerId, Legend>,
    active: &'a HashSet<SubLayerId>,
    visited: HashSet<SubLayerId>,
}

impl<'a> Builder<'a> {
    fn build(&mut self, layer: &'a SubLayerInfo, parent: NodeId) -> Option<TreeItem> {
        if !self.visited.insert(layer.id) {
            warn!("sub-layer {} is listed more than once; keeping the first", layer.id);
            return None;
        }

        let id = NodeId::sublayer(layer.id);
        let enabled = self.active.contains(&layer.id);

        let children = layer.sub_layer_ids.as_deref().unwrap_or(&[]);
        if children.is_empty() {
            let mut leaf = TreeLeaf::new(id, layer.name.clone(), parent);
            leaf.legend = self.legends.get(&layer.id).cloned();
            leaf.enabled = enabled;
            return Some(leaf.into());
        }

        let mut node = TreeNode::new(id, layer.name.clone(), parent);
        for child_id in children {
            // Hidden sub-layers take their whole subtree with them.
            let Some(child) = self.by_id.get(child_id).copied() else {
                debug!("sub-layer {child_id} under {} is not listed; skipping", layer.id);
                continue;
            };
            if let Some(item) = self.build(child, id) {
                node.children.push(item);
            }
        }
        // A group with an active descendant starts checked.
        node.enabled = enabled || node.children.iter().any(TreeItem::enabled);
        Some(node.into())
    }
}
