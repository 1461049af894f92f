use foundation::{NodeId, RegistrationId};
use futures_util::future::join_all;
use layers::HostMap;
use providers::{
    ActivationDelta, LayerRegistration, NormalizeError, Normalized, ServiceMetadataClient,
    normalize,
};
use tracing::{debug, error, info, warn};
use tree::TreeItem;

use crate::cascade::{
    CascadeError, Plan, plan_activate_leaf, plan_activate_node, plan_deactivate_leaf,
    plan_deactivate_node,
};
use crate::error::ControlError;
use crate::events::{Event, EventBus, TreeEvent};
use crate::state::ActivationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlOptions {
    /// Expose legends to the renderer; when off, resolved trees carry none.
    pub render_legends: bool,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            render_legends: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug)]
struct Resolved {
    normalized: Normalized,
    state: ActivationState,
}

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(Box<Resolved>),
    Failed(String),
}

#[derive(Debug)]
struct Entry {
    id: RegistrationId,
    registration: LayerRegistration,
    slot: Slot,
}

#[derive(Debug, Clone, Copy)]
enum Toggle {
    ActivateLeaf,
    DeactivateLeaf,
    ActivateNode,
    DeactivateNode,
}

/// The layer-tree control: registrations in display order, their resolved
/// trees and activation state, and the host map their mutators drive.
#[derive(Debug)]
pub struct LayerTreeControl<M: HostMap> {
    host: M,
    options: ControlOptions,
    next_id: u64,
    entries: Vec<Entry>,
    events: EventBus,
}

impl<M: HostMap> LayerTreeControl<M> {
    pub fn new(host: M, options: ControlOptions) -> Self {
        Self {
            host,
            options,
            next_id: 0,
            entries: Vec::new(),
            events: EventBus::new(),
        }
    }

    /// Reserves a display slot for `registration`; it resolves on the next
    /// [`load_all`](Self::load_all).
    pub fn register(&mut self, registration: LayerRegistration) -> RegistrationId {
        self.next_id += 1;
        let id = RegistrationId(self.next_id);
        debug!("{id}: registered {:?} ({})", registration.name(), registration.kind());
        self.entries.push(Entry {
            id,
            registration,
            slot: Slot::Pending,
        });
        id
    }

    /// Normalizes every pending registration concurrently.
    ///
    /// Results come back in registration order whatever order the fetches
    /// complete in. A failed registration keeps its slot and reports
    /// [`RegistrationStatus::Failed`].
    pub async fn load_all(
        &mut self,
        client: &dyn ServiceMetadataClient,
    ) -> Vec<Result<RegistrationId, ControlError>> {
        let pending: Vec<(RegistrationId, LayerRegistration)> = self
            .entries
            .iter()
            .filter(|e| matches!(e.slot, Slot::Pending))
            .map(|e| (e.id, e.registration.clone()))
            .collect();

        let results = join_all(
            pending
                .iter()
                .map(|(id, registration)| normalize(*id, registration, client)),
        )
        .await;

        pending
            .iter()
            .zip(results)
            .map(|((id, _), result)| self.finish(*id, result))
            .collect()
    }

    /// Registers and resolves one registration after the control is loaded.
    pub async fn add_layer(
        &mut self,
        registration: LayerRegistration,
        client: &dyn ServiceMetadataClient,
    ) -> Result<RegistrationId, ControlError> {
        let id = self.register(registration.clone());
        let result = normalize(id, &registration, client).await;
        self.finish(id, result)
    }

    fn finish(
        &mut self,
        id: RegistrationId,
        result: Result<Normalized, NormalizeError>,
    ) -> Result<RegistrationId, ControlError> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return Err(ControlError::UnknownRegistration(id));
        };

        match result {
            Ok(mut normalized) => {
                if !self.options.render_legends {
                    normalized.tree.strip_legends();
                }
                let state = ActivationState::seed(&normalized.tree);
                normalized.mutator.attach(&mut self.host);
                info!(
                    "{id}: resolved {:?} with {} items",
                    entry.registration.name(),
                    normalized.index.len()
                );
                entry.slot = Slot::Ready(Box::new(Resolved { normalized, state }));
                self.events.emit(TreeEvent::Resolved { registration: id });
                Ok(id)
            }
            Err(source) => {
                warn!("{id}: normalization failed: {source}");
                entry.slot = Slot::Failed(source.to_string());
                self.events.emit(TreeEvent::Failed {
                    registration: id,
                    message: source.to_string(),
                });
                Err(ControlError::Normalize {
                    registration: id,
                    source,
                })
            }
        }
    }

    pub fn activate_leaf(
        &mut self,
        main: RegistrationId,
        leaf: NodeId,
    ) -> Result<ActivationDelta, ControlError> {
        self.toggle(main, leaf, Toggle::ActivateLeaf)
    }

    pub fn deactivate_leaf(
        &mut self,
        main: RegistrationId,
        leaf: NodeId,
    ) -> Result<ActivationDelta, ControlError> {
        self.toggle(main, leaf, Toggle::DeactivateLeaf)
    }

    pub fn activate_node(
        &mut self,
        main: RegistrationId,
        node: NodeId,
    ) -> Result<ActivationDelta, ControlError> {
        self.toggle(main, node, Toggle::ActivateNode)
    }

    pub fn deactivate_node(
        &mut self,
        main: RegistrationId,
        node: NodeId,
    ) -> Result<ActivationDelta, ControlError> {
        self.toggle(main, node, Toggle::DeactivateNode)
    }

    fn toggle(
        &mut self,
        main: RegistrationId,
        id: NodeId,
        toggle: Toggle,
    ) -> Result<ActivationDelta, ControlError> {
        let resolved = resolved_mut(&mut self.entries, main)?;
        let index = &resolved.normalized.index;
        let state = &resolved.state;
        let plan: Plan = match toggle {
            Toggle::ActivateLeaf => plan_activate_leaf(index, state, id),
            Toggle::DeactivateLeaf => plan_deactivate_leaf(index, state, id),
            Toggle::ActivateNode => plan_activate_node(index, state, id),
            Toggle::DeactivateNode => plan_deactivate_node(index, state, id),
        }?;

        if let Err(e) = resolved.normalized.mutator.apply(&plan.delta, &mut self.host) {
            error!("{main}: {toggle:?} {id} rejected: {e}");
            return Err(e.into());
        }

        for (node, checked) in &plan.changes {
            resolved.state.set_checked(*node, *checked);
            self.events.emit(TreeEvent::CheckedChanged {
                registration: main,
                node: *node,
                checked: *checked,
            });
        }
        for (node, dormant) in &plan.dormant {
            resolved.state.set_dormant(*node, *dormant);
        }
        info!(
            "{main}: {toggle:?} {id}: add {:?}, remove {:?}",
            plan.delta.add, plan.delta.remove
        );
        Ok(plan.delta)
    }

    /// Records whether `node` is expanded. Returns whether the flag changed.
    pub fn set_expanded(
        &mut self,
        main: RegistrationId,
        node: NodeId,
        expanded: bool,
    ) -> Result<bool, ControlError> {
        let resolved = resolved_mut(&mut self.entries, main)?;
        if !resolved.normalized.index.contains(node) {
            return Err(CascadeError::UnknownNode(node).into());
        }
        let changed = resolved.state.set_expanded(node, expanded);
        if changed {
            self.events.emit(TreeEvent::Expanded {
                registration: main,
                node,
                expanded,
            });
        }
        Ok(changed)
    }

    /// Registration ids in display order, resolved or not.
    pub fn registrations(&self) -> impl Iterator<Item = RegistrationId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn status(&self, id: RegistrationId) -> Option<RegistrationStatus> {
        self.entry(id).map(|e| match e.slot {
            Slot::Pending => RegistrationStatus::Pending,
            Slot::Ready(_) => RegistrationStatus::Ready,
            Slot::Failed(_) => RegistrationStatus::Failed,
        })
    }

    pub fn failure(&self, id: RegistrationId) -> Option<&str> {
        match &self.entry(id)?.slot {
            Slot::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn tree(&self, id: RegistrationId) -> Option<&TreeItem> {
        self.resolved(id).map(|r| &r.normalized.tree)
    }

    /// Resolved trees in display order.
    pub fn trees(&self) -> impl Iterator<Item = (RegistrationId, &TreeItem)> + '_ {
        self.entries.iter().filter_map(|e| match &e.slot {
            Slot::Ready(r) => Some((e.id, &r.normalized.tree)),
            _ => None,
        })
    }

    pub fn state(&self, id: RegistrationId) -> Option<&ActivationState> {
        self.resolved(id).map(|r| &r.state)
    }

    pub fn is_checked(&self, main: RegistrationId, node: NodeId) -> Option<bool> {
        let resolved = self.resolved(main)?;
        resolved
            .normalized
            .index
            .contains(node)
            .then(|| resolved.state.is_checked(node))
    }

    pub fn options(&self) -> ControlOptions {
        self.options
    }

    pub fn host(&self) -> &M {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut M {
        &mut self.host
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    fn entry(&self, id: RegistrationId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn resolved(&self, id: RegistrationId) -> Option<&Resolved> {
        match &self.entry(id)?.slot {
            Slot::Ready(r) => Some(&**r),
            _ => None,
        }
    }
}

fn resolved_mut(entries: &mut [Entry], id: RegistrationId) -> Result<&mut Resolved, ControlError> {
    let entry = entries
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or(ControlError::UnknownRegistration(id))?;
    match &mut entry.slot {
        Slot::Ready(r) => Ok(&mut **r),
        Slot::Pending | Slot::Failed(_) => Err(ControlError::NotReady(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlOptions, LayerTreeControl, RegistrationStatus};
    use crate::error::ControlError;
    use crate::events::TreeEvent;
    use foundation::{NodeId, RegistrationId, SubLayerId};
    use layers::{InMemoryHostMap, LayerId, LegendInput, MapLayer, ServiceLayer};
    use pretty_assertions::assert_eq;
    use providers::{
        InMemoryMetadataClient, LayerRegistration, MutatorError, RegistrationKind,
        ServiceInfo, ServiceLegend, ServiceRegistration, StaticRegistration, SubLayerInfo,
    };

    const URL: &str = "https://host/arcgis/rest/services/Hydro/MapServer";
    const SINGLE_URL: &str = "https://host/arcgis/rest/services/Wells/MapServer";

    fn client() -> InMemoryMetadataClient {
        let mut client = InMemoryMetadataClient::new();
        client.insert(
            URL,
            ServiceInfo {
                layers: vec![
                    SubLayerInfo::group(1, "Hydro", -1, [2, 3]),
                    SubLayerInfo::leaf(2, "Rivers", 1),
                    SubLayerInfo::leaf(3, "Lakes", 1),
                ],
            },
            ServiceLegend::default(),
        );
        client.insert(
            SINGLE_URL,
            ServiceInfo {
                layers: vec![SubLayerInfo::leaf(0, "Wells", -1)],
            },
            ServiceLegend::default(),
        );
        client
    }

    fn control() -> LayerTreeControl<InMemoryHostMap> {
        LayerTreeControl::new(InMemoryHostMap::new(), ControlOptions::default())
    }

    fn hydro(visible: &[i64]) -> ServiceRegistration {
        ServiceRegistration::new("Hydro", ServiceLayer::new(50, URL))
            .with_visible_layers(visible.iter().copied())
    }

    fn basemaps() -> LayerRegistration {
        LayerRegistration::Static(StaticRegistration::group(
            "Basemaps",
            vec![
                StaticRegistration::leaf("Streets", MapLayer::new(10)).enabled(),
                StaticRegistration::leaf("Imagery", MapLayer::new(11)),
            ],
        ))
    }

    fn sublayers(ids: &[i64]) -> Vec<SubLayerId> {
        ids.iter().copied().map(SubLayerId).collect()
    }

    #[tokio::test]
    async fn activating_a_service_leaf_updates_the_sublayer_list() {
        let mut control = control();
        let id = control.register(LayerRegistration::ServiceDynamic(hydro(&[2])));
        let results = control.load_all(&client()).await;
        assert!(results[0].is_ok());
        assert_eq!(control.is_checked(id, NodeId::Item(1)), Some(true));
        assert_eq!(
            control.host().visible_sublayers(LayerId(50)),
            Some(&sublayers(&[2])[..])
        );

        let delta = control.activate_leaf(id, NodeId::Item(3)).unwrap();
        assert_eq!(delta.add, vec![NodeId::Item(3)]);
        assert!(delta.remove.is_empty());
        assert_eq!(control.is_checked(id, NodeId::Item(3)), Some(true));
        assert_eq!(control.is_checked(id, NodeId::Item(1)), Some(true));
        assert_eq!(
            control.host().visible_sublayers(LayerId(50)),
            Some(&sublayers(&[2, 3])[..])
        );
    }

    #[tokio::test]
    async fn static_root_toggles_restore_checked_leaves() {
        let mut control = control();
        let id = control.register(basemaps());
        control.load_all(&client()).await;
        let root = NodeId::Registration(id);
        assert!(control.host().is_shown(LayerId(10)));
        assert!(!control.host().is_shown(LayerId(11)));

        let delta = control.deactivate_node(id, root).unwrap();
        assert_eq!(delta.remove, vec![root, NodeId::Item(1000)]);
        assert!(!control.host().is_shown(LayerId(10)));
        assert_eq!(control.is_checked(id, root), Some(false));
        assert_eq!(control.is_checked(id, NodeId::Item(1000)), Some(false));

        let delta = control.activate_node(id, root).unwrap();
        assert_eq!(delta.add, vec![NodeId::Item(1000)]);
        assert!(control.host().is_shown(LayerId(10)));
        assert!(!control.host().is_shown(LayerId(11)));
        assert_eq!(control.is_checked(id, root), Some(true));
        assert_eq!(control.is_checked(id, NodeId::Item(1000)), Some(true));
    }

    #[tokio::test]
    async fn checked_leaves_match_the_host_after_group_and_sibling_toggles() {
        let mut control = control();
        let id = control.register(LayerRegistration::ServiceDynamic(hydro(&[2])));
        control.load_all(&client()).await;

        control.deactivate_node(id, NodeId::Item(1)).unwrap();
        let delta = control.activate_leaf(id, NodeId::Item(3)).unwrap();
        assert_eq!(delta.add, vec![NodeId::Item(3)]);
        assert_eq!(control.is_checked(id, NodeId::Item(1)), Some(true));
        assert_eq!(control.is_checked(id, NodeId::Item(2)), Some(false));

        let assert_in_sync = |control: &LayerTreeControl<InMemoryHostMap>| {
            let visible = control
                .host()
                .visible_sublayers(LayerId(50))
                .map(<[_]>::to_vec)
                .unwrap_or_default();
            for (leaf, sublayer) in [(2, SubLayerId(2)), (3, SubLayerId(3))] {
                assert_eq!(
                    control.is_checked(id, NodeId::Item(leaf)),
                    Some(visible.contains(&sublayer)),
                    "leaf {leaf} against {visible:?}"
                );
            }
        };
        assert_in_sync(&control);
        assert_eq!(
            control.host().visible_sublayers(LayerId(50)),
            Some(&sublayers(&[3])[..])
        );

        // Switching the group back on restores the leaf it switched off.
        control.activate_node(id, NodeId::Item(1)).unwrap();
        assert_in_sync(&control);
        assert_eq!(control.is_checked(id, NodeId::Item(2)), Some(true));
    }

    #[tokio::test]
    async fn deactivate_node_is_idempotent() {
        let mut control = control();
        let id = control.register(LayerRegistration::ServiceDynamic(hydro(&[2, 3])));
        control.load_all(&client()).await;

        let first = control.deactivate_node(id, NodeId::Item(1)).unwrap();
        let state = control.state(id).cloned();
        let visible = control.host().visible_sublayers(LayerId(50)).map(<[_]>::to_vec);

        let second = control.deactivate_node(id, NodeId::Item(1)).unwrap();
        assert_eq!(first.remove, vec![NodeId::Item(1), NodeId::Item(2), NodeId::Item(3)]);
        // The leaves are already off, so only the group id is resent.
        assert_eq!(second.remove, vec![NodeId::Item(1)]);
        assert_eq!(control.state(id).cloned(), state);
        assert_eq!(
            control.host().visible_sublayers(LayerId(50)).map(<[_]>::to_vec),
            visible
        );
        assert_eq!(visible, Some(vec![]));
    }

    #[tokio::test]
    async fn feature_services_reject_toggles_without_changing_state() {
        let mut control = control();
        let id = control.register(LayerRegistration::ServiceFeature(hydro(&[2])));
        control.load_all(&client()).await;
        control.drain_events();

        let err = control.activate_leaf(id, NodeId::Item(3)).unwrap_err();
        assert!(matches!(
            err,
            ControlError::Mutator(MutatorError::Unsupported {
                kind: RegistrationKind::ServiceFeature
            })
        ));
        assert_eq!(control.is_checked(id, NodeId::Item(3)), Some(false));
        assert!(control.events().is_empty());
    }

    #[tokio::test]
    async fn failed_registrations_keep_their_slot() {
        let mut control = control();
        let missing = control.register(LayerRegistration::ServiceDynamic(
            ServiceRegistration::new("Gone", ServiceLayer::new(1, "https://host/gone/MapServer")),
        ));
        let base = control.register(basemaps());
        let service = control.register(LayerRegistration::ServiceDynamic(hydro(&[])));

        let results = control.load_all(&client()).await;
        assert!(matches!(results[0], Err(ControlError::Normalize { .. })));
        assert_eq!(results[1].as_ref().ok(), Some(&base));
        assert_eq!(results[2].as_ref().ok(), Some(&service));

        assert_eq!(
            control.registrations().collect::<Vec<_>>(),
            vec![missing, base, service]
        );
        assert_eq!(control.status(missing), Some(RegistrationStatus::Failed));
        assert!(control.failure(missing).is_some());
        assert_eq!(
            control.trees().map(|(id, _)| id).collect::<Vec<_>>(),
            vec![base, service]
        );
        assert!(matches!(
            control.activate_leaf(missing, NodeId::Item(1)),
            Err(ControlError::NotReady(_))
        ));

        let events: Vec<TreeEvent> = control.drain_events().into_iter().map(|e| e.event).collect();
        assert!(matches!(events[0], TreeEvent::Failed { registration, .. } if registration == missing));
        assert_eq!(
            events[1..].to_vec(),
            vec![
                TreeEvent::Resolved { registration: base },
                TreeEvent::Resolved {
                    registration: service
                },
            ]
        );
    }

    #[tokio::test]
    async fn pending_registrations_are_not_ready() {
        let mut control = control();
        let id = control.register(basemaps());
        assert_eq!(control.status(id), Some(RegistrationStatus::Pending));
        assert!(matches!(
            control.activate_leaf(id, NodeId::Item(1000)),
            Err(ControlError::NotReady(_))
        ));
        assert!(matches!(
            control.activate_leaf(RegistrationId(99), NodeId::Item(1)),
            Err(ControlError::UnknownRegistration(_))
        ));
    }

    #[tokio::test]
    async fn legends_are_stripped_when_disabled() {
        let legend = LegendInput::Url("https://host/legend.png".to_string());
        let registration = LayerRegistration::Static(
            StaticRegistration::leaf("Parcels", MapLayer::new(3)).with_legend(legend),
        );

        let mut with = control();
        let id = with.add_layer(registration.clone(), &client()).await.unwrap();
        assert!(with.tree(id).unwrap().legend().is_some());

        let mut without = LayerTreeControl::new(
            InMemoryHostMap::new(),
            ControlOptions {
                render_legends: false,
            },
        );
        let id = without.add_layer(registration, &client()).await.unwrap();
        assert!(without.tree(id).unwrap().legend().is_none());
    }

    #[tokio::test]
    async fn collapsed_service_leaf_shows_the_whole_layer() {
        let mut control = control();
        let id = control
            .add_layer(
                LayerRegistration::ServiceDynamic(ServiceRegistration::new(
                    "Wells",
                    ServiceLayer::new(60, SINGLE_URL),
                )),
                &client(),
            )
            .await
            .unwrap();
        let root = NodeId::Registration(id);
        assert!(!control.host().is_shown(LayerId(60)));

        control.activate_leaf(id, root).unwrap();
        assert!(control.host().is_shown(LayerId(60)));
        assert_eq!(control.is_checked(id, root), Some(true));

        control.deactivate_leaf(id, root).unwrap();
        assert!(!control.host().is_shown(LayerId(60)));
    }

    #[tokio::test]
    async fn expansion_is_tracked_and_reported() {
        let mut control = control();
        let id = control.add_layer(basemaps(), &client()).await.unwrap();
        let root = NodeId::Registration(id);
        control.drain_events();

        assert!(control.set_expanded(id, root, true).unwrap());
        assert!(!control.set_expanded(id, root, true).unwrap());
        assert!(control.state(id).unwrap().is_expanded(root));
        assert_eq!(control.events().len(), 1);
        assert!(matches!(
            control.set_expanded(id, NodeId::Item(5), true),
            Err(ControlError::Cascade(_))
        ));
    }
}
