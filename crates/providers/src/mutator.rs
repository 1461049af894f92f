//! Provider activation mutators.
//!
//! A mutator receives the add/remove id sets computed by the cascade and
//! reconciles them against the live layers on the host map.

use std::collections::HashMap;

use foundation::{NodeId, SubLayerId};
use layers::{HostMap, LayerId};
use tracing::debug;

use crate::registration::RegistrationKind;

/// Leaf ids to switch on and off, in traversal order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationDelta {
    pub add: Vec<NodeId>,
    pub remove: Vec<NodeId>,
}

impl ActivationDelta {
    pub fn new(add: Vec<NodeId>, remove: Vec<NodeId>) -> Self {
        Self { add, remove }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutatorError {
    /// The registration type has no activation support. This is a wiring
    /// error, not a runtime condition.
    Unsupported { kind: RegistrationKind },
}

impl std::fmt::Display for MutatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutatorError::Unsupported { kind } => {
                write!(f, "activation is not implemented for {kind} registrations")
            }
        }
    }
}

impl std::error::Error for MutatorError {}

#[derive(Debug, Clone)]
pub enum ActivationMutator {
    ServiceDynamic(DynamicServiceMutator),
    ServiceFeature(FeatureServiceMutator),
    Static(StaticLayerMutator),
}

impl ActivationMutator {
    pub fn kind(&self) -> RegistrationKind {
        match self {
            ActivationMutator::ServiceDynamic(_) => RegistrationKind::ServiceDynamic,
            ActivationMutator::ServiceFeature(_) => RegistrationKind::ServiceFeature,
            ActivationMutator::Static(_) => RegistrationKind::Static,
        }
    }

    /// Puts the registration's initial layers on the host map.
    pub fn attach(&mut self, host: &mut dyn HostMap) {
        match self {
            ActivationMutator::ServiceDynamic(m) => m.attach(host),
            ActivationMutator::ServiceFeature(m) => host.add_layer(m.layer),
            ActivationMutator::Static(m) => m.attach(host),
        }
    }

    pub fn apply(
        &mut self,
        delta: &ActivationDelta,
        host: &mut dyn HostMap,
    ) -> Result<(), MutatorError> {
        match self {
            ActivationMutator::ServiceDynamic(m) => {
                m.apply(delta, host);
                Ok(())
            }
            ActivationMutator::ServiceFeature(_) => Err(MutatorError::Unsupported {
                kind: RegistrationKind::ServiceFeature,
            }),
            ActivationMutator::Static(m) => {
                m.apply(delta, host);
                Ok(())
            }
        }
    }
}

/// Keeps the full list of visible sub-layers for one dynamic service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicServiceMutator {
    layer: LayerId,
    active: Vec<SubLayerId>,
    /// The service is shown as one leaf; toggles show or hide the layer.
    collapsed: bool,
    shown: bool,
}

impl DynamicServiceMutator {
    pub fn new(layer: LayerId, active: Vec<SubLayerId>) -> Self {
        Self {
            layer,
            active,
            collapsed: false,
            shown: false,
        }
    }

    pub fn collapsed(layer: LayerId, active: Vec<SubLayerId>, shown: bool) -> Self {
        Self {
            layer,
            active,
            collapsed: true,
            shown,
        }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn active(&self) -> &[SubLayerId] {
        &self.active
    }

    fn attach(&mut self, host: &mut dyn HostMap) {
        if self.collapsed {
            if self.shown {
                host.add_layer(self.layer);
            }
            return;
        }
        host.add_layer(self.layer);
        host.set_visible_sublayers(self.layer, &self.active);
        self.shown = true;
    }

    fn apply(&mut self, delta: &ActivationDelta, host: &mut dyn HostMap) {
        if self.collapsed {
            self.shown = toggle_whole_layer(self.layer, self.shown, delta, host);
            return;
        }

        for id in delta.add.iter().filter_map(|id| id.as_sublayer()) {
            self.active.retain(|a| *a != id);
            self.active.push(id);
        }
        for id in delta.remove.iter().filter_map(|id| id.as_sublayer()) {
            self.active.retain(|a| *a != id);
        }
        debug!("layer {:?}: visible sub-layers {:?}", self.layer, self.active);
        host.set_visible_sublayers(self.layer, &self.active);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureServiceMutator {
    pub layer: LayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticLayerMutator {
    /// A declared hierarchy: each leaf id resolves to its own layer.
    Group {
        handles: HashMap<NodeId, LayerId>,
        initially_shown: Vec<LayerId>,
    },
    /// One layer shown or hidden as a whole.
    Single { layer: LayerId, shown: bool },
}

impl StaticLayerMutator {
    pub fn group(handles: HashMap<NodeId, LayerId>, initially_shown: Vec<LayerId>) -> Self {
        StaticLayerMutator::Group {
            handles,
            initially_shown,
        }
    }

    pub fn single(layer: LayerId, shown: bool) -> Self {
        StaticLayerMutator::Single { layer, shown }
    }

    fn attach(&mut self, host: &mut dyn HostMap) {
        match self {
            StaticLayerMutator::Group {
                initially_shown, ..
            } => {
                for layer in initially_shown.iter() {
                    host.add_layer(*layer);
                }
            }
            StaticLayerMutator::Single { layer, shown } => {
                if *shown {
                    host.add_layer(*layer);
                }
            }
        }
    }

    fn apply(&mut self, delta: &ActivationDelta, host: &mut dyn HostMap) {
        match self {
            StaticLayerMutator::Group { handles, .. } => {
                let resolve = |ids: &[NodeId]| -> Vec<LayerId> {
                    ids.iter()
                        .filter_map(|id| {
                            let layer = handles.get(id).copied();
                            if layer.is_none() {
                                debug!("node {id} has no layer of its own; skipping");
                            }
                            layer
                        })
                        .collect()
                };
                let add = resolve(&delta.add);
                let remove = resolve(&delta.remove);
                for layer in remove {
                    host.remove_layer(layer);
                }
                for layer in add {
                    host.add_layer(layer);
                }
            }
            StaticLayerMutator::Single { layer, shown } => {
                *shown = toggle_whole_layer(*layer, *shown, delta, host);
            }
        }
    }
}

/// Any add shows the layer; removes alone hide it. Returns the new state.
fn toggle_whole_layer(
    layer: LayerId,
    shown: bool,
    delta: &ActivationDelta,
    host: &mut dyn HostMap,
) -> bool {
    if !delta.add.is_empty() {
        host.add_layer(layer);
        true
    } else if !delta.remove.is_empty() {
        host.remove_layer(layer);
        false
    } else {
        shown
    }
}
