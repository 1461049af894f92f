use std::collections::{BTreeMap, BTreeSet};

use foundation::SubLayerId;

use crate::layer::LayerId;

/// The map surface that owns live layer objects.
///
/// Implementations must tolerate repeated adds and removals of absent layers.
pub trait HostMap {
    fn add_layer(&mut self, layer: LayerId);
    fn remove_layer(&mut self, layer: LayerId);
    /// Replaces the full list of visible sub-layers of a service layer.
    fn set_visible_sublayers(&mut self, layer: LayerId, sublayers: &[SubLayerId]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Add(LayerId),
    Remove(LayerId),
    SetSublayers(LayerId, Vec<SubLayerId>),
}

/// Host map that only records state; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryHostMap {
    shown: BTreeSet<LayerId>,
    sublayers: BTreeMap<LayerId, Vec<SubLayerId>>,
    calls: Vec<HostCall>,
}

impl InMemoryHostMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shown(&self, layer: LayerId) -> bool {
        self.shown.contains(&layer)
    }

    pub fn shown(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.shown.iter().copied()
    }

    pub fn visible_sublayers(&self, layer: LayerId) -> Option<&[SubLayerId]> {
        self.sublayers.get(&layer).map(Vec::as_slice)
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn drain_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }
}

impl HostMap for InMemoryHostMap {
    fn add_layer(&mut self, layer: LayerId) {
        self.shown.insert(layer);
        self.calls.push(HostCall::Add(layer));
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.shown.remove(&layer);
        self.calls.push(HostCall::Remove(layer));
    }

    fn set_visible_sublayers(&mut self, layer: LayerId, sublayers: &[SubLayerId]) {
        self.sublayers.insert(layer, sublayers.to_vec());
        self.calls
            .push(HostCall::SetSublayers(layer, sublayers.to_vec()));
    }
}
