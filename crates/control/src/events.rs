use foundation::{NodeId, RegistrationId};

/// Notifications for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// The registration's tree is ready to render.
    Resolved { registration: RegistrationId },
    /// Normalization failed; the placeholder stays empty.
    Failed {
        registration: RegistrationId,
        message: String,
    },
    CheckedChanged {
        registration: RegistrationId,
        node: NodeId,
        checked: bool,
    },
    Expanded {
        registration: RegistrationId,
        node: NodeId,
        expanded: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Position in emission order, starting at 0.
    pub seq: u64,
    pub event: TreeEvent,
}

#[derive(Debug, Default)]
pub struct EventBus {
    next_seq: u64,
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: TreeEvent) {
        self.events.push(Event {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
