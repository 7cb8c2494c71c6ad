//! Observer registry for gameplay events.

use std::fmt;

use chronoshift_core::Event;

/// Handle returned when registering a listener; used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Numeric value of the handle.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

type Listener = Box<dyn FnMut(&Event)>;

/// Listeners notified in registration order.
#[derive(Default)]
pub(crate) struct EventListeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl EventListeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&mut self, events: &[Event]) {
        for event in events {
            for (_, listener) in &mut self.entries {
                listener(event);
            }
        }
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("registered", &self.entries.len())
            .finish()
    }
}
