//! Status events delivered to subscribers.

use airtouch_protocol::{AcStatus, GroupStatus};

/// Decoded status snapshot, published once per status message received.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Ac(Vec<AcStatus>),
    Groups(Vec<GroupStatus>),
}

impl StatusEvent {
    /// Number of records carried by the event.
    pub fn len(&self) -> usize {
        match self {
            StatusEvent::Ac(records) => records.len(),
            StatusEvent::Groups(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
