use crate::events::SlotEvent;

/// Gate turning the raw event stream into distinct slot transitions.
///
/// Holds the last accepted event, starting from an empty sentinel at slot 0. The owner
/// must call [`SlotTracker::advance`] once it is done processing a new slot so the next
/// transition is evaluated against it.
#[derive(Debug, Default)]
pub struct SlotTracker {
    last_accepted: SlotEvent,
}

impl SlotTracker {
    pub fn last_accepted(&self) -> &SlotEvent {
        &self.last_accepted
    }

    pub fn is_duplicate(&self, event: &SlotEvent) -> bool {
        self.last_accepted.is_same_slot(event)
    }

    /// The event whose proposer is audited when the next slot arrives.
    ///
    /// `None` until an event with a proposer has been accepted.
    pub fn previous(&self) -> Option<&SlotEvent> {
        if self.last_accepted.proposer_index.is_empty() {
            None
        } else {
            Some(&self.last_accepted)
        }
    }

    pub fn advance(&mut self, event: SlotEvent) {
        if !self.is_duplicate(&event) {
            self.last_accepted = event;
        }
    }
}
