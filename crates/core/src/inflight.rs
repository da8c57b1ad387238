use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::booking::BookingId;
use crate::lifecycle::BookingAction;

type Key = (BookingId, BookingAction);

/// Tracks mutations that have been sent and not yet answered, so a control
/// can stay disabled and a second click is refused instead of re-sent.
#[derive(Clone, Debug, Default)]
pub struct InFlightRegistry {
    pending: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightRegistry {
    /// Returns `None` when the same action is already outstanding for the
    /// booking.
    pub fn try_begin(
        &self,
        booking_id: BookingId,
        action: BookingAction,
    ) -> Option<InFlightTicket> {
        let inserted = match self.pending.lock() {
            Ok(mut pending) => pending.insert((booking_id, action)),
            Err(poisoned) => poisoned.into_inner().insert((booking_id, action)),
        };
        inserted.then(|| InFlightTicket {
            registry: self.clone(),
            key: (booking_id, action),
        })
    }

    pub fn is_in_flight(&self, booking_id: BookingId, action: BookingAction) -> bool {
        match self.pending.lock() {
            Ok(pending) => pending.contains(&(booking_id, action)),
            Err(poisoned) => poisoned.into_inner().contains(&(booking_id, action)),
        }
    }

    fn release(&self, key: &Key) {
        match self.pending.lock() {
            Ok(mut pending) => pending.remove(key),
            Err(poisoned) => poisoned.into_inner().remove(key),
        };
    }
}

/// Releases its slot in the registry when dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    registry: InFlightRegistry,
    key: Key,
}

impl InFlightTicket {
    pub fn booking_id(&self) -> BookingId {
        self.key.0
    }

    pub fn action(&self) -> BookingAction {
        self.key.1
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
