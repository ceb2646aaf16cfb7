use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix epoch milliseconds, UTC.
pub type Ms = i64;

/// Optionally bounded closed range `[from, to]` used to query reservations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: Option<Ms>,
    pub to: Option<Ms>,
}

impl Period {
    pub fn new(from: Option<Ms>, to: Option<Ms>) -> Self {
        Self { from, to }
    }

    pub fn between(from: Ms, to: Ms) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: Option<String>,
}

/// A booking of a room for the closed range `[rented_from, rented_to]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    /// Start of day (00:00:00.000 UTC), inclusive.
    pub rented_from: Ms,
    /// End of day (23:59:59.999 UTC), inclusive.
    pub rented_to: Ms,
    pub is_canceled: bool,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        !self.is_canceled
    }

    /// Closed-interval intersection; touching endpoints count.
    pub fn overlaps(&self, other: &Reservation) -> bool {
        self.rented_from <= other.rented_to && other.rented_from <= self.rented_to
    }
}

/// A reservation before the store has assigned it an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReservation {
    pub room_id: Ulid,
    pub rented_from: Ms,
    pub rented_to: Ms,
}

/// Partial update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationPatch {
    pub room_id: Option<Ulid>,
    pub rented_from: Option<Ms>,
    pub rented_to: Option<Ms>,
    pub is_canceled: Option<bool>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self.room_id.is_none()
            && self.rented_from.is_none()
            && self.rented_to.is_none()
            && self.is_canceled.is_none()
    }

    pub fn cancel() -> Self {
        Self {
            is_canceled: Some(true),
            ..Self::default()
        }
    }

    /// Merge onto `current`, returning the full updated document.
    pub fn apply_to(&self, current: &Reservation) -> Reservation {
        Reservation {
            id: current.id,
            room_id: self.room_id.unwrap_or(current.room_id),
            rented_from: self.rented_from.unwrap_or(current.rented_from),
            rented_to: self.rented_to.unwrap_or(current.rented_to),
            is_canceled: self.is_canceled.unwrap_or(current.is_canceled),
        }
    }
}

/// One WAL record. Replaying them in order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: Option<String>,
    },
    RoomDeleted {
        id: Ulid,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    /// Carries the full merged document, not the patch.
    ReservationUpdated {
        reservation: Reservation,
    },
    ReservationDeleted {
        id: Ulid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(from: Ms, to: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            room_id: Ulid::new(),
            rented_from: from,
            rented_to: to,
            is_canceled: false,
        }
    }

    #[test]
    fn overlap_is_closed_interval() {
        let a = reservation(100, 200);
        let touching = reservation(200, 300);
        let after = reservation(201, 300);
        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&after));
    }

    #[test]
    fn overlap_containment() {
        let outer = reservation(0, 1000);
        let inner = reservation(400, 500);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let current = reservation(100, 200);
        let patch = ReservationPatch {
            rented_to: Some(500),
            ..ReservationPatch::default()
        };
        let merged = patch.apply_to(&current);
        assert_eq!(merged.id, current.id);
        assert_eq!(merged.room_id, current.room_id);
        assert_eq!(merged.rented_from, 100);
        assert_eq!(merged.rented_to, 500);
        assert!(!merged.is_canceled);
    }

    #[test]
    fn cancel_patch() {
        let patch = ReservationPatch::cancel();
        assert!(!patch.is_empty());
        assert!(ReservationPatch::default().is_empty());
        let merged = patch.apply_to(&reservation(0, 10));
        assert!(merged.is_canceled);
        assert!(!merged.is_active());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            reservation: reservation(0, 86_399_999),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
