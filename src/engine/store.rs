use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;
use super::overlap::{ReservationFilter, sort_reservations};

/// Resolves room ids. The reservation service only needs existence.
#[async_trait]
pub trait RoomLookup: Send + Sync {
    async fn find_room(&self, id: Ulid) -> Result<Option<Room>, EngineError>;
}

/// Persistence boundary for reservations. Owns no business rules.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a new active reservation; the store assigns the id.
    async fn create(&self, new: NewReservation) -> Result<Reservation, EngineError>;

    async fn find(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, EngineError>;

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Reservation>, EngineError>;

    /// Returns the post-update document, or `None` if `id` is unknown.
    async fn find_by_id_and_update(
        &self,
        id: Ulid,
        patch: &ReservationPatch,
    ) -> Result<Option<Reservation>, EngineError>;

    /// Returns the removed document, or `None` if `id` is unknown.
    async fn find_by_id_and_delete(&self, id: Ulid) -> Result<Option<Reservation>, EngineError>;
}

pub struct InMemoryStore {
    rooms: DashMap<Ulid, Room>,
    reservations: DashMap<Ulid, Reservation>,
    /// Room → reservation ids, canceled ones included.
    by_room: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            reservations: DashMap::new(),
            by_room: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, id: &Ulid) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get_room(&self, id: &Ulid) -> Option<Room> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn insert_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    pub fn remove_room(&self, id: &Ulid) -> Option<Room> {
        self.by_room.remove(id);
        self.rooms.remove(id).map(|(_, room)| room)
    }

    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.id);
        rooms
    }

    // ── Reservations ─────────────────────────────────────────

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn room_reservation_count(&self, room_id: &Ulid) -> usize {
        self.by_room.get(room_id).map_or(0, |ids| ids.len())
    }

    pub fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        self.reservations.get(id).map(|e| e.value().clone())
    }

    pub fn insert_reservation(&self, reservation: Reservation) {
        self.by_room
            .entry(reservation.room_id)
            .or_default()
            .push(reservation.id);
        self.reservations.insert(reservation.id, reservation);
    }

    /// Overwrite a stored reservation, moving it between room indexes if needed.
    pub fn replace_reservation(&self, reservation: Reservation) -> Option<Reservation> {
        let previous = self.reservations.insert(reservation.id, reservation.clone());
        match &previous {
            Some(old) if old.room_id != reservation.room_id => {
                self.unindex(&old.room_id, &reservation.id);
                self.by_room
                    .entry(reservation.room_id)
                    .or_default()
                    .push(reservation.id);
            }
            Some(_) => {}
            None => {
                self.by_room
                    .entry(reservation.room_id)
                    .or_default()
                    .push(reservation.id);
            }
        }
        previous
    }

    pub fn remove_reservation(&self, id: &Ulid) -> Option<Reservation> {
        let (_, removed) = self.reservations.remove(id)?;
        self.unindex(&removed.room_id, id);
        Some(removed)
    }

    fn unindex(&self, room_id: &Ulid, id: &Ulid) {
        if let Some(mut ids) = self.by_room.get_mut(room_id) {
            ids.retain(|r| r != id);
        }
    }

    /// Evaluate `filter` against the room's reservations.
    pub fn query(&self, filter: &ReservationFilter) -> Vec<Reservation> {
        let ids = match self.by_room.get(&filter.room_id) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        let mut hits: Vec<Reservation> = ids
            .iter()
            .filter_map(|id| self.get_reservation(id))
            .filter(|r| filter.matches(r))
            .collect();
        sort_reservations(&mut hits);
        hits
    }

    /// Every reservation, rooms in id order. Used for compaction.
    pub fn all_reservations(&self) -> Vec<Reservation> {
        let mut all: Vec<Reservation> = self
            .reservations
            .iter()
            .map(|e| e.value().clone())
            .collect();
        all.sort_by_key(|r| (r.room_id, r.rented_from, r.id));
        all
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::RoomCreated { id, name } => self.insert_room(Room {
                id: *id,
                name: name.clone(),
            }),
            Event::RoomDeleted { id } => {
                self.remove_room(id);
            }
            Event::ReservationCreated { reservation } => {
                self.insert_reservation(reservation.clone());
            }
            Event::ReservationUpdated { reservation } => {
                self.replace_reservation(reservation.clone());
            }
            Event::ReservationDeleted { id } => {
                self.remove_reservation(id);
            }
        }
    }
}

#[async_trait]
impl RoomLookup for InMemoryStore {
    async fn find_room(&self, id: Ulid) -> Result<Option<Room>, EngineError> {
        Ok(self.get_room(&id))
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, EngineError> {
        let reservation = Reservation {
            id: Ulid::new(),
            room_id: new.room_id,
            rented_from: new.rented_from,
            rented_to: new.rented_to,
            is_canceled: false,
        };
        self.insert_reservation(reservation.clone());
        Ok(reservation)
    }

    async fn find(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.query(filter))
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.get_reservation(&id))
    }

    async fn find_by_id_and_update(
        &self,
        id: Ulid,
        patch: &ReservationPatch,
    ) -> Result<Option<Reservation>, EngineError> {
        let Some(current) = self.get_reservation(&id) else {
            return Ok(None);
        };
        let updated = patch.apply_to(&current);
        self.replace_reservation(updated.clone());
        Ok(Some(updated))
    }

    async fn find_by_id_and_delete(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.remove_reservation(&id))
    }
}
