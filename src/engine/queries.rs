use ulid::Ulid;

use crate::model::*;

use super::overlap::ReservationFilter;
use super::Engine;

impl Engine {
    pub fn get_room(&self, id: &Ulid) -> Option<Room> {
        self.store.get_room(id)
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        self.store.rooms()
    }

    pub fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        self.store.get_reservation(id)
    }

    pub fn query_reservations(&self, filter: &ReservationFilter) -> Vec<Reservation> {
        self.store.query(filter)
    }
}
