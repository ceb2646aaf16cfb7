use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_room(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        if self.store.room_count() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("room name too long"));
        }

        let _guard = self.room_locks.lock(id).await;
        if self.store.contains_room(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        self.persist_and_apply(&Event::RoomCreated { id, name }).await?;
        info!("room {id} created");
        Ok(())
    }

    /// Rooms with reservations (canceled ones included) cannot be deleted.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _guard = self.room_locks.lock(id).await;
        if !self.store.contains_room(&id) {
            return Err(EngineError::NotFound(id));
        }
        if self.store.room_reservation_count(&id) > 0 {
            return Err(EngineError::HasReservations(id));
        }

        self.persist_and_apply(&Event::RoomDeleted { id }).await?;
        info!("room {id} deleted");
        Ok(())
    }

    /// Insert an active reservation with a fresh id. No overlap check here;
    /// that belongs to the reservation service.
    pub async fn insert_reservation(&self, new: NewReservation) -> Result<Reservation, EngineError> {
        let _guard = self.room_locks.lock(new.room_id).await;
        if !self.store.contains_room(&new.room_id) {
            return Err(EngineError::RoomNotFound(new.room_id));
        }
        if self.store.room_reservation_count(&new.room_id) >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        let reservation = Reservation {
            id: Ulid::new(),
            room_id: new.room_id,
            rented_from: new.rented_from,
            rented_to: new.rented_to,
            is_canceled: false,
        };
        self.persist_and_apply(&Event::ReservationCreated {
            reservation: reservation.clone(),
        })
        .await?;
        debug!("reservation {} inserted on room {}", reservation.id, reservation.room_id);
        Ok(reservation)
    }

    /// Merge `patch` into the stored record and persist the full document.
    /// Returns the post-update record, or `None` for an unknown id.
    pub async fn update_reservation(
        &self,
        id: Ulid,
        patch: &ReservationPatch,
    ) -> Result<Option<Reservation>, EngineError> {
        loop {
            let Some(seen) = self.store.get_reservation(&id) else {
                return Ok(None);
            };
            let target_room = patch.room_id.unwrap_or(seen.room_id);
            let _guards = self.room_locks.lock_all(&[seen.room_id, target_room]).await;

            let Some(current) = self.store.get_reservation(&id) else {
                return Ok(None);
            };
            if current.room_id != seen.room_id {
                // Moved to another room while we waited for the lock.
                continue;
            }

            let updated = patch.apply_to(&current);
            if updated.room_id != current.room_id && !self.store.contains_room(&updated.room_id) {
                return Err(EngineError::RoomNotFound(updated.room_id));
            }
            if updated == current {
                return Ok(Some(current));
            }

            self.persist_and_apply(&Event::ReservationUpdated {
                reservation: updated.clone(),
            })
            .await?;
            debug!("reservation {id} updated");
            return Ok(Some(updated));
        }
    }

    /// Hard delete. Returns the record as it was before deletion.
    pub async fn delete_reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        loop {
            let Some(seen) = self.store.get_reservation(&id) else {
                return Ok(None);
            };
            let _guard = self.room_locks.lock(seen.room_id).await;

            let Some(current) = self.store.get_reservation(&id) else {
                return Ok(None);
            };
            if current.room_id != seen.room_id {
                continue;
            }

            self.persist_and_apply(&Event::ReservationDeleted { id }).await?;
            debug!("reservation {id} deleted");
            return Ok(Some(current));
        }
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;

        let rooms = self.store.rooms();
        let reservations = self.store.all_reservations();
        let mut events = Vec::with_capacity(rooms.len() + reservations.len());
        events.extend(
            rooms
                .into_iter()
                .map(|room| Event::RoomCreated { id: room.id, name: room.name }),
        );
        events.extend(
            reservations
                .into_iter()
                .map(|reservation| Event::ReservationCreated { reservation }),
        );

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
