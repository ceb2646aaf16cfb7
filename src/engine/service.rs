use std::sync::Arc;

use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::conflict::{check_no_conflict, validate_period, validate_timestamp};
use super::dates::{self, format_date};
use super::locks::RoomLocks;
use super::overlap::ReservationFilter;
use super::store::{ReservationStore, RoomLookup};
use super::EngineError;

/// Business rules for reservations: day normalization and the no-overlap
/// invariant over active reservations of a room.
///
/// Check-and-write runs under a per-room lock held by the service, so two
/// concurrent creates for the same room cannot both pass the overlap check.
/// Updates are re-validated the same way.
pub struct ReservationService {
    rooms: Arc<dyn RoomLookup>,
    store: Arc<dyn ReservationStore>,
    locks: RoomLocks,
}

impl ReservationService {
    pub fn new(rooms: Arc<dyn RoomLookup>, store: Arc<dyn ReservationStore>) -> Self {
        Self {
            rooms,
            store,
            locks: RoomLocks::new(),
        }
    }

    /// Book `room_id` from the start of `rented_from`'s day through the end
    /// of `rented_to`'s day (UTC).
    pub async fn create(
        &self,
        room_id: Ulid,
        rented_from: Ms,
        rented_to: Ms,
    ) -> Result<Reservation, EngineError> {
        let room = self
            .rooms
            .find_room(room_id)
            .await?
            .ok_or(EngineError::RoomNotFound(room_id))?;

        validate_timestamp(rented_from)?;
        validate_timestamp(rented_to)?;
        let from = dates::start_of_day(rented_from);
        let to = dates::end_of_day(rented_to);
        validate_period(from, to)?;

        let _guard = self.locks.lock(room.id).await;
        let filter = ReservationFilter::overlapping(room.id, Period::between(from, to));
        check_no_conflict(self.store.as_ref(), &filter).await?;

        let reservation = self
            .store
            .create(NewReservation {
                room_id: room.id,
                rented_from: from,
                rented_to: to,
            })
            .await?;
        info!(
            "reservation {} created: room {} {}..{}",
            reservation.id,
            room.id,
            format_date(from),
            format_date(to)
        );
        Ok(reservation)
    }

    /// Active reservations of `room_id` intersecting the normalized `period`.
    pub async fn find_for_room(
        &self,
        room_id: Ulid,
        period: Period,
    ) -> Result<Vec<Reservation>, EngineError> {
        validate_bounds(period)?;
        let filter = ReservationFilter::overlapping(room_id, dates::normalize(period));
        self.store.find(&filter).await
    }

    pub async fn find_one_by_id(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        self.store.find_by_id(id).await
    }

    /// Normalize supplied dates, merge, and write the full record back.
    ///
    /// If the merged record is active it must not overlap any other active
    /// reservation of its room. Canceling always succeeds.
    pub async fn update(
        &self,
        id: Ulid,
        patch: ReservationPatch,
    ) -> Result<Option<Reservation>, EngineError> {
        let requested = Period::new(patch.rented_from, patch.rented_to);
        validate_bounds(requested)?;
        let normalized = dates::normalize(requested);
        let patch = ReservationPatch {
            rented_from: normalized.from,
            rented_to: normalized.to,
            ..patch
        };

        loop {
            let Some(seen) = self.store.find_by_id(id).await? else {
                return Ok(None);
            };
            let target_room = patch.room_id.unwrap_or(seen.room_id);
            if target_room != seen.room_id && self.rooms.find_room(target_room).await?.is_none() {
                return Err(EngineError::RoomNotFound(target_room));
            }

            let _guards = self.locks.lock_all(&[seen.room_id, target_room]).await;
            let Some(current) = self.store.find_by_id(id).await? else {
                return Ok(None);
            };
            if current.room_id != seen.room_id {
                continue;
            }

            let merged = patch.apply_to(&current);
            validate_period(merged.rented_from, merged.rented_to)?;
            if merged.is_active() {
                let filter = ReservationFilter::overlapping(
                    merged.room_id,
                    Period::between(merged.rented_from, merged.rented_to),
                )
                .excluding(id);
                check_no_conflict(self.store.as_ref(), &filter).await?;
            }

            let updated = self.store.find_by_id_and_update(id, &patch).await?;
            debug!("reservation {id} updated: {patch:?}");
            return Ok(updated);
        }
    }

    /// Hard delete. Returns the record as it was at deletion time.
    pub async fn delete(&self, id: Ulid) -> Result<Option<Reservation>, EngineError> {
        let removed = self.store.find_by_id_and_delete(id).await?;
        if let Some(r) = &removed {
            info!("reservation {} deleted from room {}", r.id, r.room_id);
        }
        Ok(removed)
    }
}

fn validate_bounds(period: Period) -> Result<(), EngineError> {
    period.from.into_iter().chain(period.to).try_for_each(validate_timestamp)
}
