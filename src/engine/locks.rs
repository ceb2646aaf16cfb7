use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

/// One async mutex per room, created on first use and dropped again once
/// nobody holds or waits for it.
#[derive(Default)]
pub(crate) struct RoomLocks {
    locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

/// Held room lock. Releasing the last handle removes the room's entry.
pub(crate) struct RoomGuard<'a> {
    locks: &'a RoomLocks,
    room_id: Ulid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(self.room_id);
    }
}

impl RoomLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn handle(&self, room_id: Ulid) -> Arc<Mutex<()>> {
        self.locks.entry(room_id).or_default().clone()
    }

    /// Waiters keep a clone of the handle, so a count of one means the map
    /// holds the only reference. Both sides run under the shard lock.
    fn prune(&self, room_id: Ulid) {
        self.locks
            .remove_if(&room_id, |_, handle| Arc::strong_count(handle) == 1);
    }

    pub(crate) async fn lock(&self, room_id: Ulid) -> RoomGuard<'_> {
        let guard = self.handle(room_id).lock_owned().await;
        RoomGuard {
            locks: self,
            room_id,
            guard: Some(guard),
        }
    }

    /// Acquire several rooms in sorted order to prevent deadlocks.
    pub(crate) async fn lock_all(&self, room_ids: &[Ulid]) -> Vec<RoomGuard<'_>> {
        let mut ids = room_ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
