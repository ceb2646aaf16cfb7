use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError};
use crate::observability::WAL_COMPACTIONS_TOTAL;

const COMPACT_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites a tenant's WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&engine, threshold).await {
            warn!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when at least `threshold` events were appended since the last
/// compaction. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        debug!("compaction skipped: {appends} appends < {threshold}");
        return Ok(false);
    }
    match engine.compact_wal().await {
        Ok(()) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            info!("compacted WAL after {appends} appends");
            Ok(true)
        }
        Err(e) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "error").increment(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roomkeeper_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let engine = Engine::new(path.clone()).unwrap();
        let room = Ulid::new();
        engine.create_room(room, None).await.unwrap();

        assert!(!compact_if_due(&engine, 5).await.unwrap());

        for day in 0..4 {
            let from = day * crate::engine::dates::DAY_MS;
            engine
                .insert_reservation(NewReservation {
                    room_id: room,
                    rented_from: from,
                    rented_to: from + 1,
                })
                .await
                .unwrap();
        }
        assert_eq!(engine.wal_appends_since_compact().await, 5);
        assert!(compact_if_due(&engine, 5).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        let replayed = Engine::new(path).unwrap();
        assert_eq!(replayed.store.reservation_count(), 4);
        assert!(replayed.get_room(&room).is_some());
    }

    #[tokio::test]
    async fn compaction_drops_deleted_history() {
        let path = test_wal_path("history.wal");
        let engine = Engine::new(path.clone()).unwrap();
        let room = Ulid::new();
        engine.create_room(room, None).await.unwrap();
        let kept = engine
            .insert_reservation(NewReservation {
                room_id: room,
                rented_from: 0,
                rented_to: 10,
            })
            .await
            .unwrap();
        let gone = engine
            .insert_reservation(NewReservation {
                room_id: room,
                rented_from: 100,
                rented_to: 110,
            })
            .await
            .unwrap();
        engine.delete_reservation(gone.id).await.unwrap();

        let before = std::fs::metadata(&path).unwrap().len();
        assert!(compact_if_due(&engine, 1).await.unwrap());
        assert!(std::fs::metadata(&path).unwrap().len() < before);

        let replayed = Engine::new(path).unwrap();
        assert_eq!(replayed.get_reservation(&kept.id), Some(kept));
        assert!(replayed.get_reservation(&gone.id).is_none());
    }
}
