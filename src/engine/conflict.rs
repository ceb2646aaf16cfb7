use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::overlap::ReservationFilter;
use super::store::ReservationStore;

/// Raw input bound, checked before any day arithmetic.
pub(crate) fn validate_timestamp(ms: Ms) -> Result<(), EngineError> {
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&ms) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

pub(crate) fn validate_period(from: Ms, to: Ms) -> Result<(), EngineError> {
    if from < MIN_VALID_TIMESTAMP_MS || to > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if from > to {
        return Err(EngineError::InvalidPeriod { from, to });
    }
    Ok(())
}

/// Fails with `Conflict` naming the earliest active reservation matching `filter`.
pub(crate) async fn check_no_conflict(
    store: &dyn ReservationStore,
    filter: &ReservationFilter,
) -> Result<(), EngineError> {
    let existing = store.find(filter).await?;
    if let Some(first) = existing.first() {
        metrics::counter!(crate::observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
        return Err(EngineError::Conflict(first.id));
    }
    Ok(())
}
