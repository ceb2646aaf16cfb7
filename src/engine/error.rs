use ulid::Ulid;

use crate::engine::dates::format_date;
use crate::model::Ms;

#[derive(Debug)]
pub enum EngineError {
    /// The referenced room does not exist.
    RoomNotFound(Ulid),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Overlaps this active reservation on the same room.
    Conflict(Ulid),
    HasReservations(Ulid),
    InvalidPeriod {
        from: Ms,
        to: Ms,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            EngineError::HasReservations(id) => {
                write!(f, "cannot delete room {id}: has reservations")
            }
            EngineError::InvalidPeriod { from, to } => write!(
                f,
                "invalid period: rented_from {} is after rented_to {}",
                format_date(*from),
                format_date(*to)
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
