use crate::model::Ms;

pub const MAX_ROOMS_PER_TENANT: usize = 100_000;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 256;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 9999-12-31T23:59:59.999Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;

/// Upper bound on `$n` placeholders accepted by the extended protocol.
pub const MAX_QUERY_PARAMS: usize = 64;
