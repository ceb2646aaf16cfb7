use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roomkeeper_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roomkeeper_query_duration_seconds";

/// Counter: creates and updates rejected for overlapping an active reservation.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "roomkeeper_reservation_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

pub const CONNECTIONS_ACTIVE: &str = "roomkeeper_connections_active";
pub const CONNECTIONS_TOTAL: &str = "roomkeeper_connections_total";
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomkeeper_connections_rejected_total";

/// Gauge: loaded tenants.
pub const TENANTS_ACTIVE: &str = "roomkeeper_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomkeeper_wal_flush_duration_seconds";

/// Histogram: events per WAL group commit.
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomkeeper_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "roomkeeper_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a command, used as a metric label.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::DeleteRoom { .. } => "delete_room",
        Command::SelectRooms => "select_rooms",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::SelectReservation { .. } => "select_reservation",
        Command::SelectRoomReservations { .. } => "select_room_reservations",
        Command::UpdateReservation { .. } => "update_reservation",
        Command::DeleteReservation { .. } => "delete_reservation",
    }
}
