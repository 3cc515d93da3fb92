use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roomalloc_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roomalloc_query_duration_seconds";

/// Counter: allocation attempts. Labels: outcome (`allocated` or the rejection kind).
pub const ALLOCATIONS_TOTAL: &str = "roomalloc_allocations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: bookings currently held in the ledger.
pub const BOOKINGS_ACTIVE: &str = "roomalloc_bookings_active";

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomalloc_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomalloc_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomalloc_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertBooking { .. } => "insert_booking",
        Command::SelectBooking { .. } => "select_booking",
        Command::SelectRoomBookings { .. } => "select_room_bookings",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::DeleteAllBookings => "delete_all_bookings",
        Command::SelectRooms => "select_rooms",
        Command::SelectAvailability { .. } => "select_availability",
    }
}
