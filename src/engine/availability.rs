use crate::model::*;

use super::EngineError;

// ── Availability Checker ──────────────────────────────────────────

/// Decide whether `span` can be booked in the ledger's room.
///
/// Booking conflicts win: if any existing booking overlaps, the room is
/// simply unavailable (`Ok(false)`), even when maintenance also overlaps.
/// Otherwise every overlapping maintenance window is collected and reported
/// as `MaintenanceConflict`.
pub fn check_availability(ledger: &RoomLedger, span: &Span) -> Result<bool, EngineError> {
    if let Some(existing) = ledger.overlapping(span).next() {
        tracing::debug!(
            room = %ledger.room.name,
            booking_id = existing.id,
            "room busy: overlaps existing booking {}",
            existing.span
        );
        return Ok(false);
    }

    let windows: Vec<Span> = ledger.room.maintenance_overlapping(span).copied().collect();
    if !windows.is_empty() {
        return Err(EngineError::MaintenanceConflict {
            room: ledger.room.name.clone(),
            windows,
        });
    }

    Ok(true)
}

/// Plain free/busy test with maintenance treated as busy. Used by the
/// available-rooms listing, where maintenance is a filter rather than an error.
pub fn is_free(ledger: &RoomLedger, span: &Span) -> bool {
    ledger.overlapping(span).next().is_none()
        && ledger.room.maintenance_overlapping(span).next().is_none()
}
