use std::sync::Arc;

use crate::model::*;

use super::availability::is_free;
use super::interval::parse_span;
use super::{Engine, EngineError};

impl Engine {
    /// Snapshot of a booking.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let guard = self.resolve_booking_read(id).await?;
        guard
            .get(id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))
    }

    /// Bookings of one room ordered by start. With `within`, only bookings
    /// strictly overlapping that span. Unknown rooms have no bookings.
    pub async fn bookings_for_room(
        &self,
        room: &str,
        within: Option<Span>,
    ) -> Result<Vec<Booking>, EngineError> {
        if self.catalog().find_by_name(room).is_none() {
            return Ok(vec![]);
        }
        let guard = self.room_ledger(room)?.read_owned().await;
        Ok(match within {
            Some(span) => guard.overlapping(&span).cloned().collect(),
            None => guard.bookings.clone(),
        })
    }

    /// Rooms free of both bookings and maintenance between `start` and
    /// `end`, in catalog order.
    pub async fn available_rooms(&self, start: &str, end: &str) -> Result<Vec<Arc<Room>>, EngineError> {
        let span = parse_span(start, end)?;
        let guards = self.lock_all_read().await?;
        let free: Vec<Arc<Room>> = guards
            .iter()
            .filter(|g| is_free(g, &span))
            .map(|g| g.room.clone())
            .collect();
        tracing::debug!(%span, found = free.len(), "available rooms");
        Ok(free)
    }

    pub fn list_rooms(&self) -> Vec<Arc<Room>> {
        self.catalog().list_all().to_vec()
    }
}
