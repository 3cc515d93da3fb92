use tracing::{info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability::{ALLOCATIONS_TOTAL, BOOKINGS_ACTIVE};

use super::allocation::{Candidate, select_room};
use super::availability::check_availability;
use super::interval::validate;
use super::{Engine, EngineError};

impl Engine {
    /// Book the best-fitting room for `number_of_people` between `start` and
    /// `end` (`HH:mm`).
    ///
    /// Every room is write-locked for the duration of the evaluation, so the
    /// availability decision and the insertion are one atomic step.
    pub async fn allocate(
        &self,
        start: &str,
        end: &str,
        number_of_people: u32,
    ) -> Result<Confirmation, EngineError> {
        let result = self.try_allocate(start, end, number_of_people).await;
        match &result {
            Ok(confirmation) => {
                metrics::counter!(ALLOCATIONS_TOTAL, "outcome" => "allocated").increment(1);
                metrics::gauge!(BOOKINGS_ACTIVE).set(self.ledger.booking_count() as f64);
                info!(booking_id = confirmation.booking_id, "{confirmation}");
            }
            Err(e) => {
                metrics::counter!(ALLOCATIONS_TOTAL, "outcome" => e.kind()).increment(1);
                warn!(start, end, number_of_people, "booking rejected: {e}");
            }
        }
        result
    }

    async fn try_allocate(
        &self,
        start: &str,
        end: &str,
        number_of_people: u32,
    ) -> Result<Confirmation, EngineError> {
        let span = validate(start, end)?;
        if number_of_people < MIN_PARTY_SIZE {
            return Err(EngineError::InvalidNumberOfPeople(number_of_people));
        }

        let mut guards = self.lock_all_write().await?;

        let idx = {
            let mut candidates = Vec::with_capacity(guards.len());
            for guard in &guards {
                // A maintenance overlap on any room aborts the whole request.
                let available = check_availability(guard, &span)?;
                candidates.push(Candidate {
                    room: guard.room.as_ref(),
                    available,
                });
            }
            select_room(&candidates, number_of_people)?
        };

        let guard = &mut guards[idx];
        let booking = Booking {
            id: self.ledger.next_id(),
            room: guard.room.name.clone(),
            span,
            number_of_people,
        };
        let confirmation = Confirmation {
            booking_id: booking.id,
            room: booking.room.clone(),
            number_of_people,
            span,
        };
        self.ledger.map_booking(booking.id, booking.room.clone());
        guard.insert_booking(booking);
        Ok(confirmation)
    }

    /// Remove a booking, freeing its slot. Returns the removed booking.
    pub async fn delete_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut guard = self.resolve_booking_write(id).await?;
        let booking = guard
            .remove_booking(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        self.ledger.unmap_booking(id);
        drop(guard);

        metrics::gauge!(BOOKINGS_ACTIVE).set(self.ledger.booking_count() as f64);
        info!(booking_id = id, room = %booking.room, "booking deleted");
        Ok(booking)
    }

    /// Drop every booking in every room. Ids keep counting up afterwards.
    pub async fn clear_bookings(&self) -> Result<usize, EngineError> {
        let mut guards = self.lock_all_write().await?;
        let mut removed = 0;
        for guard in guards.iter_mut() {
            for booking in guard.bookings.drain(..) {
                self.ledger.unmap_booking(booking.id);
                removed += 1;
            }
        }
        drop(guards);

        metrics::gauge!(BOOKINGS_ACTIVE).set(self.ledger.booking_count() as f64);
        info!(removed, "ledger cleared");
        Ok(removed)
    }
}
