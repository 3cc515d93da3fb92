mod allocation;
mod availability;
mod error;
mod interval;
mod mutations;
mod queries;
mod store;

pub use allocation::{Candidate, select_room};
pub use availability::{check_availability, is_free};
pub use error::{EngineError, IntervalViolation, TimeField};
pub use interval::{parse_span, parse_time, validate, validate_times};
pub use store::BookingLedger;

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::catalog::RoomCatalog;
use crate::model::*;

pub type SharedRoomLedger = Arc<RwLock<RoomLedger>>;

/// The allocation engine: an immutable room catalog plus the booking ledger
/// it owns.
pub struct Engine {
    catalog: Arc<RoomCatalog>,
    ledger: BookingLedger,
}

impl Engine {
    pub fn new(catalog: Arc<RoomCatalog>) -> Self {
        let ledger = BookingLedger::new(&catalog);
        Self { catalog, ledger }
    }

    pub fn catalog(&self) -> &RoomCatalog {
        &self.catalog
    }

    pub fn booking_count(&self) -> usize {
        self.ledger.booking_count()
    }

    /// Ledger for a catalog room. A catalog room with no ledger means the
    /// engine was built inconsistently.
    pub(super) fn room_ledger(&self, name: &str) -> Result<SharedRoomLedger, EngineError> {
        self.ledger
            .get_room(name)
            .ok_or_else(|| EngineError::Unavailable(format!("room {name} has no ledger")))
    }

    /// Write-lock every room in catalog order. The fixed order keeps
    /// concurrent allocations from deadlocking.
    pub(super) async fn lock_all_write(
        &self,
    ) -> Result<Vec<OwnedRwLockWriteGuard<RoomLedger>>, EngineError> {
        let mut guards = Vec::with_capacity(self.catalog.len());
        for room in self.catalog.list_all() {
            guards.push(self.room_ledger(&room.name)?.write_owned().await);
        }
        Ok(guards)
    }

    pub(super) async fn lock_all_read(
        &self,
    ) -> Result<Vec<OwnedRwLockReadGuard<RoomLedger>>, EngineError> {
        let mut guards = Vec::with_capacity(self.catalog.len());
        for room in self.catalog.list_all() {
            guards.push(self.room_ledger(&room.name)?.read_owned().await);
        }
        Ok(guards)
    }

    /// Lookup booking → room, acquire that room's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        id: BookingId,
    ) -> Result<OwnedRwLockWriteGuard<RoomLedger>, EngineError> {
        let room = self
            .ledger
            .get_room_for_booking(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        Ok(self.room_ledger(&room)?.write_owned().await)
    }

    pub(super) async fn resolve_booking_read(
        &self,
        id: BookingId,
    ) -> Result<OwnedRwLockReadGuard<RoomLedger>, EngineError> {
        let room = self
            .ledger
            .get_room_for_booking(id)
            .ok_or(EngineError::BookingNotFound(id))?;
        Ok(self.room_ledger(&room)?.read_owned().await)
    }
}
