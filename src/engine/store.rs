use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::catalog::RoomCatalog;
use crate::model::*;

use super::SharedRoomLedger;

/// In-memory booking store: one locked `RoomLedger` per catalog room, a
/// booking id → room index, and the id counter.
pub struct BookingLedger {
    rooms: DashMap<String, SharedRoomLedger>,
    booking_to_room: DashMap<BookingId, String>,
    next_id: AtomicU64,
}

impl BookingLedger {
    pub fn new(catalog: &RoomCatalog) -> Self {
        let rooms = DashMap::with_capacity(catalog.len());
        for room in catalog.list_all() {
            rooms.insert(
                room.name.clone(),
                Arc::new(RwLock::new(RoomLedger::new(room.clone()))),
            );
        }
        Self {
            rooms,
            booking_to_room: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room(&self, name: &str) -> Option<SharedRoomLedger> {
        self.rooms.get(name).map(|e| e.value().clone())
    }

    // ── Identity ─────────────────────────────────────────────

    /// Hand out the next booking id. Ids are shared across rooms and never reused.
    pub fn next_id(&self) -> BookingId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ── Booking index ────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.booking_to_room.len()
    }

    pub fn get_room_for_booking(&self, id: BookingId) -> Option<String> {
        self.booking_to_room.get(&id).map(|e| e.value().clone())
    }

    pub fn map_booking(&self, id: BookingId, room: String) {
        self.booking_to_room.insert(id, room);
    }

    pub fn unmap_booking(&self, id: BookingId) {
        self.booking_to_room.remove(&id);
    }
}
